use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::blueprint::{MenuBlueprint, PageBlueprint, PageRole, SiteBlueprint};
use crate::site::{
    ExecutionContext, NewMenuItem, NewPage, PAGE_ON_FRONT_OPTION, PageStatus, SHOP_PAGE_OPTION,
    SHOW_ON_FRONT_OPTION, SiteStore, option_is_set,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BootstrapOutcome {
    /// The import marker was already set; nothing after theme activation ran.
    AlreadyImported { marker_value: Value },
    Completed { marker_written_at: u64 },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThemeOutcome {
    pub target: String,
    pub previous: Option<String>,
    pub switched: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnsureAction {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageOutcome {
    pub slug: String,
    pub title: String,
    pub page_id: i64,
    pub action: EnsureAction,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MenuItemOutcome {
    pub title: String,
    pub page_id: i64,
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MenuOutcome {
    pub name: String,
    pub menu_id: i64,
    pub action: EnsureAction,
    pub items: Vec<MenuItemOutcome>,
    /// Slugs whose pages could not be found when the menu was populated.
    pub missing_pages: Vec<String>,
    pub bound_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BootstrapReport {
    pub outcome: BootstrapOutcome,
    pub theme: ThemeOutcome,
    pub pages: Vec<PageOutcome>,
    pub front_page_id: Option<i64>,
    pub menu: Option<MenuOutcome>,
    pub theme_settings_option: Option<String>,
    pub marker_option: String,
}

impl BootstrapReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, BootstrapOutcome::Completed { .. })
    }

    pub fn created_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| page.action == EnsureAction::Created)
            .count()
    }
}

/// Provision the blueprint's pages, menu and theme settings once per site.
///
/// Preconditions are checked before any write. Theme activation happens before
/// the marker gate; everything after it runs inside [`SiteStore::atomically`],
/// so with a transactional store the marker is present only if the whole run
/// committed.
pub fn run_bootstrap<S: SiteStore>(
    store: &mut S,
    blueprint: &SiteBlueprint,
    now_unix: u64,
) -> Result<BootstrapReport> {
    check_preconditions(store, blueprint)?;
    info!(theme = %blueprint.theme, "starting site bootstrap");

    let theme = ensure_theme(store, &blueprint.theme)?;

    if let Some(marker_value) = store
        .get_option(&blueprint.marker_option)
        .context("failed to read import marker")?
        && option_is_set(&marker_value)
    {
        info!(
            marker = %blueprint.marker_option,
            value = %marker_value,
            "site already bootstrapped; skipping"
        );
        return Ok(BootstrapReport {
            outcome: BootstrapOutcome::AlreadyImported { marker_value },
            theme,
            pages: Vec::new(),
            front_page_id: None,
            menu: None,
            theme_settings_option: None,
            marker_option: blueprint.marker_option.clone(),
        });
    }

    store.atomically(|store| {
        info!("creating storefront page structure");
        let mut pages = Vec::with_capacity(blueprint.pages.len());
        let mut front_page_id = None;
        for page in &blueprint.pages {
            let outcome = ensure_page(store, page)
                .with_context(|| format!("failed to provision page {}", page.slug))?;
            if page.role == PageRole::FrontPage && outcome.action == EnsureAction::Created {
                front_page_id = Some(outcome.page_id);
            }
            pages.push(outcome);
        }

        let menu = ensure_menu(store, &blueprint.menu)
            .with_context(|| format!("failed to provision menu {}", blueprint.menu.name))?;

        store
            .set_option(
                &blueprint.theme_settings_option,
                &Value::Object(blueprint.theme_settings.clone()),
            )
            .context("failed to write theme settings")?;
        info!(
            option = %blueprint.theme_settings_option,
            settings = blueprint.theme_settings.len(),
            "applied theme settings"
        );

        store
            .set_option(&blueprint.marker_option, &Value::from(now_unix))
            .context("failed to write import marker")?;
        info!(marker = %blueprint.marker_option, at = now_unix, "recorded import marker");

        Ok(BootstrapReport {
            outcome: BootstrapOutcome::Completed {
                marker_written_at: now_unix,
            },
            theme,
            pages,
            front_page_id,
            menu: Some(menu),
            theme_settings_option: Some(blueprint.theme_settings_option.clone()),
            marker_option: blueprint.marker_option.clone(),
        })
    })
}

fn check_preconditions<S: SiteStore>(store: &mut S, blueprint: &SiteBlueprint) -> Result<()> {
    let context = store.execution_context();
    if context != ExecutionContext::Administrative {
        bail!(
            "bootstrap must run via the administrative CLI harness (site store is {})",
            context.as_str()
        );
    }

    if blueprint.required_extensions.is_empty() {
        debug!("no catalog extension required");
        return Ok(());
    }
    for name in &blueprint.required_extensions {
        if store
            .is_extension_active(name)
            .with_context(|| format!("failed to read extension state for {name}"))?
        {
            debug!(extension = %name, "required extension is active");
            return Ok(());
        }
    }
    bail!(
        "required extension is not active: activate one of [{}] first (siteseed extension activate {})",
        blueprint.required_extensions.join(", "),
        blueprint.required_extensions[0]
    );
}

fn ensure_theme<S: SiteStore>(store: &mut S, target: &str) -> Result<ThemeOutcome> {
    let previous = store
        .active_theme()
        .context("failed to read active theme")?;
    let switched = previous.as_deref() != Some(target);
    if switched {
        info!(
            from = previous.as_deref().unwrap_or("<none>"),
            to = target,
            "switching active theme"
        );
        store
            .activate_theme(target)
            .with_context(|| format!("failed to activate theme {target}"))?;
    }
    Ok(ThemeOutcome {
        target: target.to_string(),
        previous,
        switched,
    })
}

/// Create the page unless one already exists under its slug. Existing pages are
/// never touched, and their designations are not rewritten.
pub fn ensure_page<S: SiteStore>(store: &mut S, page: &PageBlueprint) -> Result<PageOutcome> {
    if let Some(existing) = store.find_page_by_slug(&page.slug)? {
        debug!(slug = %page.slug, page_id = existing.id, "page already present");
        return Ok(PageOutcome {
            slug: page.slug.clone(),
            title: existing.title,
            page_id: existing.id,
            action: EnsureAction::AlreadyPresent,
        });
    }

    let page_id = store.create_page(&NewPage {
        slug: page.slug.clone(),
        title: page.title.clone(),
        status: PageStatus::Publish,
        body: page.body.clone(),
    })?;

    match page.role {
        PageRole::Plain => {
            info!(slug = %page.slug, page_id, "created page");
        }
        PageRole::Shop => {
            store.set_option(SHOP_PAGE_OPTION, &Value::from(page_id))?;
            info!(slug = %page.slug, page_id, "created shop page");
        }
        PageRole::FrontPage => {
            store.set_option(SHOW_ON_FRONT_OPTION, &Value::from("page"))?;
            store.set_option(PAGE_ON_FRONT_OPTION, &Value::from(page_id))?;
            info!(slug = %page.slug, page_id, "created page and set as front page");
        }
    }

    Ok(PageOutcome {
        slug: page.slug.clone(),
        title: page.title.clone(),
        page_id,
        action: EnsureAction::Created,
    })
}

fn ensure_menu<S: SiteStore>(store: &mut S, menu: &MenuBlueprint) -> Result<MenuOutcome> {
    if let Some(existing) = store.find_menu_by_name(&menu.name)? {
        debug!(menu = %menu.name, menu_id = existing.id, "menu already present; leaving it as is");
        return Ok(MenuOutcome {
            name: existing.name,
            menu_id: existing.id,
            action: EnsureAction::AlreadyPresent,
            items: Vec::new(),
            missing_pages: Vec::new(),
            bound_location: None,
        });
    }

    let menu_id = store.create_menu(&menu.name)?;
    let mut items = Vec::with_capacity(menu.entries.len());
    let mut missing_pages = Vec::new();
    for entry in &menu.entries {
        let Some(page) = store.find_page_by_slug(&entry.slug)? else {
            warn!(menu = %menu.name, slug = %entry.slug, "page not found; skipping menu item");
            missing_pages.push(entry.slug.clone());
            continue;
        };
        let position = u32::try_from(items.len() + 1).context("menu position overflow")?;
        store.append_menu_item(
            menu_id,
            &NewMenuItem {
                title: entry.title.clone(),
                target_page_id: page.id,
                position,
            },
        )?;
        items.push(MenuItemOutcome {
            title: entry.title.clone(),
            page_id: page.id,
            position,
        });
    }

    let mut bindings = store.menu_location_bindings()?;
    bindings.insert(menu.location.clone(), menu_id);
    store.set_menu_location_bindings(&bindings)?;
    info!(
        menu = %menu.name,
        menu_id,
        items = items.len(),
        location = %menu.location,
        "created navigation menu"
    );

    Ok(MenuOutcome {
        name: menu.name.clone(),
        menu_id,
        action: EnsureAction::Created,
        items,
        missing_pages,
        bound_location: Some(menu.location.clone()),
    })
}
