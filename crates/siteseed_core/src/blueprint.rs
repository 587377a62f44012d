//! The fixed storefront layout the bootstrap procedure provisions.

use serde_json::{Map, Value, json};

use crate::config::SiteConfig;

const SHOP_BODY: &str = include_str!("../blueprint/shop.html");
const HOME_BODY: &str = include_str!("../blueprint/home.html");
const ABOUT_BODY: &str = include_str!("../blueprint/about.html");
const CONTACT_BODY: &str = include_str!("../blueprint/contact.html");

/// Site-wide designation written when a page is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRole {
    Plain,
    /// Storefront page read by the catalog extension.
    Shop,
    /// Static page served at the site root.
    FrontPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlueprint {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub role: PageRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuBlueprint {
    pub name: String,
    pub location: String,
    pub entries: Vec<MenuEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteBlueprint {
    pub theme: String,
    pub required_extensions: Vec<String>,
    pub marker_option: String,
    /// Creation order; the menu order lives in `menu.entries`.
    pub pages: Vec<PageBlueprint>,
    pub menu: MenuBlueprint,
    pub theme_settings_option: String,
    pub theme_settings: Map<String, Value>,
}

impl SiteBlueprint {
    pub fn from_config(config: &SiteConfig) -> Self {
        let render = |template: &str| {
            template
                .replace("{{site_name}}", config.site_name())
                .replace("{{contact_email}}", config.contact_email())
        };

        let pages = vec![
            PageBlueprint {
                slug: "shop".to_string(),
                title: "Shop".to_string(),
                body: render(SHOP_BODY).trim_end().to_string(),
                role: PageRole::Shop,
            },
            PageBlueprint {
                slug: "home".to_string(),
                title: "Home".to_string(),
                body: render(HOME_BODY).trim_end().to_string(),
                role: PageRole::FrontPage,
            },
            PageBlueprint {
                slug: "about".to_string(),
                title: "About".to_string(),
                body: render(ABOUT_BODY).trim_end().to_string(),
                role: PageRole::Plain,
            },
            PageBlueprint {
                slug: "contact".to_string(),
                title: "Contact".to_string(),
                body: render(CONTACT_BODY).trim_end().to_string(),
                role: PageRole::Plain,
            },
        ];

        let entries = ["home", "shop", "about", "contact"]
            .iter()
            .filter_map(|slug| pages.iter().find(|page| page.slug == *slug))
            .map(|page| MenuEntry {
                title: page.title.clone(),
                slug: page.slug.clone(),
            })
            .collect();

        Self {
            theme: config.theme(),
            required_extensions: config.required_extensions(),
            marker_option: config.marker_option().to_string(),
            pages,
            menu: MenuBlueprint {
                name: config.menu_name().to_string(),
                location: config.menu_location().to_string(),
                entries,
            },
            theme_settings_option: config.theme_settings_option().to_string(),
            theme_settings: storefront_theme_settings(),
        }
    }
}

pub fn storefront_theme_settings() -> Map<String, Value> {
    let settings = json!({
        "theme-color": "#0274be",
        "link-color": "#0274be",
        "text-color": "#3a3a3a",
        "header-layouts": "header-main-layout-1",
        "header-main-rt-section": "woocommerce",
        "mobile-header-logo-width": { "desktop": 100 },
        "footer-sml-layout": "footer-sml-layout-1",
        "footer-copyright-alignment": "center",
    });
    match settings {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{PageRole, SiteBlueprint, storefront_theme_settings};
    use crate::config::{SiteConfig, SiteSection};

    #[test]
    fn default_blueprint_creates_shop_first_and_orders_menu_from_home() {
        let blueprint = SiteBlueprint::from_config(&SiteConfig::default());
        let slugs = blueprint
            .pages
            .iter()
            .map(|page| page.slug.as_str())
            .collect::<Vec<_>>();
        assert_eq!(slugs, vec!["shop", "home", "about", "contact"]);

        let menu = blueprint
            .menu
            .entries
            .iter()
            .map(|entry| entry.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(menu, vec!["Home", "Shop", "About", "Contact"]);
        assert_eq!(blueprint.menu.name, "Primary");
        assert_eq!(blueprint.menu.location, "primary");
    }

    #[test]
    fn page_roles_mark_shop_and_front_page() {
        let blueprint = SiteBlueprint::from_config(&SiteConfig::default());
        let role = |slug: &str| {
            blueprint
                .pages
                .iter()
                .find(|page| page.slug == slug)
                .map(|page| page.role)
        };
        assert_eq!(role("shop"), Some(PageRole::Shop));
        assert_eq!(role("home"), Some(PageRole::FrontPage));
        assert_eq!(role("about"), Some(PageRole::Plain));
    }

    #[test]
    fn bodies_render_site_identity() {
        let config = SiteConfig {
            site: SiteSection {
                name: Some("Tidewater Goods".to_string()),
                contact_email: Some("hello@tidewater.test".to_string()),
                ..SiteSection::default()
            },
            ..SiteConfig::default()
        };
        let blueprint = SiteBlueprint::from_config(&config);
        let body = |slug: &str| {
            blueprint
                .pages
                .iter()
                .find(|page| page.slug == slug)
                .map(|page| page.body.clone())
                .expect("page")
        };

        assert_eq!(body("shop"), "[woocommerce_cart]");
        assert!(body("home").contains("Welcome to Tidewater Goods"));
        assert!(body("home").contains("wp:woocommerce/featured-product"));
        assert!(body("home").contains("wp:woocommerce/product-categories"));
        assert!(body("about").contains("Welcome to Tidewater Goods, where every piece"));
        assert!(body("contact").contains("hello@tidewater.test"));
        assert!(!body("contact").contains("{{"));
    }

    #[test]
    fn theme_settings_are_the_storefront_layout() {
        let settings = storefront_theme_settings();
        assert_eq!(settings.len(), 8);
        assert_eq!(settings.get("theme-color"), Some(&json!("#0274be")));
        assert_eq!(settings.get("header-main-rt-section"), Some(&json!("woocommerce")));
        assert_eq!(
            settings.get("mobile-header-logo-width"),
            Some(&json!({"desktop": 100}))
        );
    }
}
