use std::time::Duration;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::migrate::{current_version, open_connection, table_exists, unix_timestamp};
use crate::runtime::ResolvedPaths;
use crate::site::{
    ExecutionContext, Menu, MenuItem, MenuLocations, NewMenuItem, NewPage, Page, PageStatus,
    SiteStore,
};

/// Option naming the active theme's stylesheet slug.
pub const ACTIVE_THEME_OPTION: &str = "stylesheet";

const SAVEPOINT_NAME: &str = "site_store_atomic";

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionState {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteStats {
    pub pages: usize,
    pub options: usize,
    pub menus: usize,
    pub menu_items: usize,
    pub active_extensions: usize,
}

pub struct SqliteSiteStore {
    connection: Connection,
    context: ExecutionContext,
}

impl SqliteSiteStore {
    /// Open the site database for administrative writes. The schema must already be migrated.
    pub fn open(paths: &ResolvedPaths) -> Result<Self> {
        if !paths.db_path.exists() {
            bail!(
                "site database not found at {} (run `siteseed init`)",
                paths.db_path.display()
            );
        }
        let connection = open_connection(&paths.db_path)?;
        ensure_site_schema(&connection)?;
        Ok(Self {
            connection,
            context: ExecutionContext::Administrative,
        })
    }

    /// Open the site database for inspection only; every write fails at the SQLite layer.
    pub fn open_read_only(paths: &ResolvedPaths) -> Result<Self> {
        let connection = Connection::open_with_flags(
            &paths.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {} read-only", paths.db_path.display()))?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .context("failed to set sqlite busy timeout")?;
        ensure_site_schema(&connection)?;
        Ok(Self {
            connection,
            context: ExecutionContext::ReadOnly,
        })
    }

    pub fn list_extensions(&self) -> Result<Vec<ExtensionState>> {
        let mut statement = self
            .connection
            .prepare("SELECT name, active FROM extensions ORDER BY name ASC")
            .context("failed to prepare extensions query")?;
        let rows = statement
            .query_map([], |row| {
                let active: i64 = row.get(1)?;
                Ok(ExtensionState {
                    name: row.get(0)?,
                    active: active == 1,
                })
            })
            .context("failed to run extensions query")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("failed to decode extension row")?);
        }
        Ok(out)
    }

    pub fn set_extension_active(&mut self, name: &str, active: bool) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("extension name cannot be empty");
        }
        self.connection
            .execute(
                "INSERT INTO extensions (name, active, updated_at_unix) VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                    active = excluded.active,
                    updated_at_unix = excluded.updated_at_unix",
                params![name, i64::from(active), now_i64()?],
            )
            .with_context(|| format!("failed to update extension {name}"))?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<u32> {
        current_version(&self.connection)
    }

    pub fn site_stats(&self) -> Result<SiteStats> {
        Ok(SiteStats {
            pages: count_query(&self.connection, "SELECT COUNT(*) FROM pages")?,
            options: count_query(&self.connection, "SELECT COUNT(*) FROM site_options")?,
            menus: count_query(&self.connection, "SELECT COUNT(*) FROM menus")?,
            menu_items: count_query(&self.connection, "SELECT COUNT(*) FROM menu_items")?,
            active_extensions: count_query(
                &self.connection,
                "SELECT COUNT(*) FROM extensions WHERE active = 1",
            )?,
        })
    }
}

impl SiteStore for SqliteSiteStore {
    fn execution_context(&self) -> ExecutionContext {
        self.context
    }

    fn is_extension_active(&mut self, name: &str) -> Result<bool> {
        let active: Option<i64> = self
            .connection
            .query_row(
                "SELECT active FROM extensions WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read extension state for {name}"))?;
        Ok(active == Some(1))
    }

    fn find_page_by_slug(&mut self, slug: &str) -> Result<Option<Page>> {
        let row = self
            .connection
            .query_row(
                "SELECT id, slug, title, status, body FROM pages WHERE slug = ?1 LIMIT 1",
                [slug],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("failed to look up page by slug {slug}"))?;

        match row {
            Some((id, slug, title, status, body)) => Ok(Some(Page {
                id,
                slug,
                title,
                status: PageStatus::parse(&status)?,
                body,
            })),
            None => Ok(None),
        }
    }

    fn create_page(&mut self, page: &NewPage) -> Result<i64> {
        self.connection
            .execute(
                "INSERT INTO pages (slug, title, status, body, created_at_unix)
                VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    page.slug,
                    page.title,
                    page.status.as_str(),
                    page.body,
                    now_i64()?
                ],
            )
            .with_context(|| format!("failed to insert page {}", page.slug))?;
        Ok(self.connection.last_insert_rowid())
    }

    fn get_option(&mut self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .connection
            .query_row(
                "SELECT value_json FROM site_options WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read site option {key}"))?;
        match raw {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("failed to decode site option {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set_option(&mut self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .with_context(|| format!("failed to encode site option {key}"))?;
        self.connection
            .execute(
                "INSERT INTO site_options (key, value_json, updated_at_unix) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value_json = excluded.value_json,
                    updated_at_unix = excluded.updated_at_unix",
                params![key, encoded, now_i64()?],
            )
            .with_context(|| format!("failed to set site option {key}"))?;
        Ok(())
    }

    fn find_menu_by_name(&mut self, name: &str) -> Result<Option<Menu>> {
        self.connection
            .query_row(
                "SELECT id, name FROM menus WHERE name = ?1 LIMIT 1",
                [name],
                |row| {
                    Ok(Menu {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("failed to look up menu {name}"))
    }

    fn create_menu(&mut self, name: &str) -> Result<i64> {
        self.connection
            .execute(
                "INSERT INTO menus (name, created_at_unix) VALUES (?1, ?2)",
                params![name, now_i64()?],
            )
            .with_context(|| format!("failed to insert menu {name}"))?;
        Ok(self.connection.last_insert_rowid())
    }

    fn append_menu_item(&mut self, menu_id: i64, item: &NewMenuItem) -> Result<i64> {
        self.connection
            .execute(
                "INSERT INTO menu_items (menu_id, title, target_page_id, position)
                VALUES (?1, ?2, ?3, ?4)",
                params![
                    menu_id,
                    item.title,
                    item.target_page_id,
                    i64::from(item.position)
                ],
            )
            .with_context(|| format!("failed to append menu item {} to menu {menu_id}", item.title))?;
        Ok(self.connection.last_insert_rowid())
    }

    fn menu_items(&mut self, menu_id: i64) -> Result<Vec<MenuItem>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT id, menu_id, title, target_page_id, position
                 FROM menu_items
                 WHERE menu_id = ?1
                 ORDER BY position ASC",
            )
            .context("failed to prepare menu items query")?;
        let rows = statement
            .query_map([menu_id], |row| {
                let position: i64 = row.get(4)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    position,
                ))
            })
            .with_context(|| format!("failed to run menu items query for menu {menu_id}"))?;

        let mut out = Vec::new();
        for row in rows {
            let (id, menu_id, title, target_page_id, position) =
                row.context("failed to decode menu item row")?;
            out.push(MenuItem {
                id,
                menu_id,
                title,
                target_page_id,
                position: u32::try_from(position)
                    .context("menu item position does not fit into u32")?,
            });
        }
        Ok(out)
    }

    fn active_theme(&mut self) -> Result<Option<String>> {
        Ok(self
            .get_option(ACTIVE_THEME_OPTION)?
            .and_then(|value| value.as_str().map(ToString::to_string)))
    }

    fn activate_theme(&mut self, theme: &str) -> Result<()> {
        self.set_option(ACTIVE_THEME_OPTION, &Value::String(theme.to_string()))
    }

    fn menu_location_bindings(&mut self) -> Result<MenuLocations> {
        let mut statement = self
            .connection
            .prepare("SELECT location, menu_id FROM menu_locations ORDER BY location ASC")
            .context("failed to prepare menu locations query")?;
        let rows = statement
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .context("failed to run menu locations query")?;

        let mut out = MenuLocations::new();
        for row in rows {
            let (location, menu_id) = row.context("failed to decode menu location row")?;
            out.insert(location, menu_id);
        }
        Ok(out)
    }

    fn set_menu_location_bindings(&mut self, bindings: &MenuLocations) -> Result<()> {
        let transaction = self
            .connection
            .savepoint()
            .context("failed to start menu locations savepoint")?;
        transaction
            .execute("DELETE FROM menu_locations", [])
            .context("failed to clear menu locations")?;
        for (location, menu_id) in bindings {
            transaction
                .execute(
                    "INSERT INTO menu_locations (location, menu_id) VALUES (?1, ?2)",
                    params![location, menu_id],
                )
                .with_context(|| format!("failed to bind menu location {location}"))?;
        }
        transaction
            .commit()
            .context("failed to commit menu locations")
    }

    fn atomically<T, F>(&mut self, operation: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.connection
            .execute_batch(&format!("SAVEPOINT {SAVEPOINT_NAME}"))
            .context("failed to create savepoint")?;

        match operation(self) {
            Ok(value) => {
                self.connection
                    .execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT_NAME}"))
                    .context("failed to release savepoint")?;
                Ok(value)
            }
            Err(err) => {
                // Releasing after a failed rollback would commit the partial work.
                if let Err(rollback_err) = self
                    .connection
                    .execute_batch(&format!("ROLLBACK TO SAVEPOINT {SAVEPOINT_NAME}"))
                {
                    warn!(error = %rollback_err, "failed to roll back site store savepoint");
                    return Err(err.context(format!("rollback also failed: {rollback_err}")));
                }
                if let Err(release_err) = self
                    .connection
                    .execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT_NAME}"))
                {
                    warn!(error = %release_err, "failed to release site store savepoint");
                }
                Err(err)
            }
        }
    }
}

fn ensure_site_schema(connection: &Connection) -> Result<()> {
    for table in ["pages", "site_options", "menus", "menu_items", "menu_locations", "extensions"] {
        if !table_exists(connection, table)? {
            bail!("site database is missing table {table} (run `siteseed db migrate`)");
        }
    }
    Ok(())
}

fn count_query(connection: &Connection, sql: &str) -> Result<usize> {
    let count: i64 = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed query: {sql}"))?;
    usize::try_from(count).context("count does not fit into usize")
}

fn now_i64() -> Result<i64> {
    i64::try_from(unix_timestamp()?).context("timestamp does not fit into i64")
}
