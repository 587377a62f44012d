//! Site data model and the store contract the bootstrap procedure runs against.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Option holding the page id served at the site root.
pub const PAGE_ON_FRONT_OPTION: &str = "page_on_front";
/// Option selecting a static page (`"page"`) or the post listing (`"posts"`) at the root.
pub const SHOW_ON_FRONT_OPTION: &str = "show_on_front";
/// Option the catalog extension reads to find its storefront page.
pub const SHOP_PAGE_OPTION: &str = "woocommerce_shop_page_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Publish,
    Draft,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Draft => "draft",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "publish" => Ok(Self::Publish),
            "draft" => Ok(Self::Draft),
            other => bail!("unknown page status: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub status: PageStatus,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub slug: String,
    pub title: String,
    pub status: PageStatus,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: i64,
    pub menu_id: i64,
    pub title: String,
    pub target_page_id: i64,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMenuItem {
    pub title: String,
    pub target_page_id: i64,
    pub position: u32,
}

/// Theme navigation slot name mapped to a menu id.
pub type MenuLocations = BTreeMap<String, i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    Administrative,
    ReadOnly,
}

impl ExecutionContext {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrative => "administrative",
            Self::ReadOnly => "read-only",
        }
    }
}

pub trait SiteStore {
    fn execution_context(&self) -> ExecutionContext;
    fn is_extension_active(&mut self, name: &str) -> Result<bool>;

    fn find_page_by_slug(&mut self, slug: &str) -> Result<Option<Page>>;
    fn create_page(&mut self, page: &NewPage) -> Result<i64>;

    fn get_option(&mut self, key: &str) -> Result<Option<Value>>;
    fn set_option(&mut self, key: &str, value: &Value) -> Result<()>;

    fn find_menu_by_name(&mut self, name: &str) -> Result<Option<Menu>>;
    fn create_menu(&mut self, name: &str) -> Result<i64>;
    fn append_menu_item(&mut self, menu_id: i64, item: &NewMenuItem) -> Result<i64>;
    fn menu_items(&mut self, menu_id: i64) -> Result<Vec<MenuItem>>;

    fn active_theme(&mut self) -> Result<Option<String>>;
    fn activate_theme(&mut self, theme: &str) -> Result<()>;

    fn menu_location_bindings(&mut self) -> Result<MenuLocations>;
    fn set_menu_location_bindings(&mut self, bindings: &MenuLocations) -> Result<()>;

    /// Run `operation` as one unit. Stores without transactions run it directly,
    /// so earlier writes survive a later failure.
    fn atomically<T, F>(&mut self, operation: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        operation(self)
    }
}

/// Loose truthiness for option values: null, false, zero and empty values count as unset.
pub fn option_is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{PageStatus, option_is_set};

    #[test]
    fn option_truthiness_matches_unset_values() {
        assert!(!option_is_set(&json!(null)));
        assert!(!option_is_set(&json!(false)));
        assert!(!option_is_set(&json!(0)));
        assert!(!option_is_set(&json!("")));
        assert!(!option_is_set(&json!("0")));
        assert!(!option_is_set(&json!({})));
        assert!(option_is_set(&json!(1_760_000_000u64)));
        assert!(option_is_set(&json!("yes")));
        assert!(option_is_set(&json!({"primary": 3})));
    }

    #[test]
    fn page_status_parses_stored_values() {
        assert_eq!(PageStatus::parse("publish").expect("parse"), PageStatus::Publish);
        assert_eq!(PageStatus::parse("draft").expect("parse"), PageStatus::Draft);
        assert!(PageStatus::parse("trash").is_err());
    }
}
