use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SITE_NAME: &str = "Myriam Craft Store";
pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONTACT_EMAIL: &str = "info@myriamcraft.com";
pub const DEFAULT_THEME: &str = "astra";
pub const DEFAULT_MARKER_OPTION: &str = "myngcraft_brandstore_imported";
pub const DEFAULT_MENU_NAME: &str = "Primary";
pub const DEFAULT_MENU_LOCATION: &str = "primary";
pub const DEFAULT_THEME_SETTINGS_OPTION: &str = "astra-settings";
pub const DEFAULT_REQUIRED_EXTENSIONS: [&str; 2] = ["astra-sites", "starter-templates"];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub bootstrap: BootstrapSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteSection {
    pub url: Option<String>,
    pub name: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BootstrapSection {
    pub theme: Option<String>,
    pub marker_option: Option<String>,
    /// Any one of these must be active; empty means the built-in pair.
    #[serde(default)]
    pub required_extensions: Vec<String>,
    pub menu_name: Option<String>,
    pub menu_location: Option<String>,
    pub theme_settings_option: Option<String>,
}

impl SiteConfig {
    /// Resolve the site base URL: env SITESEED_SITE_URL > config > DEFAULT_SITE_URL.
    pub fn site_url(&self) -> String {
        self.site_url_with_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn site_url_with_lookup<F>(&self, lookup_env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(lookup_env("SITESEED_SITE_URL"))
            .unwrap_or_else(|| self.site.url.as_deref().unwrap_or(DEFAULT_SITE_URL).to_string());
        url.trim().trim_end_matches('/').to_string()
    }

    pub fn site_name(&self) -> &str {
        self.site.name.as_deref().unwrap_or(DEFAULT_SITE_NAME)
    }

    pub fn contact_email(&self) -> &str {
        self.site
            .contact_email
            .as_deref()
            .unwrap_or(DEFAULT_CONTACT_EMAIL)
    }

    /// Resolve the target theme: env SITESEED_THEME > config > DEFAULT_THEME.
    pub fn theme(&self) -> String {
        self.theme_with_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn theme_with_lookup<F>(&self, lookup_env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        non_empty(lookup_env("SITESEED_THEME"))
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| {
                self.bootstrap
                    .theme
                    .clone()
                    .unwrap_or_else(|| DEFAULT_THEME.to_string())
            })
    }

    pub fn marker_option(&self) -> &str {
        self.bootstrap
            .marker_option
            .as_deref()
            .unwrap_or(DEFAULT_MARKER_OPTION)
    }

    pub fn required_extensions(&self) -> Vec<String> {
        if self.bootstrap.required_extensions.is_empty() {
            DEFAULT_REQUIRED_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            self.bootstrap.required_extensions.clone()
        }
    }

    pub fn menu_name(&self) -> &str {
        self.bootstrap
            .menu_name
            .as_deref()
            .unwrap_or(DEFAULT_MENU_NAME)
    }

    pub fn menu_location(&self) -> &str {
        self.bootstrap
            .menu_location
            .as_deref()
            .unwrap_or(DEFAULT_MENU_LOCATION)
    }

    pub fn theme_settings_option(&self) -> &str {
        self.bootstrap
            .theme_settings_option
            .as_deref()
            .unwrap_or(DEFAULT_THEME_SETTINGS_OPTION)
    }

    fn validate(&self, config_path: &Path) -> Result<()> {
        let named = [
            ("bootstrap.theme", self.bootstrap.theme.as_deref()),
            (
                "bootstrap.marker_option",
                self.bootstrap.marker_option.as_deref(),
            ),
            ("bootstrap.menu_name", self.bootstrap.menu_name.as_deref()),
            (
                "bootstrap.menu_location",
                self.bootstrap.menu_location.as_deref(),
            ),
            (
                "bootstrap.theme_settings_option",
                self.bootstrap.theme_settings_option.as_deref(),
            ),
        ];
        for (key, value) in named {
            if let Some(value) = value
                && value.trim().is_empty()
            {
                bail!("{key} cannot be empty in {}", config_path.display());
            }
        }
        if self
            .bootstrap
            .required_extensions
            .iter()
            .any(|name| name.trim().is_empty())
        {
            bail!(
                "bootstrap.required_extensions cannot contain empty names in {}",
                config_path.display()
            );
        }
        Ok(())
    }
}

/// Load and parse a SiteConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<SiteConfig> {
    if !config_path.exists() {
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: SiteConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    parsed.validate(config_path)?;
    Ok(parsed)
}

pub fn render_default_config() -> String {
    format!(
        "# siteseed runtime configuration (materialized by `siteseed init`)\n\n[site]\nurl = \"{DEFAULT_SITE_URL}\"\nname = \"{DEFAULT_SITE_NAME}\"\ncontact_email = \"{DEFAULT_CONTACT_EMAIL}\"\n\n[bootstrap]\ntheme = \"{DEFAULT_THEME}\"\nmarker_option = \"{DEFAULT_MARKER_OPTION}\"\n# Any one of these must be active before bootstrap runs.\nrequired_extensions = [\"{}\", \"{}\"]\nmenu_name = \"{DEFAULT_MENU_NAME}\"\nmenu_location = \"{DEFAULT_MENU_LOCATION}\"\ntheme_settings_option = \"{DEFAULT_THEME_SETTINGS_OPTION}\"\n",
        DEFAULT_REQUIRED_EXTENSIONS[0], DEFAULT_REQUIRED_EXTENSIONS[1],
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_uses_builtin_bootstrap_values() {
        let config = SiteConfig::default();
        assert_eq!(config.marker_option(), DEFAULT_MARKER_OPTION);
        assert_eq!(config.menu_name(), "Primary");
        assert_eq!(config.menu_location(), "primary");
        assert_eq!(config.theme_settings_option(), "astra-settings");
        assert_eq!(
            config.required_extensions(),
            vec!["astra-sites".to_string(), "starter-templates".to_string()]
        );
        assert_eq!(config.site_name(), DEFAULT_SITE_NAME);
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn load_config_parses_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[site]
url = "https://shop.example.org/"
name = "Example Shop"

[bootstrap]
marker_option = "example_seeded"
required_extensions = ["catalog"]
menu_name = "Main Navigation"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.site.url.as_deref(), Some("https://shop.example.org/"));
        assert_eq!(config.site_name(), "Example Shop");
        assert_eq!(config.marker_option(), "example_seeded");
        assert_eq!(config.required_extensions(), vec!["catalog".to_string()]);
        assert_eq!(config.menu_name(), "Main Navigation");
        assert_eq!(config.menu_location(), DEFAULT_MENU_LOCATION);
    }

    #[test]
    fn rendered_default_config_round_trips() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, render_default_config()).expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.bootstrap.theme.as_deref(), Some(DEFAULT_THEME));
        assert_eq!(config.marker_option(), DEFAULT_MARKER_OPTION);
        assert_eq!(config.required_extensions().len(), 2);
    }

    #[test]
    fn env_overrides_win_over_config_values() {
        let config = SiteConfig {
            site: SiteSection {
                url: Some("https://shop.example.org".to_string()),
                ..SiteSection::default()
            },
            bootstrap: BootstrapSection {
                theme: Some("storefront".to_string()),
                ..BootstrapSection::default()
            },
        };
        let env = HashMap::from([
            (
                "SITESEED_SITE_URL".to_string(),
                " https://staging.example.org/ ".to_string(),
            ),
            ("SITESEED_THEME".to_string(), "kadence".to_string()),
        ]);

        assert_eq!(
            config.site_url_with_lookup(|key| env.get(key).cloned()),
            "https://staging.example.org"
        );
        assert_eq!(config.theme_with_lookup(|key| env.get(key).cloned()), "kadence");
    }

    #[test]
    fn config_values_win_over_defaults_and_blank_env_is_ignored() {
        let config = SiteConfig {
            site: SiteSection {
                url: Some("https://shop.example.org///".to_string()),
                ..SiteSection::default()
            },
            bootstrap: BootstrapSection {
                theme: Some("storefront".to_string()),
                ..BootstrapSection::default()
            },
        };
        let env = HashMap::from([("SITESEED_THEME".to_string(), "   ".to_string())]);

        assert_eq!(
            config.site_url_with_lookup(|key| env.get(key).cloned()),
            "https://shop.example.org"
        );
        assert_eq!(
            config.theme_with_lookup(|key| env.get(key).cloned()),
            "storefront"
        );
    }

    #[test]
    fn defaults_apply_without_env_or_config() {
        let config = SiteConfig::default();
        assert_eq!(config.site_url_with_lookup(|_| None), DEFAULT_SITE_URL);
        assert_eq!(config.theme_with_lookup(|_| None), DEFAULT_THEME);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[site\nurl = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn load_config_rejects_blank_marker_option() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[bootstrap]\nmarker_option = \"  \"\n").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("bootstrap.marker_option"));
    }
}
