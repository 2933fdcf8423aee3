//! Host configuration loaded from TOML.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8090
//!
//! [search]
//! streaming = true
//! coalesce_window_ms = 100
//! provider_timeout_seconds = 10
//!
//! [[providers]]
//! key = "alpha"
//! name = "Alpha CMS"
//! api = "https://alpha.example/api.php/provide/vod"
//!
//! [content_filter]
//! blocked_types = ["trailer"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use vodhub_search::AggregateConfig;

use crate::error::{HubError, Result};

/// Top-level configuration for the hub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Search mode and aggregation tuning.
    pub search: SearchSection,
    /// Upstream providers, in the order they are queried.
    pub providers: Vec<ProviderEntry>,
    /// Category pre-filter applied before records reach the core.
    pub content_filter: ContentFilterConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind. `0` picks a free port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8090,
        }
    }
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// Serve results over the streaming endpoint. When `false` clients must
    /// use the non-streaming fallback.
    pub streaming: bool,
    /// Aggregation tuning shared with the core.
    #[serde(flatten)]
    pub aggregate: AggregateConfig,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            streaming: true,
            aggregate: AggregateConfig::default(),
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Stable key used in events and filters.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Base URL of the provider's CMS API.
    pub api: String,
    /// Disabled providers are never queried.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// `[content_filter]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilterConfig {
    /// Category substrings to drop, matched case-insensitively against
    /// each record's `type_name`.
    pub blocked_types: Vec<String>,
}

impl HubConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HubError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HubError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/vodhub/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("vodhub").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("vodhub")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/vodhub-config/config.toml")
        }
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Search`] for invalid aggregation settings and
    /// [`HubError::Config`] for blank or duplicate provider keys.
    pub fn validate(&self) -> Result<()> {
        self.search.aggregate.validate()?;

        let mut keys = HashSet::new();
        for provider in &self.providers {
            if provider.key.trim().is_empty() {
                return Err(HubError::Config("provider key must not be empty".into()));
            }
            if !keys.insert(provider.key.as_str()) {
                return Err(HubError::Config(format!(
                    "duplicate provider key {:?}",
                    provider.key
                )));
            }
        }
        Ok(())
    }

    /// Providers that will be queried.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderEntry> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn entry(key: &str) -> ProviderEntry {
        ProviderEntry {
            key: key.to_owned(),
            name: key.to_uppercase(),
            api: format!("https://{key}.example/api.php/provide/vod"),
            enabled: true,
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.search.streaming);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: HubConfig = toml::from_str("").unwrap();
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn search_section_reads_flattened_aggregate_fields() {
        let config: HubConfig = toml::from_str(
            r#"
            [search]
            streaming = false
            coalesce_window_ms = 250
            max_concurrent_providers = 4
            "#,
        )
        .unwrap();
        assert!(!config.search.streaming);
        assert_eq!(config.search.aggregate.coalesce_window_ms, 250);
        assert_eq!(config.search.aggregate.max_concurrent_providers, 4);
        assert_eq!(config.search.aggregate.provider_timeout_seconds, 10);
    }

    #[test]
    fn provider_enabled_defaults_true() {
        let config: HubConfig = toml::from_str(
            r#"
            [[providers]]
            key = "alpha"
            name = "Alpha"
            api = "https://alpha.example/api"

            [[providers]]
            key = "beta"
            name = "Beta"
            api = "https://beta.example/api"
            enabled = false
            "#,
        )
        .unwrap();
        let enabled: Vec<&str> = config.enabled_providers().map(|p| p.key.as_str()).collect();
        assert_eq!(enabled, vec!["alpha"]);
    }

    #[test]
    fn duplicate_provider_keys_rejected() {
        let config = HubConfig {
            providers: vec![entry("alpha"), entry("alpha")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn blank_provider_key_rejected() {
        let config = HubConfig {
            providers: vec![entry(" ")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_aggregate_settings_rejected() {
        let mut config = HubConfig::default();
        config.search.aggregate.event_buffer = 0;
        assert!(matches!(config.validate(), Err(HubError::Search(_))));
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = HubConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = HubConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("vodhub"));
    }
}
