//! Builds the enabled provider list from configuration.

use std::sync::Arc;
use vodhub_search::providers::CmsProvider;
use vodhub_search::{AggregateConfig, Dispatcher, SharedProvider};

use crate::config::HubConfig;
use crate::content_filter::{ContentFilter, FilteredProvider};
use crate::error::Result;

/// The providers a hub queries, already wrapped with the content filter.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<SharedProvider>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.key()))
            .finish()
    }
}

impl ProviderRegistry {
    /// One [`CmsProvider`] per enabled `[[providers]]` entry, in file order.
    ///
    /// # Errors
    ///
    /// Fails on an invalid provider URL or if the HTTP client cannot be built.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let timeout = config.search.aggregate.provider_timeout();
        let mut providers: Vec<SharedProvider> = Vec::new();
        for entry in config.enabled_providers() {
            let provider = CmsProvider::new(&entry.key, &entry.name, &entry.api, timeout)?;
            providers.push(Arc::new(provider));
        }
        Ok(Self::with_filter(
            providers,
            ContentFilter::from_config(&config.content_filter),
        ))
    }

    /// Wrap already-built providers with `filter`.
    pub fn with_filter(providers: Vec<SharedProvider>, filter: ContentFilter) -> Self {
        if filter.is_empty() {
            return Self { providers };
        }
        let filter = Arc::new(filter);
        let providers = providers
            .into_iter()
            .map(|inner| {
                Arc::new(FilteredProvider::new(inner, Arc::clone(&filter))) as SharedProvider
            })
            .collect();
        Self { providers }
    }

    /// The provider list handed to each dispatch.
    pub fn providers(&self) -> &[SharedProvider] {
        &self.providers
    }

    /// Number of enabled providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is enabled.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// A dispatcher over every enabled provider.
    pub fn dispatcher(&self, config: &AggregateConfig) -> Dispatcher {
        Dispatcher::new(self.providers.clone(), config.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::{ContentFilterConfig, ProviderEntry};

    fn entry(key: &str, enabled: bool) -> ProviderEntry {
        ProviderEntry {
            key: key.to_owned(),
            name: key.to_uppercase(),
            api: format!("https://{key}.example/api.php/provide/vod"),
            enabled,
        }
    }

    #[test]
    fn builds_enabled_providers_in_order() {
        let config = HubConfig {
            providers: vec![entry("b", true), entry("x", false), entry("a", true)],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        let keys: Vec<&str> = registry.providers().iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(registry.dispatcher(&config.search.aggregate).total_sources(), 2);
    }

    #[test]
    fn filter_keeps_provider_identity() {
        let config = HubConfig {
            providers: vec![entry("a", true)],
            content_filter: ContentFilterConfig {
                blocked_types: vec!["trailer".into()],
            },
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.providers()[0].key(), "a");
        assert_eq!(registry.providers()[0].name(), "A");
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let mut bad = entry("a", true);
        bad.api = "not a url".into();
        let config = HubConfig {
            providers: vec![bad],
            ..Default::default()
        };
        assert!(ProviderRegistry::from_config(&config).is_err());
    }

    #[test]
    fn no_providers_is_not_an_error() {
        let registry = ProviderRegistry::from_config(&HubConfig::default()).unwrap();
        assert!(registry.is_empty());
    }
}
