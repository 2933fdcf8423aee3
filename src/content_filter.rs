//! Category pre-filter applied before records reach the search core.
//!
//! The filter wraps each provider, so blocked records never appear in a
//! `source_result` event and never count toward a group.

use async_trait::async_trait;
use std::sync::Arc;
use vodhub_search::{Provider, ResultRecord, SearchError, SharedProvider};

use crate::config::ContentFilterConfig;

/// Drops records whose `type_name` contains a blocked category.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    blocked: Vec<String>,
}

impl ContentFilter {
    /// Build from the `[content_filter]` section. Blank entries are ignored.
    pub fn from_config(config: &ContentFilterConfig) -> Self {
        let blocked = config
            .blocked_types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { blocked }
    }

    /// Whether nothing is blocked.
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Whether `record` may pass. Records without a category always pass.
    pub fn allows(&self, record: &ResultRecord) -> bool {
        let Some(type_name) = record.type_name.as_deref() else {
            return true;
        };
        let type_name = type_name.to_lowercase();
        !self.blocked.iter().any(|b| type_name.contains(b.as_str()))
    }

    /// Keep the allowed records, preserving order.
    pub fn apply(&self, records: Vec<ResultRecord>) -> Vec<ResultRecord> {
        if self.is_empty() {
            return records;
        }
        records.into_iter().filter(|r| self.allows(r)).collect()
    }
}

/// Provider decorator that runs the inner provider and filters its records.
pub struct FilteredProvider {
    inner: SharedProvider,
    filter: Arc<ContentFilter>,
}

impl FilteredProvider {
    /// Wrap `inner` with `filter`.
    pub fn new(inner: SharedProvider, filter: Arc<ContentFilter>) -> Self {
        Self { inner, filter }
    }
}

#[async_trait]
impl Provider for FilteredProvider {
    fn key(&self) -> &str {
        self.inner.key()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str) -> Result<Vec<ResultRecord>, SearchError> {
        let records = self.inner.search(query).await?;
        let before = records.len();
        let kept = self.filter.apply(records);
        if kept.len() < before {
            tracing::debug!(
                provider = self.key(),
                dropped = before - kept.len(),
                "content filter removed records"
            );
        }
        Ok(kept)
    }
}
