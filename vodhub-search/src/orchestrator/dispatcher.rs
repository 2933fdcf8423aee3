//! Concurrent provider fan-out with per-provider failure isolation.
//!
//! One request per enabled provider, each wrapped in its own deadline. A
//! provider that errors or times out becomes a [`ProviderOutcome`] carrying
//! the error; it never blocks or fails the other providers.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::AggregateConfig;
use crate::error::SearchError;
use crate::provider::SharedProvider;
use crate::types::{Progress, ResultRecord};

/// What one provider produced for a query.
#[derive(Debug)]
pub struct ProviderOutcome {
    /// Provider key.
    pub source: String,
    /// Provider display name.
    pub source_name: String,
    /// Records in provider order, or the reason the provider failed.
    pub result: Result<Vec<ResultRecord>, SearchError>,
}

/// A provider that failed during a non-streaming fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    /// Provider key.
    pub source: String,
    /// Provider display name.
    pub source_name: String,
    /// Failure description.
    pub error: String,
}

/// Everything a completed non-streaming fan-out produced.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// All records, grouped by provider in completion order.
    pub records: Vec<ResultRecord>,
    /// Providers that failed or timed out.
    pub failed: Vec<SourceFailure>,
    /// Final counters. `completed_sources` always equals `total_sources`.
    pub progress: Progress,
}

/// Issues one request per provider for a query.
#[derive(Clone)]
pub struct Dispatcher {
    providers: Vec<SharedProvider>,
    config: AggregateConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.key()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher over the enabled providers for one request.
    pub fn new(providers: Vec<SharedProvider>, config: AggregateConfig) -> Self {
        Self { providers, config }
    }

    /// Number of providers a dispatch will query.
    pub fn total_sources(&self) -> usize {
        self.providers.len()
    }

    /// Fan the query out and yield each provider's outcome as it finishes.
    ///
    /// Outcomes arrive first-come-first-served. The stream ends after exactly
    /// [`total_sources`](Self::total_sources) items. At most
    /// [`AggregateConfig::concurrency_limit`] calls are in flight at once.
    /// Dropping the stream abandons calls still in flight.
    pub fn dispatch(&self, query: &str) -> BoxStream<'static, ProviderOutcome> {
        let query: Arc<str> = Arc::from(query);
        let timeout = self.config.provider_timeout();
        let limit = self.config.concurrency_limit(self.providers.len());

        tracing::trace!(%query, providers = self.providers.len(), limit, "dispatching query");

        stream::iter(self.providers.clone())
            .map(move |provider| {
                let query = Arc::clone(&query);
                async move { query_provider(provider, &query, timeout).await }
            })
            .buffer_unordered(limit)
            .boxed()
    }

    /// Run a full fan-out and wait for every provider to finish or time out.
    pub async fn collect(&self, query: &str) -> DispatchReport {
        let mut report = DispatchReport {
            progress: Progress::new(self.total_sources()),
            ..Default::default()
        };

        let mut outcomes = self.dispatch(query);
        while let Some(outcome) = outcomes.next().await {
            report.progress.completed_sources += 1;
            match outcome.result {
                Ok(records) => report.records.extend(records),
                Err(err) => report.failed.push(SourceFailure {
                    source: outcome.source,
                    source_name: outcome.source_name,
                    error: err.to_string(),
                }),
            }
        }

        tracing::debug!(
            total = report.progress.total_sources,
            failed = report.failed.len(),
            records = report.records.len(),
            "fan-out complete"
        );
        report
    }
}

/// Query a single provider under its deadline.
///
/// Records are stamped with the provider's key and display name so every
/// record in an outcome is attributable to the provider that produced it.
async fn query_provider(
    provider: SharedProvider,
    query: &str,
    timeout: Duration,
) -> ProviderOutcome {
    let source = provider.key().to_owned();
    let source_name = provider.name().to_owned();

    let result = match tokio::time::timeout(timeout, provider.search(query)).await {
        Ok(Ok(mut records)) => {
            for record in &mut records {
                record.source.clone_from(&source);
                record.source_name.clone_from(&source_name);
            }
            tracing::debug!(provider = %source, count = records.len(), "provider returned results");
            Ok(records)
        }
        Ok(Err(err)) => {
            tracing::warn!(provider = %source, error = %err, "provider query failed");
            Err(err)
        }
        Err(_) => {
            tracing::warn!(provider = %source, ?timeout, "provider query timed out");
            Err(SearchError::Timeout(source.clone()))
        }
    };

    ProviderOutcome {
        source,
        source_name,
        result,
    }
}
