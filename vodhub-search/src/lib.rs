//! # vodhub-search
//!
//! Streaming multi-source video search.
//!
//! A query fans out to every enabled [`Provider`] at once. As each provider
//! answers, its records are pushed to the consumer as discrete
//! [`SearchEvent`]s. The consumer side folds those events into a live flat
//! list and a grouped list, and derives sorted, filtered views from both
//! while the stream is still in flight.
//!
//! ## Design
//!
//! - [`Dispatcher`]: concurrent fan-out, one call per provider, each under
//!   its own deadline. A failing provider never affects the others.
//! - [`StreamEmitter`] / [`run_search`]: `start`, then any interleaving of
//!   `source_result` and `source_error`, then `complete`.
//! - [`EventSource`]: the consumer's end of the push channel, in-process
//!   ([`ChannelSource`]) or over SSE ([`SseSource`]).
//! - [`Session`] / [`SessionController`]: one live query per consumer,
//!   always reaching a terminal status.
//! - [`CoalescingBuffer`] and [`Aggregator`]: bounded-latency batching and
//!   append-only grouping by `(title, year, kind)`.
//! - [`view`]: flat and grouped views under a filter and sort order.
//!
//! ## Security
//!
//! - Queries are logged only at trace level
//! - No network listeners; serving is the host's job

pub mod aggregate;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod session;
pub mod sse;
pub mod transport;
pub mod types;
pub mod view;

pub use aggregate::{AggregationGroup, Aggregator, GroupKey, GroupStats};
pub use config::AggregateConfig;
pub use error::{Result, SearchError};
pub use event::SearchEvent;
pub use orchestrator::{run_search, DispatchReport, Dispatcher, SourceFailure, StreamEmitter};
pub use provider::{Provider, SharedProvider};
pub use session::{CoalescingBuffer, Session, SessionController, SessionStatus, SessionUpdate};
pub use transport::{ChannelSource, EventSource, SseSource};
pub use types::{MediaKind, Progress, ResultRecord};
pub use view::{FilterOptions, SortOrder, ViewFilter};

/// Query every provider and wait for all of them.
///
/// The non-streaming counterpart of [`run_search`]: failures are collected
/// in [`DispatchReport::failed`] instead of being emitted as events.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `config` fails validation. Provider
/// failures never make this function fail.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> vodhub_search::Result<()> {
/// use std::sync::Arc;
/// use vodhub_search::providers::CmsProvider;
///
/// let config = vodhub_search::AggregateConfig::default();
/// let provider = CmsProvider::new("demo", "Demo", "https://cms.example/api.php/provide/vod", config.provider_timeout())?;
/// let report = vodhub_search::search("Foo", vec![Arc::new(provider)], &config).await?;
/// println!("{} records from {} sources", report.records.len(), report.progress.total_sources);
/// # Ok(())
/// # }
/// ```
pub async fn search(
    query: &str,
    providers: Vec<SharedProvider>,
    config: &AggregateConfig,
) -> Result<DispatchReport> {
    config.validate()?;
    Ok(Dispatcher::new(providers, config.clone()).collect(query).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_validates_config_zero_timeout() {
        let config = AggregateConfig {
            provider_timeout_seconds: 0,
            ..Default::default()
        };
        let result = search("test", vec![], &config).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn search_with_no_providers_completes_empty() {
        let report = search("test", vec![], &AggregateConfig::default())
            .await
            .expect("search");
        assert!(report.records.is_empty());
        assert!(report.progress.is_complete());
        assert_eq!(report.progress.total_sources, 0);
    }
}
