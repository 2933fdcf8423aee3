//! Aggregation configuration with sensible defaults.
//!
//! [`AggregateConfig`] controls the fan-out (timeouts, concurrency cap), the
//! push channel capacity, and the consuming side (coalescing window, whether
//! incoming batches are pre-sorted on ingest).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Configuration shared by the dispatcher, emitter and consuming session.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Bounded-latency flush window for the coalescing buffer, in milliseconds.
    pub coalesce_window_ms: u64,
    /// Pre-sort every incoming batch once at ingestion (exact title match
    /// first, then newest year, unknown year last). When `false`, the flat
    /// list keeps raw arrival order and ordering only happens at render time.
    pub presort_on_ingest: bool,
    /// Per-provider deadline in seconds. A provider that misses it is
    /// reported as a `source_error`.
    pub provider_timeout_seconds: u64,
    /// Maximum number of provider calls in flight at once. `0` means one
    /// call per enabled provider with no cap.
    pub max_concurrent_providers: usize,
    /// Capacity of the event channel between emitter and consumer.
    pub event_buffer: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 100,
            presort_on_ingest: true,
            provider_timeout_seconds: 10,
            max_concurrent_providers: 0,
            event_buffer: 64,
        }
    }
}

impl AggregateConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `coalesce_window_ms` must be greater than 0
    /// - `provider_timeout_seconds` must be greater than 0
    /// - `event_buffer` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.coalesce_window_ms == 0 {
            return Err(SearchError::Config(
                "coalesce_window_ms must be greater than 0".into(),
            ));
        }
        if self.provider_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "provider_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(SearchError::Config(
                "event_buffer must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The coalescing window as a [`Duration`].
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    /// The per-provider deadline as a [`Duration`].
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }

    /// Effective fan-out width for `providers` enabled providers.
    pub fn concurrency_limit(&self, providers: usize) -> usize {
        match self.max_concurrent_providers {
            0 => providers.max(1),
            cap => cap.min(providers.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = AggregateConfig::default();
        assert_eq!(config.coalesce_window_ms, 100);
        assert!(config.presort_on_ingest);
        assert_eq!(config.provider_timeout_seconds, 10);
        assert_eq!(config.max_concurrent_providers, 0);
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(AggregateConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_window_rejected() {
        let config = AggregateConfig {
            coalesce_window_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("coalesce_window_ms"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = AggregateConfig {
            provider_timeout_seconds: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider_timeout_seconds"));
    }

    #[test]
    fn zero_buffer_rejected() {
        let config = AggregateConfig {
            event_buffer: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("event_buffer"));
    }

    #[test]
    fn unbounded_concurrency_matches_provider_count() {
        let config = AggregateConfig::default();
        assert_eq!(config.concurrency_limit(7), 7);
        assert_eq!(config.concurrency_limit(0), 1);
    }

    #[test]
    fn bounded_concurrency_caps_fan_out() {
        let config = AggregateConfig {
            max_concurrent_providers: 3,
            ..Default::default()
        };
        assert_eq!(config.concurrency_limit(10), 3);
        assert_eq!(config.concurrency_limit(2), 2);
    }

    #[test]
    fn durations_follow_fields() {
        let config = AggregateConfig {
            coalesce_window_ms: 250,
            provider_timeout_seconds: 4,
            ..Default::default()
        };
        assert_eq!(config.coalesce_window(), Duration::from_millis(250));
        assert_eq!(config.provider_timeout(), Duration::from_secs(4));
    }
}
