//! The push-channel event taxonomy and its JSON wire format.
//!
//! A session emits exactly one [`SearchEvent::Start`], then any interleaving
//! of [`SearchEvent::SourceResult`] and [`SearchEvent::SourceError`], then
//! exactly one [`SearchEvent::Complete`].

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::ResultRecord;

/// One discrete event on a search push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    /// The fan-out began against `total_sources` providers.
    Start {
        /// Number of providers queried.
        #[serde(rename = "totalSources")]
        total_sources: usize,
    },
    /// Records returned by one provider.
    SourceResult {
        /// Provider key.
        source: String,
        /// Provider display name.
        #[serde(rename = "sourceName", default)]
        source_name: String,
        /// Zero or more records, in the provider's emission order.
        #[serde(default)]
        results: Vec<ResultRecord>,
    },
    /// One provider failed or timed out.
    SourceError {
        /// Provider key.
        source: String,
        /// Provider display name.
        #[serde(rename = "sourceName", default)]
        source_name: String,
        /// Failure description.
        #[serde(default)]
        error: String,
    },
    /// Every provider has been accounted for.
    Complete {
        /// Successes plus failures.
        #[serde(rename = "completedSources")]
        completed_sources: usize,
    },
}

impl SearchEvent {
    /// Short lowercase name of the event kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::SourceResult { .. } => "source_result",
            Self::SourceError { .. } => "source_error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Encode as a single-line JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Protocol`] if serialisation fails.
    pub fn encode(&self) -> Result<String, SearchError> {
        serde_json::to_string(self)
            .map_err(|e| SearchError::Protocol(format!("failed to encode {} event: {e}", self.kind())))
    }

    /// Decode a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MalformedEvent`] for anything that is not a
    /// well-formed event. Callers drop such payloads and keep going.
    pub fn decode(payload: &str) -> Result<Self, SearchError> {
        serde_json::from_str(payload).map_err(|e| SearchError::MalformedEvent(e.to_string()))
    }
}
