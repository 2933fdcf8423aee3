//! Error types for the vodhub-search crate.
//!
//! Provider-level failures are carried as data (`source_error` events) and
//! never abort a fan-out. Only [`SearchError::Transport`] is fatal to a
//! consuming session, and even then it surfaces as a terminal status rather
//! than an error crossing the session boundary.

/// Errors that can occur while dispatching, streaming or consuming a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A single provider failed to answer the query.
    #[error("provider {provider} failed: {reason}")]
    Provider {
        /// Provider key.
        provider: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A single provider did not answer before its deadline.
    #[error("provider {0} timed out")]
    Timeout(String),

    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A provider response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The stream emitter was driven through an illegal transition.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An event payload could not be decoded. Non-fatal: the event is dropped.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The push channel itself broke. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(String),

    /// The consumer detached or was superseded by a newer session.
    #[error("channel closed")]
    Closed,
}

impl SearchError {
    /// Whether this error ends a consuming session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Convenience type alias for vodhub-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
