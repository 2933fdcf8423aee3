//! Shared HTTP client construction for provider adapters and stream consumers.

use crate::error::SearchError;
use std::time::Duration;

/// User-Agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("vodhub-search/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] for provider requests.
///
/// The client has a whole-request timeout, gzip decompression and a bounded
/// redirect policy.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Build a client for long-lived push channels.
///
/// Only the connect phase is bounded; the body of an event stream may stay
/// open for as long as the slowest provider takes.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_stream_client(connect_timeout: Duration) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build stream client: {e}")))
}
