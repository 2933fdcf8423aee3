//! HTTP client for a running hub.
//!
//! Picks the streaming or fallback mode from `GET /api/config` the same way
//! a browser front end would.

use std::time::Duration;
use url::Url;
use vodhub_search::http::build_stream_client;
use vodhub_search::{SearchError, SseSource};

use crate::error::{HubError, Result};
use crate::server::{ClientConfig, SearchResponse};

/// Talks to one hub server.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base: Url,
}

impl HubClient {
    /// Client for the server at `base` (e.g. `http://127.0.0.1:8090/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, connect_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_stream_client(connect_timeout)?,
            base,
        })
    }

    /// The server base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| HubError::Config(format!("invalid server url {}: {e}", self.base)))
    }

    /// Fetch the server's mode.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Search`] wrapping an HTTP error if the request fails.
    pub async fn config(&self) -> Result<ClientConfig> {
        let url = self.endpoint("/api/config")?;
        let config = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SearchError::Http(format!("config request failed: {e}")))?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("config response: {e}")))?;
        Ok(config)
    }

    /// Run a non-streaming search.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Search`] if the request fails or the body cannot
    /// be decoded.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        let mut url = self.endpoint("/api/search")?;
        url.query_pairs_mut().append_pair("q", query);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SearchError::Http(format!("search request failed: {e}")))?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("search response: {e}")))?;
        Ok(response)
    }

    /// Open the streaming endpoint for `query` as `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the server refuses the stream.
    pub async fn open_stream(&self, query: &str, client_id: &str) -> std::result::Result<SseSource, SearchError> {
        SseSource::connect(&self.http, &self.base, query, client_id).await
    }
}
