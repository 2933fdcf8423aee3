//! HTTP server exposing the search core.
//!
//! ## Endpoints
//!
//! - `GET /api/search/stream?q=&client=`: SSE stream of search events
//! - `GET /api/search?q=`: non-streaming fallback, one JSON body
//! - `GET /api/config`: tells clients which mode is enabled
//!
//! Each streaming request runs its fan-out on a background task that feeds
//! an mpsc channel; the SSE body drains that channel. A client id has at
//! most one live fan-out: a newer request for the same id cancels the older
//! one before it starts.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;
use vodhub_search::{AggregateConfig, ResultRecord, SearchError, SourceFailure, run_search};

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::registry::ProviderRegistry;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query string accepted by both search endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    /// The search query.
    #[serde(default)]
    pub q: String,
    /// Consumer id for session exclusivity. Generated when absent.
    #[serde(default)]
    pub client: Option<String>,
}

/// Body of the non-streaming fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Every record, grouped by provider in completion order.
    pub results: Vec<ResultRecord>,
    /// Providers queried.
    pub total_sources: usize,
    /// Providers that finished, successfully or not.
    pub completed_sources: usize,
    /// Providers that failed or timed out.
    pub failed_sources: Vec<SourceFailure>,
}

/// Body of `GET /api/config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Whether the streaming endpoint is enabled.
    pub streaming: bool,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error details.
    pub error: ErrorBody,
}

/// Error details within an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub message: String,
    /// Error type (e.g. `"invalid_request_error"`, `"not_found"`).
    #[serde(rename = "type")]
    pub error_type: String,
}

fn error_response(status: StatusCode, message: &str, error_type: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            message: message.to_owned(),
            error_type: error_type.to_owned(),
        },
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Per-client session registry
// ---------------------------------------------------------------------------

struct LiveSession {
    id: u64,
    cancel: CancellationToken,
}

/// Tracks the one live fan-out per client id.
#[derive(Default)]
struct ClientSessions {
    next_id: AtomicU64,
    live: Mutex<HashMap<String, LiveSession>>,
}

impl ClientSessions {
    /// Register a new fan-out for `client`, cancelling the previous one.
    fn begin(&self, client: &str) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let previous = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                client.to_owned(),
                LiveSession {
                    id,
                    cancel: cancel.clone(),
                },
            );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            tracing::debug!(client, superseded = previous.id, session = id, "session replaced");
        }
        (id, cancel)
    }

    /// Forget `client`'s fan-out if it is still session `id`.
    fn end(&self, client: &str, id: u64) {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        if live.get(client).is_some_and(|s| s.id == id) {
            live.remove(client);
        }
    }

    fn len(&self) -> usize {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    registry: ProviderRegistry,
    aggregate: AggregateConfig,
    streaming: bool,
    sessions: Arc<ClientSessions>,
}

// ---------------------------------------------------------------------------
// HubServer
// ---------------------------------------------------------------------------

/// The search HTTP server running on a background task.
pub struct HubServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
    sessions: Arc<ClientSessions>,
}

impl HubServer {
    /// Validate `config`, build its providers and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a provider cannot
    /// be built, or the listener cannot bind.
    pub async fn start(config: &HubConfig) -> Result<Self> {
        config.validate()?;
        let registry = ProviderRegistry::from_config(config)?;
        Self::start_with_registry(registry, config).await
    }

    /// Start serving an already-built provider registry.
    ///
    /// Binds to `{config.server.host}:{config.server.port}` (use port `0`
    /// for auto-assign).
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregation settings are invalid or the TCP
    /// listener cannot bind.
    pub async fn start_with_registry(registry: ProviderRegistry, config: &HubConfig) -> Result<Self> {
        config.search.aggregate.validate()?;

        let sessions = Arc::new(ClientSessions::default());
        let state = AppState {
            registry,
            aggregate: config.search.aggregate.clone(),
            streaming: config.search.streaming,
            sessions: Arc::clone(&sessions),
        };

        let app = Router::new()
            .route("/api/config", get(handle_config))
            .route("/api/search", get(handle_search))
            .route("/api/search/stream", get(handle_stream))
            .with_state(state);

        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| HubError::Server(format!("bind {bind_addr} failed: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| HubError::Server(format!("failed to get local addr: {e}")))?;

        info!(
            streaming = config.search.streaming,
            "search server listening on http://{addr}/api"
        );

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("search server error: {e}");
            }
        });

        Ok(Self {
            addr,
            handle,
            sessions,
        })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL for clients, e.g. `http://127.0.0.1:8090/`.
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Number of client ids with a fan-out still running.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for HubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `GET /api/config`
async fn handle_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(ClientConfig {
        streaming: state.streaming,
    })
}

/// `GET /api/search`: wait for every provider, then answer once.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.trim();
    if query.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "query must not be empty",
            "invalid_request_error",
        );
    }

    tracing::trace!(query, "fallback search");
    let report = state.registry.dispatcher(&state.aggregate).collect(query).await;

    Json(SearchResponse {
        results: report.records,
        total_sources: report.progress.total_sources,
        completed_sources: report.progress.completed_sources,
        failed_sources: report.failed,
    })
    .into_response()
}

/// `GET /api/search/stream`: one SSE `data:` frame per search event.
async fn handle_stream(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    if !state.streaming {
        return error_response(
            StatusCode::NOT_FOUND,
            "streaming search is disabled; use /api/search",
            "not_found",
        );
    }
    let query = params.q.trim().to_owned();
    if query.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "query must not be empty",
            "invalid_request_error",
        );
    }

    let client = params
        .client
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let (session, cancel) = state.sessions.begin(&client);
    tracing::trace!(%query, %client, session, "streaming search");

    let dispatcher = state.registry.dispatcher(&state.aggregate);
    let (tx, mut rx) = mpsc::channel(state.aggregate.event_buffer);
    let sessions = Arc::clone(&state.sessions);

    // The fan-out outlives the handler; it stops when the SSE body is
    // dropped or a newer request for this client cancels it.
    tokio::spawn(async move {
        match run_search(&query, &dispatcher, tx, cancel).await {
            Ok(progress) => tracing::debug!(
                session,
                total = progress.total_sources,
                "stream complete"
            ),
            Err(SearchError::Closed) => tracing::debug!(session, "stream abandoned"),
            Err(e) => tracing::warn!(session, error = %e, "stream failed"),
        }
        sessions.end(&client, session);
    });

    let sse_stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match event.encode() {
                Ok(json) => yield Ok::<_, Infallible>(Event::default().data(json)),
                Err(e) => tracing::warn!(error = %e, "dropping unencodable event"),
            }
        }
    };

    Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
