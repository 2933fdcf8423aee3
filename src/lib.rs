//! # vodhub
//!
//! Host application for [`vodhub_search`]: loads configuration, builds the
//! provider list, applies the content pre-filter and serves the streaming
//! and non-streaming search endpoints over HTTP.
//!
//! ## Binaries
//!
//! - `vodhub-server`: runs [`HubServer`] from a TOML config
//! - `vodhub-watch`: terminal consumer that drives a search session against
//!   a running server and prints the flat or grouped view

pub mod client;
pub mod config;
pub mod content_filter;
pub mod error;
pub mod registry;
pub mod server;

pub use client::HubClient;
pub use config::HubConfig;
pub use content_filter::{ContentFilter, FilteredProvider};
pub use error::{HubError, Result};
pub use registry::ProviderRegistry;
pub use server::HubServer;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "vodhub=info,vodhub_search=info";
