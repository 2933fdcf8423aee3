//! Trait definition for upstream content provider adapters.
//!
//! Each provider adapter implements [`Provider`] to turn a query into a list
//! of uniform [`ResultRecord`] values. The adapter owns its own request and
//! parse logic; the dispatcher only sees the uniform records or an error.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::ResultRecord;

/// An upstream content provider.
///
/// All implementations must be `Send + Sync` so the dispatcher can query
/// many providers concurrently. The trait is object safe; providers are
/// passed around as [`SharedProvider`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider key, copied into every record's `source` field.
    fn key(&self) -> &str;

    /// Display name, copied into every record's `source_name` field.
    fn name(&self) -> &str;

    /// Run the query against this provider.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails or the response cannot
    /// be parsed. The dispatcher turns this into a per-source failure.
    async fn search(&self, query: &str) -> Result<Vec<ResultRecord>, SearchError>;
}

/// A provider shared across concurrent fan-outs.
pub type SharedProvider = Arc<dyn Provider>;
