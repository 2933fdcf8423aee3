//! Consumer-side lifecycle of one query.
//!
//! A [`Session`] reads events from an [`EventSource`], buffers records in a
//! [`CoalescingBuffer`] and folds each flush into an [`Aggregator`]. It
//! always reaches a terminal [`SessionStatus`]: `complete` and transport
//! failures flush whatever is pending before the session ends, while a
//! consumer-initiated close discards it.
//!
//! The [`SessionController`] keeps at most one session alive and always
//! closes the old one before a new one is installed.

pub mod coalesce;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use tokio::time::Instant;

pub use coalesce::CoalescingBuffer;

use crate::aggregate::{AggregationGroup, Aggregator};
use crate::config::AggregateConfig;
use crate::error::SearchError;
use crate::event::SearchEvent;
use crate::transport::EventSource;
use crate::types::{Progress, ResultRecord};
use crate::view::{self, FilterOptions, SortOrder, ViewFilter};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Events are still arriving.
    Receiving,
    /// `complete` arrived and every record was flushed.
    Completed,
    /// The channel broke before `complete`. Everything received was flushed.
    StoppedEarly(String),
    /// The consumer closed the session or replaced it with a newer one.
    Closed,
}

impl SessionStatus {
    /// The presentation layer's "still receiving" flag.
    pub fn is_receiving(&self) -> bool {
        matches!(self, Self::Receiving)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receiving => f.write_str("receiving"),
            Self::Completed => f.write_str("completed"),
            Self::StoppedEarly(reason) => write!(f, "stopped early: {reason}"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Observable change produced by [`Session::next_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// `start` arrived.
    Started {
        /// Number of providers queried.
        total: usize,
    },
    /// A provider answered; its records are now pending.
    SourceReported {
        /// Provider key.
        source: String,
        /// Records it contributed.
        records: usize,
    },
    /// A provider failed. Counted toward completion.
    SourceFailed {
        /// Provider key.
        source: String,
        /// Failure description from the server.
        error: String,
    },
    /// Pending records moved into the aggregator.
    Flushed {
        /// Records in this flush.
        records: usize,
    },
    /// The session reached a terminal status. Always the last update.
    Finished(SessionStatus),
}

/// One query's stream on the consuming side.
pub struct Session<S> {
    id: u64,
    query: String,
    source: S,
    presort: bool,
    buffer: CoalescingBuffer,
    aggregator: Aggregator,
    status: SessionStatus,
    progress: Progress,
    reported: HashSet<String>,
    started: bool,
    finish_announced: bool,
    malformed: usize,
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("records", &self.aggregator.len())
            .field("pending", &self.buffer.pending_len())
            .finish()
    }
}

impl<S: EventSource> Session<S> {
    /// Begin consuming `source` for `query`.
    pub fn new(id: u64, query: &str, source: S, config: &AggregateConfig) -> Self {
        tracing::trace!(id, query, "session opened");
        Self {
            id,
            query: query.to_owned(),
            source,
            presort: config.presort_on_ingest,
            buffer: CoalescingBuffer::new(config.coalesce_window()),
            aggregator: Aggregator::new(),
            status: SessionStatus::Receiving,
            progress: Progress::default(),
            reported: HashSet::new(),
            started: false,
            finish_announced: false,
            malformed: 0,
        }
    }

    /// Wait for the next observable change.
    ///
    /// Returns `None` once [`SessionUpdate::Finished`] has been delivered.
    /// Pending records are flushed when the coalescing window elapses, even
    /// if the source stays silent.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            if !self.status.is_receiving() {
                if self.finish_announced {
                    return None;
                }
                self.finish_announced = true;
                return Some(SessionUpdate::Finished(self.status.clone()));
            }

            if self.buffer.is_due(Instant::now()) {
                return Some(self.flush());
            }

            let deadline = self.buffer.deadline();
            let received = tokio::select! {
                biased;

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => None,
                event = self.source.recv() => Some(event),
            };

            let update = match received {
                None => Some(self.flush()),
                Some(event) => self.handle(event),
            };
            if update.is_some() {
                return update;
            }
        }
    }

    /// Drive the session to its terminal status, discarding updates.
    pub async fn run_to_end(&mut self) -> SessionStatus {
        while self.next_update().await.is_some() {}
        self.status.clone()
    }

    fn handle(&mut self, event: Option<Result<SearchEvent, SearchError>>) -> Option<SessionUpdate> {
        match event {
            Some(Ok(event)) => self.apply(event),
            Some(Err(e)) if e.is_fatal() => self.finish(SessionStatus::StoppedEarly(e.to_string())),
            Some(Err(e)) => {
                self.malformed += 1;
                tracing::warn!(session = self.id, error = %e, "dropping undecodable event");
                None
            }
            None => self.finish(SessionStatus::StoppedEarly(
                "stream ended before complete".to_owned(),
            )),
        }
    }

    /// Apply one decoded event. Inert once the session is terminal.
    pub fn apply(&mut self, event: SearchEvent) -> Option<SessionUpdate> {
        if !self.status.is_receiving() {
            tracing::trace!(session = self.id, kind = event.kind(), "late event ignored");
            return None;
        }

        match event {
            SearchEvent::Start { total_sources } => {
                if self.started {
                    self.malformed += 1;
                    tracing::warn!(session = self.id, "duplicate start event dropped");
                    return None;
                }
                self.started = true;
                self.progress.total_sources = total_sources;
                Some(SessionUpdate::Started {
                    total: total_sources,
                })
            }
            SearchEvent::SourceResult {
                source,
                mut results,
                ..
            } => {
                self.mark_reported(&source);
                let records = results.len();
                if self.presort {
                    view::presort_batch(&mut results, &self.query);
                }
                self.buffer.push(results, Instant::now());
                tracing::debug!(session = self.id, source = %source, records, "source reported");
                Some(SessionUpdate::SourceReported { source, records })
            }
            SearchEvent::SourceError { source, error, .. } => {
                self.mark_reported(&source);
                Some(SessionUpdate::SourceFailed { source, error })
            }
            SearchEvent::Complete { completed_sources } => {
                self.progress.completed_sources = completed_sources;
                self.finish(SessionStatus::Completed)
            }
        }
    }

    fn mark_reported(&mut self, source: &str) {
        if self.reported.insert(source.to_owned()) {
            self.progress.completed_sources = self.reported.len();
        }
    }

    fn flush(&mut self) -> SessionUpdate {
        let batch = self.buffer.flush();
        let records = batch.len();
        self.aggregator.ingest(batch);
        SessionUpdate::Flushed { records }
    }

    /// Flush unconditionally, then end the session.
    fn finish(&mut self, status: SessionStatus) -> Option<SessionUpdate> {
        let pending = self.buffer.pending_len();
        let flushed = (pending > 0).then(|| self.flush());
        if let SessionStatus::StoppedEarly(reason) = &status {
            tracing::warn!(session = self.id, reason = %reason, "session stopped early");
        } else {
            tracing::debug!(session = self.id, records = self.aggregator.len(), "session completed");
        }
        self.status = status;
        self.source.close();
        flushed
    }

    /// Detach: close the channel and drop anything not yet flushed.
    pub fn close(&mut self) {
        if self.status.is_receiving() {
            self.status = SessionStatus::Closed;
        }
        self.buffer.discard();
        self.source.close();
    }
}

impl<S> Session<S> {
    /// Controller-assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The query this session answers.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Current status.
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Whether events are still arriving.
    pub fn is_receiving(&self) -> bool {
        self.status.is_receiving()
    }

    /// Fan-out progress as seen by this consumer.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Events dropped because they could not be decoded or were out of place.
    pub fn malformed_events(&self) -> usize {
        self.malformed
    }

    /// Records waiting for the next flush.
    pub fn pending_records(&self) -> usize {
        self.buffer.pending_len()
    }

    /// Records delivered to the aggregator so far.
    pub fn flushed_records(&self) -> usize {
        self.buffer.flushed_total()
    }

    /// Aggregated state.
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Flat view under `filter` and `order`.
    pub fn flat_view(&self, filter: &ViewFilter, order: SortOrder) -> Vec<&ResultRecord> {
        view::flat_view(self.aggregator.records(), filter, order, &self.query)
    }

    /// Grouped view under `filter` and `order`.
    pub fn grouped_view(&self, filter: &ViewFilter, order: SortOrder) -> Vec<&AggregationGroup> {
        view::grouped_view(self.aggregator.groups(), filter, order, &self.query)
    }

    /// Distinct filter values in the flushed records.
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_records(self.aggregator.records())
    }
}

/// Owns the single live session for one consumer.
pub struct SessionController<S> {
    config: AggregateConfig,
    active: Option<Session<S>>,
    next_id: u64,
}

impl<S> fmt::Debug for SessionController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("active", &self.active.as_ref().map(|s| s.id))
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<S: EventSource> SessionController<S> {
    /// Create a controller with no session.
    pub fn new(config: AggregateConfig) -> Self {
        Self {
            config,
            active: None,
            next_id: 1,
        }
    }

    /// Replace the current session with one reading from `source`.
    pub fn start(&mut self, query: &str, source: S) -> &mut Session<S> {
        self.close();
        self.install(query, source)
    }

    /// Close the current session, then open a source and start a new one.
    ///
    /// The old channel is closed before `open` runs, so two fan-outs for
    /// this consumer never overlap. If `open` fails no session is active.
    ///
    /// # Errors
    ///
    /// Whatever `open` returns.
    pub async fn start_with<F, Fut>(&mut self, query: &str, open: F) -> Result<&mut Session<S>, SearchError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<S, SearchError>>,
    {
        self.close();
        let source = open(query.to_owned()).await?;
        Ok(self.install(query, source))
    }

    fn install(&mut self, query: &str, source: S) -> &mut Session<S> {
        let id = self.next_id;
        self.next_id += 1;
        self.active.insert(Session::new(id, query, source, &self.config))
    }

    /// Close and drop the current session, if any.
    pub fn close(&mut self) {
        if let Some(mut session) = self.active.take() {
            session.close();
            tracing::trace!(session = session.id(), "session discarded");
        }
    }

    /// The live session.
    pub fn active(&self) -> Option<&Session<S>> {
        self.active.as_ref()
    }

    /// The live session, mutably.
    pub fn active_mut(&mut self) -> Option<&mut Session<S>> {
        self.active.as_mut()
    }
}
