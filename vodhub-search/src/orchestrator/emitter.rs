//! Ordered event emission over a single-consumer push channel.
//!
//! [`StreamEmitter`] is the `idle → started → receiving* → completed` state
//! machine. It refuses any transition that would put an event before
//! `start` or after `complete`, so a consumer always sees exactly one of
//! each with the per-source events in between.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::event::SearchEvent;
use crate::orchestrator::dispatcher::Dispatcher;
use crate::types::{Progress, ResultRecord};

/// Emitter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Nothing sent yet.
    Idle,
    /// `start` sent, no provider has reported.
    Started,
    /// At least one provider has reported.
    Receiving,
    /// `complete` sent. Nothing more may be emitted.
    Completed,
}

/// Sends one session's events to its single consumer.
#[derive(Debug)]
pub struct StreamEmitter {
    tx: mpsc::Sender<SearchEvent>,
    state: EmitterState,
    progress: Progress,
}

impl StreamEmitter {
    /// Wrap the sending half of a consumer's channel.
    pub fn new(tx: mpsc::Sender<SearchEvent>) -> Self {
        Self {
            tx,
            state: EmitterState::Idle,
            progress: Progress::default(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EmitterState {
        self.state
    }

    /// Counters as emitted so far.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Resolves once the consumer has dropped or closed its receiver.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Emit `start`. Only valid from [`EmitterState::Idle`].
    ///
    /// # Errors
    ///
    /// [`SearchError::Protocol`] on an illegal transition,
    /// [`SearchError::Closed`] if the consumer is gone.
    pub async fn start(&mut self, total_sources: usize) -> Result<(), SearchError> {
        if self.state != EmitterState::Idle {
            return Err(self.illegal("start"));
        }
        self.progress = Progress::new(total_sources);
        self.send(SearchEvent::Start { total_sources }).await?;
        self.state = EmitterState::Started;
        Ok(())
    }

    /// Emit one provider's records.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn source_result(
        &mut self,
        source: String,
        source_name: String,
        results: Vec<ResultRecord>,
    ) -> Result<(), SearchError> {
        self.ensure_receiving("source_result")?;
        self.send(SearchEvent::SourceResult {
            source,
            source_name,
            results,
        })
        .await?;
        self.record_completion();
        Ok(())
    }

    /// Emit one provider's failure.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn source_error(
        &mut self,
        source: String,
        source_name: String,
        error: String,
    ) -> Result<(), SearchError> {
        self.ensure_receiving("source_error")?;
        self.send(SearchEvent::SourceError {
            source,
            source_name,
            error,
        })
        .await?;
        self.record_completion();
        Ok(())
    }

    /// Emit `complete`. Only valid once every provider has been accounted for.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn complete(&mut self) -> Result<(), SearchError> {
        if !matches!(self.state, EmitterState::Started | EmitterState::Receiving) {
            return Err(self.illegal("complete"));
        }
        if !self.progress.is_complete() {
            return Err(SearchError::Protocol(format!(
                "complete with {}/{} sources reported",
                self.progress.completed_sources, self.progress.total_sources
            )));
        }
        self.send(SearchEvent::Complete {
            completed_sources: self.progress.completed_sources,
        })
        .await?;
        self.state = EmitterState::Completed;
        Ok(())
    }

    fn ensure_receiving(&mut self, event: &str) -> Result<(), SearchError> {
        match self.state {
            EmitterState::Started | EmitterState::Receiving => {
                self.state = EmitterState::Receiving;
                Ok(())
            }
            _ => Err(self.illegal(event)),
        }
    }

    fn record_completion(&mut self) {
        self.progress.completed_sources += 1;
    }

    fn illegal(&self, event: &str) -> SearchError {
        SearchError::Protocol(format!("cannot emit {event} while {:?}", self.state))
    }

    async fn send(&self, event: SearchEvent) -> Result<(), SearchError> {
        self.tx.send(event).await.map_err(|_| SearchError::Closed)
    }
}

/// Run one streaming search session end to end.
///
/// Emits `start`, then one `source_result` or `source_error` per provider as
/// each finishes, then `complete`. Stops early with [`SearchError::Closed`]
/// when `cancel` fires or the consumer drops its receiver; provider calls
/// still in flight are abandoned and their results never delivered.
///
/// # Errors
///
/// [`SearchError::Closed`] when the session was superseded or detached.
pub async fn run_search(
    query: &str,
    dispatcher: &Dispatcher,
    tx: mpsc::Sender<SearchEvent>,
    cancel: CancellationToken,
) -> Result<Progress, SearchError> {
    let mut emitter = StreamEmitter::new(tx);
    emitter.start(dispatcher.total_sources()).await?;

    let mut outcomes = dispatcher.dispatch(query);
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(progress = ?emitter.progress(), "search cancelled");
                return Err(SearchError::Closed);
            }
            () = emitter.closed() => {
                tracing::debug!(progress = ?emitter.progress(), "consumer detached");
                return Err(SearchError::Closed);
            }
            next = outcomes.next() => next,
        };
        let Some(outcome) = next else { break };

        match outcome.result {
            Ok(records) => {
                emitter
                    .source_result(outcome.source, outcome.source_name, records)
                    .await?;
            }
            Err(err) => {
                emitter
                    .source_error(outcome.source, outcome.source_name, err.to_string())
                    .await?;
            }
        }
    }

    emitter.complete().await?;
    Ok(emitter.progress())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (StreamEmitter, mpsc::Receiver<SearchEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (StreamEmitter::new(tx), rx)
    }

    #[tokio::test]
    async fn happy_path_emits_start_first_and_complete_last() {
        let (mut emitter, mut rx) = channel();
        emitter.start(2).await.expect("start");
        emitter
            .source_result("a".into(), "A".into(), vec![])
            .await
            .expect("result");
        emitter
            .source_error("b".into(), "B".into(), "boom".into())
            .await
            .expect("error");
        emitter.complete().await.expect("complete");
        assert_eq!(emitter.state(), EmitterState::Completed);
        drop(emitter);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["start", "source_result", "source_error", "complete"]);
    }

    #[tokio::test]
    async fn second_start_rejected() {
        let (mut emitter, _rx) = channel();
        emitter.start(0).await.expect("start");
        let err = emitter.start(0).await.unwrap_err();
        assert!(matches!(err, SearchError::Protocol(_)));
    }

    #[tokio::test]
    async fn result_before_start_rejected() {
        let (mut emitter, _rx) = channel();
        let err = emitter
            .source_result("a".into(), "A".into(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Protocol(_)));
        assert_eq!(emitter.state(), EmitterState::Idle);
    }

    #[tokio::test]
    async fn nothing_after_complete() {
        let (mut emitter, _rx) = channel();
        emitter.start(0).await.expect("start");
        emitter.complete().await.expect("complete");
        assert!(emitter
            .source_error("a".into(), "A".into(), "late".into())
            .await
            .is_err());
        assert!(emitter.complete().await.is_err());
    }

    #[tokio::test]
    async fn complete_requires_every_source() {
        let (mut emitter, _rx) = channel();
        emitter.start(2).await.expect("start");
        emitter
            .source_result("a".into(), "A".into(), vec![])
            .await
            .expect("result");
        let err = emitter.complete().await.unwrap_err();
        assert!(err.to_string().contains("1/2"));
    }

    #[tokio::test]
    async fn dropped_consumer_reports_closed() {
        let (mut emitter, rx) = channel();
        drop(rx);
        let err = emitter.start(1).await.unwrap_err();
        assert!(matches!(err, SearchError::Closed));
    }

    #[tokio::test]
    async fn zero_providers_emit_start_then_complete() {
        let dispatcher = Dispatcher::new(vec![], crate::AggregateConfig::default());
        let (tx, mut rx) = mpsc::channel(4);
        let progress = run_search("q", &dispatcher, tx, CancellationToken::new())
            .await
            .expect("run");
        assert_eq!(progress, Progress::new(0));
        assert_eq!(rx.recv().await, Some(SearchEvent::Start { total_sources: 0 }));
        assert_eq!(
            rx.recv().await,
            Some(SearchEvent::Complete { completed_sources: 0 })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn cancelled_before_start_of_dispatch_stops() {
        let dispatcher = Dispatcher::new(vec![], crate::AggregateConfig::default());
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_search("q", &dispatcher, tx, cancel).await.unwrap_err();
        assert!(matches!(err, SearchError::Closed));
    }
}
