//! Consumer-side push channel sources.
//!
//! A session reads events through [`EventSource`], which hides whether the
//! emitter runs in-process ([`ChannelSource`]) or behind an HTTP endpoint
//! ([`SseSource`]). Closing a source makes every later event inert.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::SearchError;
use crate::event::SearchEvent;
use crate::orchestrator::{run_search, Dispatcher};
use crate::sse::{SseDecoder, SseFrame};
use crate::types::Progress;

/// Path of the streaming search endpoint relative to a server base URL.
pub const STREAM_PATH: &str = "/api/search/stream";

/// A single-consumer source of search events.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event.
    ///
    /// Returns `None` once the channel has ended or been closed.
    /// `Some(Err(SearchError::MalformedEvent(_)))` is recoverable;
    /// `Some(Err(SearchError::Transport(_)))` means the channel broke.
    async fn recv(&mut self) -> Option<Result<SearchEvent, SearchError>>;

    /// Close the channel. Anything still in flight is discarded.
    fn close(&mut self);
}

/// Source backed by an in-process emitter.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Option<mpsc::Receiver<SearchEvent>>,
}

impl ChannelSource {
    /// Wrap the receiving half of an emitter channel.
    pub fn new(rx: mpsc::Receiver<SearchEvent>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Start an in-process streaming search and return its source.
    ///
    /// The emitter runs on a spawned task and stops as soon as the source is
    /// closed or dropped, or `cancel` fires.
    pub fn spawn(
        query: &str,
        dispatcher: Dispatcher,
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<Result<Progress, SearchError>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let query = query.to_owned();
        let handle =
            tokio::spawn(async move { run_search(&query, &dispatcher, tx, cancel).await });
        (Self::new(rx), handle)
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn recv(&mut self) -> Option<Result<SearchEvent, SearchError>> {
        let event = self.rx.as_mut()?.recv().await;
        if event.is_none() {
            self.rx = None;
        }
        event.map(Ok)
    }

    fn close(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }
}

/// Source backed by the server's SSE endpoint.
pub struct SseSource {
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    decoder: SseDecoder,
    ready: VecDeque<SseFrame>,
}

impl std::fmt::Debug for SseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseSource")
            .field("open", &self.body.is_some())
            .field("ready", &self.ready.len())
            .finish()
    }
}

impl SseSource {
    /// Open a streaming search against the server at `base`.
    ///
    /// `client_id` identifies the consumer; the server keeps at most one live
    /// session per id and cancels the older one when a new query arrives.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`] for an unusable base URL,
    /// [`SearchError::Http`] if the request fails or the server refuses it.
    pub async fn connect(
        client: &reqwest::Client,
        base: &Url,
        query: &str,
        client_id: &str,
    ) -> Result<Self, SearchError> {
        let url = stream_url(base, query, client_id)?;
        tracing::trace!(%url, "opening event stream");

        let response = client
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("stream request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("stream refused: {e}")))?;

        Ok(Self::from_response(response))
    }

    /// Wrap an already-opened streaming response.
    pub fn from_response(response: reqwest::Response) -> Self {
        Self {
            body: Some(response.bytes_stream().boxed()),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }
}

#[async_trait]
impl EventSource for SseSource {
    async fn recv(&mut self) -> Option<Result<SearchEvent, SearchError>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                let event = SearchEvent::decode(&frame.data);
                if matches!(&event, Ok(e) if e.is_terminal()) {
                    // Nothing after `complete` belongs to this session.
                    self.close();
                }
                return Some(event);
            }

            let body = self.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    self.body = None;
                    return Some(Err(SearchError::Transport(format!("stream read failed: {e}"))));
                }
                None => {
                    self.body = None;
                    self.ready.extend(self.decoder.finish());
                    if self.ready.is_empty() {
                        return None;
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        self.body = None;
        self.ready.clear();
    }
}

/// Build the streaming endpoint URL for a query.
///
/// # Errors
///
/// [`SearchError::Config`] if `base` cannot carry a path.
pub fn stream_url(base: &Url, query: &str, client_id: &str) -> Result<Url, SearchError> {
    let mut url = base
        .join(STREAM_PATH)
        .map_err(|e| SearchError::Config(format!("invalid server url {base}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("client", client_id);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_yields_events_then_none() {
        let (tx, rx) = mpsc::channel(4);
        let mut source = ChannelSource::new(rx);
        tx.send(SearchEvent::Start { total_sources: 0 })
            .await
            .expect("send");
        drop(tx);
        assert!(matches!(
            source.recv().await,
            Some(Ok(SearchEvent::Start { total_sources: 0 }))
        ));
        assert!(source.recv().await.is_none());
        assert!(source.recv().await.is_none());
    }

    #[tokio::test]
    async fn closing_channel_source_discards_in_flight_events() {
        let (tx, rx) = mpsc::channel(4);
        let mut source = ChannelSource::new(rx);
        tx.send(SearchEvent::Start { total_sources: 1 })
            .await
            .expect("send");
        source.close();
        assert!(source.recv().await.is_none());
        assert!(tx
            .send(SearchEvent::Complete { completed_sources: 1 })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn spawned_search_with_no_providers_completes() {
        let dispatcher = Dispatcher::new(vec![], crate::AggregateConfig::default());
        let (mut source, handle) =
            ChannelSource::spawn("q", dispatcher, 8, CancellationToken::new());
        assert!(matches!(
            source.recv().await,
            Some(Ok(SearchEvent::Start { total_sources: 0 }))
        ));
        assert!(matches!(
            source.recv().await,
            Some(Ok(SearchEvent::Complete { completed_sources: 0 }))
        ));
        let progress = handle.await.expect("join").expect("run");
        assert!(progress.is_complete());
    }

    #[test]
    fn stream_url_encodes_query() {
        let base = Url::parse("http://127.0.0.1:8080/").expect("url");
        let url = stream_url(&base, "foo & bar", "tab-1").expect("stream url");
        assert_eq!(url.path(), STREAM_PATH);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_owned(), "foo & bar".to_owned()),
                ("client".to_owned(), "tab-1".to_owned())
            ]
        );
    }
}
