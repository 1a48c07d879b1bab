//! The streaming triad (spec §3, §4.1, §6.2): content/done/error channels
//! produced by one background task and drained by one caller.
//!
//! `Close` is idempotent and safe to call from either side (guarded by a
//! shared flag, not a channel). Sends from the producer cooperate with that
//! flag rather than racing a closed channel — spec §9 flags the source's
//! sends-after-Close as undefined behavior and explicitly declines to
//! prescribe a fix; this re-implementation picks "producer checks the flag
//! before every send" so no channel operation can ever observe a panic.

use crate::error::DispatchError;
use crate::types::Usage;
use futures::Stream;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

/// Buffer depth for the content channel (spec §4.1 step 2: "capacity >= 64").
const CONTENT_CHANNEL_CAPACITY: usize = 64;
/// Buffer depth for the done/error channels (spec §4.1 step 2: "capacity 1").
const TERMINAL_CHANNEL_CAPACITY: usize = 1;

#[derive(Clone, Default)]
struct CloseGuard(Arc<Mutex<bool>>);

impl CloseGuard {
    /// Transitions to closed and reports whether *this* call performed the
    /// transition (so terminal channels are signaled exactly once).
    fn close(&self) -> bool {
        let mut closed = self.0.lock();
        if *closed {
            false
        } else {
            *closed = true;
            true
        }
    }

    fn is_closed(&self) -> bool {
        *self.0.lock()
    }
}

/// A streaming chat completion in progress. Produced immediately by
/// [`crate::providers::VendorAdapter::send_streaming_request`]; a background
/// task feeds `content`/`done`/`error` until the vendor's HTTP body drains
/// or fails.
pub struct StreamingResponse {
    pub content: mpsc::Receiver<String>,
    pub done: mpsc::Receiver<()>,
    pub error: mpsc::Receiver<DispatchError>,
    pub usage: Usage,
    pub model: String,
    pub vendor: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    guard: CloseGuard,
}

impl StreamingResponse {
    /// Idempotent: calling this any number of times, from any thread, never
    /// panics and never sends twice.
    pub fn close(&self) {
        self.guard.close();
    }

    pub fn is_closed(&self) -> bool {
        self.guard.is_closed()
    }

    /// Drains just the content channel as a plain `Stream<Item = String>`,
    /// for callers that only want text and will check `done`/`error`
    /// themselves once it ends. Built the same way the teacher's Anthropic
    /// SSE processor builds its chunk stream: an `async_stream::stream!`
    /// generator around successive `recv().await` calls.
    pub fn content_stream(&mut self) -> impl Stream<Item = String> + '_ {
        async_stream::stream! {
            while let Some(fragment) = self.content.recv().await {
                yield fragment;
            }
        }
    }

    /// Consumes the triad and merges it into a single tagged event stream —
    /// the alternative representation spec §9 raises as "a single async
    /// iterator yielding `{Content(str) | Done | Error(e)}`" instead of three
    /// channels. Ordering across content/done/error is interleaved by
    /// whichever channel is ready first, same as polling all three by hand.
    pub fn into_events(self) -> impl Stream<Item = StreamEvent> {
        let content = ReceiverStream::new(self.content).map(StreamEvent::Content);
        let done = ReceiverStream::new(self.done).map(|_| StreamEvent::Done);
        let error = ReceiverStream::new(self.error).map(StreamEvent::Error);
        content.merge(done).merge(error)
    }
}

/// A single event out of [`StreamingResponse::into_events`].
#[derive(Debug)]
pub enum StreamEvent {
    Content(String),
    Done,
    Error(DispatchError),
}

/// The producer half, held by the background task that drains the vendor's
/// HTTP body. Not exposed outside `providers` adapters.
pub(crate) struct StreamingProducer {
    content_tx: mpsc::Sender<String>,
    done_tx: mpsc::Sender<()>,
    error_tx: mpsc::Sender<DispatchError>,
    guard: CloseGuard,
}

impl StreamingProducer {
    /// Delivers one content fragment, unless the triad has already been
    /// closed by the consumer (or by a prior terminal signal).
    pub(crate) async fn send_content(&self, fragment: String) {
        if self.guard.is_closed() || fragment.is_empty() {
            return;
        }
        let _ = self.content_tx.send(fragment).await;
    }

    /// Signals normal completion. No-op if the triad is already closed
    /// (e.g. the consumer called `close()` mid-stream).
    pub(crate) fn finish_done(&self) {
        if self.guard.close() {
            let _ = self.done_tx.try_send(());
        }
    }

    /// Signals a terminal error. No-op if the triad is already closed.
    pub(crate) fn finish_error(&self, error: DispatchError) {
        if self.guard.close() {
            let _ = self.error_tx.try_send(error);
        }
    }
}

/// Builds one producer/consumer pair sharing a single close flag.
pub(crate) fn channel_pair(
    model: String,
    vendor: String,
    usage: Usage,
) -> (StreamingProducer, StreamingResponse) {
    let (content_tx, content_rx) = mpsc::channel(CONTENT_CHANNEL_CAPACITY);
    let (done_tx, done_rx) = mpsc::channel(TERMINAL_CHANNEL_CAPACITY);
    let (error_tx, error_rx) = mpsc::channel(TERMINAL_CHANNEL_CAPACITY);
    let guard = CloseGuard::default();

    let producer = StreamingProducer {
        content_tx,
        done_tx,
        error_tx,
        guard: guard.clone(),
    };
    let response = StreamingResponse {
        content: content_rx,
        done: done_rx,
        error: error_rx,
        usage,
        model,
        vendor,
        created_at: chrono::Utc::now(),
        guard,
    };
    (producer, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    #[tokio::test]
    async fn close_is_idempotent_and_suppresses_later_sends() {
        let (producer, mut response) =
            channel_pair("gpt-4".into(), "openai".into(), Usage::default());

        producer.send_content("hello".into()).await;
        response.close();
        response.close(); // second call must not panic or double-signal

        producer.send_content(" world".into()).await; // suppressed
        producer.finish_done(); // suppressed, triad already closed

        assert_eq!(response.content.recv().await, Some("hello".into()));
        // No further content, and no done signal, was delivered.
        drop(producer);
        assert_eq!(response.content.recv().await, None);
        assert_eq!(response.done.recv().await, None);
    }

    #[tokio::test]
    async fn normal_completion_signals_done_exactly_once() {
        let (producer, mut response) =
            channel_pair("claude-3-5-sonnet-20241022".into(), "anthropic".into(), Usage::default());

        producer.send_content("Hello".into()).await;
        producer.send_content(" world".into()).await;
        producer.finish_done();
        producer.finish_done(); // no-op, already closed

        assert_eq!(response.content.recv().await, Some("Hello".into()));
        assert_eq!(response.content.recv().await, Some(" world".into()));
        drop(producer);
        assert_eq!(response.done.recv().await, Some(()));
        assert!(response.is_closed());
    }

    #[tokio::test]
    async fn error_path_signals_error_not_done() {
        let (producer, mut response) =
            channel_pair("gpt-4".into(), "openai".into(), Usage::default());

        producer.finish_error(DispatchError::Timeout);
        drop(producer);

        assert!(matches!(response.error.recv().await, Some(DispatchError::Timeout)));
        assert_eq!(response.done.recv().await, None);
    }

    #[tokio::test]
    async fn content_stream_yields_fragments_then_ends_on_done() {
        let (producer, mut response) =
            channel_pair("gpt-4".into(), "openai".into(), Usage::default());

        producer.send_content("hello".into()).await;
        producer.send_content(" world".into()).await;
        producer.finish_done();
        drop(producer);

        let fragments: Vec<String> = response.content_stream().collect().await;
        assert_eq!(fragments, vec!["hello".to_string(), " world".to_string()]);
        assert_eq!(response.done.recv().await, Some(()));
    }

    #[tokio::test]
    async fn into_events_yields_content_then_done() {
        let (producer, response) = channel_pair("gpt-4".into(), "openai".into(), Usage::default());

        producer.send_content("hello".into()).await;
        producer.finish_done();
        drop(producer);

        let events: Vec<StreamEvent> = response.into_events().collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Content(s) if s == "hello"));
        assert!(matches!(&events[1], StreamEvent::Done));
    }

    #[tokio::test]
    async fn into_events_surfaces_error() {
        let (producer, response) = channel_pair("gpt-4".into(), "openai".into(), Usage::default());

        producer.finish_error(DispatchError::Timeout);
        drop(producer);

        let events: Vec<StreamEvent> = response.into_events().collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(DispatchError::Timeout)));
    }
}
