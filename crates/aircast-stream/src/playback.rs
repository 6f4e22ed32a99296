//! Playback reconstruction pipeline.
//!
//! Converts an unordered-arrival, asynchronously-ready chunk stream into
//! continuous playback. Chunks are queued in arrival order and drained one
//! at a time into a single-writer sink; a reentrancy guard ensures no two
//! appends are ever in flight. The whole pipeline is owned by one task,
//! driven over a typed event channel.

use std::collections::VecDeque;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Chunk rejected: {0}")]
    Rejected(String),

    #[error("Encoding not supported: {0}")]
    UnsupportedEncoding(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// The local playback consumer. Single-writer and non-reentrant: the
/// pipeline never calls `append` again before the previous call resolved.
#[async_trait::async_trait]
pub trait PlaybackSink: Send {
    /// Whether the sink can play the negotiated encoding.
    fn supports(&self, encoding: &str) -> bool;

    /// Append one chunk. Resolution of the future is the completion
    /// signal; an error means the chunk was rejected and is discarded.
    async fn append(&mut self, chunk: Bytes) -> Result<(), SinkError>;
}

/// Receiver-side buffer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// No sink yet, or its encoding is unconfirmed; chunks queue up.
    NotReady,
    /// Sink attached and idle.
    Ready,
    /// An append is in flight.
    Appending,
    /// Session torn down; terminal.
    Closed,
}

/// Events driving one playback pipeline task.
pub enum PlaybackEvent {
    /// An audio chunk arrived.
    Chunk(Bytes),
    /// The presentation layer finished constructing a sink.
    SinkReady(Box<dyn PlaybackSink>),
    /// Session teardown.
    Shutdown,
}

/// Per-session playback state: the chunk queue, the sink, and the
/// readiness flags. Owned by exactly one task.
pub struct PlaybackPipeline {
    encoding: String,
    state: SinkState,
    queue: VecDeque<Bytes>,
    sink: Option<Box<dyn PlaybackSink>>,
    /// Reentrancy guard for `drain`.
    appending: bool,
}

impl PlaybackPipeline {
    /// Create a pipeline negotiating the given encoding. Starts `NotReady`.
    pub fn new(encoding: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
            state: SinkState::NotReady,
            queue: VecDeque::new(),
            sink: None,
            appending: false,
        }
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Handle one arriving chunk: enqueue always, drain if ready.
    pub async fn on_chunk(&mut self, chunk: Bytes) {
        if self.state == SinkState::Closed {
            return;
        }
        self.queue.push_back(chunk);
        if self.state == SinkState::NotReady {
            debug!(queued = self.queue.len(), "Sink not ready, chunk queued");
            return;
        }
        self.drain().await;
    }

    /// Attach a constructed sink, confirming the negotiated encoding first.
    /// On rejection the pipeline stays `NotReady` and keeps queueing.
    pub async fn attach_sink(&mut self, sink: Box<dyn PlaybackSink>) -> Result<(), SinkError> {
        if self.state == SinkState::Closed {
            return Err(SinkError::Unavailable("pipeline closed".into()));
        }
        if !sink.supports(&self.encoding) {
            warn!(encoding = %self.encoding, "Sink does not support negotiated encoding");
            return Err(SinkError::UnsupportedEncoding(self.encoding.clone()));
        }

        info!(encoding = %self.encoding, queued = self.queue.len(), "Playback sink ready");
        self.sink = Some(sink);
        self.state = SinkState::Ready;
        self.drain().await;
        Ok(())
    }

    /// Drain queued chunks one at a time, waiting for each append to
    /// complete before the next. A drain observed while an append is in
    /// flight is a no-op.
    pub async fn drain(&mut self) {
        if self.appending {
            return;
        }
        self.appending = true;

        while self.state == SinkState::Ready {
            let Some(chunk) = self.queue.pop_front() else {
                break;
            };
            let Some(sink) = self.sink.as_mut() else {
                break;
            };

            self.state = SinkState::Appending;
            if let Err(e) = sink.append(chunk).await {
                // One bad chunk never stalls the pipeline: discard, move on.
                warn!(error = %e, "Sink append failed, chunk discarded");
            }
            if self.state == SinkState::Appending {
                self.state = SinkState::Ready;
            }
        }

        self.appending = false;
    }

    /// Terminal teardown. Queued chunks are dropped.
    pub fn close(&mut self) {
        self.state = SinkState::Closed;
        self.queue.clear();
        self.sink = None;
    }
}

/// Drive a pipeline from an event channel until shutdown or the channel
/// closes.
pub async fn run_playback(encoding: String, mut events: mpsc::Receiver<PlaybackEvent>) {
    let mut pipeline = PlaybackPipeline::new(encoding);

    while let Some(event) = events.recv().await {
        match event {
            PlaybackEvent::Chunk(chunk) => pipeline.on_chunk(chunk).await,
            PlaybackEvent::SinkReady(sink) => {
                if let Err(e) = pipeline.attach_sink(sink).await {
                    warn!(error = %e, "Sink attachment rejected, staying unready");
                }
            }
            PlaybackEvent::Shutdown => break,
        }
    }

    pipeline.close();
    info!("Playback pipeline terminated");
}

/// Spawn the playback task for one session.
pub fn spawn_playback(
    encoding: impl Into<String>,
    events: mpsc::Receiver<PlaybackEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run_playback(encoding.into(), events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records appends, optionally failing on one of them, and asserts
    /// that appends never overlap.
    struct MockSink {
        appended: Arc<Mutex<Vec<Bytes>>>,
        attempts: Arc<Mutex<Vec<Bytes>>>,
        fail_on_attempt: Option<usize>,
        in_flight: Arc<AtomicBool>,
        supported: bool,
    }

    impl MockSink {
        fn new() -> (Self, Arc<Mutex<Vec<Bytes>>>, Arc<Mutex<Vec<Bytes>>>) {
            let appended = Arc::new(Mutex::new(Vec::new()));
            let attempts = Arc::new(Mutex::new(Vec::new()));
            let sink = Self {
                appended: appended.clone(),
                attempts: attempts.clone(),
                fail_on_attempt: None,
                in_flight: Arc::new(AtomicBool::new(false)),
                supported: true,
            };
            (sink, appended, attempts)
        }
    }

    #[async_trait::async_trait]
    impl PlaybackSink for MockSink {
        fn supports(&self, _encoding: &str) -> bool {
            self.supported
        }

        async fn append(&mut self, chunk: Bytes) -> Result<(), SinkError> {
            assert!(
                !self.in_flight.swap(true, Ordering::SeqCst),
                "two appends in flight"
            );
            // Yield so an overlapping append would be observable.
            tokio::task::yield_now().await;

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(chunk.clone());
                attempts.len() - 1
            };

            let result = if self.fail_on_attempt == Some(attempt) {
                Err(SinkError::Rejected("malformed chunk".into()))
            } else {
                self.appended.lock().unwrap().push(chunk);
                Ok(())
            };

            self.in_flight.store(false, Ordering::SeqCst);
            result
        }
    }

    fn chunk(tag: u8) -> Bytes {
        Bytes::from(vec![tag; 4])
    }

    #[tokio::test]
    async fn test_chunks_queue_while_not_ready_then_drain_in_order() {
        // Scenario: C1, C2, C3 arrive before the sink exists.
        let mut pipeline = PlaybackPipeline::new("pcm-test");
        pipeline.on_chunk(chunk(1)).await;
        pipeline.on_chunk(chunk(2)).await;
        pipeline.on_chunk(chunk(3)).await;

        assert_eq!(pipeline.state(), SinkState::NotReady);
        assert_eq!(pipeline.queued(), 3);

        let (sink, appended, _) = MockSink::new();
        pipeline.attach_sink(Box::new(sink)).await.unwrap();

        assert_eq!(pipeline.state(), SinkState::Ready);
        assert_eq!(pipeline.queued(), 0);
        assert_eq!(
            appended.lock().unwrap().clone(),
            vec![chunk(1), chunk(2), chunk(3)]
        );
    }

    #[tokio::test]
    async fn test_chunk_while_ready_is_appended_immediately() {
        let mut pipeline = PlaybackPipeline::new("pcm-test");
        let (sink, appended, _) = MockSink::new();
        pipeline.attach_sink(Box::new(sink)).await.unwrap();

        pipeline.on_chunk(chunk(7)).await;

        assert_eq!(pipeline.queued(), 0);
        assert_eq!(appended.lock().unwrap().clone(), vec![chunk(7)]);
    }

    #[tokio::test]
    async fn test_failing_append_is_skipped_once_and_never_retried() {
        // Scenario: append of C2 fails; C3 must follow without a retry.
        let mut pipeline = PlaybackPipeline::new("pcm-test");
        let (mut sink, appended, attempts) = MockSink::new();
        sink.fail_on_attempt = Some(1);

        pipeline.on_chunk(chunk(1)).await;
        pipeline.on_chunk(chunk(2)).await;
        pipeline.on_chunk(chunk(3)).await;
        pipeline.attach_sink(Box::new(sink)).await.unwrap();

        assert_eq!(appended.lock().unwrap().clone(), vec![chunk(1), chunk(3)]);
        assert_eq!(
            attempts.lock().unwrap().clone(),
            vec![chunk(1), chunk(2), chunk(3)],
            "C2 attempted exactly once"
        );
        assert_eq!(pipeline.state(), SinkState::Ready);
    }

    #[tokio::test]
    async fn test_unsupported_encoding_keeps_pipeline_not_ready() {
        let mut pipeline = PlaybackPipeline::new("pcm-test");
        let (mut sink, appended, _) = MockSink::new();
        sink.supported = false;

        pipeline.on_chunk(chunk(1)).await;
        let result = pipeline.attach_sink(Box::new(sink)).await;

        assert!(matches!(result, Err(SinkError::UnsupportedEncoding(_))));
        assert_eq!(pipeline.state(), SinkState::NotReady);
        assert_eq!(pipeline.queued(), 1);
        assert!(appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_is_a_noop_while_appending() {
        let mut pipeline = PlaybackPipeline::new("pcm-test");
        let (sink, appended, _) = MockSink::new();
        pipeline.attach_sink(Box::new(sink)).await.unwrap();
        pipeline.queue.push_back(chunk(1));

        // Simulate a drain observed mid-append: the guard must no-op and
        // leave the queue untouched.
        pipeline.appending = true;
        pipeline.drain().await;
        assert_eq!(pipeline.queued(), 1);
        assert!(appended.lock().unwrap().is_empty());

        pipeline.appending = false;
        pipeline.drain().await;
        assert_eq!(pipeline.queued(), 0);
        assert_eq!(appended.lock().unwrap().clone(), vec![chunk(1)]);
    }

    #[tokio::test]
    async fn test_closed_pipeline_ignores_chunks() {
        let mut pipeline = PlaybackPipeline::new("pcm-test");
        pipeline.on_chunk(chunk(1)).await;
        pipeline.close();

        assert_eq!(pipeline.state(), SinkState::Closed);
        assert_eq!(pipeline.queued(), 0);

        pipeline.on_chunk(chunk(2)).await;
        assert_eq!(pipeline.queued(), 0);
    }

    #[tokio::test]
    async fn test_run_playback_drains_after_late_sink() {
        let (tx, rx) = mpsc::channel(16);
        let (sink, appended, _) = MockSink::new();

        let task = spawn_playback("pcm-test", rx);

        tx.send(PlaybackEvent::Chunk(chunk(1))).await.unwrap();
        tx.send(PlaybackEvent::Chunk(chunk(2))).await.unwrap();
        tx.send(PlaybackEvent::SinkReady(Box::new(sink))).await.unwrap();
        tx.send(PlaybackEvent::Shutdown).await.unwrap();
        task.await.unwrap();

        assert_eq!(appended.lock().unwrap().clone(), vec![chunk(1), chunk(2)]);
    }
}
