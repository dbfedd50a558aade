//! # Outbound Ports
//!
//! The push-stream transport the connection manager drives.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use shared_types::{StreamTarget, TransportError};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Text frames from one open stream. The stream ending means the server
/// closed the connection.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Push-stream transport - outbound port.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a stream scoped to `target`.
    async fn open(&self, target: &StreamTarget) -> Result<FrameStream, TransportError>;
}

// =============================================================================
// Mock Implementation for Testing
// =============================================================================

type FrameSender = mpsc::UnboundedSender<Result<String, TransportError>>;

#[derive(Default)]
struct MockShared {
    sender: Mutex<Option<FrameSender>>,
    targets: Mutex<Vec<StreamTarget>>,
    fail_next: AtomicU32,
    refuse_all: Mutex<bool>,
    opens: AtomicU32,
    live: AtomicUsize,
}

/// Decrements the live-stream count when the stream is dropped.
struct LiveGuard(Arc<MockShared>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scriptable in-memory transport.
///
/// Frames pushed with [`push_frame`](Self::push_frame) go to the most
/// recently opened stream.
#[derive(Clone, Default)]
pub struct MockStreamTransport {
    shared: Arc<MockShared>,
}

impl MockStreamTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a text frame on the current stream.
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        match self.shared.sender.lock().as_ref() {
            Some(tx) => tx.send(Ok(text.into())).is_ok(),
            None => false,
        }
    }

    /// Emit a transport error on the current stream and end it.
    pub fn fail_stream(&self, reason: impl Into<String>) {
        if let Some(tx) = self.shared.sender.lock().take() {
            let _ = tx.send(Err(TransportError::Stream(reason.into())));
        }
    }

    /// End the current stream as if the server closed it.
    pub fn close_stream(&self) {
        self.shared.sender.lock().take();
    }

    /// Refuse the next `n` open attempts.
    pub fn fail_next_opens(&self, n: u32) {
        self.shared.fail_next.store(n, Ordering::SeqCst);
    }

    /// Refuse every open attempt until reset.
    pub fn refuse_all(&self, refuse: bool) {
        *self.shared.refuse_all.lock() = refuse;
    }

    /// Total open attempts, including refused ones.
    pub fn open_count(&self) -> u32 {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Streams currently held open by a consumer.
    pub fn live_streams(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Targets passed to `open`, in order.
    pub fn opened_targets(&self) -> Vec<StreamTarget> {
        self.shared.targets.lock().clone()
    }
}

#[async_trait]
impl StreamTransport for MockStreamTransport {
    async fn open(&self, target: &StreamTarget) -> Result<FrameStream, TransportError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        self.shared.targets.lock().push(target.clone());

        if *self.shared.refuse_all.lock() {
            return Err(TransportError::Connect("mock refused".to_string()));
        }
        let refused = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("mock refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.sender.lock() = Some(tx);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(self.shared.clone());

        let stream = futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|item| (item, (rx, guard)))
        });
        Ok(stream.boxed())
    }
}
