//! # Stream Connection Manager Service
//!
//! Owns the single live push-stream connection of a session.
//!
//! ```text
//! connect(target) ──► spawn connection_loop
//!                        │
//!                        ├─ open ──► Connected ──► read frames ──► dispatch
//!                        │              ▲                │
//!                        │              │        error / end of stream
//!                        │              │                ▼
//!                        └──── sleep(delay_for(n)) ◄── Disconnected{n}
//!                                                        │ n > max_attempts
//!                                                        ▼
//!                                              Disconnected{gave_up}
//! ```

use crate::domain::{ReconnectPolicy, StreamConnectionError, StreamStats, StreamStatsSnapshot};
use crate::ports::StreamTransport;
use futures::StreamExt;
use shared_bus::EventDispatcher;
use shared_types::{
    decode_frame, ConnectionState, ConnectionStatus, FrameDecision, StreamTarget, TransportError,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ActiveConnection {
    target: StreamTarget,
    task: JoinHandle<()>,
}

/// Shared state handed to the connection task.
#[derive(Clone)]
struct LoopContext {
    transport: Arc<dyn StreamTransport>,
    dispatcher: Arc<dyn EventDispatcher>,
    policy: ReconnectPolicy,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    stats: Arc<StreamStats>,
}

impl LoopContext {
    fn publish(&self, state: ConnectionState, reconnect_attempts: u32, gave_up: bool) {
        self.status_tx.send_replace(ConnectionStatus {
            state,
            reconnect_attempts,
            gave_up,
        });
    }
}

/// Stream Connection Manager.
///
/// One instance per session. At most one physical connection exists at a
/// time; switching targets tears the old one down before opening the new.
pub struct StreamConnectionManager {
    ctx: LoopContext,
    active: Mutex<Option<ActiveConnection>>,
}

impl StreamConnectionManager {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        dispatcher: Arc<dyn EventDispatcher>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::disconnected());
        Self {
            ctx: LoopContext {
                transport,
                dispatcher,
                policy,
                status_tx: Arc::new(status_tx),
                stats: Arc::new(StreamStats::new()),
            },
            active: Mutex::new(None),
        }
    }

    /// Connect to `target`.
    ///
    /// A no-op while a connection task for the same target is still running.
    /// Any other live connection is fully shut down first.
    pub async fn connect(&self, target: StreamTarget) -> Result<(), StreamConnectionError> {
        if target.endpoint.trim().is_empty() {
            return Err(StreamConnectionError::InvalidTarget(
                "endpoint is empty".to_string(),
            ));
        }
        if target.identity.as_str().is_empty() {
            return Err(StreamConnectionError::InvalidTarget(
                "identity is empty".to_string(),
            ));
        }

        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if current.target == target && !current.task.is_finished() {
                debug!(stream = %target, "Already connected to target");
                return Ok(());
            }
        }
        if let Some(previous) = active.take() {
            info!(from = %previous.target, to = %target, "Switching stream target");
            Self::shutdown(previous).await;
        }

        info!(stream = %target, "Connecting event stream");
        self.ctx.publish(ConnectionState::Connecting, 0, false);
        let task = tokio::spawn(Self::connection_loop(self.ctx.clone(), target.clone()));
        *active = Some(ActiveConnection { target, task });
        Ok(())
    }

    /// Close the connection and reset reconnection state. Safe to call at any time.
    pub async fn disconnect(&self) {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            info!(stream = %previous.target, "Disconnecting event stream");
            Self::shutdown(previous).await;
        }
        self.ctx.publish(ConnectionState::Disconnected, 0, false);
    }

    /// Watch connection transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.ctx.status_tx.subscribe()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.ctx.status_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Target of the current connection task, if any.
    pub async fn current_target(&self) -> Option<StreamTarget> {
        self.active.lock().await.as_ref().map(|a| a.target.clone())
    }

    pub fn stats(&self) -> StreamStatsSnapshot {
        self.ctx.stats.snapshot()
    }

    async fn shutdown(connection: ActiveConnection) {
        connection.task.abort();
        // Waiting makes sure the old stream is dropped before anything new opens.
        let _ = connection.task.await;
    }

    /// Connection loop with bounded reconnection.
    async fn connection_loop(ctx: LoopContext, target: StreamTarget) {
        let mut failures = 0u32;

        loop {
            if failures > 0 {
                ctx.publish(ConnectionState::Connecting, failures, false);
            }

            let error = Self::run_connection(&ctx, &target, &mut failures).await;
            StreamStats::incr(&ctx.stats.connection_failures);
            failures += 1;

            if !ctx.policy.should_retry(failures) {
                StreamStats::incr(&ctx.stats.gave_up);
                warn!(
                    stream = %target,
                    attempts = ctx.policy.max_attempts,
                    error = %error,
                    "Event stream reconnection failed, giving up"
                );
                ctx.publish(ConnectionState::Disconnected, ctx.policy.max_attempts, true);
                break;
            }

            let delay = ctx.policy.delay_for(failures);
            warn!(
                stream = %target,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Event stream lost, reconnecting"
            );
            ctx.publish(ConnectionState::Disconnected, failures, false);
            tokio::time::sleep(delay).await;
        }
    }

    /// Run a single connection until it fails or ends.
    async fn run_connection(
        ctx: &LoopContext,
        target: &StreamTarget,
        failures: &mut u32,
    ) -> TransportError {
        let mut frames = match ctx.transport.open(target).await {
            Ok(frames) => frames,
            Err(e) => return e,
        };

        *failures = 0;
        StreamStats::incr(&ctx.stats.connections_opened);
        info!(stream = %target, "Event stream connected");
        ctx.publish(ConnectionState::Connected, 0, false);

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(text) => Self::handle_frame(ctx, &text),
                Err(e) => return e,
            }
        }

        TransportError::Stream("stream closed by server".to_string())
    }

    fn handle_frame(ctx: &LoopContext, text: &str) {
        match decode_frame(text) {
            FrameDecision::Blank => {}
            FrameDecision::Malformed(e) => {
                StreamStats::incr(&ctx.stats.frames_received);
                StreamStats::incr(&ctx.stats.frames_malformed);
                debug!(error = %e, "Dropping malformed stream frame");
            }
            FrameDecision::Event(event) => {
                StreamStats::incr(&ctx.stats.frames_received);
                let delivered = ctx.dispatcher.dispatch(&event);
                StreamStats::incr(&ctx.stats.events_dispatched);
                debug!(kind = %event.kind, delivered, "Stream event dispatched");
            }
        }
    }
}

impl Drop for StreamConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockStreamTransport;
    use shared_bus::{EventCallback, ListenerRegistry};
    use shared_types::{EventKind, StreamEvent};
    use std::time::Duration;

    struct Fixture {
        transport: MockStreamTransport,
        registry: Arc<ListenerRegistry>,
        manager: StreamConnectionManager,
    }

    fn fixture(policy: ReconnectPolicy) -> Fixture {
        let transport = MockStreamTransport::new();
        let registry = Arc::new(ListenerRegistry::new());
        let manager =
            StreamConnectionManager::new(Arc::new(transport.clone()), registry.clone(), policy);
        Fixture {
            transport,
            registry,
            manager,
        }
    }

    fn target(endpoint: &str) -> StreamTarget {
        StreamTarget::new(endpoint, "agent-1")
    }

    async fn wait_for_status(
        rx: &mut watch::Receiver<ConnectionStatus>,
        pred: impl Fn(&ConnectionStatus) -> bool,
    ) -> ConnectionStatus {
        tokio::time::timeout(Duration::from_secs(600), async {
            loop {
                let status = *rx.borrow_and_update();
                if pred(&status) {
                    return status;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("status never reached")
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn collect(registry: &ListenerRegistry, kind: &str) -> Arc<parking_lot::Mutex<Vec<StreamEvent>>> {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.subscribe(
            EventKind::from(kind),
            EventCallback::new(move |e| sink.lock().push(e.clone())),
        );
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reaches_connected() {
        let f = fixture(ReconnectPolicy::for_testing());
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;
        assert!(f.manager.is_connected());
        assert_eq!(f.transport.live_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_dispatched_in_order_and_malformed_dropped() {
        let f = fixture(ReconnectPolicy::for_testing());
        let seen = collect(&f.registry, "write_committed");
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;

        f.transport.push_frame(r#"{"kind":"write_committed","subjectId":"C1","n":1}"#);
        f.transport.push_frame("   ");
        f.transport.push_frame("{garbage");
        f.transport.push_frame(r#"{"subjectId":"C1"}"#);
        f.transport.push_frame(r#"{"kind":"unrelated"}"#);
        f.transport.push_frame(r#"{"kind":"write_committed","subjectId":"C1","n":2}"#);
        settle().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].field("n"), Some(&serde_json::json!(1)));
        assert_eq!(seen[1].field("n"), Some(&serde_json::json!(2)));

        let stats = f.manager.stats();
        assert_eq!(stats.frames_malformed, 2);
        assert_eq!(stats.events_dispatched, 3);
        assert!(f.manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_same_target_is_idempotent() {
        let f = fixture(ReconnectPolicy::for_testing());
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;
        assert_eq!(f.transport.open_count(), 1);
        assert_eq!(f.transport.live_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_different_target_replaces_connection() {
        let f = fixture(ReconnectPolicy::for_testing());
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;

        f.manager.connect(target("http://b")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;
        settle().await;

        assert_eq!(f.transport.live_streams(), 1);
        let opened = f.transport.opened_targets();
        assert_eq!(opened.last(), Some(&target("http://b")));
        assert_eq!(f.manager.current_target().await, Some(target("http://b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_stream_error_resets_counter() {
        let f = fixture(ReconnectPolicy::for_testing());
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;

        f.transport.fail_stream("reset by peer");
        let status = wait_for_status(&mut rx, |s| s.state == ConnectionState::Disconnected).await;
        assert_eq!(status.reconnect_attempts, 1);
        assert!(!status.gave_up);

        let status = wait_for_status(&mut rx, ConnectionStatus::is_connected).await;
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(f.transport.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_end_of_stream_triggers_reconnect() {
        let f = fixture(ReconnectPolicy::for_testing());
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;

        f.transport.close_stream();
        wait_for_status(&mut rx, |s| s.state == ConnectionState::Disconnected).await;
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;
        assert_eq!(f.transport.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnection_is_bounded() {
        let policy = ReconnectPolicy::for_testing();
        let max = policy.max_attempts;
        let f = fixture(policy);
        f.transport.refuse_all(true);
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();

        let status = wait_for_status(&mut rx, |s| s.gave_up).await;
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.reconnect_attempts, max);
        assert_eq!(f.transport.open_count(), max + 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.transport.open_count(), max + 1);
        assert_eq!(f.manager.stats().gave_up, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_give_up_starts_fresh() {
        let f = fixture(ReconnectPolicy::for_testing());
        f.transport.refuse_all(true);
        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, |s| s.gave_up).await;

        f.transport.refuse_all(false);
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_and_is_idempotent() {
        let f = fixture(ReconnectPolicy::for_testing());
        f.manager.disconnect().await;

        let mut rx = f.manager.subscribe_status();
        f.manager.connect(target("http://a")).await.unwrap();
        wait_for_status(&mut rx, ConnectionStatus::is_connected).await;

        f.manager.disconnect().await;
        f.manager.disconnect().await;
        assert_eq!(f.manager.status(), ConnectionStatus::disconnected());
        assert_eq!(f.transport.live_streams(), 0);
        assert!(f.manager.current_target().await.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_target_rejected() {
        let f = fixture(ReconnectPolicy::for_testing());
        let err = f.manager.connect(StreamTarget::new("", "a")).await.unwrap_err();
        assert!(matches!(err, StreamConnectionError::InvalidTarget(_)));
        let err = f.manager.connect(StreamTarget::new("http://a", "")).await.unwrap_err();
        assert!(matches!(err, StreamConnectionError::InvalidTarget(_)));
    }
}
