//! Copies session counters into the Prometheus registry.

use crate::session::Session;
use ll_telemetry::{
    sync_counter, BUS_LISTENERS, OPERATIONS_FINISHED, OPERATIONS_PENDING,
    OPERATIONS_REJECTED_DUPLICATES, STREAM_CONNECTED, STREAM_EVENTS_RECEIVED,
    STREAM_FRAMES_DROPPED, STREAM_RECONNECT_ATTEMPTS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Export the session's current counters.
pub fn record_metrics(session: &Session) {
    let stream = session.stream().stats();
    sync_counter(&STREAM_EVENTS_RECEIVED, stream.events_dispatched);
    sync_counter(&STREAM_FRAMES_DROPPED, stream.frames_malformed);
    sync_counter(&STREAM_RECONNECT_ATTEMPTS, stream.connection_failures);
    STREAM_CONNECTED.set(i64::from(session.is_connected()));

    BUS_LISTENERS.set(session.registry().total_listeners() as i64);

    let ops = session.supervisor().correlator_stats();
    for (state, total) in [
        ("accepted", ops.total_accepted),
        ("rejected", ops.total_rejected),
        ("failed", ops.total_failed),
        ("timed_out", ops.total_timeouts),
        ("cancelled", ops.total_cancelled),
    ] {
        sync_counter(&OPERATIONS_FINISHED.with_label_values(&[state]), total);
    }
    OPERATIONS_PENDING.set(session.supervisor().active_count() as i64);
    sync_counter(
        &OPERATIONS_REJECTED_DUPLICATES,
        session.supervisor().stats().rejected_duplicates,
    );
}

/// Record metrics every `every` until the task is aborted.
pub fn spawn_metrics_reporter(session: Arc<Session>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            record_metrics(&session);
            debug!("Metrics recorded");
        }
    })
}
