//! # Session Integration
//!
//! Drives `client_runtime::Session` end to end: agent registration, stream
//! start, writes confirmed over the stream, user listeners sharing the
//! registry with the correlator, and teardown.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use client_runtime::{Session, SessionConfig};
    use ll_01_stream_connection::MockStreamTransport;
    use ll_02_contract_api::MockContractApi;
    use ll_04_operation_supervisor::{OperationState, SupervisorError};
    use serde_json::json;
    use shared_types::{ConnectionState, EventKind, Outcome, SubjectId};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Harness {
        transport: MockStreamTransport,
        api: MockContractApi,
        session: Session,
    }

    fn harness() -> Harness {
        let transport = MockStreamTransport::new();
        let api = MockContractApi::new();
        let session = Session::new(
            SessionConfig::for_testing(),
            Arc::new(transport.clone()),
            Arc::new(api.clone()),
        );
        Harness {
            transport,
            api,
            session,
        }
    }

    async fn started(h: &Harness) {
        h.session.start().await.unwrap();
        let mut status = h.session.connection_status();
        timeout(Duration::from_secs(2), status.wait_for(|s| s.is_connected()))
            .await
            .expect("stream never connected")
            .expect("connection manager dropped");
    }

    fn committed(subject: &str, token: &str) -> String {
        json!({
            "kind": "write_committed",
            "subjectId": subject,
            "correlationToken": token,
            "outcome": true,
        })
        .to_string()
    }

    // =============================================================================
    // INTEGRATION TESTS: SESSION LIFECYCLE
    // =============================================================================

    /// Start registers the agent, a write resolves over the stream, end tears down
    #[tokio::test]
    async fn test_session_round_trip() {
        let h = harness();
        started(&h).await;
        assert!(h.api.is_registered());

        let handle = h
            .session
            .write(SubjectId::from("C1"), "set_property", json!({ "value": 3 }))
            .await
            .unwrap();
        let submitted = h.api.writes().submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].operation, "set_property");

        h.transport.push_frame(committed("C1", "T1"));
        let outcome = timeout(Duration::from_secs(2), handle.outcome())
            .await
            .unwrap();
        assert_eq!(outcome, Ok(Outcome::Accepted));

        h.session.end().await;
        assert_eq!(h.transport.live_streams(), 0);
        assert_eq!(h.session.registry().total_listeners(), 0);
    }

    /// A second start for a known agent does not register again
    #[tokio::test]
    async fn test_restart_does_not_reregister() {
        let h = harness();
        started(&h).await;
        h.session.end().await;
        started(&h).await;

        assert_eq!(h.api.register_calls(), 1);
        assert_eq!(h.transport.open_count(), 2);
        assert_eq!(h.transport.live_streams(), 1);
    }

    /// User listeners and the correlator share one stream and one registry
    #[tokio::test]
    async fn test_user_listener_sees_confirmations_too() {
        let h = harness();
        started(&h).await;

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = h.session.on_event("write_committed", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handle = h
            .session
            .write(SubjectId::from("C1"), "set_property", json!({}))
            .await
            .unwrap();
        let kind = EventKind::new("write_committed");
        assert_eq!(h.session.registry().listener_count(&kind), 2);

        h.transport.push_frame(committed("C1", "T1"));
        timeout(Duration::from_secs(2), handle.wait()).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(h.session.registry().listener_count(&kind), 1);
        assert!(h.session.off_event(&sub));
        assert_eq!(h.session.registry().total_listeners(), 0);
    }

    /// Ending the session cancels pending writes; a late confirmation changes nothing
    #[tokio::test]
    async fn test_end_cancels_pending_writes() {
        let h = harness();
        started(&h).await;
        let handle = h
            .session
            .write(SubjectId::from("C1"), "set_property", json!({}))
            .await
            .unwrap();

        h.session.end().await;
        assert_eq!(
            h.session.connection_status().borrow().state,
            ConnectionState::Disconnected
        );
        assert!(!h.transport.push_frame(committed("C1", "T1")));

        assert_eq!(handle.state(), OperationState::Cancelled);
        assert_eq!(handle.outcome().await, Err(SupervisorError::Cancelled));
        assert_eq!(h.session.supervisor().active_count(), 0);
    }

    /// Writes for different contracts proceed in parallel through one session
    #[tokio::test]
    async fn test_parallel_writes_on_one_session() {
        let h = harness();
        started(&h).await;

        let a = h
            .session
            .write(SubjectId::from("C1"), "set_property", json!({}))
            .await
            .unwrap();
        let b = h
            .session
            .write(SubjectId::from("C2"), "set_property", json!({}))
            .await
            .unwrap();
        let dup = h
            .session
            .write(SubjectId::from("C1"), "set_property", json!({}))
            .await;
        assert!(matches!(dup, Err(SupervisorError::AlreadyActive { .. })));

        h.transport.push_frame(committed("C2", "T2"));
        h.transport.push_frame(committed("C1", "T1"));

        for handle in [&a, &b] {
            let outcome = timeout(Duration::from_secs(2), handle.outcome())
                .await
                .unwrap();
            assert_eq!(outcome, Ok(Outcome::Accepted));
        }
        assert_eq!(h.session.supervisor().stats().rejected_duplicates, 1);
    }
}
