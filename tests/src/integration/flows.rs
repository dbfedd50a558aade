//! # Integration Test Flows
//!
//! Tests that ll-01-stream-connection, ll-03-write-correlation and
//! ll-04-operation-supervisor work together through the shared listener
//! registry.
//!
//! ## Flows Tested:
//!
//! 1. **Stream (01) → Registry → Correlator (03)**: a pushed confirmation
//!    frame resolves the matching pending write and removes its listener
//! 2. **Supervisor (04) → Write API (02) → Correlator (03)**: one operation
//!    per (subject, kind), early confirmations, cancellation, timeouts
//! 3. **Stream resilience**: reconnection and target switches keep pending
//!    operations matchable

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    // Shared infrastructure
    use serde_json::{json, Value};
    use shared_bus::ListenerRegistry;
    use shared_types::{
        ConnectionStatus, EventKind, OpKind, Outcome, StreamEvent, StreamTarget, SubjectId,
    };

    // Subsystem 01: Stream Connection
    use ll_01_stream_connection::{MockStreamTransport, ReconnectPolicy, StreamConnectionManager};

    // Subsystem 02: Contract API
    use ll_02_contract_api::{token_from_response, ApiError, MockWriteApi};

    // Subsystem 03 / 04: Correlation and supervision
    use ll_03_write_correlation::{CorrelatorConfig, WriteCorrelator};
    use ll_04_operation_supervisor::{
        DuplicatePolicy, OperationHandle, OperationState, OperationSupervisor, SupervisorConfig,
        SupervisorError,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const CONFIRMED: &str = "write_committed";

    struct Pipeline {
        transport: MockStreamTransport,
        registry: Arc<ListenerRegistry>,
        writes: MockWriteApi,
        stream: StreamConnectionManager,
        supervisor: OperationSupervisor,
    }

    fn pipeline_with(correlator: CorrelatorConfig, supervisor: SupervisorConfig) -> Pipeline {
        let transport = MockStreamTransport::new();
        let registry = Arc::new(ListenerRegistry::new());
        let writes = MockWriteApi::new();
        let correlator = Arc::new(WriteCorrelator::new(
            registry.clone(),
            Arc::new(writes.clone()),
            correlator,
        ));
        let stream = StreamConnectionManager::new(
            Arc::new(transport.clone()),
            registry.clone(),
            ReconnectPolicy::for_testing(),
        );
        Pipeline {
            transport,
            registry,
            writes,
            stream,
            supervisor: OperationSupervisor::new(correlator, supervisor),
        }
    }

    fn pipeline() -> Pipeline {
        pipeline_with(CorrelatorConfig::for_testing(), SupervisorConfig::for_testing())
    }

    fn target(identity: &str) -> StreamTarget {
        StreamTarget::new("http://ledger.test", identity)
    }

    fn committed(subject: &str, token: &str, outcome: Value) -> String {
        json!({
            "kind": CONFIRMED,
            "subjectId": subject,
            "correlationToken": token,
            "outcome": outcome,
        })
        .to_string()
    }

    fn listeners(p: &Pipeline) -> usize {
        p.registry.listener_count(&EventKind::new(CONFIRMED))
    }

    async fn wait_status<F>(p: &Pipeline, predicate: F) -> ConnectionStatus
    where
        F: Fn(&ConnectionStatus) -> bool,
    {
        let mut status = p.stream.subscribe_status();
        let settled = timeout(Duration::from_secs(2), status.wait_for(|s| predicate(s)))
            .await
            .expect("connection status never settled")
            .expect("connection manager dropped");
        *settled
    }

    async fn connect(p: &Pipeline, identity: &str) {
        p.stream.connect(target(identity)).await.unwrap();
        wait_status(p, ConnectionStatus::is_connected).await;
    }

    /// Wait until the connection task has handed `n` events to the registry.
    async fn wait_dispatched(p: &Pipeline, n: u64) {
        timeout(Duration::from_secs(2), async {
            while p.stream.stats().events_dispatched < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("events were not dispatched");
    }

    async fn outcome_of(handle: &OperationHandle) -> Result<Outcome, SupervisorError> {
        timeout(Duration::from_secs(2), handle.outcome())
            .await
            .expect("operation did not finish")
    }

    async fn submit(p: &Pipeline, subject: &str) -> OperationHandle {
        p.supervisor
            .submit(
                SubjectId::from(subject),
                OpKind::new("set_property"),
                "set_property",
                json!({ "value": 1 }),
            )
            .await
            .unwrap()
    }

    // =============================================================================
    // INTEGRATION TESTS: STREAM → REGISTRY → CORRELATOR
    // =============================================================================

    /// A confirmation frame resolves the pending write and its listener goes away
    #[tokio::test]
    async fn test_confirmation_over_stream_resolves_write() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        assert_eq!(listeners(&p), 0);

        let handle = submit(&p, "C1").await;
        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);
        assert_eq!(listeners(&p), 1);
        assert_eq!(p.writes.submitted()[0].subject, SubjectId::from("C1"));

        assert!(p.transport.push_frame(committed("C1", "T1", json!(true))));

        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
        assert_eq!(listeners(&p), 0);
        assert_eq!(p.supervisor.active_count(), 0);
    }

    /// A negative outcome still resolves; the reason string is kept
    #[tokio::test]
    async fn test_rejection_over_stream_carries_reason() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.transport
            .push_frame(committed("C1", "T1", json!("insufficient balance")));

        assert_eq!(
            outcome_of(&handle).await,
            Ok(Outcome::Rejected {
                reason: Some("insufficient balance".to_string())
            })
        );
        assert_eq!(listeners(&p), 0);
    }

    /// Confirmations for another write or another subject leave the operation pending
    #[tokio::test]
    async fn test_unrelated_confirmations_are_ignored() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.transport.push_frame(committed("C1", "T9", json!(true)));
        p.transport.push_frame(committed("C2", "T1", json!(true)));
        wait_dispatched(&p, 2).await;

        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);
        assert_eq!(listeners(&p), 1);
        assert_eq!(p.supervisor.correlator_stats().mismatched_events, 1);

        p.transport.push_frame(committed("C1", "T1", json!(false)));
        assert_eq!(
            outcome_of(&handle).await,
            Ok(Outcome::Rejected { reason: None })
        );
    }

    /// The default configuration reads the legacy field names
    #[tokio::test]
    async fn test_legacy_field_names_resolve_write() {
        let p = pipeline_with(CorrelatorConfig::default(), SupervisorConfig::for_testing());
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;
        assert_eq!(p.registry.listener_count(&EventKind::contract_write()), 1);

        p.transport.push_frame(
            json!({
                "action": "contract_write",
                "contract": "C1",
                "request": "T1",
                "reply": true,
            })
            .to_string(),
        );

        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
        assert_eq!(p.registry.listener_count(&EventKind::contract_write()), 0);
    }

    /// An object write response is echoed back whole in the confirmation
    #[tokio::test]
    async fn test_object_write_response_resolves_from_echo() {
        let p = pipeline_with(CorrelatorConfig::default(), SupervisorConfig::for_testing());
        connect(&p, "pk-1").await;
        let response = json!({ "id": 4, "method": "join" });

        let handle = p
            .supervisor
            .start(SubjectId::from("C1"), OpKind::new("join"), || {
                let response = response.clone();
                async move { token_from_response(&response) }
            })
            .await
            .unwrap();
        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);

        p.transport.push_frame(
            json!({
                "action": "contract_write",
                "contract": "C1",
                "request": { "method": "join", "id": 4 },
                "reply": true,
            })
            .to_string(),
        );

        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
        assert_eq!(p.registry.listener_count(&EventKind::contract_write()), 0);
    }

    /// A frame without an outcome field counts as accepted
    #[tokio::test]
    async fn test_missing_outcome_resolves_accepted() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.transport.push_frame(
            json!({ "kind": CONFIRMED, "subjectId": "C1", "correlationToken": "T1" }).to_string(),
        );

        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
    }

    /// Malformed frames are dropped without disturbing later ones
    #[tokio::test]
    async fn test_malformed_frames_do_not_block_confirmation() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.transport.push_frame("not json");
        p.transport.push_frame("   ");
        p.transport.push_frame(json!({ "subjectId": "C1" }).to_string());
        p.transport.push_frame(committed("C1", "T1", json!(true)));

        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
        let stats = p.stream.stats();
        assert_eq!(stats.frames_malformed, 2);
        assert_eq!(stats.events_dispatched, 1);
    }

    /// Many writes in flight, confirmed in reverse order
    #[tokio::test]
    async fn test_many_subjects_resolve_independently() {
        let p = pipeline();
        connect(&p, "pk-1").await;

        let mut handles = Vec::new();
        for i in 1..=16 {
            handles.push(submit(&p, &format!("C{i}")).await);
        }
        assert_eq!(listeners(&p), 16);
        assert_eq!(p.supervisor.active_count(), 16);

        for i in (1..=16).rev() {
            let outcome = if i % 2 == 0 { json!(true) } else { json!(false) };
            p.transport
                .push_frame(committed(&format!("C{i}"), &format!("T{i}"), outcome));
        }

        for (i, handle) in handles.iter().enumerate() {
            let expected = if (i + 1) % 2 == 0 {
                Outcome::Accepted
            } else {
                Outcome::Rejected { reason: None }
            };
            assert_eq!(outcome_of(handle).await, Ok(expected));
        }
        assert_eq!(listeners(&p), 0);
        assert_eq!(p.supervisor.correlator_stats().total_accepted, 8);
        assert_eq!(p.supervisor.correlator_stats().total_rejected, 8);
    }

    // =============================================================================
    // INTEGRATION TESTS: SUPERVISOR → WRITE API → CORRELATOR
    // =============================================================================

    /// The confirmation may arrive before the write response
    #[tokio::test]
    async fn test_confirmation_before_write_response() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        p.writes.hold();

        let push_then_release = async {
            while p.writes.submit_count() == 0 {
                tokio::task::yield_now().await;
            }
            p.transport.push_frame(committed("C1", "T1", json!(true)));
            wait_dispatched(&p, 1).await;
            p.writes.release();
        };
        let (handle, ()) = tokio::join!(submit(&p, "C1"), push_then_release);

        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
        assert_eq!(p.supervisor.correlator_stats().early_events, 1);
        assert_eq!(listeners(&p), 0);
    }

    /// A second write for the same subject and kind is refused while the first is pending
    #[tokio::test]
    async fn test_duplicate_write_refused_until_confirmed() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let first = submit(&p, "C1").await;

        let err = p
            .supervisor
            .submit(
                SubjectId::from("C1"),
                OpKind::new("set_property"),
                "set_property",
                json!({ "value": 2 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyActive { .. }));
        assert_eq!(p.writes.submit_count(), 1);

        p.transport.push_frame(committed("C1", "T1", json!(true)));
        assert_eq!(outcome_of(&first).await, Ok(Outcome::Accepted));

        let second = submit(&p, "C1").await;
        p.transport.push_frame(committed("C1", "T2", json!(true)));
        assert_eq!(outcome_of(&second).await, Ok(Outcome::Accepted));
    }

    /// With supersede, only the newer write can be resolved
    #[tokio::test]
    async fn test_superseded_write_ignores_its_confirmation() {
        let supervisor = SupervisorConfig {
            duplicate_policy: DuplicatePolicy::Supersede,
            ..SupervisorConfig::for_testing()
        };
        let p = pipeline_with(CorrelatorConfig::for_testing(), supervisor);
        connect(&p, "pk-1").await;

        let old = submit(&p, "C1").await;
        let new = submit(&p, "C1").await;
        assert_eq!(outcome_of(&old).await, Err(SupervisorError::Superseded));
        assert_eq!(listeners(&p), 1);

        p.transport.push_frame(committed("C1", "T1", json!(true)));
        wait_dispatched(&p, 1).await;
        assert_eq!(new.state(), OperationState::AwaitingConfirmation);

        p.transport.push_frame(committed("C1", "T2", json!(true)));
        assert_eq!(outcome_of(&new).await, Ok(Outcome::Accepted));
        assert_eq!(listeners(&p), 0);
    }

    /// A cancelled write ignores its late confirmation
    #[tokio::test]
    async fn test_cancelled_write_ignores_late_confirmation() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        assert!(p.supervisor.cancel(&handle));
        assert_eq!(listeners(&p), 0);

        p.transport.push_frame(committed("C1", "T1", json!(true)));
        wait_dispatched(&p, 1).await;

        assert_eq!(handle.state(), OperationState::Cancelled);
        assert_eq!(outcome_of(&handle).await, Err(SupervisorError::Cancelled));
        assert_eq!(p.supervisor.correlator_stats().total_accepted, 0);
    }

    /// A refused submission never leaves a listener behind
    #[tokio::test]
    async fn test_failed_submission_releases_listener() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        p.writes.fail_with(ApiError::Rejected {
            status: 400,
            message: "bad args".to_string(),
        });

        let err = p
            .supervisor
            .submit(
                SubjectId::from("C1"),
                OpKind::new("set_property"),
                "set_property",
                json!({}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SupervisorError::Submit(_)));
        assert_eq!(listeners(&p), 0);
        assert!(!p.supervisor.is_active(&SubjectId::from("C1"), &OpKind::new("set_property")));
    }

    /// Observers see every stream-driven transition in order
    #[tokio::test]
    async fn test_observers_see_stream_driven_transitions() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let mut updates = p.supervisor.observe();

        let handle = submit(&p, "C1").await;
        p.transport.push_frame(committed("C1", "T1", json!(true)));
        outcome_of(&handle).await.unwrap();

        let mut states = Vec::new();
        for _ in 0..3 {
            let update = updates.recv().await.unwrap();
            assert_eq!(update.id, handle.id());
            states.push(update.state);
        }
        assert_eq!(
            states,
            vec![
                OperationState::AwaitingResponse,
                OperationState::AwaitingConfirmation,
                OperationState::Resolved {
                    outcome: Outcome::Accepted
                },
            ]
        );
    }

    // =============================================================================
    // INTEGRATION TESTS: STREAM RESILIENCE
    // =============================================================================

    /// A pending write survives a dropped stream and resolves after reconnecting
    #[tokio::test]
    async fn test_pending_write_resolves_after_reconnect() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.transport.fail_stream("connection reset");
        wait_status(&p, |s| !s.is_connected()).await;
        wait_status(&p, ConnectionStatus::is_connected).await;
        assert_eq!(p.transport.open_count(), 2);
        assert_eq!(p.transport.live_streams(), 1);

        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);
        p.transport.push_frame(committed("C1", "T1", json!(true)));
        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
    }

    /// Switching identity closes the old stream; pending writes stay matchable
    #[tokio::test]
    async fn test_switching_target_keeps_single_stream() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.stream.connect(target("pk-2")).await.unwrap();
        wait_status(&p, ConnectionStatus::is_connected).await;

        assert_eq!(p.transport.live_streams(), 1);
        assert_eq!(p.transport.opened_targets(), vec![target("pk-1"), target("pk-2")]);
        assert_eq!(p.stream.current_target().await, Some(target("pk-2")));

        p.transport.push_frame(committed("C1", "T1", json!(true)));
        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
    }

    /// Once the stream gives up, only the operation timeout ends a pending write
    #[tokio::test(start_paused = true)]
    async fn test_gave_up_stream_leaves_write_to_its_timeout() {
        let supervisor = SupervisorConfig {
            default_timeout_ms: Some(2_000),
            ..SupervisorConfig::for_testing()
        };
        let p = pipeline_with(CorrelatorConfig::for_testing(), supervisor);
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.transport.refuse_all(true);
        p.transport.fail_stream("server gone");
        let status = wait_status(&p, |s| s.gave_up).await;
        assert_eq!(status.reconnect_attempts, ReconnectPolicy::for_testing().max_attempts);
        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);

        assert_eq!(handle.outcome().await, Err(SupervisorError::TimedOut));
        assert_eq!(listeners(&p), 0);
    }

    /// Disconnecting stops delivery without touching pending writes
    #[tokio::test]
    async fn test_disconnect_keeps_pending_writes() {
        let p = pipeline();
        connect(&p, "pk-1").await;
        let handle = submit(&p, "C1").await;

        p.stream.disconnect().await;
        assert_eq!(p.transport.live_streams(), 0);
        assert!(!p.transport.push_frame(committed("C1", "T1", json!(true))));
        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);

        connect(&p, "pk-1").await;
        p.transport.push_frame(committed("C1", "T1", json!(true)));
        assert_eq!(outcome_of(&handle).await, Ok(Outcome::Accepted));
    }

    // =============================================================================
    // PROPERTY TESTS: ARRIVAL ORDER
    // =============================================================================

    mod arrival_order {
        use super::*;
        use proptest::prelude::*;

        fn confirmation(subject: &str, token: &str) -> StreamEvent {
            StreamEvent::new(CONFIRMED, Some(SubjectId::from(subject)))
                .with_field("correlationToken", json!(token))
                .with_field("outcome", json!(true))
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            /// Whatever order confirmations arrive in, each write takes its own
            #[test]
            fn prop_every_write_matches_its_own_confirmation(
                order in Just((1..=8usize).collect::<Vec<_>>()).prop_shuffle(),
                noise in proptest::collection::vec(9..20usize, 0..6),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let p = pipeline();
                    let mut handles = Vec::new();
                    for i in 1..=8 {
                        handles.push(submit(&p, &format!("C{i}")).await);
                    }

                    for n in &noise {
                        let subject = format!("C{}", n % 8 + 1);
                        p.registry.dispatch(&confirmation(&subject, &format!("T{n}")));
                    }
                    for i in &order {
                        p.registry
                            .dispatch(&confirmation(&format!("C{i}"), &format!("T{i}")));
                    }

                    for handle in &handles {
                        assert_eq!(handle.outcome().await, Ok(Outcome::Accepted));
                    }
                    assert_eq!(listeners(&p), 0);
                    assert_eq!(
                        p.supervisor.correlator_stats().mismatched_events,
                        noise.len() as u64
                    );
                });
            }
        }
    }
}
