//! # Write-Confirmation Correlator
//!
//! Flow:
//! 1. `arm()` registers the confirmation listener
//! 2. `send()` submits the write and stores the returned token
//! 3. A matching push event resolves the operation
//! 4. Timeout or cancel end it otherwise; the listener is removed exactly once

use crate::application::operation::{TrackedOperation, TransitionHook};
use crate::config::CorrelatorConfig;
use crate::domain::{CorrelationError, CorrelatorStats, CorrelatorStatsSnapshot, OperationState};
use ll_02_contract_api::{WriteApi, WriteError};
use serde_json::Value;
use shared_bus::EventSubscriber;
use shared_types::{CorrelationToken, EventKind, OpKind, SubjectId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Correlates optimistic writes with their confirmation events.
pub struct WriteCorrelator {
    subscriber: Arc<dyn EventSubscriber>,
    write_api: Arc<dyn WriteApi>,
    config: Arc<CorrelatorConfig>,
    stats: Arc<CorrelatorStats>,
}

impl WriteCorrelator {
    pub fn new(
        subscriber: Arc<dyn EventSubscriber>,
        write_api: Arc<dyn WriteApi>,
        config: CorrelatorConfig,
    ) -> Self {
        Self {
            subscriber,
            write_api,
            config: Arc::new(config),
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn write_api(&self) -> &Arc<dyn WriteApi> {
        &self.write_api
    }

    pub fn stats(&self) -> CorrelatorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Operations whose listener is still registered.
    pub fn active_operations(&self) -> u64 {
        self.stats.active()
    }

    /// Register a listener for the default confirmation kind.
    pub fn arm(&self, subject: SubjectId, op_kind: OpKind) -> Arc<TrackedOperation> {
        self.arm_with(subject, op_kind, None, None)
    }

    /// Register a listener for `confirmation_kind` (or the default) and report
    /// every transition to `hook`.
    pub fn arm_with(
        &self,
        subject: SubjectId,
        op_kind: OpKind,
        confirmation_kind: Option<EventKind>,
        hook: Option<TransitionHook>,
    ) -> Arc<TrackedOperation> {
        TrackedOperation::arm(
            subject,
            op_kind,
            confirmation_kind.unwrap_or_else(|| self.config.confirmation_kind()),
            self.subscriber.clone(),
            self.config.clone(),
            self.stats.clone(),
            hook,
        )
    }

    /// Run `write` for an armed operation and record its token.
    ///
    /// A failed write ends the operation as `Failed` and returns the error.
    /// Nothing is sent if the operation already ended.
    pub async fn send<F>(
        &self,
        op: &TrackedOperation,
        write: F,
    ) -> Result<CorrelationToken, CorrelationError>
    where
        F: Future<Output = Result<CorrelationToken, WriteError>>,
    {
        let state = op.state();
        if state.is_terminal() {
            return Err(CorrelationError::AlreadyFinished(state));
        }

        match write.await {
            Ok(token) => {
                debug!(operation = %op.id(), token = %token, "Write acknowledged");
                op.set_token(token.clone())?;
                Ok(token)
            }
            Err(e) => {
                warn!(
                    operation = %op.id(),
                    subject = %op.subject(),
                    error = %e,
                    "Write submission failed"
                );
                op.fail_submit(e.to_string());
                Err(CorrelationError::Submit(e))
            }
        }
    }

    /// Submit `operation` through the configured write API.
    pub async fn submit(
        &self,
        op: &TrackedOperation,
        operation: &str,
        payload: Value,
    ) -> Result<CorrelationToken, CorrelationError> {
        let api = self.write_api.clone();
        let subject = op.subject().clone();
        self.send(op, async move { api.submit_write(&subject, operation, payload).await })
            .await
    }

    /// Expire `op` after `after` unless it ends first.
    pub fn spawn_timeout(&self, op: &Arc<TrackedOperation>, after: Duration) -> JoinHandle<()> {
        let op = op.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => {
                    if op.expire() {
                        warn!(
                            operation = %op.id(),
                            subject = %op.subject(),
                            timeout_ms = after.as_millis() as u64,
                            "Operation timed out waiting for confirmation"
                        );
                    }
                }
                _ = op.wait() => {}
            }
        })
    }

    /// Arm, submit, and wait for the terminal state.
    pub async fn execute(
        &self,
        subject: SubjectId,
        op_kind: OpKind,
        operation: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<OperationState, CorrelationError> {
        let op = self.arm(subject, op_kind);
        let _timer = timeout.map(|after| self.spawn_timeout(&op, after));
        self.submit(&op, operation, payload).await?;
        Ok(op.wait().await)
    }
}
