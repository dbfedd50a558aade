//! # Operation Supervisor
//!
//! Owns every pending operation of a session. At most one operation is
//! outstanding per (subject, operation kind).
//!
//! Lock order: a map shard may be held while an operation's record is read,
//! never the reverse. Transition hooks only broadcast; finished entries are
//! removed by a reaper task that waits on the operation's state channel.

use crate::application::handle::OperationHandle;
use crate::config::SupervisorConfig;
use crate::domain::{
    DuplicatePolicy, StartOptions, SupervisorError, SupervisorStats, SupervisorStatsSnapshot,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ll_02_contract_api::WriteError;
use ll_03_write_correlation::{
    CorrelationError, CorrelatorStatsSnapshot, OperationState, OperationUpdate, TrackedOperation,
    TransitionHook, WriteCorrelator,
};
use serde_json::Value;
use shared_types::{CorrelationToken, OpKind, OperationId, SubjectId};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

type OperationKey = (SubjectId, OpKind);

struct ActiveEntry {
    op: Arc<TrackedOperation>,
    superseded: Arc<AtomicBool>,
}

/// Cancels an operation whose start future was dropped mid-submit.
struct CancelOnDrop<'a>(Option<&'a TrackedOperation>);

impl CancelOnDrop<'_> {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(op) = self.0.take() {
            if op.cancel() {
                debug!(operation = %op.id(), "Start abandoned before the write returned");
            }
        }
    }
}

/// Supervises pending write operations.
pub struct OperationSupervisor {
    correlator: Arc<WriteCorrelator>,
    config: SupervisorConfig,
    active: Arc<DashMap<OperationKey, ActiveEntry>>,
    updates: broadcast::Sender<OperationUpdate>,
    stats: SupervisorStats,
}

impl OperationSupervisor {
    pub fn new(correlator: Arc<WriteCorrelator>, config: SupervisorConfig) -> Self {
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        Self {
            correlator,
            config,
            active: Arc::new(DashMap::new()),
            updates,
            stats: SupervisorStats::default(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Arc<WriteCorrelator> {
        &self.correlator
    }

    pub fn stats(&self) -> SupervisorStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn correlator_stats(&self) -> CorrelatorStatsSnapshot {
        self.correlator.stats()
    }

    /// Every state change of every supervised operation, in transition order
    /// per operation.
    pub fn observe(&self) -> broadcast::Receiver<OperationUpdate> {
        self.updates.subscribe()
    }

    /// Operations that have not reached a terminal state.
    pub fn active_count(&self) -> usize {
        self.active
            .iter()
            .filter(|entry| !entry.value().op.is_terminal())
            .count()
    }

    pub fn is_active(&self, subject: &SubjectId, op_kind: &OpKind) -> bool {
        self.active
            .get(&(subject.clone(), op_kind.clone()))
            .is_some_and(|entry| !entry.op.is_terminal())
    }

    /// Start an operation with the default options.
    ///
    /// `write_fn` is called once, after the confirmation listener is armed.
    pub async fn start<F, Fut>(
        &self,
        subject: SubjectId,
        op_kind: OpKind,
        write_fn: F,
    ) -> Result<OperationHandle, SupervisorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CorrelationToken, WriteError>>,
    {
        self.start_with(subject, op_kind, StartOptions::default(), write_fn)
            .await
    }

    /// Start an operation.
    ///
    /// Returns once the write is acknowledged; the handle then tracks the
    /// confirmation. A failed submission is returned as
    /// [`SupervisorError::Submit`] and frees the (subject, kind) slot.
    pub async fn start_with<F, Fut>(
        &self,
        subject: SubjectId,
        op_kind: OpKind,
        options: StartOptions,
        write_fn: F,
    ) -> Result<OperationHandle, SupervisorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CorrelationToken, WriteError>>,
    {
        let key: OperationKey = (subject.clone(), op_kind.clone());
        let superseded = Arc::new(AtomicBool::new(false));

        let (op, replaced) = match self.active.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let outstanding = !occupied.get().op.is_terminal();
                if outstanding && self.config.duplicate_policy == DuplicatePolicy::Reject {
                    SupervisorStats::incr(&self.stats.rejected_duplicates);
                    warn!(
                        subject = %subject,
                        op_kind = %op_kind,
                        "Operation already active, rejecting start"
                    );
                    return Err(SupervisorError::AlreadyActive { subject, op_kind });
                }
                let op = self.arm(&subject, &op_kind, &options);
                let previous = occupied.insert(ActiveEntry {
                    op: op.clone(),
                    superseded: superseded.clone(),
                });
                (op, outstanding.then_some(previous))
            }
            Entry::Vacant(vacant) => {
                let op = self.arm(&subject, &op_kind, &options);
                vacant.insert(ActiveEntry {
                    op: op.clone(),
                    superseded: superseded.clone(),
                });
                (op, None)
            }
        };

        if let Some(previous) = replaced {
            previous.superseded.store(true, Ordering::Release);
            if previous.op.cancel() {
                SupervisorStats::incr(&self.stats.superseded);
                info!(
                    subject = %subject,
                    op_kind = %op_kind,
                    previous = %previous.op.id(),
                    operation = %op.id(),
                    "Superseded outstanding operation"
                );
            }
        }

        SupervisorStats::incr(&self.stats.started);
        self.spawn_reaper(key, op.id(), op.subscribe());
        if let Some(after) = options.timeout.resolve(self.config.default_timeout()) {
            self.correlator.spawn_timeout(&op, after);
        }

        let guard = CancelOnDrop(Some(&op));
        let sent = self.correlator.send(&op, write_fn()).await;
        guard.disarm();

        let handle = OperationHandle::new(op.clone(), superseded);
        match sent {
            Ok(_) => Ok(handle),
            // Ended while the write was in flight; the handle reports how.
            Err(CorrelationError::AlreadyFinished(_)) => Ok(handle),
            Err(CorrelationError::Submit(e)) => {
                SupervisorStats::incr(&self.stats.submit_failures);
                Err(SupervisorError::Submit(e))
            }
        }
    }

    /// Start an operation that submits `operation` through the write API.
    pub async fn submit(
        &self,
        subject: SubjectId,
        op_kind: OpKind,
        operation: &str,
        payload: Value,
    ) -> Result<OperationHandle, SupervisorError> {
        let api = self.correlator.write_api().clone();
        let target = subject.clone();
        let operation = operation.to_string();
        self.start(subject, op_kind, move || async move {
            api.submit_write(&target, &operation, payload).await
        })
        .await
    }

    /// Cancel the operation behind `handle`. Returns false if it had already ended.
    pub fn cancel(&self, handle: &OperationHandle) -> bool {
        let cancelled = handle.operation().cancel();
        if cancelled {
            info!(operation = %handle.id(), subject = %handle.subject(), "Operation cancelled");
        }
        cancelled
    }

    /// Cancel whatever is outstanding for (subject, kind).
    pub fn cancel_subject(&self, subject: &SubjectId, op_kind: &OpKind) -> bool {
        let op = self
            .active
            .get(&(subject.clone(), op_kind.clone()))
            .map(|entry| entry.op.clone());
        op.is_some_and(|op| op.cancel())
    }

    /// Cancel every outstanding operation. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ops: Vec<Arc<TrackedOperation>> = self
            .active
            .iter()
            .map(|entry| entry.value().op.clone())
            .collect();
        let cancelled = ops.iter().filter(|op| op.cancel()).count();
        if cancelled > 0 {
            info!(cancelled, "Cancelled all pending operations");
        }
        cancelled
    }

    fn arm(
        &self,
        subject: &SubjectId,
        op_kind: &OpKind,
        options: &StartOptions,
    ) -> Arc<TrackedOperation> {
        let updates = self.updates.clone();
        let hook: TransitionHook = Arc::new(move |update: &OperationUpdate| {
            let _ = updates.send(update.clone());
        });
        let op = self.correlator.arm_with(
            subject.clone(),
            op_kind.clone(),
            options.confirmation_kind.clone(),
            Some(hook),
        );
        // Nothing else holds the operation yet, so this precedes its transitions.
        let _ = self.updates.send(OperationUpdate {
            id: op.id(),
            subject: subject.clone(),
            op_kind: op_kind.clone(),
            state: op.state(),
        });
        op
    }

    fn spawn_reaper(
        &self,
        key: OperationKey,
        id: OperationId,
        mut state: watch::Receiver<OperationState>,
    ) {
        let active = Arc::downgrade(&self.active);
        tokio::spawn(async move {
            let _ = state.wait_for(OperationState::is_terminal).await;
            if let Some(active) = active.upgrade() {
                active.remove_if(&key, |_, entry| entry.op.id() == id);
            }
        });
    }
}

impl Drop for OperationSupervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
