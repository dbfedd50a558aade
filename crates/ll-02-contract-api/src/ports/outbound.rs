//! # Outbound Ports
//!
//! The ledger backend as seen by the client.

use crate::domain::{ApiError, ContractDescriptor, HealthStatus, WriteError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::{CorrelationToken, SubjectId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Write submission - outbound port.
///
/// The immediate response only acknowledges receipt; the real outcome
/// arrives later on the push stream.
#[async_trait]
pub trait WriteApi: Send + Sync {
    /// Submit `operation` with `payload` against `subject`.
    async fn submit_write(
        &self,
        subject: &SubjectId,
        operation: &str,
        payload: Value,
    ) -> Result<CorrelationToken, WriteError>;
}

/// Full backend surface - outbound port.
#[async_trait]
pub trait ContractApi: WriteApi {
    /// Call a read-only contract method.
    async fn contract_read(
        &self,
        subject: &SubjectId,
        method: &str,
        args: Value,
    ) -> Result<Value, ApiError>;

    /// Deploy a contract for the agent.
    async fn deploy_contract(&self, contract: &ContractDescriptor) -> Result<(), ApiError>;

    /// List the agent's contracts.
    async fn get_contracts(&self) -> Result<Vec<ContractDescriptor>, ApiError>;

    /// Whether the agent is known to the backend.
    async fn is_exist_agent(&self) -> Result<bool, ApiError>;

    /// Register the agent with the backend.
    async fn register_agent(&self) -> Result<(), ApiError>;

    /// Backend liveness.
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// One recorded write submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedWrite {
    pub subject: SubjectId,
    pub operation: String,
    pub payload: Value,
}

type SubmitHook = Arc<dyn Fn(&SubmittedWrite, &CorrelationToken) + Send + Sync>;

/// In-memory [`WriteApi`].
///
/// Hands out tokens `T1`, `T2`, ... unless responses are scripted. Can be
/// held so a submission stays in flight until released.
#[derive(Clone)]
pub struct MockWriteApi {
    submitted: Arc<Mutex<Vec<SubmittedWrite>>>,
    scripted: Arc<Mutex<VecDeque<Result<CorrelationToken, WriteError>>>>,
    next_token: Arc<AtomicU64>,
    gate: Arc<watch::Sender<bool>>,
    on_submit: Arc<Mutex<Option<SubmitHook>>>,
}

impl Default for MockWriteApi {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            submitted: Arc::new(Mutex::new(Vec::new())),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            next_token: Arc::new(AtomicU64::new(1)),
            gate: Arc::new(gate),
            on_submit: Arc::new(Mutex::new(None)),
        }
    }
}

impl MockWriteApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next submission with `token`.
    pub fn respond_with(&self, token: impl Into<String>) {
        self.scripted
            .lock()
            .push_back(Ok(CorrelationToken::new(token)));
    }

    /// Fail the next submission with `error`.
    pub fn fail_with(&self, error: WriteError) {
        self.scripted.lock().push_back(Err(error));
    }

    /// Keep submissions in flight until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Run `hook` after a submission is accepted, before its response is returned.
    pub fn on_submit<F>(&self, hook: F)
    where
        F: Fn(&SubmittedWrite, &CorrelationToken) + Send + Sync + 'static,
    {
        *self.on_submit.lock() = Some(Arc::new(hook));
    }

    pub fn submitted(&self) -> Vec<SubmittedWrite> {
        self.submitted.lock().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }
}

#[async_trait]
impl WriteApi for MockWriteApi {
    async fn submit_write(
        &self,
        subject: &SubjectId,
        operation: &str,
        payload: Value,
    ) -> Result<CorrelationToken, WriteError> {
        let write = SubmittedWrite {
            subject: subject.clone(),
            operation: operation.to_string(),
            payload,
        };
        self.submitted.lock().push(write.clone());

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(ApiError::Transport("mock shut down".to_string()));
        }

        let response = self.scripted.lock().pop_front().unwrap_or_else(|| {
            let n = self.next_token.fetch_add(1, Ordering::SeqCst);
            Ok(CorrelationToken::new(format!("T{n}")))
        });

        if let Ok(token) = &response {
            let hook = self.on_submit.lock().clone();
            if let Some(hook) = hook {
                hook(&write, token);
            }
        }
        response
    }
}

/// In-memory [`ContractApi`] built on [`MockWriteApi`].
///
/// Tracks agent registration and deployed contracts; reads answer from a
/// fixed table keyed by `(subject, method)`.
#[derive(Clone, Default)]
pub struct MockContractApi {
    writes: MockWriteApi,
    registered: Arc<AtomicBool>,
    register_calls: Arc<AtomicU64>,
    contracts: Arc<Mutex<Vec<ContractDescriptor>>>,
    reads: Arc<Mutex<HashMap<(SubjectId, String), Value>>>,
    unreachable: Arc<AtomicBool>,
}

impl MockContractApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// The write side, for scripting tokens and holding submissions.
    pub fn writes(&self) -> &MockWriteApi {
        &self.writes
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> u64 {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Answer `contract_read(subject, method, _)` with `value`.
    pub fn set_read(&self, subject: impl Into<SubjectId>, method: &str, value: Value) {
        self.reads
            .lock()
            .insert((subject.into(), method.to_string()), value);
    }

    /// Fail every non-write call with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn reachable(&self) -> Result<(), ApiError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WriteApi for MockContractApi {
    async fn submit_write(
        &self,
        subject: &SubjectId,
        operation: &str,
        payload: Value,
    ) -> Result<CorrelationToken, WriteError> {
        self.writes.submit_write(subject, operation, payload).await
    }
}

#[async_trait]
impl ContractApi for MockContractApi {
    async fn contract_read(
        &self,
        subject: &SubjectId,
        method: &str,
        _args: Value,
    ) -> Result<Value, ApiError> {
        self.reachable()?;
        self.reads
            .lock()
            .get(&(subject.clone(), method.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::Rejected {
                status: 404,
                message: format!("no method {method} on {subject}"),
            })
    }

    async fn deploy_contract(&self, contract: &ContractDescriptor) -> Result<(), ApiError> {
        self.reachable()?;
        self.contracts.lock().push(contract.clone());
        Ok(())
    }

    async fn get_contracts(&self) -> Result<Vec<ContractDescriptor>, ApiError> {
        self.reachable()?;
        Ok(self.contracts.lock().clone())
    }

    async fn is_exist_agent(&self) -> Result<bool, ApiError> {
        self.reachable()?;
        Ok(self.is_registered())
    }

    async fn register_agent(&self) -> Result<(), ApiError> {
        self.reachable()?;
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.reachable()?;
        Ok(HealthStatus {
            status: "OK".to_string(),
            message: Some("mock".to_string()),
        })
    }
}
