//! # Session
//!
//! One logged-in agent: its push stream, listener registry, contract API and
//! operation supervisor. Instances are passed by handle; nothing is global.
//!
//! ## Lifecycle
//!
//! ```text
//! Session::start ── is_exist_agent? ──no──► register_agent
//!        │                 │yes                  │
//!        └─────────────────┴──────► connect stream
//!
//! Session::end ── cancel pending operations ──► disconnect stream
//! ```

use crate::config::{ConfigError, SessionConfig};
use ll_01_stream_connection::{
    SseTransport, StreamConnectionError, StreamConnectionManager, StreamTransport,
};
use ll_02_contract_api::{ApiError, ContractApi, ContractDescriptor, HttpContractApi, WriteApi};
use ll_03_write_correlation::WriteCorrelator;
use ll_04_operation_supervisor::{OperationHandle, OperationSupervisor, SupervisorError};
use serde_json::Value;
use shared_bus::{EventCallback, ListenerRegistry, Subscription};
use shared_types::{
    AgentId, ConnectionStatus, EventKind, OpKind, StreamEvent, SubjectId, TransportError,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use ll_telemetry::log_event;

/// Session setup and lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Backend call failed: {0}")]
    Api(#[from] ApiError),

    #[error("Stream connection failed: {0}")]
    Stream(#[from] StreamConnectionError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// A client session.
pub struct Session {
    config: SessionConfig,
    registry: Arc<ListenerRegistry>,
    api: Arc<dyn ContractApi>,
    stream: StreamConnectionManager,
    supervisor: OperationSupervisor,
}

impl Session {
    /// Wire a session over the given transport and backend.
    pub fn new<A>(config: SessionConfig, transport: Arc<dyn StreamTransport>, api: Arc<A>) -> Self
    where
        A: ContractApi + 'static,
    {
        let registry = Arc::new(ListenerRegistry::new());
        let write_api: Arc<dyn WriteApi> = api.clone();
        let correlator = Arc::new(WriteCorrelator::new(
            registry.clone(),
            write_api,
            config.correlator.clone(),
        ));
        let supervisor = OperationSupervisor::new(correlator, config.supervisor.clone());
        let stream = StreamConnectionManager::new(
            transport,
            registry.clone(),
            config.stream.reconnect.clone(),
        );

        Self {
            config,
            registry,
            api,
            stream,
            supervisor,
        }
    }

    /// Session over SSE and the HTTP contract API.
    pub fn from_config(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let transport = Arc::new(SseTransport::new(config.stream.connect_timeout())?);
        let api = Arc::new(HttpContractApi::new(&config.api, config.agent())?);
        Ok(Self::new(config, transport, api))
    }

    /// Make sure the agent is known to the backend, then open the stream.
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.config.session.register_agent {
            self.ensure_registered().await?;
        }
        self.stream.connect(self.config.stream.target()).await?;
        log_event!(
            info,
            "session",
            "Session started",
            agent = %self.agent(),
            endpoint = %self.config.stream.endpoint
        );
        Ok(())
    }

    /// Cancel every pending operation and close the stream.
    pub async fn end(&self) {
        let cancelled = self.supervisor.cancel_all();
        self.stream.disconnect().await;
        log_event!(
            info,
            "session",
            "Session ended",
            agent = %self.agent(),
            cancelled = cancelled
        );
    }

    /// Register the agent unless the backend already knows it.
    ///
    /// Returns true if a registration was made.
    pub async fn ensure_registered(&self) -> Result<bool, ApiError> {
        if self.api.is_exist_agent().await? {
            return Ok(false);
        }
        self.api.register_agent().await?;
        log_event!(info, "session", "Registered agent with backend", agent = %self.agent());
        Ok(true)
    }

    /// Submit a contract write; the handle resolves on its confirmation.
    ///
    /// The method name doubles as the operation kind.
    pub async fn write(
        &self,
        subject: SubjectId,
        method: &str,
        args: Value,
    ) -> Result<OperationHandle, SupervisorError> {
        self.supervisor
            .submit(subject, OpKind::new(method), method, args)
            .await
    }

    pub async fn read(
        &self,
        subject: &SubjectId,
        method: &str,
        args: Value,
    ) -> Result<Value, ApiError> {
        self.api.contract_read(subject, method, args).await
    }

    pub async fn contracts(&self) -> Result<Vec<ContractDescriptor>, ApiError> {
        self.api.get_contracts().await
    }

    /// Listen for stream events of `kind`.
    pub fn on_event<F>(&self, kind: impl Into<EventKind>, f: F) -> Subscription
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe(kind.into(), EventCallback::new(f))
    }

    pub fn off_event(&self, subscription: &Subscription) -> bool {
        self.registry
            .unsubscribe(subscription.kind(), subscription.callback())
    }

    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.stream.subscribe_status()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    pub fn agent(&self) -> AgentId {
        self.config.agent()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    pub fn api(&self) -> &Arc<dyn ContractApi> {
        &self.api
    }

    pub fn stream(&self) -> &StreamConnectionManager {
        &self.stream
    }

    pub fn supervisor(&self) -> &OperationSupervisor {
        &self.supervisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ll_01_stream_connection::MockStreamTransport;
    use ll_02_contract_api::MockContractApi;
    use ll_04_operation_supervisor::OperationState;
    use serde_json::json;
    use shared_types::{ConnectionState, Outcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        transport: MockStreamTransport,
        api: MockContractApi,
        session: Session,
    }

    fn fixture() -> Fixture {
        let transport = MockStreamTransport::new();
        let api = MockContractApi::new();
        let session = Session::new(
            SessionConfig::for_testing(),
            Arc::new(transport.clone()),
            Arc::new(api.clone()),
        );
        Fixture {
            transport,
            api,
            session,
        }
    }

    async fn connected(session: &Session) {
        let mut status = session.connection_status();
        tokio::time::timeout(Duration::from_secs(1), status.wait_for(|s| s.is_connected()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_registers_unknown_agent_and_connects() {
        let f = fixture();
        f.session.start().await.unwrap();
        connected(&f.session).await;

        assert!(f.api.is_registered());
        assert_eq!(f.api.register_calls(), 1);
        assert_eq!(f.transport.opened_targets(), vec![f.session.config().stream.target()]);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lifecycle_logs_name_the_component() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let f = fixture();
        f.session.start().await.unwrap();
        f.session.end().await;

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        for message in ["Registered agent with backend", "Session started", "Session ended"] {
            let line = text
                .lines()
                .find(|l| l.contains(message))
                .unwrap_or_else(|| panic!("missing log line: {message}\n{text}"));
            assert!(line.contains("component=\"session\""), "{line}");
        }
    }

    #[tokio::test]
    async fn test_start_skips_registration_for_known_agent() {
        let f = fixture();
        f.api.set_registered(true);
        f.session.start().await.unwrap();
        assert_eq!(f.api.register_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_fails_when_backend_unreachable() {
        let f = fixture();
        f.api.set_unreachable(true);
        let err = f.session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ref e) if e.is_transport()));
        assert_eq!(f.transport.open_count(), 0);
    }

    #[tokio::test]
    async fn test_write_resolves_from_stream() {
        let f = fixture();
        f.session.start().await.unwrap();
        connected(&f.session).await;
        f.api.writes().respond_with("T1");

        let handle = f
            .session
            .write(SubjectId::from("C1"), "set_property", json!({"value": 1}))
            .await
            .unwrap();
        assert_eq!(handle.state(), OperationState::AwaitingConfirmation);

        assert!(f.transport.push_frame(
            r#"{"kind":"write_committed","subjectId":"C1","correlationToken":"T1","outcome":true}"#
        ));
        let outcome = tokio::time::timeout(Duration::from_secs(1), handle.outcome())
            .await
            .unwrap();
        assert_eq!(outcome, Ok(Outcome::Accepted));
    }

    #[tokio::test]
    async fn test_end_cancels_and_disconnects() {
        let f = fixture();
        f.session.start().await.unwrap();
        connected(&f.session).await;
        let handle = f
            .session
            .write(SubjectId::from("C1"), "set_property", json!({}))
            .await
            .unwrap();

        f.session.end().await;

        assert_eq!(handle.state(), OperationState::Cancelled);
        assert_eq!(f.session.connection_status().borrow().state, ConnectionState::Disconnected);
        assert_eq!(f.transport.live_streams(), 0);
        assert_eq!(f.session.registry().total_listeners(), 0);
    }

    #[tokio::test]
    async fn test_event_listeners() {
        let f = fixture();
        f.session.start().await.unwrap();
        connected(&f.session).await;

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = f.session.on_event("deploy_contract", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        f.transport
            .push_frame(r#"{"action":"deploy_contract","contract":"C1"}"#);
        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(f.session.off_event(&sub));
        assert!(!f.session.off_event(&sub));
    }

    #[tokio::test]
    async fn test_read_and_contracts() {
        let f = fixture();
        f.api.set_read("C1", "get_property", json!(42));
        let value = f
            .session
            .read(&SubjectId::from("C1"), "get_property", json!([]))
            .await
            .unwrap();
        assert_eq!(value, json!(42));
        assert!(f.session.contracts().await.unwrap().is_empty());
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let err = Session::from_config(SessionConfig::default()).err().unwrap();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
