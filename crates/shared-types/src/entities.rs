//! # Core Domain Entities
//!
//! Identifiers, stream events and connection states.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of the contract/resource a write or event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Category tag of a stream event.
///
/// Open-ended: the server may introduce new kinds at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(String);

impl EventKind {
    /// Kind announcing a committed contract write.
    pub const CONTRACT_WRITE: &'static str = "contract_write";
    /// Kind announcing a contract deployment.
    pub const DEPLOY_CONTRACT: &'static str = "deploy_contract";
    /// Kind announcing an agent-to-agent connection.
    pub const A2A_CONNECT: &'static str = "a2a_connect";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn contract_write() -> Self {
        Self::new(Self::CONTRACT_WRITE)
    }

    pub fn deploy_contract() -> Self {
        Self::new(Self::DEPLOY_CONTRACT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Logical operation kind, e.g. `"join"` or `"add_proposal"`.
///
/// Together with a `SubjectId` it names one logical action; at most one
/// such action is outstanding at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpKind(String);

impl OpKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OpKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OpKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Agent identity (public key) used to scope the stream and API paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of one pending operation.
///
/// Uses UUID v7 so ids sort by creation time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CORRELATION
// =============================================================================

/// Opaque value returned by the write API and echoed back inside the
/// confirmation event.
///
/// String values are kept verbatim; any other JSON value is held as its
/// canonical JSON text so that equal content compares equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Build a token from a raw JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self(s.clone()),
            other => Self(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Business outcome reported by a confirmation event.
///
/// A rejection is a normal result (e.g. "request queue full"), not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Rejected { reason: Option<String> },
}

impl Outcome {
    /// Interpret an outcome field.
    ///
    /// `true`, `null`, non-zero numbers and the strings `accepted`, `ok`,
    /// `success`, `true` are positive. `false`, zero and `rejected`, `false`
    /// are negative without a reason; any other string is a rejection whose
    /// reason is that string. Objects are read through their `accepted`
    /// (or `ok`) flag and optional `reason`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Outcome::Accepted,
            Value::Bool(true) => Outcome::Accepted,
            Value::Bool(false) => Outcome::Rejected { reason: None },
            Value::Number(n) => {
                if n.as_f64().is_some_and(|f| f != 0.0) {
                    Outcome::Accepted
                } else {
                    Outcome::Rejected { reason: None }
                }
            }
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "accepted" | "ok" | "success" | "true" => Outcome::Accepted,
                "rejected" | "false" => Outcome::Rejected { reason: None },
                _ => Outcome::Rejected {
                    reason: Some(s.clone()),
                },
            },
            Value::Object(map) => {
                let accepted = map
                    .get("accepted")
                    .or_else(|| map.get("ok"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if accepted {
                    Outcome::Accepted
                } else {
                    Outcome::Rejected {
                        reason: map.get("reason").and_then(Value::as_str).map(String::from),
                    }
                }
            }
            Value::Array(_) => Outcome::Rejected {
                reason: Some(value.to_string()),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }
}

// =============================================================================
// STREAM EVENTS
// =============================================================================

/// A decoded push-stream event.
///
/// `kind` is never empty on a delivered event. Everything besides the kind
/// and subject stays in `fields` untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    pub kind: EventKind,
    #[serde(rename = "subjectId", skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StreamEvent {
    /// Create an event with no extra fields.
    pub fn new(kind: impl Into<EventKind>, subject_id: Option<SubjectId>) -> Self {
        Self {
            kind: kind.into(),
            subject_id,
            fields: Map::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// First present field among `keys`.
    pub fn first_field<'a, S: AsRef<str>>(&'a self, keys: &[S]) -> Option<&'a Value> {
        keys.iter().find_map(|k| self.fields.get(k.as_ref()))
    }

    /// Whether this event concerns `subject`.
    pub fn concerns(&self, subject: &SubjectId) -> bool {
        self.subject_id.as_ref() == Some(subject)
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// CONNECTION STATE
// =============================================================================

/// Push-stream connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Snapshot broadcast to connection-state observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Reconnection stopped after exhausting the retry budget.
    pub gave_up: bool,
}

impl ConnectionStatus {
    pub const fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            gave_up: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Where a push stream is opened: server endpoint plus the agent identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamTarget {
    pub endpoint: String,
    pub identity: AgentId,
}

impl StreamTarget {
    pub fn new(endpoint: impl Into<String>, identity: impl Into<AgentId>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity: identity.into(),
        }
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.endpoint, self.identity)
    }
}
