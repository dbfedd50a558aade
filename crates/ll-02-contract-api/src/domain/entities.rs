//! # Domain Entities
//!
//! Request and response bodies of the ledger backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::CorrelationToken;
use std::fmt;

use super::errors::ApiError;

/// Response field that names the correlation token explicitly.
pub const TOKEN_RESPONSE_FIELD: &str = "correlationToken";

/// Value of the `action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiAction {
    ContractWrite,
    ContractRead,
    DeployContract,
    GetContracts,
    IsExistAgent,
    RegisterAgent,
}

impl ApiAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiAction::ContractWrite => "contract_write",
            ApiAction::ContractRead => "contract_read",
            ApiAction::DeployContract => "deploy_contract",
            ApiAction::GetContracts => "get_contracts",
            ApiAction::IsExistAgent => "is_exist_agent",
            ApiAction::RegisterAgent => "register_agent",
        }
    }
}

impl fmt::Display for ApiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method invocation body for contract reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Named arguments.
    #[serde(default)]
    pub values: Value,
    #[serde(default)]
    pub parameters: Value,
}

impl MethodCall {
    /// Call `name` with `values` as its named arguments.
    pub fn new(name: impl Into<String>, values: Value) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            values,
            parameters: Value::Object(Map::new()),
        }
    }
}

/// A contract as deployed on (or listed by) the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub id: String,
    pub name: String,
    /// Source file name.
    pub contract: String,
    pub code: String,
    /// Replication protocol, e.g. `BFT`.
    pub protocol: String,
    #[serde(default)]
    pub default_app: String,
    /// Owner agent id.
    pub pid: String,
    /// Owner server address.
    pub address: String,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub constructor: Value,
}

impl ContractDescriptor {
    /// Descriptor for a BFT contract owned by `agent` at `address`.
    pub fn bft(
        name: impl Into<String>,
        file_name: impl Into<String>,
        code: impl Into<String>,
        agent: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            contract: file_name.into(),
            code: code.into(),
            protocol: "BFT".to_string(),
            default_app: String::new(),
            pid: agent.into(),
            address: address.into(),
            group: Vec::new(),
            threshold: 0,
            profile: None,
            constructor: Value::Object(Map::new()),
        }
    }
}

/// `is_exist_agent` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AgentExists {
    pub exists: bool,
}

/// `register_agent` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterAgentRequest {
    /// Server the agent is reachable at.
    pub address: String,
}

/// Generic acknowledgement (`register_agent`, `deploy_contract`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `/health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Extract the correlation token from a `contract_write` response.
///
/// The response is opaque and echoed verbatim in the confirmation, so the
/// whole value is the token. Only an object with a non-null
/// [`TOKEN_RESPONSE_FIELD`] hands out that field instead.
pub fn token_from_response(value: &Value) -> Result<CorrelationToken, ApiError> {
    match value {
        Value::Null => Err(ApiError::InvalidResponse(
            "empty write response".to_string(),
        )),
        Value::String(s) if s.is_empty() => Err(ApiError::InvalidResponse(
            "empty correlation token".to_string(),
        )),
        Value::Object(map) => Ok(map
            .get(TOKEN_RESPONSE_FIELD)
            .filter(|v| !v.is_null())
            .map_or_else(|| CorrelationToken::from_value(value), CorrelationToken::from_value)),
        other => Ok(CorrelationToken::from_value(other)),
    }
}
