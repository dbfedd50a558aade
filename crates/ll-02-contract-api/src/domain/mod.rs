//! # Domain Layer
//!
//! Backend payloads and errors.

pub mod entities;
pub mod errors;

pub use entities::{
    token_from_response, Acknowledgement, AgentExists, ApiAction, ContractDescriptor,
    HealthStatus, MethodCall, RegisterAgentRequest, TOKEN_RESPONSE_FIELD,
};
pub use errors::{ApiError, WriteError};
