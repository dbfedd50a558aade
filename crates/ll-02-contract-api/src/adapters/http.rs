//! # HTTP Contract API Client
//!
//! Talks to the ledger backend under `{server}/ibc/app/{agent}`:
//!
//! | Call | Request |
//! |------|---------|
//! | `contract_write` | `POST /ibc/app/{agent}/{contract}/{method}?action=contract_write` |
//! | `contract_read` | `POST /ibc/app/{agent}/{contract}/{method}?action=contract_read` |
//! | `deploy_contract` | `PUT /ibc/app/{agent}?action=deploy_contract` |
//! | `register_agent` | `PUT /ibc/app/{agent}?action=register_agent` |
//! | `get_contracts` | `GET /ibc/app/{agent}?action=get_contracts` |
//! | `is_exist_agent` | `GET /ibc/app/{agent}?action=is_exist_agent` |
//! | `health` | `GET /health` |

use crate::config::ApiConfig;
use crate::domain::{
    token_from_response, Acknowledgement, AgentExists, ApiAction, ApiError, ContractDescriptor,
    HealthStatus, MethodCall, RegisterAgentRequest, WriteError,
};
use crate::ports::{ContractApi, WriteApi};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::{AgentId, CorrelationToken, SubjectId};
use tracing::{debug, warn};

/// Base path of agent-scoped endpoints.
pub const APP_PATH: &str = "/ibc/app";

/// reqwest-backed [`ContractApi`].
#[derive(Debug, Clone)]
pub struct HttpContractApi {
    http_client: reqwest::Client,
    server_url: String,
    agent: AgentId,
}

impl HttpContractApi {
    /// Create a client for `agent` on the configured server.
    pub fn new(config: &ApiConfig, agent: AgentId) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self::with_client(http_client, &config.server_url, agent))
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(http_client: reqwest::Client, server_url: &str, agent: AgentId) -> Self {
        Self {
            http_client,
            server_url: server_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// `{server}/ibc/app/{agent}`
    pub fn agent_url(&self) -> String {
        format!("{}{}/{}", self.server_url, APP_PATH, self.agent)
    }

    /// `{server}/ibc/app/{agent}/{contract}/{method}`
    pub fn method_url(&self, subject: &SubjectId, method: &str) -> String {
        format!("{}/{}/{}", self.agent_url(), subject, method)
    }

    fn request(&self, method: Method, url: &str, action: ApiAction) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .query(&[("action", action.as_str())])
    }

    /// Send a request and decode its JSON body.
    async fn call<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<R, ApiError> {
        let response = request.send().await.map_err(|e| {
            warn!(action, error = %e, "Backend request failed");
            ApiError::from(e)
        })?;
        let response = Self::check_status(response, action).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn check_status(response: Response, action: &str) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body
        };
        debug!(action, status = status.as_u16(), "Backend rejected request");
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl WriteApi for HttpContractApi {
    async fn submit_write(
        &self,
        subject: &SubjectId,
        operation: &str,
        payload: Value,
    ) -> Result<CorrelationToken, WriteError> {
        let url = self.method_url(subject, operation);
        debug!(subject = %subject, operation, "Submitting contract write");
        let request = self
            .request(Method::POST, &url, ApiAction::ContractWrite)
            .json(&MethodCall::new(operation, payload));
        let response: Value = self.call(request, ApiAction::ContractWrite.as_str()).await?;
        token_from_response(&response)
    }
}

#[async_trait]
impl ContractApi for HttpContractApi {
    async fn contract_read(
        &self,
        subject: &SubjectId,
        method: &str,
        args: Value,
    ) -> Result<Value, ApiError> {
        let url = self.method_url(subject, method);
        let request = self
            .request(Method::POST, &url, ApiAction::ContractRead)
            .json(&MethodCall::new(method, args));
        self.call(request, ApiAction::ContractRead.as_str()).await
    }

    async fn deploy_contract(&self, contract: &ContractDescriptor) -> Result<(), ApiError> {
        let request = self
            .request(Method::PUT, &self.agent_url(), ApiAction::DeployContract)
            .json(contract);
        let ack: Acknowledgement = self.call(request, ApiAction::DeployContract.as_str()).await?;
        debug!(contract = %contract.name, message = ?ack.message, "Contract deployed");
        Ok(())
    }

    async fn get_contracts(&self) -> Result<Vec<ContractDescriptor>, ApiError> {
        let request = self.request(Method::GET, &self.agent_url(), ApiAction::GetContracts);
        self.call(request, ApiAction::GetContracts.as_str()).await
    }

    async fn is_exist_agent(&self) -> Result<bool, ApiError> {
        let request = self.request(Method::GET, &self.agent_url(), ApiAction::IsExistAgent);
        let answer: AgentExists = self.call(request, ApiAction::IsExistAgent.as_str()).await?;
        Ok(answer.exists)
    }

    async fn register_agent(&self) -> Result<(), ApiError> {
        let request = self
            .request(Method::PUT, &self.agent_url(), ApiAction::RegisterAgent)
            .json(&RegisterAgentRequest {
                address: self.server_url.clone(),
            });
        let ack: Acknowledgement = self.call(request, ApiAction::RegisterAgent.as_str()).await?;
        debug!(agent = %self.agent, message = ?ack.message, "Agent registered");
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = format!("{}/health", self.server_url);
        self.call(self.http_client.get(url), "health").await
    }
}
