//! HTTP client for the agents service
//!
//! Every request carries the `api-version` query parameter and a bearer token
//! from the shared `TokenCache`. A 401 drops the cached token and the request
//! is retried once with a fresh one.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use super::api::RunsApi;
use super::types::{
    Agent, AgentThread, CreateAgentRequest, CreateMessageRequest, CreateRunRequest,
    DeletionStatus, ListResponse, ListSortOrder, MessageRole, Run, RunStep, ThreadMessage,
    ToolApproval, ToolOutput,
};
use crate::auth::TokenCache;
use crate::config::{RunnerConfig, PROJECT_AUTH_SCOPE};
use crate::core::{RunnerError, RunnerResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for agents, threads, messages, runs and run steps
#[derive(Clone)]
pub struct AgentsClient {
    http: Client,
    endpoint: String,
    api_version: String,
    tokens: TokenCache,
    scope: String,
}

impl std::fmt::Debug for AgentsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentsClient")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AgentsClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>, tokens: TokenCache) -> RunnerResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: "v1".to_string(),
            tokens,
            scope: PROJECT_AUTH_SCOPE.to_string(),
        })
    }

    /// Create a client from the runner configuration
    pub fn from_config(config: &RunnerConfig, tokens: TokenCache) -> RunnerResult<Self> {
        tracing::info!("[AgentsClient] Using endpoint {}", config.project_endpoint);
        Ok(Self::new(config.project_endpoint.clone(), tokens)?.with_api_version(config.api_version.clone()))
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> RunnerResult<T> {
        let mut retried = false;

        loop {
            let token = self.tokens.token(&self.scope).await?;

            let mut request = self
                .http
                .request(method.clone(), self.url(path))
                .query(&[("api-version", self.api_version.as_str())])
                .query(query)
                .bearer_auth(&token.token);
            if let Some(body) = &body {
                request = request.json(body);
            }

            tracing::debug!("[AgentsClient] {} {}", method, path);
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                tracing::warn!("[AgentsClient] 401 on {} {}, refreshing token", method, path);
                self.tokens.invalidate(&self.scope).await;
                retried = true;
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                tracing::error!("[AgentsClient] {} {} failed ({}): {}", method, path, status, text);
                return Err(RunnerError::Api {
                    status: status.as_u16(),
                    body: text,
                });
            }

            return Ok(serde_json::from_str(&text)?);
        }
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    pub async fn create_agent(&self, request: CreateAgentRequest) -> RunnerResult<Agent> {
        tracing::info!(
            "[AgentsClient] Creating agent '{}' on model {} with {} tools",
            request.name,
            request.model,
            request.tools.len()
        );
        let body = serde_json::to_value(&request)?;
        self.send(Method::POST, "assistants", &[], Some(body)).await
    }

    pub async fn get_agent(&self, agent_id: &str) -> RunnerResult<Agent> {
        self.send(Method::GET, &format!("assistants/{}", agent_id), &[], None)
            .await
    }

    pub async fn delete_agent(&self, agent_id: &str) -> RunnerResult<DeletionStatus> {
        tracing::info!("[AgentsClient] Deleting agent {}", agent_id);
        self.send(Method::DELETE, &format!("assistants/{}", agent_id), &[], None)
            .await
    }

    // ------------------------------------------------------------------
    // Threads and messages
    // ------------------------------------------------------------------

    pub async fn create_thread(&self) -> RunnerResult<AgentThread> {
        self.send(Method::POST, "threads", &[], Some(json!({}))).await
    }

    pub async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: impl Into<String>,
    ) -> RunnerResult<ThreadMessage> {
        let body = serde_json::to_value(CreateMessageRequest {
            role,
            content: content.into(),
        })?;
        self.send(
            Method::POST,
            &format!("threads/{}/messages", thread_id),
            &[],
            Some(body),
        )
        .await
    }

    /// List all messages of a thread, following pagination
    pub async fn list_messages(
        &self,
        thread_id: &str,
        order: ListSortOrder,
    ) -> RunnerResult<Vec<ThreadMessage>> {
        self.list_all(&format!("threads/{}/messages", thread_id), order)
            .await
    }

    // ------------------------------------------------------------------
    // Runs and run steps
    // ------------------------------------------------------------------

    pub async fn create_run(&self, thread_id: &str, request: CreateRunRequest) -> RunnerResult<Run> {
        tracing::info!(
            "[AgentsClient] Creating run on thread {} for agent {}",
            thread_id,
            request.agent_id
        );
        let body = serde_json::to_value(&request)?;
        self.send(Method::POST, &format!("threads/{}/runs", thread_id), &[], Some(body))
            .await
    }

    /// List the steps of a run in creation order
    pub async fn list_run_steps(&self, thread_id: &str, run_id: &str) -> RunnerResult<Vec<RunStep>> {
        self.list_all(
            &format!("threads/{}/runs/{}/steps", thread_id, run_id),
            ListSortOrder::Ascending,
        )
        .await
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        order: ListSortOrder,
    ) -> RunnerResult<Vec<T>> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("order", order.as_str().to_string())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page: ListResponse<T> = self.send(Method::GET, path, &query, None).await?;
            items.extend(page.data);

            match (page.has_more, page.last_id) {
                (true, Some(last)) => after = Some(last),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl RunsApi for AgentsClient {
    async fn get_run(&self, thread_id: &str, run_id: &str) -> RunnerResult<Run> {
        self.send(
            Method::GET,
            &format!("threads/{}/runs/{}", thread_id, run_id),
            &[],
            None,
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> RunnerResult<Run> {
        tracing::info!("[AgentsClient] Cancelling run {}", run_id);
        self.send(
            Method::POST,
            &format!("threads/{}/runs/{}/cancel", thread_id, run_id),
            &[],
            Some(json!({})),
        )
        .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> RunnerResult<Run> {
        tracing::info!("[AgentsClient] Submitting {} tool outputs to run {}", outputs.len(), run_id);
        self.send(
            Method::POST,
            &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            &[],
            Some(json!({ "tool_outputs": outputs })),
        )
        .await
    }

    async fn submit_tool_approvals(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: Vec<ToolApproval>,
    ) -> RunnerResult<Run> {
        tracing::info!(
            "[AgentsClient] Submitting {} tool approvals to run {}",
            approvals.len(),
            run_id
        );
        self.send(
            Method::POST,
            &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            &[],
            Some(json!({ "tool_approvals": approvals })),
        )
        .await
    }
}
