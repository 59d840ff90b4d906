//! Agent setup and teardown

use crate::agents::{
    Agent, AgentThread, AgentsClient, CreateAgentRequest, CreateRunRequest, MessageRole, Run,
    ToolResources,
};
use crate::config::RunnerConfig;
use crate::core::{RunnerError, RunnerResult};
use crate::tools::ToolCatalog;

/// Instructions for a newly created agent when none are configured
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are a helpful coding assistant that can also assist with general questions.

You have access to tools provided by a remote MCP server. When a question can be answered more accurately with current information from those tools, use them and say when you are consulting them.

Use the code interpreter for calculations and data analysis, and web search for recent public information."#;

/// Where the agent comes from
#[derive(Debug, Clone)]
pub enum AgentSource {
    /// Reuse an agent that already exists
    Existing(String),
    /// Create a new agent (deleted again on `finish(true)`)
    New(CreateAgentRequest),
}

impl AgentSource {
    /// Pick reuse when `AGENT_ID` is configured, creation otherwise
    pub fn from_config(config: &RunnerConfig, catalog: &ToolCatalog) -> Self {
        match &config.agent_id {
            Some(id) => AgentSource::Existing(id.clone()),
            None => AgentSource::New(CreateAgentRequest {
                model: config.model.clone(),
                name: config.agent_name.clone(),
                instructions: config
                    .instructions
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
                tools: catalog.definitions(),
            }),
        }
    }
}

/// An agent plus the thread the conversation happens on
pub struct AgentSession {
    client: AgentsClient,
    agent: Agent,
    thread: AgentThread,
    created_agent: bool,
}

impl AgentSession {
    /// Resolve the agent and create a fresh thread
    pub async fn prepare(client: AgentsClient, source: AgentSource) -> RunnerResult<Self> {
        let (agent, created_agent) = match source {
            AgentSource::Existing(id) => {
                tracing::info!("[AgentSession] Reusing agent {}", id);
                let agent = client.get_agent(&id).await?;
                (agent, false)
            }
            AgentSource::New(request) => {
                let agent = client.create_agent(request).await?;
                tracing::info!("[AgentSession] Created agent, ID: {}", agent.id);
                (agent, true)
            }
        };

        let thread = client.create_thread().await?;
        tracing::info!("[AgentSession] Created thread, ID: {}", thread.id);

        Ok(Self {
            client,
            agent,
            thread,
            created_agent,
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn thread_id(&self) -> &str {
        &self.thread.id
    }

    pub fn client(&self) -> &AgentsClient {
        &self.client
    }

    /// Whether this session created (and therefore owns) the agent
    pub fn owns_agent(&self) -> bool {
        self.created_agent
    }

    /// Post a user message and start a run on it
    pub async fn start_run(
        &self,
        message: &str,
        additional_instructions: Option<String>,
        tool_resources: ToolResources,
    ) -> RunnerResult<Run> {
        let message = self
            .client
            .create_message(&self.thread.id, MessageRole::User, message)
            .await?;
        tracing::info!("[AgentSession] Created message, ID: {}", message.id);

        let run = self
            .client
            .create_run(
                &self.thread.id,
                CreateRunRequest {
                    agent_id: self.agent.id.clone(),
                    additional_instructions,
                    tool_resources: (!tool_resources.is_empty()).then_some(tool_resources),
                },
            )
            .await?;
        tracing::info!("[AgentSession] Created run, ID: {}", run.id);

        Ok(run)
    }

    /// Tear down; only an agent this session created is ever deleted
    pub async fn finish(self, delete_agent: bool) -> RunnerResult<()> {
        if !delete_agent {
            return Ok(());
        }
        if !self.created_agent {
            tracing::info!(
                "[AgentSession] Keeping reused agent {} (not created by this session)",
                self.agent.id
            );
            return Ok(());
        }

        let status = self.client.delete_agent(&self.agent.id).await?;
        tracing::info!("[AgentSession] Deleted agent {}: {}", status.id, status.deleted);
        Ok(())
    }

    /// Tear down after `result` was produced, whether it succeeded or not
    ///
    /// The error in `result` wins over a cleanup error; a cleanup error alone
    /// is returned as is.
    pub async fn finish_after<T, E>(self, result: Result<T, E>, delete_agent: bool) -> Result<T, E>
    where
        E: From<RunnerError>,
    {
        let cleanup = self.finish(delete_agent).await;
        match (result, cleanup) {
            (Err(e), Err(cleanup_err)) => {
                tracing::error!("[AgentSession] Cleanup failed after an earlier error: {}", cleanup_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(cleanup_err)) => Err(cleanup_err.into()),
            (Ok(value), Ok(())) => Ok(value),
        }
    }
}
