//! Tool catalog
//!
//! Everything the agent gets attached: hosted tools (code interpreter, web
//! search), MCP servers called by the service, and function tools the runner
//! executes itself.

use crate::agents::types::{BingGroundingConfig, BingSearchConfiguration};
use crate::agents::{McpToolResource, ToolDefinition, ToolResources};
use crate::auth::{bearer_headers, TokenCache};
use crate::core::RunnerResult;
use crate::mcp::McpServerConfig;

use super::registry::ToolRegistry;

/// Approval mode requested for MCP calls made by the service
const REQUIRE_APPROVAL: &str = "always";

/// The set of tools attached to an agent
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    code_interpreter: bool,
    bing_connection_id: Option<String>,
    mcp_servers: Vec<McpServerConfig>,
    functions: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the sandboxed code interpreter
    pub fn with_code_interpreter(mut self) -> Self {
        self.code_interpreter = true;
        self
    }

    /// Attach web search through a Bing connection
    pub fn with_bing_grounding(mut self, connection_id: impl Into<String>) -> Self {
        self.bing_connection_id = Some(connection_id.into());
        self
    }

    /// Attach an MCP server the service calls directly (approval flow)
    pub fn with_mcp_server(mut self, server: McpServerConfig) -> Self {
        self.mcp_servers.push(server);
        self
    }

    /// Attach every function tool in `registry`
    pub fn with_functions(mut self, registry: &ToolRegistry) -> Self {
        self.functions.extend(registry.definitions());
        self
    }

    /// Tool definitions for agent creation
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = Vec::new();

        if self.code_interpreter {
            defs.push(ToolDefinition::CodeInterpreter);
        }

        if let Some(connection_id) = &self.bing_connection_id {
            defs.push(ToolDefinition::BingGrounding {
                bing_grounding: BingGroundingConfig {
                    search_configurations: vec![BingSearchConfiguration {
                        connection_id: connection_id.clone(),
                    }],
                },
            });
        }

        for server in &self.mcp_servers {
            defs.push(ToolDefinition::Mcp {
                server_label: server.label.clone(),
                server_url: server.url.clone(),
                allowed_tools: server.allowed_tools().to_vec(),
            });
        }

        defs.extend(self.functions.iter().cloned());
        defs
    }

    /// Per-run resources: one entry per MCP server with fresh auth headers
    pub async fn mcp_resources(&self, tokens: &TokenCache) -> RunnerResult<ToolResources> {
        let mut resources = ToolResources::default();

        for server in &self.mcp_servers {
            let token = tokens.token(&server.auth_scope).await?;
            resources.mcp.push(McpToolResource {
                server_label: server.label.clone(),
                headers: bearer_headers(&token),
                require_approval: Some(REQUIRE_APPROVAL.to_string()),
            });
        }

        Ok(resources)
    }

    pub fn is_empty(&self) -> bool {
        !self.code_interpreter
            && self.bing_connection_id.is_none()
            && self.mcp_servers.is_empty()
            && self.functions.is_empty()
    }
}
