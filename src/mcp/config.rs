//! MCP Server Configuration
//!
//! Configuration types for the remote MCP tool server

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ToolServerSettings, DEFAULT_MCP_AUTH_SCOPE};
use crate::core::{RunnerError, RunnerResult};

/// How the agent reaches the MCP server's tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpToolMode {
    /// The service calls the server itself; the runner approves each call
    Approval,
    /// Tools are exposed as functions; the runner calls the server
    Function,
}

impl McpToolMode {
    pub fn parse(value: &str) -> RunnerResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approval" => Ok(McpToolMode::Approval),
            "function" => Ok(McpToolMode::Function),
            other => Err(RunnerError::InvalidConfig(format!(
                "MCP_TOOL_MODE must be 'approval' or 'function', got '{}'",
                other
            ))),
        }
    }
}

/// Configuration for the MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Label the agent uses for this server (also the tool namespace)
    pub label: String,

    /// Base URL of the server; JSON-RPC goes to `{url}/message`
    pub url: String,

    /// Scope of the bearer token sent to the server
    #[serde(default = "default_auth_scope")]
    pub auth_scope: String,

    /// Tools the agent may call; empty means every tool the server exposes
    #[serde(default)]
    allowed_tools: Vec<String>,

    #[serde(default = "default_mode")]
    pub mode: McpToolMode,

    /// Timeout for a single JSON-RPC request in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_auth_scope() -> String {
    DEFAULT_MCP_AUTH_SCOPE.to_string()
}

fn default_mode() -> McpToolMode {
    McpToolMode::Approval
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl McpServerConfig {
    /// Create a new MCP server configuration
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            auth_scope: default_auth_scope(),
            allowed_tools: Vec::new(),
            mode: default_mode(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Build from the environment-derived settings
    pub fn from_settings(settings: &ToolServerSettings) -> Self {
        let mut config = Self::new(settings.label.clone(), settings.url.clone())
            .with_auth_scope(settings.auth_scope.clone())
            .with_mode(settings.mode);
        for tool in &settings.allowed_tools {
            config.allow_tool(tool.clone());
        }
        config
    }

    pub fn with_auth_scope(mut self, scope: impl Into<String>) -> Self {
        self.auth_scope = scope.into();
        self
    }

    pub fn with_mode(mut self, mode: McpToolMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Add a tool to the allow list (no-op if already present)
    pub fn allow_tool(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.allowed_tools.contains(&name) {
            tracing::debug!("[McpServerConfig] Allowing tool '{}' on '{}'", name, self.label);
            self.allowed_tools.push(name);
        }
    }

    /// Remove a tool from the allow list
    pub fn disallow_tool(&mut self, name: &str) -> RunnerResult<()> {
        let before = self.allowed_tools.len();
        self.allowed_tools.retain(|t| t != name);
        if self.allowed_tools.len() == before {
            return Err(RunnerError::InvalidConfig(format!(
                "tool '{}' is not in the allowed list of '{}'",
                name, self.label
            )));
        }
        tracing::debug!("[McpServerConfig] Disallowed tool '{}' on '{}'", name, self.label);
        Ok(())
    }

    pub fn allowed_tools(&self) -> &[String] {
        &self.allowed_tools
    }

    /// Whether `name` passes the allow list
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == name)
    }

    /// The JSON-RPC endpoint without the session query
    pub fn message_endpoint(&self) -> String {
        format!("{}/message", self.url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_and_disallow() {
        let mut config = McpServerConfig::new("docs", "https://learn.microsoft.com/api/mcp");
        assert!(config.is_allowed("anything"));

        config.allow_tool("microsoft_docs_fetch");
        config.allow_tool("microsoft_docs_search");
        config.allow_tool("microsoft_docs_fetch");
        assert_eq!(
            config.allowed_tools(),
            ["microsoft_docs_fetch", "microsoft_docs_search"]
        );
        assert!(config.is_allowed("microsoft_docs_search"));
        assert!(!config.is_allowed("microsoft_code_sample_search"));

        config.disallow_tool("microsoft_docs_fetch").unwrap();
        assert_eq!(config.allowed_tools(), ["microsoft_docs_search"]);

        let err = config.disallow_tool("microsoft_docs_fetch").unwrap_err();
        assert!(matches!(err, RunnerError::InvalidConfig(_)));
    }

    #[test]
    fn test_message_endpoint() {
        let config = McpServerConfig::new("sql", "https://tools.example/");
        assert_eq!(config.message_endpoint(), "https://tools.example/message");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(McpToolMode::parse("Function").unwrap(), McpToolMode::Function);
        assert_eq!(McpToolMode::parse(" approval ").unwrap(), McpToolMode::Approval);
        assert!(McpToolMode::parse("auto").is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: McpServerConfig =
            serde_json::from_str(r#"{"label": "sql", "url": "https://tools.example"}"#).unwrap();
        assert_eq!(config.mode, McpToolMode::Approval);
        assert_eq!(config.auth_scope, DEFAULT_MCP_AUTH_SCOPE);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.allowed_tools().is_empty());
    }
}
