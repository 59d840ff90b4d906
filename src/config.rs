//! Runner configuration
//!
//! All settings come from environment variables. `RunnerConfig::from_lookup`
//! takes any key lookup so tests don't have to touch the process environment.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AzureCliTokenProvider, ScopedTokenProvider, TokenProvider};
use crate::core::{RunnerError, RunnerResult};
use crate::mcp::McpToolMode;

/// Scope requested for the MCP tool server when `MCP_AUTH_SCOPE` is unset
pub const DEFAULT_MCP_AUTH_SCOPE: &str = "17a97781-0078-4478-8b4e-fe5dda9e2400/.default";

/// Scope used for the agents service
pub const PROJECT_AUTH_SCOPE: &str = "https://ai.azure.com/.default";

const DEFAULT_AGENT_NAME: &str = "my-agent";
const DEFAULT_API_VERSION: &str = "v1";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

const REQUIRED_KEYS: &[&str] = &["PROJECT_ENDPOINT", "MODEL_DEPLOYMENT_NAME"];
const TOOL_SERVER_KEYS: &[&str] = &["MCP_SERVER_URL", "MCP_SERVER_LABEL", "MCP_AUTH_SCOPE"];
const OPTIONAL_KEYS: &[&str] = &[
    "AGENT_ID",
    "AGENT_NAME",
    "AGENT_INSTRUCTIONS",
    "RUN_ADDITIONAL_INSTRUCTIONS",
    "BING_CONNECTION_ID",
    "MCP_ALLOWED_TOOLS",
    "MCP_TOOL_MODE",
    "MCP_ACCESS_TOKEN",
    "PROJECT_ACCESS_TOKEN",
    "RUN_POLL_INTERVAL_MS",
    "RUN_TIMEOUT_SECS",
    "AGENTS_API_VERSION",
];

/// Settings for the remote MCP tool server
#[derive(Debug, Clone)]
pub struct ToolServerSettings {
    pub url: String,
    pub label: String,
    pub auth_scope: String,
    /// Tools to allow up front; empty means "whatever the server exposes"
    pub allowed_tools: Vec<String>,
    /// Static token that bypasses the CLI credential
    pub access_token: Option<String>,
    pub mode: McpToolMode,
}

/// Complete runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Agents service endpoint (the project endpoint)
    pub project_endpoint: String,
    /// Model deployment the agent runs on
    pub model: String,
    pub agent_name: String,
    /// Instructions for a newly created agent
    pub instructions: Option<String>,
    /// Extra instructions for this run only
    pub additional_instructions: Option<String>,
    /// Existing agent to reuse instead of creating one
    pub agent_id: Option<String>,
    /// Connection for the web-search tool
    pub bing_connection_id: Option<String>,
    pub tool_server: Option<ToolServerSettings>,
    /// Static token for the agents service
    pub project_access_token: Option<String>,
    pub api_version: String,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
}

impl RunnerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> RunnerResult<Self> {
        tracing::info!("[Config] Loading runner configuration from environment");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> RunnerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| RunnerError::MissingConfig(key.to_string()));

        let project_endpoint = require("PROJECT_ENDPOINT")?
            .trim_end_matches('/')
            .to_string();
        let model = require("MODEL_DEPLOYMENT_NAME")?;

        let tool_server = match (get("MCP_SERVER_URL"), get("MCP_SERVER_LABEL")) {
            (Some(url), Some(label)) => Some(ToolServerSettings {
                url,
                label,
                auth_scope: get("MCP_AUTH_SCOPE")
                    .unwrap_or_else(|| DEFAULT_MCP_AUTH_SCOPE.to_string()),
                allowed_tools: get("MCP_ALLOWED_TOOLS")
                    .map(|list| split_list(&list))
                    .unwrap_or_default(),
                access_token: get("MCP_ACCESS_TOKEN"),
                mode: match get("MCP_TOOL_MODE") {
                    Some(mode) => McpToolMode::parse(&mode)?,
                    None => McpToolMode::Approval,
                },
            }),
            (Some(_), None) => {
                return Err(RunnerError::MissingConfig(
                    "MCP_SERVER_LABEL (required when MCP_SERVER_URL is set)".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(RunnerError::MissingConfig(
                    "MCP_SERVER_URL (required when MCP_SERVER_LABEL is set)".into(),
                ))
            }
            (None, None) => None,
        };

        let poll_interval_ms = parse_u64(&get, "RUN_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let run_timeout_secs = parse_u64(&get, "RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS)?;
        if poll_interval_ms == 0 {
            return Err(RunnerError::InvalidConfig(
                "RUN_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }

        Ok(Self {
            project_endpoint,
            model,
            agent_name: get("AGENT_NAME").unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            instructions: get("AGENT_INSTRUCTIONS"),
            additional_instructions: get("RUN_ADDITIONAL_INSTRUCTIONS"),
            agent_id: get("AGENT_ID"),
            bing_connection_id: get("BING_CONNECTION_ID"),
            tool_server,
            project_access_token: get("PROJECT_ACCESS_TOKEN"),
            api_version: get("AGENTS_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            run_timeout: Duration::from_secs(run_timeout_secs),
        })
    }

    /// Credentials for both services
    ///
    /// Configured access tokens are pinned to their scope; every other scope
    /// goes through the Azure CLI.
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        self.token_provider_with(Arc::new(AzureCliTokenProvider::new()))
    }

    /// Like `token_provider`, with `fallback` for scopes without a pinned token
    pub fn token_provider_with(&self, fallback: Arc<dyn TokenProvider>) -> Arc<dyn TokenProvider> {
        let mut provider = ScopedTokenProvider::new(fallback);
        if let Some(token) = &self.project_access_token {
            provider = provider.with_token(PROJECT_AUTH_SCOPE, token.clone());
        }
        if let Some(server) = &self.tool_server {
            if let Some(token) = &server.access_token {
                provider = provider.with_token(server.auth_scope.clone(), token.clone());
            }
        }
        tracing::debug!("[Config] {} scope(s) use a configured token", provider.fixed_scopes());
        Arc::new(provider)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u64<G>(get: &G, key: &str, default: u64) -> RunnerResult<u64>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| RunnerError::InvalidConfig(format!("{} must be an integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}

/// One line of the configuration report
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub key: String,
    /// Truncated value, or None when unset
    pub preview: Option<String>,
    pub required: bool,
}

/// Which settings are present, without failing on the first missing one
#[derive(Debug, Clone)]
pub struct ConfigReport {
    pub entries: Vec<ConfigEntry>,
}

impl ConfigReport {
    /// Build a report from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a report through an arbitrary key lookup
    ///
    /// The tool server keys count as required here: the diagnostics exist to
    /// check the tool server. `MCP_AUTH_SCOPE` falls back to its default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            let v = lookup(key).filter(|v| !v.trim().is_empty());
            if key == "MCP_AUTH_SCOPE" {
                v.or_else(|| Some(DEFAULT_MCP_AUTH_SCOPE.to_string()))
            } else {
                v
            }
        };

        let required = REQUIRED_KEYS.iter().chain(TOOL_SERVER_KEYS).map(|&key| ConfigEntry {
            key: key.to_string(),
            preview: value(key).map(|v| preview(&v)),
            required: true,
        });
        let optional = OPTIONAL_KEYS.iter().map(|&key| ConfigEntry {
            key: key.to_string(),
            preview: value(key).map(|v| {
                if key.ends_with("ACCESS_TOKEN") {
                    format!("<{} chars>", v.len())
                } else {
                    preview(&v)
                }
            }),
            required: false,
        });

        Self {
            entries: required.chain(optional).collect(),
        }
    }

    /// True when every required key is set
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .filter(|e| e.required)
            .all(|e| e.preview.is_some())
    }

    /// Keys that are required but unset
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.required && e.preview.is_none())
            .map(|e| e.key.as_str())
            .collect()
    }
}

/// Truncate a value to 50 characters for display
pub fn preview(value: &str) -> String {
    if value.chars().count() > 50 {
        let head: String = value.chars().take(50).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example.services.ai.azure.com/api/projects/demo/"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
        ]))
        .unwrap();

        assert_eq!(
            config.project_endpoint,
            "https://example.services.ai.azure.com/api/projects/demo"
        );
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.agent_name, "my-agent");
        assert_eq!(config.api_version, "v1");
        assert!(config.tool_server.is_none());
        assert!(config.agent_id.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.run_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_required() {
        let err = RunnerConfig::from_lookup(lookup(&[("MODEL_DEPLOYMENT_NAME", "gpt-4o")]))
            .unwrap_err();
        assert!(matches!(err, RunnerError::MissingConfig(ref k) if k == "PROJECT_ENDPOINT"));
    }

    #[test]
    fn test_tool_server_settings() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("MCP_SERVER_URL", "https://tools.example/"),
            ("MCP_SERVER_LABEL", "sql"),
            ("MCP_ALLOWED_TOOLS", "list_tables, describe_table,,"),
        ]))
        .unwrap();

        let server = config.tool_server.unwrap();
        assert_eq!(server.label, "sql");
        assert_eq!(server.auth_scope, DEFAULT_MCP_AUTH_SCOPE);
        assert_eq!(server.allowed_tools, vec!["list_tables", "describe_table"]);
        assert!(server.access_token.is_none());
        assert_eq!(server.mode, McpToolMode::Approval);
    }

    #[test]
    fn test_function_mode() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("MCP_SERVER_URL", "https://tools.example"),
            ("MCP_SERVER_LABEL", "sql"),
            ("MCP_TOOL_MODE", "function"),
            ("MCP_ACCESS_TOKEN", "abc"),
        ]))
        .unwrap();

        let server = config.tool_server.unwrap();
        assert_eq!(server.mode, McpToolMode::Function);
        assert_eq!(server.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_tool_server_needs_label() {
        let err = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("MCP_SERVER_URL", "https://tools.example"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RunnerError::MissingConfig(_)));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("RUN_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidConfig(_)));

        let err = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("RUN_POLL_INTERVAL_MS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_pinned_tokens() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("MCP_SERVER_URL", "https://tools.example"),
            ("MCP_SERVER_LABEL", "sql"),
            ("MCP_ACCESS_TOKEN", "tool-token"),
        ]))
        .unwrap();

        let fallback = Arc::new(crate::auth::token_provider(|_scope| async {
            Ok(crate::auth::AccessToken::new(
                "cli-token",
                chrono::Utc::now() + chrono::Duration::hours(1),
            ))
        }));
        let provider = config.token_provider_with(fallback);

        let tool = provider.get_token(DEFAULT_MCP_AUTH_SCOPE).await.unwrap();
        assert_eq!(tool.token, "tool-token");
        let project = provider.get_token(PROJECT_AUTH_SCOPE).await.unwrap();
        assert_eq!(project.token, "cli-token");
    }

    #[test]
    fn test_report() {
        let report = ConfigReport::from_lookup(lookup(&[
            ("PROJECT_ENDPOINT", "https://example"),
            ("MODEL_DEPLOYMENT_NAME", "gpt-4o"),
            ("MCP_SERVER_URL", "https://tools.example"),
            ("MCP_ACCESS_TOKEN", "secret-token"),
        ]));

        assert!(!report.is_complete());
        assert_eq!(report.missing(), vec!["MCP_SERVER_LABEL"]);

        let token = report
            .entries
            .iter()
            .find(|e| e.key == "MCP_ACCESS_TOKEN")
            .unwrap();
        assert_eq!(token.preview.as_deref(), Some("<12 chars>"));

        let scope = report.entries.iter().find(|e| e.key == "MCP_AUTH_SCOPE").unwrap();
        assert_eq!(scope.preview.as_deref(), Some(DEFAULT_MCP_AUTH_SCOPE));
    }

    #[test]
    fn test_preview_truncation() {
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(preview("short"), "short");
    }
}
