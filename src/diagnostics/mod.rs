//! Connectivity diagnostics (`--check`)
//!
//! Three checks, in order, each gating the next:
//!
//! 1. Configuration: every required key is set
//! 2. Authentication: a token can be obtained for the tool server scope
//! 3. Connectivity: a `tools/call list_tables` JSON-RPC call succeeds

use anyhow::Context;
use serde_json::{json, Value};
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AccessToken, AzureCliTokenProvider, ScopedTokenProvider, TokenCache};
use crate::cli::{CheckMark, Console};
use crate::config::{preview, ConfigReport, DEFAULT_MCP_AUTH_SCOPE};
use crate::core::RunnerError;
use crate::mcp::{truncate, McpClient, McpServerConfig};

/// Timeout for the connectivity check
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Tool invoked by the connectivity check
pub const CONNECTIVITY_TOOL: &str = "list_tables";

/// Which checks passed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub configuration: bool,
    pub authentication: bool,
    pub connectivity: bool,
}

impl CheckSummary {
    pub fn all_passed(&self) -> bool {
        self.configuration && self.authentication && self.connectivity
    }
}

/// How the tool server answered the connectivity check
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectivityOutcome {
    /// HTTP 200 with a JSON-RPC result
    Success { preview: String },
    /// HTTP 200 with a JSON-RPC error object
    RpcError { code: i64, message: String },
    Unauthorized { body: String },
    Forbidden { body: String },
    UnexpectedStatus { status: u16, body: String },
    Timeout,
    Connection(String),
    Other(String),
}

impl ConnectivityOutcome {
    /// Classify the result of a connectivity request
    pub fn classify(result: Result<Value, RunnerError>) -> Self {
        match result {
            Ok(value) => ConnectivityOutcome::Success {
                preview: truncate(&value.to_string(), 200),
            },
            Err(RunnerError::JsonRpc { code, message }) => ConnectivityOutcome::RpcError { code, message },
            Err(RunnerError::ToolServer { status: 401, body }) => ConnectivityOutcome::Unauthorized { body },
            Err(RunnerError::ToolServer { status: 403, body }) => ConnectivityOutcome::Forbidden { body },
            Err(RunnerError::ToolServer { status, body }) => {
                ConnectivityOutcome::UnexpectedStatus { status, body }
            }
            Err(RunnerError::Http(e)) if e.is_timeout() => ConnectivityOutcome::Timeout,
            Err(RunnerError::Http(e)) if e.is_connect() => ConnectivityOutcome::Connection(e.to_string()),
            Err(other) => ConnectivityOutcome::Other(other.to_string()),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, ConnectivityOutcome::Success { .. })
    }

    /// Troubleshooting steps for a failed connectivity check
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            ConnectivityOutcome::Unauthorized { .. } => &[
                "Check that MCP_AUTH_SCOPE matches the server's app registration",
                "Check that the token was issued for the right audience",
                "Verify the Azure AD app registration of the tool server",
            ],
            ConnectivityOutcome::Forbidden { .. } => &[
                "Check Azure AD role assignments",
                "Verify the database permissions behind the tool server",
                "Check whether the user is in the required Azure AD group",
            ],
            ConnectivityOutcome::Timeout => &[
                "Check that the tool server is running",
                "Verify network connectivity",
                "Check firewall rules",
            ],
            ConnectivityOutcome::Connection(_) => &[
                "Verify MCP_SERVER_URL",
                "Check that the server is running: az container show ...",
                "Test with: curl http://your-server/health",
            ],
            _ => &[],
        }
    }
}

/// Run every check against the process environment
pub async fn run_checks(console: &Console) -> CheckSummary {
    run_checks_with(console, |key| env::var(key).ok()).await
}

/// Run every check, reading settings through `lookup`
pub async fn run_checks_with<F>(console: &Console, lookup: F) -> CheckSummary
where
    F: Fn(&str) -> Option<String>,
{
    let mut summary = CheckSummary::default();

    console.print_header("TEST 1: Configuration Check");
    let report = ConfigReport::from_lookup(&lookup);
    print_report(console, &report);
    summary.configuration = report.is_complete();
    if !summary.configuration {
        console.print_check(
            CheckMark::Fail,
            &format!("Configuration incomplete, missing: {}", report.missing().join(", ")),
        );
        return finish(console, summary);
    }

    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let scope = value("MCP_AUTH_SCOPE").unwrap_or_else(|| DEFAULT_MCP_AUTH_SCOPE.to_string());

    let mut provider = ScopedTokenProvider::new(Arc::new(AzureCliTokenProvider::new()));
    if let Some(token) = value("MCP_ACCESS_TOKEN") {
        provider = provider.with_token(scope.clone(), token);
    }
    let tokens = TokenCache::new(Arc::new(provider));

    console.print_header("TEST 2: Azure AD Authentication");
    let token = match check_token(console, &tokens, &scope).await {
        Some(token) => token,
        None => return finish(console, summary),
    };
    summary.authentication = true;
    tracing::debug!("[Diagnostics] Token ready ({:?})", token);

    console.print_header("TEST 3: MCP Server Connectivity");
    // Both keys are required by the report, so they are present here
    let url = value("MCP_SERVER_URL").unwrap_or_default();
    let label = value("MCP_SERVER_LABEL").unwrap_or_default();
    let server = McpServerConfig::new(label, url)
        .with_auth_scope(scope)
        .with_timeout(CONNECTIVITY_TIMEOUT);

    summary.connectivity = match check_connectivity(console, server, tokens).await {
        Ok(outcome) => outcome.passed(),
        Err(e) => {
            console.print_check(CheckMark::Fail, &format!("{:#}", e));
            false
        }
    };

    finish(console, summary)
}

fn print_report(console: &Console, report: &ConfigReport) {
    console.print_section("📋 Required Configuration:");
    for entry in report.entries.iter().filter(|e| e.required) {
        match &entry.preview {
            Some(value) => console.print_check(CheckMark::Pass, &format!("{}: {}", entry.key, value)),
            None => console.print_check(CheckMark::Fail, &format!("{}: NOT SET", entry.key)),
        }
    }

    console.print_section("📋 Optional Configuration:");
    for entry in report.entries.iter().filter(|e| !e.required) {
        match &entry.preview {
            Some(value) => console.print_check(CheckMark::Pass, &format!("{}: {}", entry.key, value)),
            None => console.print_check(
                CheckMark::Warn,
                &format!("{}: NOT SET (optional)", entry.key),
            ),
        }
    }
}

async fn check_token(console: &Console, tokens: &TokenCache, scope: &str) -> Option<AccessToken> {
    console.print_system(&format!("Requesting token with scope: {}", scope));

    match tokens.token(scope).await {
        Ok(token) => {
            console.print_check(CheckMark::Pass, "Token obtained successfully!");
            console.print_detail("Token length", &format!("{} characters", token.token.len()));
            console.print_detail("Expires in", &format!("{} minutes", token.minutes_remaining()));
            console.print_detail("Token preview", &preview(&token.token));
            Some(token)
        }
        Err(e) => {
            console.print_check(CheckMark::Fail, &format!("Authentication failed: {}", e));
            console.print_hints(&[
                "Run 'az login' to authenticate",
                "Verify you have access to the MCP resource",
                "Check MCP_AUTH_SCOPE",
            ]);
            None
        }
    }
}

async fn check_connectivity(
    console: &Console,
    server: McpServerConfig,
    tokens: TokenCache,
) -> anyhow::Result<ConnectivityOutcome> {
    let client = McpClient::new(server, tokens).context("Failed to build tool server client")?;

    console.print_system(&format!("Connecting to: {}", client.endpoint()));
    console.print_system(&format!(
        "Sending JSON-RPC request: {} (sessionId: {})",
        CONNECTIVITY_TOOL,
        client.session_id()
    ));

    let result = client
        .request("tools/call", json!({ "name": CONNECTIVITY_TOOL, "arguments": {} }))
        .await;
    let outcome = ConnectivityOutcome::classify(result);
    tracing::info!("[Diagnostics] Connectivity outcome: {:?}", outcome);

    match &outcome {
        ConnectivityOutcome::Success { preview } => {
            console.print_check(CheckMark::Pass, "MCP server responded successfully!");
            console.print_detail("Result preview", preview);
        }
        ConnectivityOutcome::RpcError { code, message } => {
            console.print_check(
                CheckMark::Warn,
                &format!("Server returned error {}: {}", code, message),
            );
        }
        ConnectivityOutcome::Unauthorized { body } => {
            console.print_check(CheckMark::Fail, "Authentication failed (401 Unauthorized)");
            console.print_detail("Response", body);
        }
        ConnectivityOutcome::Forbidden { body } => {
            console.print_check(CheckMark::Fail, "Authorization failed (403 Forbidden)");
            console.print_detail("Response", body);
        }
        ConnectivityOutcome::UnexpectedStatus { status, body } => {
            console.print_check(CheckMark::Fail, &format!("Unexpected status code: {}", status));
            console.print_detail("Response", body);
        }
        ConnectivityOutcome::Timeout => console.print_check(CheckMark::Fail, "Connection timeout"),
        ConnectivityOutcome::Connection(e) => {
            console.print_check(CheckMark::Fail, &format!("Connection error: {}", e))
        }
        ConnectivityOutcome::Other(e) => console.print_check(CheckMark::Fail, &format!("Unexpected error: {}", e)),
    }

    let hints = outcome.hints();
    if !hints.is_empty() {
        console.print_hints(hints);
    }

    Ok(outcome)
}

fn finish(console: &Console, summary: CheckSummary) -> CheckSummary {
    console.print_header("SUMMARY");
    if summary.all_passed() {
        console.print_check(CheckMark::Pass, "All tests passed!");
        console.print_line("🚀 You can now run the agent");
    } else {
        console.print_check(CheckMark::Fail, "Some tests failed");
        console.print_line("🔧 Fix the issues above before running the agent");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_classify_statuses() {
        let ok = ConnectivityOutcome::classify(Ok(json!({"content": [{"type": "text", "text": "orders"}]})));
        assert!(ok.passed());

        let rpc = ConnectivityOutcome::classify(Err(RunnerError::JsonRpc {
            code: -32601,
            message: "Method not found".to_string(),
        }));
        assert_eq!(
            rpc,
            ConnectivityOutcome::RpcError {
                code: -32601,
                message: "Method not found".to_string()
            }
        );
        assert!(!rpc.passed());

        let unauthorized = ConnectivityOutcome::classify(Err(RunnerError::ToolServer {
            status: 401,
            body: "expired".to_string(),
        }));
        assert!(matches!(unauthorized, ConnectivityOutcome::Unauthorized { .. }));
        assert_eq!(unauthorized.hints().len(), 3);

        let forbidden = ConnectivityOutcome::classify(Err(RunnerError::ToolServer {
            status: 403,
            body: String::new(),
        }));
        assert!(matches!(forbidden, ConnectivityOutcome::Forbidden { .. }));

        let other = ConnectivityOutcome::classify(Err(RunnerError::ToolServer {
            status: 502,
            body: "bad gateway".to_string(),
        }));
        assert_eq!(
            other,
            ConnectivityOutcome::UnexpectedStatus {
                status: 502,
                body: "bad gateway".to_string()
            }
        );
        assert!(other.hints().is_empty());
    }

    #[test]
    fn test_long_result_is_truncated() {
        let outcome = ConnectivityOutcome::classify(Ok(json!({ "text": "x".repeat(500) })));
        match outcome {
            ConnectivityOutcome::Success { preview } => assert!(preview.chars().count() <= 203),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_incomplete_configuration_stops_early() {
        let vars: HashMap<&str, &str> = [("PROJECT_ENDPOINT", "https://example.services.ai.azure.com")]
            .into_iter()
            .collect();
        let console = Console::new();

        let summary = run_checks_with(&console, move |key: &str| {
            vars.get(key).map(|v| v.to_string())
        })
        .await;

        assert!(!summary.configuration);
        assert!(!summary.authentication);
        assert!(!summary.all_passed());
    }
}
