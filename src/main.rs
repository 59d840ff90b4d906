use anyhow::Context;
use std::env;
use std::sync::Arc;

use foundry_agent_runner::agents::AgentsClient;
use foundry_agent_runner::auth::TokenCache;
use foundry_agent_runner::cli::{transcript, Console};
use foundry_agent_runner::config::RunnerConfig;
use foundry_agent_runner::diagnostics;
use foundry_agent_runner::logging;
use foundry_agent_runner::mcp::{McpClient, McpServerConfig, McpToolMode, McpToolProvider};
use foundry_agent_runner::run::{AllowListPolicy, ApprovalPolicy, ApproveAll, PollConfig, RunPoller};
use foundry_agent_runner::session::{AgentSession, AgentSource};
use foundry_agent_runner::tools::{ToolCatalog, ToolRegistry};

const DEFAULT_MESSAGE: &str =
    "I would like to get the AI-102 certification. What do you recommend I study?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_guard = logging::init_logging()?;

    // Parse command line arguments
    let args: Vec<String> = env::args().skip(1).collect();
    let check = args.iter().any(|a| a == "--check");
    let delete_agent = args.iter().any(|a| a == "--delete-agent");
    let words: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();
    let message = if words.is_empty() {
        DEFAULT_MESSAGE.to_string()
    } else {
        words.join(" ")
    };

    let console = Console::new();

    if check {
        let summary = diagnostics::run_checks(&console).await;
        drop(log_guard);
        std::process::exit(if summary.all_passed() { 0 } else { 1 });
    }

    tracing::info!("=== Agent Runner Starting ===");

    let config = RunnerConfig::from_env().context("Failed to load configuration")?;
    let tokens = TokenCache::new(config.token_provider());
    let client = AgentsClient::from_config(&config, tokens.clone())
        .context("Failed to create agents client")?;

    // --- Tool server ---
    let mut registry = ToolRegistry::new();
    let mut mcp_server: Option<McpServerConfig> = None;

    if let Some(settings) = &config.tool_server {
        let mut server = McpServerConfig::from_settings(settings);
        let mcp = Arc::new(
            McpClient::new(server.clone(), tokens.clone())
                .context("Failed to create MCP client")?,
        );

        match server.mode {
            McpToolMode::Function => {
                mcp.initialize()
                    .await
                    .with_context(|| format!("Failed to initialize MCP server '{}'", server.label))?;
                let count = registry
                    .add_provider(Arc::new(McpToolProvider::new(mcp.clone())))
                    .await
                    .with_context(|| format!("Failed to discover tools on '{}'", server.label))?;
                console.print_system(&format!(
                    "Registered {} function tools from '{}'",
                    count, server.label
                ));
            }
            McpToolMode::Approval => match discover(&mcp).await {
                Ok(tools) => {
                    console.print_system(&format!(
                        "'{}' exposes {} tools",
                        server.label,
                        tools.len()
                    ));
                    if server.allowed_tools().is_empty() {
                        for tool in &tools {
                            server.allow_tool(tool.name.to_string());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("[Main] Tool discovery on '{}' failed: {}", server.label, e);
                    console.print_system(&format!(
                        "Could not list tools on '{}', the service will discover them",
                        server.label
                    ));
                }
            },
        }

        mcp_server = Some(server);
    }

    // --- Tool catalog ---
    let mut catalog = ToolCatalog::new().with_code_interpreter();
    if let Some(connection_id) = &config.bing_connection_id {
        catalog = catalog.with_bing_grounding(connection_id.clone());
    }
    if let Some(server) = mcp_server.clone().filter(|s| s.mode == McpToolMode::Approval) {
        catalog = catalog.with_mcp_server(server);
    }
    catalog = catalog.with_functions(&registry);

    // --- Agent, thread and run ---
    let source = AgentSource::from_config(&config, &catalog);
    let session = AgentSession::prepare(client.clone(), source)
        .await
        .context("Failed to prepare agent")?;
    if session.owns_agent() {
        console.print_system(&format!("Created agent {}", session.agent().id));
    } else {
        console.print_system(&format!("Reusing agent {}", session.agent().id));
    }

    // Everything past this point runs before cleanup, whether it fails or not
    let result: anyhow::Result<bool> = async {
        let resources = catalog
            .mcp_resources(&tokens)
            .await
            .context("Failed to build tool resources")?;
        let run = session
            .start_run(&message, config.additional_instructions.clone(), resources)
            .await
            .context("Failed to start run")?;

        // --- Poll ---
        let policy: Arc<dyn ApprovalPolicy> = match &mcp_server {
            Some(server) if !server.allowed_tools().is_empty() => Arc::new(
                AllowListPolicy::new()
                    .with_server(server.label.clone(), server.allowed_tools().to_vec()),
            ),
            _ => Arc::new(ApproveAll),
        };

        let mut poller = RunPoller::new(Arc::new(client.clone()), PollConfig::from_config(&config))
            .with_tools(Arc::new(registry))
            .with_tokens(tokens.clone())
            .with_policy(policy);
        if let Some(server) = &mcp_server {
            poller = poller.with_approval_scope(server.label.clone(), server.auth_scope.clone());
        }

        let cancel = poller.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("[Main] Ctrl-C received, cancelling run");
                cancel.cancel();
            }
        });

        let outcome = poller.poll(run).await.context("Failed while polling run")?;
        console.print_system(&format!(
            "Run finished with status: {} after {} polls",
            outcome.run.status, outcome.polls
        ));
        if let Some(error) = &outcome.run.last_error {
            console.print_error(&format!("Run failed: {}", error));
        }

        // --- Transcript ---
        if let Err(e) = transcript::print_transcript(&console, &session, &outcome.run.id).await {
            console.print_error(&format!("Failed to fetch transcript: {}", e));
        }

        let completed = outcome.is_completed();
        outcome
            .into_result(config.run_timeout)
            .context("Run did not finish")?;
        Ok(completed)
    }
    .await;

    let completed = session
        .finish_after(result, delete_agent)
        .await
        .context("Agent run failed")?;

    tracing::info!("=== Agent Runner Finished ===");

    if !completed {
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

/// Handshake with the tool server and list its tools
async fn discover(
    mcp: &McpClient,
) -> foundry_agent_runner::core::RunnerResult<Vec<rmcp::model::Tool>> {
    mcp.initialize().await?;
    mcp.list_tools().await
}
