//! JSON-RPC client for the MCP tool server
//!
//! Requests are POSTed to `{url}/message?sessionId=<uuid>`; one session id is
//! generated per client. Replies may be plain JSON or a single SSE `data:`
//! frame. Results are decoded into rmcp's model types.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use rmcp::model::{CallToolResult, ListToolsResult, Tool};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::config::McpServerConfig;
use crate::auth::TokenCache;
use crate::core::{RunnerError, RunnerResult};

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Client for one MCP server
pub struct McpClient {
    http: Client,
    config: McpServerConfig,
    tokens: TokenCache,
    session_id: String,
    next_id: AtomicU64,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("label", &self.config.label)
            .field("url", &self.config.url)
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl McpClient {
    /// Create a client; no request is sent until the first call
    pub fn new(config: McpServerConfig, tokens: TokenCache) -> RunnerResult<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        let session_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            "[McpClient] Created client for '{}' at {} (session {})",
            config.label,
            config.url,
            session_id
        );

        Ok(Self {
            http,
            config,
            tokens,
            session_id,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Full endpoint including the session query
    pub fn endpoint(&self) -> String {
        format!("{}?sessionId={}", self.config.message_endpoint(), self.session_id)
    }

    /// Perform the MCP handshake, returning the server's `initialize` result
    pub async fn initialize(&self) -> RunnerResult<Value> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        self.notify("notifications/initialized", json!({})).await?;

        let server_info = result.get("serverInfo").cloned().unwrap_or(Value::Null);
        tracing::info!("[McpClient] Initialized '{}': {}", self.config.label, server_info);
        Ok(result)
    }

    /// List every tool the server exposes, following `nextCursor`
    pub async fn list_tools(&self) -> RunnerResult<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::info!("[McpClient] Got {} tools from '{}'", tools.len(), self.config.label);
        Ok(tools)
    }

    /// Call a tool by its server-side name
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> RunnerResult<CallToolResult> {
        tracing::info!("[McpClient] Calling tool '{}' on '{}'", name, self.config.label);
        tracing::debug!("[McpClient] Arguments: {:?}", arguments);

        let params = json!({
            "name": name,
            "arguments": arguments.unwrap_or_default(),
        });
        let result = self.request("tools/call", params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a request and return its `result`
    pub async fn request(&self, method: &str, params: Value) -> RunnerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };

        let text = self.post(&body).await?;
        let response = parse_response(&text)?;

        if let Some(error) = response.error {
            tracing::warn!(
                "[McpClient] '{}' returned error {} for {}: {}",
                self.config.label,
                error.code,
                method,
                error.message
            );
            return Err(RunnerError::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }

        response.result.ok_or_else(|| RunnerError::JsonRpc {
            code: -32603,
            message: format!("response to '{}' has neither result nor error", method),
        })
    }

    async fn notify(&self, method: &str, params: Value) -> RunnerResult<()> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params,
        };
        self.post(&body).await.map(|_| ())
    }

    /// POST with bearer auth; a 401 refreshes the token and retries once
    async fn post(&self, body: &JsonRpcRequest<'_>) -> RunnerResult<String> {
        let scope = &self.config.auth_scope;
        let mut retried = false;

        loop {
            let token = self.tokens.token(scope).await?;
            tracing::debug!("[McpClient] -> {} ({})", body.method, self.config.label);

            let response = self
                .http
                .post(self.endpoint())
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json, text/event-stream")
                .bearer_auth(&token.token)
                .json(body)
                .send()
                .await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                tracing::warn!("[McpClient] 401 from '{}', refreshing token", self.config.label);
                self.tokens.invalidate(scope).await;
                retried = true;
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                return Err(RunnerError::ToolServer {
                    status: status.as_u16(),
                    body: truncate(&text, 200),
                });
            }
            return Ok(text);
        }
    }
}

/// Decode a JSON-RPC reply, unwrapping an SSE `data:` frame if present
fn parse_response(text: &str) -> RunnerResult<JsonRpcResponse> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let data: Vec<&str> = trimmed
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        return Err(RunnerError::JsonRpc {
            code: -32700,
            message: format!("unrecognised response: {}", truncate(text, 200)),
        });
    }
    Ok(serde_json::from_str(&data.join("\n"))?)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use crate::testing::StubServer;
    use std::sync::Arc;

    fn client() -> McpClient {
        let tokens = TokenCache::new(Arc::new(StaticTokenProvider::new("t")));
        McpClient::new(McpServerConfig::new("sql", "https://tools.example/"), tokens).unwrap()
    }

    #[test]
    fn test_endpoint_has_session() {
        let client = client();
        let endpoint = client.endpoint();
        assert!(endpoint.starts_with("https://tools.example/message?sessionId="));
        assert!(endpoint.ends_with(client.session_id()));
        assert_eq!(client.session_id().len(), 36);
    }

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(1),
            method: "tools/call",
            params: json!({"name": "list_tables", "arguments": {}}),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "list_tables", "arguments": {}}
            })
        );

        let notification = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: json!({}),
        };
        assert!(serde_json::to_value(&notification).unwrap().get("id").is_none());
    }

    #[test]
    fn test_parse_plain_json() {
        let response =
            parse_response(r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#).unwrap();
        assert_eq!(response.result, Some(json!({"tools": []})));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_parse_sse_frame() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"error\":{\"code\":-32601,\"message\":\"Method not found\"}}\n\n";
        let response = parse_response(body).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_response("<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, RunnerError::JsonRpc { code: -32700, .. }));
    }

    #[test]
    fn test_decode_tool_results() {
        let page: ListToolsResult = serde_json::from_value(json!({
            "tools": [{
                "name": "list_tables",
                "description": "List tables in the database",
                "inputSchema": {"type": "object", "properties": {}}
            }],
            "nextCursor": "page-2"
        }))
        .unwrap();
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.tools[0].name, "list_tables");
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));

        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "dbo.Customers"}],
            "isError": false
        }))
        .unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    fn stub_client(url: &str) -> (McpClient, Arc<std::sync::atomic::AtomicU32>) {
        use std::sync::atomic::{AtomicU32, Ordering};

        let fetches = Arc::new(AtomicU32::new(0));
        let counter = fetches.clone();
        let provider = crate::auth::token_provider(move |_scope| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(crate::auth::AccessToken::new(
                    format!("tok-{}", n),
                    chrono::Utc::now() + chrono::Duration::hours(1),
                ))
            }
        });
        let tokens = TokenCache::new(Arc::new(provider));
        let client = McpClient::new(McpServerConfig::new("sql", url), tokens).unwrap();
        (client, fetches)
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token_once() {
        let server = StubServer::start(vec![
            (401, ""),
            (200, r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#),
        ])
        .await;
        let (client, fetches) = stub_client(&server.url);

        let tools = client.list_tools().await.unwrap();
        assert!(tools.is_empty());

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok-0"));
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer tok-1"));
        assert_eq!(
            requests[1].path,
            format!("/message?sessionId={}", client.session_id())
        );
        assert_eq!(fetches.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_initialize_sends_initialized_notification() {
        let server = StubServer::start(vec![
            (
                200,
                r#"{"jsonrpc":"2.0","id":1,"result":{
                    "protocolVersion":"2024-11-05","capabilities":{},
                    "serverInfo":{"name":"sql","version":"1.0"}}}"#,
            ),
            (202, ""),
        ])
        .await;
        let (client, _) = stub_client(&server.url);

        let result = client.initialize().await.unwrap();
        assert_eq!(result["serverInfo"]["name"], "sql");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        let first: Value = serde_json::from_str(&requests[0].body).unwrap();
        let second: Value = serde_json::from_str(&requests[1].body).unwrap();
        assert_eq!(first["method"], "initialize");
        assert_eq!(second["method"], "notifications/initialized");
        assert!(second.get("id").map_or(true, Value::is_null));
    }

    #[tokio::test]
    async fn test_forbidden_is_tool_server_error() {
        let server = StubServer::start(vec![(403, "denied")]).await;
        let (client, _) = stub_client(&server.url);

        let err = client.list_tools().await.unwrap_err();

        assert!(matches!(err, RunnerError::ToolServer { status: 403, ref body } if body == "denied"));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let server = StubServer::start(vec![
            (
                200,
                r#"{"jsonrpc":"2.0","id":1,"result":{
                    "tools":[{"name":"list_tables","inputSchema":{"type":"object"}}],
                    "nextCursor":"page-2"}}"#,
            ),
            (
                200,
                r#"{"jsonrpc":"2.0","id":2,"result":{
                    "tools":[{"name":"describe_table","inputSchema":{"type":"object"}}]}}"#,
            ),
        ])
        .await;
        let (client, _) = stub_client(&server.url);

        let tools = client.list_tools().await.unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(names, vec!["list_tables", "describe_table"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        let first: Value = serde_json::from_str(&requests[0].body).unwrap();
        let second: Value = serde_json::from_str(&requests[1].body).unwrap();
        assert_eq!(first["method"], "tools/list");
        assert_eq!(first["params"], json!({}));
        assert_eq!(second["params"], json!({"cursor": "page-2"}));
        assert!(second["id"].as_u64() > first["id"].as_u64());
    }

    #[tokio::test]
    #[ignore] // Requires a running MCP server and MCP_SERVER_URL
    async fn test_live_list_tools() {
        let url = std::env::var("MCP_SERVER_URL").unwrap();
        let tokens = TokenCache::new(Arc::new(crate::auth::AzureCliTokenProvider::new()));
        let client = McpClient::new(McpServerConfig::new("live", url), tokens).unwrap();

        client.initialize().await.unwrap();
        let tools = client.list_tools().await.unwrap();
        assert!(!tools.is_empty());
    }
}
