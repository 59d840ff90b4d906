//! MCP Tool Adapter
//!
//! Adapts a discovered MCP tool to the `Tool` trait so the agent can call it
//! as a function.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::RunnerResult;
use crate::tools::{Tool, ToolResult};

use super::client::McpClient;

/// Adapter that wraps an MCP tool to implement the Tool trait
pub struct McpToolAdapter {
    client: Arc<McpClient>,

    /// Original tool name (used when calling the server)
    tool_name: String,

    /// Exposed name with namespace (e.g., "sql__list_tables")
    exposed_name: String,

    description: String,

    parameters: Value,
}

impl McpToolAdapter {
    /// Create a new MCP tool adapter with namespacing
    pub fn new(client: Arc<McpClient>, rmcp_tool: rmcp::model::Tool) -> Self {
        let exposed_name = exposed_name(client.label(), &rmcp_tool.name);
        let description = rmcp_tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("MCP tool '{}' on '{}'", rmcp_tool.name, client.label()));

        Self {
            tool_name: rmcp_tool.name.to_string(),
            exposed_name,
            description,
            parameters: convert_schema(&rmcp_tool),
            client,
        }
    }

    /// Name of the tool on the server
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Expose the tool under `name` instead of the derived one
    pub fn with_exposed_name(mut self, name: impl Into<String>) -> Self {
        self.exposed_name = name.into();
        self
    }
}

/// `name`, or `name` with a numeric suffix when it is already in `taken`
///
/// The result stays within 64 characters.
pub(crate) fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    (2usize..)
        .map(|n| {
            let suffix = format!("_{}", n);
            let mut base = name.to_string();
            base.truncate(64 - suffix.len());
            base + &suffix
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// `label__tool`, restricted to the characters function names accept
fn exposed_name(label: &str, tool: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    };
    let mut name = format!("{}__{}", clean(label), clean(tool));
    name.truncate(64);
    name
}

/// The tool's input schema, with `type: object` filled in when missing
fn convert_schema(rmcp_tool: &rmcp::model::Tool) -> Value {
    let mut schema = rmcp_tool.input_schema.as_ref().clone();
    schema
        .entry("type")
        .or_insert_with(|| Value::String("object".to_string()));
    schema
        .entry("properties")
        .or_insert_with(|| Value::Object(Default::default()));
    Value::Object(schema)
}

/// Flatten a tool call result into the single string the agent receives
pub(crate) fn flatten_result(result: rmcp::model::CallToolResult) -> RunnerResult<ToolResult> {
    use rmcp::model::RawContent;

    let is_error = result.is_error.unwrap_or(false);
    let mut parts = Vec::new();

    for content in &result.content {
        match &content.raw {
            RawContent::Text(text) => parts.push(text.text.clone()),
            RawContent::Image(image) => {
                parts.push(format!("[image: {}, {} base64 chars]", image.mime_type, image.data.len()))
            }
            RawContent::Resource(resource) => {
                parts.push(serde_json::to_string_pretty(&resource.resource)?)
            }
            _ => parts.push(serde_json::to_string_pretty(content)?),
        }
    }

    if parts.is_empty() {
        if let Some(structured) = &result.structured_content {
            parts.push(structured.to_string());
        }
    }

    let output = parts.join("\n\n");
    Ok(if is_error {
        ToolResult::error(output)
    } else {
        ToolResult::success(output)
    })
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.exposed_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, input: &Value) -> RunnerResult<ToolResult> {
        tracing::info!(
            "[McpToolAdapter] Executing '{}' on server '{}'",
            self.tool_name,
            self.client.label()
        );

        // Call the server with the ORIGINAL tool name (not namespaced)
        let result = self
            .client
            .call_tool(&self.tool_name, input.as_object().cloned())
            .await?;
        let result = flatten_result(result)?;

        tracing::debug!(
            "[McpToolAdapter] Tool '{}' completed. Is error: {}",
            self.tool_name,
            result.is_error
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rmcp_tool(value: Value) -> rmcp::model::Tool {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_exposed_name() {
        assert_eq!(exposed_name("sql", "list_tables"), "sql__list_tables");
        assert_eq!(exposed_name("my server", "get.item"), "my_server__get_item");
        assert_eq!(exposed_name(&"a".repeat(40), &"b".repeat(40)).len(), 64);
    }

    #[test]
    fn test_colliding_names_get_suffix() {
        let first = exposed_name("sql", "get.item");
        let second = exposed_name("sql", "get_item");
        assert_eq!(first, second);

        let mut taken = HashSet::new();
        taken.insert(first.clone());
        assert_eq!(unique_name(&second, &taken), "sql__get_item_2");
        taken.insert("sql__get_item_2".to_string());
        assert_eq!(unique_name(&second, &taken), "sql__get_item_3");

        let long = exposed_name(&"a".repeat(40), &"b".repeat(40));
        let mut taken = HashSet::new();
        taken.insert(long.clone());
        let renamed = unique_name(&long, &taken);
        assert_eq!(renamed.len(), 64);
        assert!(renamed.ends_with("_2"));
    }

    #[test]
    fn test_schema_conversion() {
        let tool = rmcp_tool(json!({
            "name": "describe_table",
            "inputSchema": {
                "type": "object",
                "properties": {"table": {"type": "string"}},
                "required": ["table"]
            }
        }));
        let schema = convert_schema(&tool);
        assert_eq!(schema["required"], json!(["table"]));

        let bare = rmcp_tool(json!({"name": "ping", "inputSchema": {}}));
        assert_eq!(convert_schema(&bare), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_flatten_text_and_error() {
        let result: rmcp::model::CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "dbo.Customers"},
                {"type": "text", "text": "dbo.Orders"}
            ]
        }))
        .unwrap();
        let flat = flatten_result(result).unwrap();
        assert_eq!(flat.output, "dbo.Customers\n\ndbo.Orders");
        assert!(!flat.is_error);

        let result: rmcp::model::CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "permission denied"}],
            "isError": true
        }))
        .unwrap();
        let flat = flatten_result(result).unwrap();
        assert!(flat.is_error);
        assert_eq!(flat.output, "permission denied");
    }

    #[test]
    fn test_flatten_image() {
        let result: rmcp::model::CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"}]
        }))
        .unwrap();
        let flat = flatten_result(result).unwrap();
        assert_eq!(flat.output, "[image: image/png, 8 base64 chars]");
    }
}
