//! MCP Tool Provider
//!
//! Implements ToolProvider for an MCP server

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::RunnerResult;
use crate::tools::{Tool, ToolProvider};

use super::client::McpClient;
use super::tool_adapter::{unique_name, McpToolAdapter};

/// Tool provider that discovers tools on an MCP server
pub struct McpToolProvider {
    client: Arc<McpClient>,
}

impl McpToolProvider {
    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn get_tools(&self) -> RunnerResult<Vec<Arc<dyn Tool>>> {
        tracing::info!("[McpToolProvider] Discovering tools on '{}'", self.client.label());

        let discovered = self.client.list_tools().await?;
        let config = self.client.config();

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut taken = HashSet::new();
        for tool in discovered {
            if !config.is_allowed(&tool.name) {
                tracing::debug!("[McpToolProvider] Skipping '{}' (not in allow list)", tool.name);
                continue;
            }

            let mut adapter = McpToolAdapter::new(self.client.clone(), tool);
            let name = unique_name(adapter.name(), &taken);
            if name != adapter.name() {
                tracing::warn!(
                    "[McpToolProvider] '{}' clashes with another tool, exposing it as '{}'",
                    adapter.tool_name(),
                    name
                );
                adapter = adapter.with_exposed_name(name.clone());
            }
            taken.insert(name);
            tools.push(Arc::new(adapter));
        }

        tracing::info!(
            "[McpToolProvider] Created {} tool adapters from '{}'",
            tools.len(),
            self.client.label()
        );

        Ok(tools)
    }

    fn name(&self) -> &str {
        self.client.label()
    }
}
