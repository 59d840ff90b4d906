//! Tool registry for function tools
//!
//! The registry holds every function tool the runner can execute. Tools are
//! either registered directly or pulled from providers (like an MCP server).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use super::provider::ToolProvider;
use super::tool::{Tool, ToolResult};
use crate::agents::ToolDefinition;
use crate::core::{RunnerError, RunnerResult};

/// Registry that holds all available function tools
pub struct ToolRegistry {
    /// Tools keyed by the name the agent calls them by
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a static tool in the registry
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> RunnerResult<()> {
        self.insert(Arc::new(tool), "static")
    }

    fn insert(&mut self, tool: Arc<dyn Tool>, source: &str) -> RunnerResult<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RunnerError::InvalidConfig(format!(
                "Tool name conflict: '{}' already exists (from '{}')",
                name, source
            )));
        }

        tracing::info!("[ToolRegistry] Registering tool '{}' from '{}'", name, source);
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Fetch every tool from `provider` and add it
    ///
    /// Returns an error if any tool name conflicts with an existing tool or
    /// another tool of the same provider; nothing is added in that case.
    pub async fn add_provider(&mut self, provider: Arc<dyn ToolProvider>) -> RunnerResult<usize> {
        tracing::info!("[ToolRegistry] Adding provider '{}'", provider.name());

        let tools = provider.get_tools().await?;
        let mut incoming = HashSet::new();
        for tool in &tools {
            let name = tool.name();
            if self.tools.contains_key(name) || !incoming.insert(name.to_string()) {
                return Err(RunnerError::InvalidConfig(format!(
                    "Tool name conflict: '{}' from '{}' is already registered",
                    name,
                    provider.name()
                )));
            }
        }

        let count = tools.len();
        for tool in tools {
            self.insert(tool, provider.name())?;
        }

        Ok(count)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Function definitions for every registered tool, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a tool with the JSON-encoded arguments the agent produced
    ///
    /// An empty argument string is treated as `{}`.
    pub async fn execute(&self, name: &str, arguments: &str) -> RunnerResult<ToolResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RunnerError::UnknownTool(name.to_string()))?;

        let input: Value = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                RunnerError::tool_error(format!("invalid arguments for '{}': {}", name, e))
            })?
        };

        tracing::info!("[ToolRegistry] Executing tool: {}", name);
        tracing::debug!("[ToolRegistry] Input: {}", input);

        let result = tool.execute(&input).await?;

        tracing::debug!(
            "[ToolRegistry] Tool {} completed. Is error: {}",
            name,
            result.is_error
        );

        Ok(result)
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
