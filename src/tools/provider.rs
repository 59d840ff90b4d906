//! Tool Provider trait
//!
//! Abstraction for dynamic tool sources (MCP servers and the like)

use async_trait::async_trait;
use std::sync::Arc;

use super::tool::Tool;
use crate::core::RunnerResult;

/// Trait for dynamic tool providers
///
/// Providers fetch tools from an external source and expose them as Tool
/// implementations.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Get all tools from this provider
    async fn get_tools(&self) -> RunnerResult<Vec<Arc<dyn Tool>>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &str;
}
