//! Tool system
//!
//! This module provides:
//! - `Tool` trait - Interface for function tools the runner executes
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Registry of function tools
//! - `ToolProvider` trait - Interface for dynamic tool sources (MCP)
//! - `ToolCatalog` - Every tool attached to the agent

mod catalog;
mod provider;
mod registry;
mod tool;

pub use catalog::ToolCatalog;
pub use provider::ToolProvider;
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolResult};
