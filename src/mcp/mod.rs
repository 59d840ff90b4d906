//! MCP (Model Context Protocol) Support
//!
//! Integration with a remote MCP tool server reached over JSON-RPC.
//!
//! # Architecture
//!
//! - `McpServerConfig`: label, URL, token scope, allow list, tool mode
//! - `McpClient`: JSON-RPC over HTTP with bearer auth (`initialize`,
//!   `tools/list`, `tools/call`)
//! - `McpToolAdapter`: exposes one discovered tool through the `Tool` trait
//! - `McpToolProvider`: implements `ToolProvider` over a client
//!
//! # Tool modes
//!
//! In approval mode the server is attached as an `mcp` tool and the service
//! calls it; the runner only approves calls and supplies auth headers. In
//! function mode the discovered tools are attached as functions and the
//! runner calls the server itself.
//!
//! # Tool Namespacing
//!
//! Function-mode tools are namespaced with the server label:
//! - Server label: `sql`
//! - Original tool name: `list_tables`
//! - Exposed name: `sql__list_tables`

mod client;
mod config;
mod provider;
mod tool_adapter;

pub use client::McpClient;
pub(crate) use client::truncate;
pub use config::{McpServerConfig, McpToolMode};
pub use provider::McpToolProvider;
pub use tool_adapter::McpToolAdapter;
