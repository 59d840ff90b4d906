//! Runner for cloud-hosted conversational agents
//!
//! Configures an agent with code execution, web search and a remote MCP tool
//! server, starts a run and polls it to completion while approving tool
//! calls and executing function calls.

pub mod core;
pub mod config;

// Service clients
pub mod agents;
pub mod auth;
pub mod mcp;

// Tools and the run loop
pub mod run;
pub mod session;
pub mod tools;

// Optional components
pub mod cli;
pub mod diagnostics;
pub mod logging;

#[cfg(test)]
pub(crate) mod testing;
