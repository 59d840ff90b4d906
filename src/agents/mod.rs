//! Agents service client
//!
//! - `AgentsClient` - REST client (agents, threads, messages, runs, steps)
//! - `RunsApi` - the subset of run operations the poll loop depends on
//! - `types` - request/response types

pub mod api;
pub mod client;
pub mod types;

pub use api::RunsApi;
pub use client::AgentsClient;
pub use types::{
    Agent, AgentThread, CreateAgentRequest, CreateRunRequest, FunctionCall, FunctionDefinition,
    ListSortOrder, McpToolResource, MessageRole, RequiredAction, RequiredToolCall, Run, RunError,
    RunStatus, RunStep, StepDetails, ThreadMessage, ToolApproval, ToolDefinition, ToolOutput,
    ToolResources,
};
