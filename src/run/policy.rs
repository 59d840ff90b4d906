//! Approval policies for MCP calls made by the service

use std::collections::HashMap;

/// Decides whether an MCP call awaiting approval may go ahead
pub trait ApprovalPolicy: Send + Sync {
    fn approve(&self, server_label: &str, tool_name: &str, arguments: &str) -> bool;
}

/// Approve every call
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

impl ApprovalPolicy for ApproveAll {
    fn approve(&self, _server_label: &str, _tool_name: &str, _arguments: &str) -> bool {
        true
    }
}

/// Approve only tools on a per-server allow list
///
/// A server with no entry, or an empty list, allows everything.
#[derive(Debug, Clone, Default)]
pub struct AllowListPolicy {
    allowed: HashMap<String, Vec<String>>,
}

impl AllowListPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, label: impl Into<String>, tools: Vec<String>) -> Self {
        self.allowed.insert(label.into(), tools);
        self
    }
}

impl ApprovalPolicy for AllowListPolicy {
    fn approve(&self, server_label: &str, tool_name: &str, _arguments: &str) -> bool {
        match self.allowed.get(server_label) {
            Some(tools) if !tools.is_empty() => tools.iter().any(|t| t == tool_name),
            _ => true,
        }
    }
}
