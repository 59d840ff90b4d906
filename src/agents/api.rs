//! Runs API trait
//!
//! The poll loop only needs these four calls. `AgentsClient` implements them
//! over HTTP; tests use an in-memory fake.

use async_trait::async_trait;

use super::types::{Run, ToolApproval, ToolOutput};
use crate::core::RunnerResult;

/// Operations on an existing run
#[async_trait]
pub trait RunsApi: Send + Sync {
    /// Fetch the current state of a run
    async fn get_run(&self, thread_id: &str, run_id: &str) -> RunnerResult<Run>;

    /// Ask the service to cancel a run
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> RunnerResult<Run>;

    /// Hand back outputs for function calls
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> RunnerResult<Run>;

    /// Approve or reject MCP calls
    async fn submit_tool_approvals(
        &self,
        thread_id: &str,
        run_id: &str,
        approvals: Vec<ToolApproval>,
    ) -> RunnerResult<Run>;
}
