//! Poll-and-satisfy loop
//!
//! Drives a run from creation to a terminal status. While the run is
//! `requires_action` the poller either approves the MCP calls the service
//! wants to make, or executes the requested function calls and submits their
//! output. A wall-clock timeout and a cancellation token bound the loop; both
//! cancel the run on the service before returning.

use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::policy::{ApprovalPolicy, ApproveAll};
use crate::agents::{RequiredAction, RequiredToolCall, Run, RunStatus, RunsApi, ToolApproval, ToolOutput};
use crate::auth::{bearer_headers, TokenCache};
use crate::config::RunnerConfig;
use crate::core::{RunnerError, RunnerResult};
use crate::tools::ToolRegistry;

/// Consecutive failed status fetches before the run is given up on
pub const MAX_FETCH_FAILURES: u32 = 5;

/// Timing of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status checks
    pub interval: Duration,
    /// Give up (and cancel the run) after this long
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.poll_interval, config.run_timeout)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}

/// Why the poller stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The run reached a terminal status on its own
    Terminal,
    /// The timeout elapsed; the run was cancelled
    TimedOut,
    /// The run was cancelled by the poller
    Cancelled(String),
}

/// Final state of a polled run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Last known state of the run
    pub run: Run,
    pub reason: StopReason,
    /// Number of status fetches performed
    pub polls: u32,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// True when the run completed successfully
    pub fn is_completed(&self) -> bool {
        self.reason == StopReason::Terminal && self.run.status == RunStatus::Completed
    }

    /// Turn timeouts and cancellations into errors
    pub fn into_result(self, timeout: Duration) -> RunnerResult<Run> {
        match self.reason {
            StopReason::Terminal => Ok(self.run),
            StopReason::TimedOut => Err(RunnerError::Timeout {
                run_id: self.run.id,
                seconds: timeout.as_secs(),
            }),
            StopReason::Cancelled(reason) => Err(RunnerError::Cancelled(reason)),
        }
    }
}

/// What to do after servicing a required action
enum ActionStep {
    /// Call ids handed to the service (possibly none, to retry later)
    Submitted(Vec<String>),
    Abort(String),
}

/// Polls a run and services its required actions
pub struct RunPoller {
    api: Arc<dyn RunsApi>,
    tools: Arc<ToolRegistry>,
    tokens: Option<TokenCache>,
    /// MCP server label -> token scope for approval headers
    approval_scopes: HashMap<String, String>,
    policy: Arc<dyn ApprovalPolicy>,
    config: PollConfig,
    cancel: CancellationToken,
}

impl RunPoller {
    pub fn new(api: Arc<dyn RunsApi>, config: PollConfig) -> Self {
        Self {
            api,
            tools: Arc::new(ToolRegistry::new()),
            tokens: None,
            approval_scopes: HashMap::new(),
            policy: Arc::new(ApproveAll),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Function tools executed for `submit_tool_outputs`
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Token cache used to attach auth headers to approvals
    pub fn with_tokens(mut self, tokens: TokenCache) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Send a bearer token for `scope` with approvals for server `label`
    pub fn with_approval_scope(mut self, label: impl Into<String>, scope: impl Into<String>) -> Self {
        self.approval_scopes.insert(label.into(), scope.into());
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ApprovalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Stop polling (and cancel the run) when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll `run` until it is terminal, times out, or is cancelled
    ///
    /// A failed status fetch is logged and retried on the next tick; after
    /// `MAX_FETCH_FAILURES` failures in a row the run is cancelled.
    pub async fn poll(&self, run: Run) -> RunnerResult<RunOutcome> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut run = run;
        let mut polls = 0u32;
        let mut fetch_failures = 0u32;
        let mut answered: HashSet<String> = HashSet::new();

        tracing::info!(
            "[RunPoller] Polling run {} (status {}, interval {:?}, timeout {:?})",
            run.id,
            run.status,
            self.config.interval,
            self.config.timeout
        );

        loop {
            if run.status.is_terminal() {
                return Ok(self.finish(run, StopReason::Terminal, polls, started));
            }

            if self.cancel.is_cancelled() {
                return self
                    .abort(run, StopReason::Cancelled("cancellation requested".into()), polls, started)
                    .await;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "[RunPoller] Run {} still {} after {:?}, cancelling",
                    run.id,
                    run.status,
                    self.config.timeout
                );
                return self.abort(run, StopReason::TimedOut, polls, started).await;
            }

            let pause = self.config.interval.min(deadline - now);
            tokio::select! {
                _ = self.cancel.cancelled() => continue,
                _ = tokio::time::sleep(pause) => {}
            }

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => continue,
                fetched = tokio::time::timeout_at(deadline, self.api.get_run(&run.thread_id, &run.id)) => fetched,
            };
            polls += 1;

            let fresh = match fetched {
                // Deadline hit mid-request; the timeout branch above handles it
                Err(_) => continue,
                Ok(Err(e)) => {
                    fetch_failures += 1;
                    tracing::warn!(
                        "[RunPoller] Failed to fetch run {} ({} in a row): {}",
                        run.id,
                        fetch_failures,
                        e
                    );
                    if fetch_failures >= MAX_FETCH_FAILURES {
                        let reason = format!("status fetch failed {} times: {}", fetch_failures, e);
                        return self
                            .abort(run, StopReason::Cancelled(reason), polls, started)
                            .await;
                    }
                    continue;
                }
                Ok(Ok(fresh)) => fresh,
            };
            fetch_failures = 0;

            let previous = std::mem::replace(&mut run, fresh).status;
            if run.status != previous {
                tracing::info!("[RunPoller] Run {}: {} -> {}", run.id, previous, run.status);
            } else {
                tracing::debug!("[RunPoller] Run {} still {}", run.id, run.status);
            }

            if run.status != RunStatus::RequiresAction {
                continue;
            }

            let (calls, is_approval) = match run.required_action.clone() {
                Some(RequiredAction::SubmitToolApproval { submit_tool_approval }) => {
                    (submit_tool_approval.tool_calls, true)
                }
                Some(RequiredAction::SubmitToolOutputs { submit_tool_outputs }) => {
                    (submit_tool_outputs.tool_calls, false)
                }
                None => {
                    tracing::warn!("[RunPoller] Run {} requires action but names none", run.id);
                    continue;
                }
            };

            // The service may report the same action again before it has
            // consumed our submission; only calls not yet submitted are serviced
            let pending: Vec<RequiredToolCall> = calls
                .iter()
                .filter(|c| !c.id().is_some_and(|id| answered.contains(id)))
                .cloned()
                .collect();
            if !calls.is_empty() && pending.is_empty() {
                tracing::debug!("[RunPoller] Run {} action already answered, waiting", run.id);
                continue;
            }

            let step = if is_approval {
                self.approve_calls(&run, pending).await?
            } else {
                self.execute_calls(&run, pending).await?
            };

            match step {
                ActionStep::Submitted(ids) => answered.extend(ids),
                ActionStep::Abort(reason) => {
                    return self
                        .abort(run, StopReason::Cancelled(reason), polls, started)
                        .await;
                }
            }
        }
    }

    /// Answer a `submit_tool_approval` action
    ///
    /// A call whose auth headers cannot be fetched is left out and retried on
    /// the next poll.
    async fn approve_calls(&self, run: &Run, calls: Vec<RequiredToolCall>) -> RunnerResult<ActionStep> {
        if calls.is_empty() {
            tracing::warn!("[RunPoller] No tool calls provided - cancelling run {}", run.id);
            return Ok(ActionStep::Abort("no tool calls provided".into()));
        }

        let mut approvals = Vec::new();
        let mut deferred = 0usize;
        for call in calls {
            let (id, name, arguments, server_label) = match call {
                RequiredToolCall::Mcp {
                    id,
                    name,
                    arguments,
                    server_label,
                } => (id, name, arguments, server_label),
                other => {
                    tracing::warn!("[RunPoller] Ignoring non-MCP call in approval request: {:?}", other);
                    continue;
                }
            };

            let approve = self.policy.approve(&server_label, &name, &arguments);
            let headers = if approve {
                match self.approval_headers(&server_label).await {
                    Ok(headers) => headers,
                    Err(e) => {
                        tracing::error!("[RunPoller] Error approving tool call {}: {}", id, e);
                        deferred += 1;
                        continue;
                    }
                }
            } else {
                HashMap::new()
            };

            tracing::info!(
                "[RunPoller] {} tool call {} ({} on '{}')",
                if approve { "Approving" } else { "Rejecting" },
                id,
                name,
                server_label
            );
            approvals.push(ToolApproval {
                tool_call_id: id,
                approve,
                headers,
            });
        }

        if approvals.is_empty() {
            if deferred > 0 {
                return Ok(ActionStep::Submitted(Vec::new()));
            }
            return Ok(ActionStep::Abort("no tool calls could be approved".into()));
        }

        let ids = approvals.iter().map(|a| a.tool_call_id.clone()).collect();
        self.api
            .submit_tool_approvals(&run.thread_id, &run.id, approvals)
            .await?;
        Ok(ActionStep::Submitted(ids))
    }

    async fn approval_headers(&self, server_label: &str) -> RunnerResult<HashMap<String, String>> {
        match (&self.tokens, self.approval_scopes.get(server_label)) {
            (Some(tokens), Some(scope)) => Ok(bearer_headers(&tokens.token(scope).await?)),
            _ => Ok(HashMap::new()),
        }
    }

    /// Answer a `submit_tool_outputs` action
    ///
    /// A failing tool produces an `{"error": ...}` output; the run carries on.
    async fn execute_calls(&self, run: &Run, calls: Vec<RequiredToolCall>) -> RunnerResult<ActionStep> {
        if calls.is_empty() {
            tracing::warn!("[RunPoller] No tool calls provided - cancelling run {}", run.id);
            return Ok(ActionStep::Abort("no tool calls provided".into()));
        }

        let mut outputs = Vec::new();
        for call in calls {
            let (id, function) = match call {
                RequiredToolCall::Function { id, function } => (id, function),
                other => {
                    tracing::warn!("[RunPoller] Ignoring non-function call in output request: {:?}", other);
                    continue;
                }
            };

            let output = match self.tools.execute(&function.name, &function.arguments).await {
                Ok(result) if result.is_error => json!({ "error": result.output }).to_string(),
                Ok(result) => result.output,
                Err(e) => {
                    tracing::error!("[RunPoller] Tool call {} ({}) failed: {}", id, function.name, e);
                    json!({ "error": e.to_string() }).to_string()
                }
            };

            outputs.push(ToolOutput {
                tool_call_id: id,
                output,
            });
        }

        if outputs.is_empty() {
            return Ok(ActionStep::Abort("no tool calls could be executed".into()));
        }

        let ids = outputs.iter().map(|o| o.tool_call_id.clone()).collect();
        self.api
            .submit_tool_outputs(&run.thread_id, &run.id, outputs)
            .await?;
        Ok(ActionStep::Submitted(ids))
    }

    /// Cancel the run on the service and report why
    async fn abort(
        &self,
        run: Run,
        reason: StopReason,
        polls: u32,
        started: Instant,
    ) -> RunnerResult<RunOutcome> {
        let run = match self.api.cancel_run(&run.thread_id, &run.id).await {
            Ok(cancelled) => cancelled,
            Err(e) => {
                tracing::warn!("[RunPoller] Failed to cancel run {}: {}", run.id, e);
                run
            }
        };
        Ok(self.finish(run, reason, polls, started))
    }

    fn finish(&self, run: Run, reason: StopReason, polls: u32, started: Instant) -> RunOutcome {
        match (&reason, &run.last_error) {
            (StopReason::Terminal, Some(error)) if run.status == RunStatus::Failed => {
                tracing::error!("[RunPoller] Run {} failed: {}", run.id, error);
            }
            _ => tracing::info!(
                "[RunPoller] Run {} finished with status {} ({:?}) after {} polls",
                run.id,
                run.status,
                reason,
                polls
            ),
        }

        RunOutcome {
            run,
            reason,
            polls,
            elapsed: started.elapsed(),
        }
    }
}
