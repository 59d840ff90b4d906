//! Run driver
//!
//! - `RunPoller` - polls a run to a terminal status, servicing required actions
//! - `ApprovalPolicy` - decides MCP approvals

mod poller;
mod policy;

pub use poller::{PollConfig, RunOutcome, RunPoller, StopReason};
pub use policy::{AllowListPolicy, ApprovalPolicy, ApproveAll};
