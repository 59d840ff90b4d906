//! Agent session
//!
//! Resolves the agent (reused by id or freshly created), owns the thread and
//! starts runs on it.

mod agent_session;

pub use agent_session::{AgentSession, AgentSource, DEFAULT_INSTRUCTIONS};
