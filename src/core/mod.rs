//! Core types shared across the runner
//!
//! - `RunnerError` / `RunnerResult` - Error types

pub mod error;

pub use error::{RunnerError, RunnerResult};
