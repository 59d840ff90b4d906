//! Runner error types

use thiserror::Error;

/// Errors that can occur while configuring an agent or driving a run
#[derive(Error, Debug)]
pub enum RunnerError {
    /// A required setting is missing
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A setting is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not obtain or use an access token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The agents service answered with a non-success status
    #[error("Agents API error ({status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the service
        body: String,
    },

    /// The tool server returned a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the server
        message: String,
    },

    /// The tool server answered with a non-success HTTP status
    #[error("Tool server error ({status}): {body}")]
    ToolServer {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The agent asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool execution failed
    #[error("Tool error: {0}")]
    ToolError(String),

    /// The run did not reach a terminal status in time
    #[error("Run {run_id} timed out after {seconds}s")]
    Timeout {
        /// Identifier of the run
        run_id: String,
        /// Configured timeout in seconds
        seconds: u64,
    },

    /// Polling was cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RunnerError {
    /// Create a tool error
    pub fn tool_error(msg: impl Into<String>) -> Self {
        RunnerError::ToolError(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        RunnerError::Auth(msg.into())
    }
}

/// Result type alias for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RunnerError::MissingConfig("PROJECT_ENDPOINT".into());
        assert_eq!(err.to_string(), "Missing configuration: PROJECT_ENDPOINT");

        let err = RunnerError::Api {
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.to_string(), "Agents API error (404): not found");

        let err = RunnerError::JsonRpc {
            code: -32601,
            message: "Method not found".into(),
        };
        assert_eq!(err.to_string(), "JSON-RPC error -32601: Method not found");
    }
}
