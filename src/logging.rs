//! Tracing setup for the runner binary

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "foundry_agent_runner=info";

/// Directory for the rolling log file; unset means stderr only
pub const LOG_DIR_VAR: &str = "RUNNER_LOG_DIR";

/// Install the global subscriber
///
/// Logs go to stderr. When `RUNNER_LOG_DIR` is set they are also written as
/// JSON lines to a daily rolling file there. Keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_logging() -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match env::var(LOG_DIR_VAR).ok().filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, "foundry-agent-runner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().json().with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()?;

            tracing::info!("[Logging] Writing logs to {}", dir);
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
