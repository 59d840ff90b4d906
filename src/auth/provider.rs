//! Token providers

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::process::Command;

use crate::core::{RunnerError, RunnerResult};

/// A bearer token and the moment it stops being valid
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &format!("<{} chars>", self.token.len()))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl AccessToken {
    /// Create a token that expires at the given time
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Whether the token expires within `margin` from now
    pub fn is_expired(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_on
    }

    /// Whole minutes until expiry (negative once expired)
    pub fn minutes_remaining(&self) -> i64 {
        (self.expires_on - Utc::now()).num_minutes()
    }
}

/// Type alias for the boxed future returned by token providers
pub type TokenFuture<'a> = BoxFuture<'a, RunnerResult<AccessToken>>;

/// Trait for obtaining access tokens for a scope
///
/// Implementations fetch a fresh token on every call; caching is the job of
/// `TokenCache`.
pub trait TokenProvider: Send + Sync {
    /// Fetch a token for `scope`
    fn get_token<'a>(&'a self, scope: &'a str) -> TokenFuture<'a>;
}

/// Provider that always hands out the same token
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token<'a>(&'a self, _scope: &'a str) -> TokenFuture<'a> {
        // Static tokens are assumed valid for the lifetime of the process
        let token = AccessToken::new(self.token.clone(), Utc::now() + Duration::days(365));
        Box::pin(async move { Ok(token) })
    }
}

/// Provider backed by the Azure CLI (`az login` must have been run)
pub struct AzureCliTokenProvider {
    program: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    /// Local timestamp, e.g. "2025-01-01 12:00:00.000000"
    expires_on: Option<String>,
    /// Epoch seconds (newer CLI versions)
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl AzureCliTokenProvider {
    pub fn new() -> Self {
        if cfg!(windows) {
            Self::with_program("az.cmd")
        } else {
            Self::with_program("az")
        }
    }

    /// Use a different executable (e.g. `az.cmd` on Windows)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Parse the JSON printed by `az account get-access-token`
    pub(crate) fn parse_output(stdout: &[u8]) -> RunnerResult<AccessToken> {
        let response: CliTokenResponse = serde_json::from_slice(stdout)?;

        let expires_on = if let Some(epoch) = response.expires_on_epoch {
            Utc.timestamp_opt(epoch, 0)
                .single()
                .ok_or_else(|| RunnerError::auth(format!("invalid expiry timestamp {}", epoch)))?
        } else if let Some(local) = response.expires_on.as_deref() {
            parse_local_timestamp(local)?
        } else {
            return Err(RunnerError::auth("token response has no expiry"));
        };

        Ok(AccessToken::new(response.access_token, expires_on))
    }
}

impl Default for AzureCliTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_local_timestamp(value: &str) -> RunnerResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| RunnerError::auth(format!("invalid expiry '{}': {}", value, e)))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RunnerError::auth(format!("ambiguous expiry '{}'", value)))
}

impl TokenProvider for AzureCliTokenProvider {
    fn get_token<'a>(&'a self, scope: &'a str) -> TokenFuture<'a> {
        Box::pin(async move {
            tracing::debug!("[AzureCli] Requesting token for scope {}", scope);

            let output = Command::new(&self.program)
                .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
                .output()
                .await
                .map_err(|e| {
                    RunnerError::auth(format!("failed to run '{}': {} (is the Azure CLI installed?)", self.program, e))
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(RunnerError::auth(format!(
                    "'{} account get-access-token' failed: {} (run 'az login')",
                    self.program,
                    stderr.trim()
                )));
            }

            let token = Self::parse_output(&output.stdout)?;
            tracing::info!(
                "[AzureCli] Obtained token for {} (expires in {} min)",
                scope,
                token.minutes_remaining()
            );
            Ok(token)
        })
    }
}

/// Fixed tokens for some scopes, another provider for the rest
///
/// Lets a pre-issued token for one service sit next to CLI credentials for
/// another.
pub struct ScopedTokenProvider {
    fixed: HashMap<String, String>,
    fallback: Arc<dyn TokenProvider>,
}

impl ScopedTokenProvider {
    pub fn new(fallback: Arc<dyn TokenProvider>) -> Self {
        Self {
            fixed: HashMap::new(),
            fallback,
        }
    }

    /// Always answer `scope` with `token`
    pub fn with_token(mut self, scope: impl Into<String>, token: impl Into<String>) -> Self {
        self.fixed.insert(scope.into(), token.into());
        self
    }

    /// Number of scopes with a fixed token
    pub fn fixed_scopes(&self) -> usize {
        self.fixed.len()
    }
}

impl TokenProvider for ScopedTokenProvider {
    fn get_token<'a>(&'a self, scope: &'a str) -> TokenFuture<'a> {
        match self.fixed.get(scope) {
            Some(token) => {
                tracing::debug!("[ScopedTokenProvider] Using fixed token for {}", scope);
                let token = AccessToken::new(token.clone(), Utc::now() + Duration::days(365));
                Box::pin(async move { Ok(token) })
            }
            None => self.fallback.get_token(scope),
        }
    }
}

/// Wrapper to implement TokenProvider for async closures
pub struct FnTokenProvider<F> {
    func: F,
}

impl<F, Fut> TokenProvider for FnTokenProvider<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = RunnerResult<AccessToken>> + Send + 'static,
{
    fn get_token<'a>(&'a self, scope: &'a str) -> TokenFuture<'a> {
        Box::pin((self.func)(scope.to_string()))
    }
}

/// Create a token provider from an async closure taking the scope
///
/// # Example
///
/// ```ignore
/// let provider = token_provider(|scope| async move {
///     let token = fetch_from_vault(&scope).await?;
///     Ok(AccessToken::new(token, Utc::now() + Duration::hours(1)))
/// });
/// ```
pub fn token_provider<F, Fut>(func: F) -> FnTokenProvider<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = RunnerResult<AccessToken>> + Send + 'static,
{
    FnTokenProvider { func }
}
