//! Per-scope token cache

use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::provider::{AccessToken, TokenProvider};
use crate::core::RunnerResult;

/// Tokens are refreshed once they are this many minutes from expiry
pub const DEFAULT_REFRESH_MARGIN_MINUTES: i64 = 5;

/// Caches one token per scope on top of a `TokenProvider`
///
/// Cloning shares the cache.
#[derive(Clone)]
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    tokens: Arc<Mutex<HashMap<String, AccessToken>>>,
    margin: Duration,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            tokens: Arc::new(Mutex::new(HashMap::new())),
            margin: Duration::minutes(DEFAULT_REFRESH_MARGIN_MINUTES),
        }
    }

    /// Get a valid token for `scope`, refreshing if needed
    ///
    /// The lock is held across the refresh so concurrent callers don't all
    /// hit the provider at once.
    pub async fn token(&self, scope: &str) -> RunnerResult<AccessToken> {
        let mut tokens = self.tokens.lock().await;

        if let Some(cached) = tokens.get(scope) {
            if !cached.is_expired(self.margin) {
                tracing::trace!("[TokenCache] Using cached token for {}", scope);
                return Ok(cached.clone());
            }
            tracing::info!("[TokenCache] Token for {} is about to expire, refreshing", scope);
        } else {
            tracing::debug!("[TokenCache] No cached token for {}", scope);
        }

        let fresh = self.provider.get_token(scope).await?;
        tokens.insert(scope.to_string(), fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token for `scope` (e.g. after a 401)
    pub async fn invalidate(&self, scope: &str) {
        if self.tokens.lock().await.remove(scope).is_some() {
            tracing::info!("[TokenCache] Invalidated token for {}", scope);
        }
    }
}

/// Authorization headers carrying `token` as a bearer token
pub fn bearer_headers(token: &AccessToken) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), format!("Bearer {}", token.token));
    headers
}
