//! Access-token management
//!
//! Both the agents service and the MCP tool server expect a bearer token.
//! Tokens come from a `TokenProvider` and are cached per scope by `TokenCache`:
//!
//! - Static: a token set once at creation (`StaticTokenProvider`)
//! - Azure CLI: `az account get-access-token` (`AzureCliTokenProvider`)
//! - Dynamic: any async closure (`token_provider`)
//! - Per scope: fixed tokens over a fallback (`ScopedTokenProvider`)
//!
//! # Example
//!
//! ```ignore
//! use foundry_agent_runner::auth::{AzureCliTokenProvider, TokenCache};
//!
//! let cache = TokenCache::new(Arc::new(AzureCliTokenProvider::new()));
//! let token = cache.token("https://ai.azure.com/.default").await?;
//! ```

mod cache;
mod provider;

pub use cache::{bearer_headers, TokenCache, DEFAULT_REFRESH_MARGIN_MINUTES};
pub use provider::{
    token_provider, AccessToken, AzureCliTokenProvider, FnTokenProvider, ScopedTokenProvider,
    StaticTokenProvider, TokenFuture, TokenProvider,
};
