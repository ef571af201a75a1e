use async_trait::async_trait;
use thiserror::Error;

use crate::search::{TorrentDescription, TorrentQuery};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to serialize cache entry: {0}")]
    Serialization(String),

    #[error("Cache error: {0}")]
    Other(String),
}

/// Storage for provider tokens and query results.
///
/// Implementations are called concurrently from every provider task and
/// must tolerate concurrent reads and writes for different keys. Result
/// entries are keyed by `(provider, query)`.
#[async_trait]
pub trait TorrentProviderCache: Send + Sync {
    /// Persist an auth token for `provider`.
    async fn save_token(&self, provider: &str, token: &str) -> Result<(), CacheError>;

    /// Load a previously saved auth token.
    async fn load_token(&self, provider: &str) -> Result<Option<String>, CacheError>;

    /// Persist results for `query` on `provider`.
    async fn save_results(
        &self,
        provider: &str,
        query: &TorrentQuery,
        results: &[TorrentDescription],
    ) -> Result<(), CacheError>;

    /// Load results for `query` on `provider`, `None` on a miss.
    async fn load_results(
        &self,
        provider: &str,
        query: &TorrentQuery,
    ) -> Result<Option<Vec<TorrentDescription>>, CacheError>;
}
