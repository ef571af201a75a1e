use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{CacheError, TorrentProviderCache};
use crate::search::{TorrentDescription, TorrentQuery};

/// In-process cache keeping tokens and results for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryProviderCache {
    tokens: RwLock<HashMap<String, String>>,
    results: RwLock<HashMap<(String, TorrentQuery), Vec<TorrentDescription>>>,
    results_loads: AtomicUsize,
    results_saves: AtomicUsize,
}

impl MemoryProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `load_results` calls made so far.
    pub fn results_loads(&self) -> usize {
        self.results_loads.load(Ordering::SeqCst)
    }

    /// Number of `save_results` calls made so far.
    pub fn results_saves(&self) -> usize {
        self.results_saves.load(Ordering::SeqCst)
    }

    /// Number of cached result entries.
    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }

    /// Drop every token and result.
    pub async fn clear(&self) {
        self.tokens.write().await.clear();
        self.results.write().await.clear();
    }
}

#[async_trait]
impl TorrentProviderCache for MemoryProviderCache {
    async fn save_token(&self, provider: &str, token: &str) -> Result<(), CacheError> {
        self.tokens
            .write()
            .await
            .insert(provider.to_string(), token.to_string());
        Ok(())
    }

    async fn load_token(&self, provider: &str) -> Result<Option<String>, CacheError> {
        Ok(self.tokens.read().await.get(provider).cloned())
    }

    async fn save_results(
        &self,
        provider: &str,
        query: &TorrentQuery,
        results: &[TorrentDescription],
    ) -> Result<(), CacheError> {
        self.results_saves.fetch_add(1, Ordering::SeqCst);
        self.results
            .write()
            .await
            .insert((provider.to_string(), query.clone()), results.to_vec());
        Ok(())
    }

    async fn load_results(
        &self,
        provider: &str,
        query: &TorrentQuery,
    ) -> Result<Option<Vec<TorrentDescription>>, CacheError> {
        self.results_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .results
            .read()
            .await
            .get(&(provider.to_string(), query.clone()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(content: &str) -> TorrentQuery {
        TorrentQuery::builder().content(content).build()
    }

    #[tokio::test]
    async fn test_results_are_keyed_by_provider_and_query() {
        let cache = MemoryProviderCache::new();
        let torrents = vec![TorrentDescription::new("a", "Sintel")];

        cache
            .save_results("a", &query("sintel"), &torrents)
            .await
            .unwrap();

        assert_eq!(
            cache.load_results("a", &query("sintel")).await.unwrap(),
            Some(torrents)
        );
        assert!(cache
            .load_results("b", &query("sintel"))
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .load_results("a", &query("sintel").next_page())
            .await
            .unwrap()
            .is_none());
        assert_eq!(cache.results_saves(), 1);
        assert_eq!(cache.results_loads(), 3);
    }

    #[tokio::test]
    async fn test_tokens() {
        let cache = MemoryProviderCache::new();
        assert!(cache.load_token("rarbg").await.unwrap().is_none());

        cache.save_token("rarbg", "abc").await.unwrap();
        assert_eq!(cache.load_token("rarbg").await.unwrap().as_deref(), Some("abc"));

        cache.clear().await;
        assert!(cache.load_token("rarbg").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let cache = std::sync::Arc::new(MemoryProviderCache::new());
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let provider = format!("provider-{}", i);
                    cache
                        .save_results(&provider, &query("test"), &[])
                        .await
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len().await, 10);
    }
}
