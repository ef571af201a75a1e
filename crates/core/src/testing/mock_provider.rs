//! Mock provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::provider::{
    ProviderError, ProviderState, TorrentProvider, DEFAULT_RESULTS_PER_PAGE,
};
use crate::search::{
    Category, ProviderResult, ProviderSuccess, ResolveResult, SearchParam, TorrentDescription,
    TorrentQuery,
};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    /// The query that was searched.
    pub query: TorrentQuery,
    /// When the search was made.
    pub timestamp: Instant,
}

/// Mock implementation of the TorrentProvider trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable torrents, optionally paginated
/// - Track queries for assertions
/// - Simulate errors, panics and slow responses
///
/// Clones share their state, so a test can keep one clone for assertions
/// and hand another to the engine.
///
/// # Example
///
/// ```rust,ignore
/// use torrentsearch_core::testing::{fixtures, MockProvider};
///
/// let provider = MockProvider::new("mock");
/// provider.set_torrents(vec![fixtures::torrent("mock", "Sintel", "abc123")]).await;
///
/// let result = provider.search(&TorrentQuery::builder().content("sintel").build()).await?;
/// assert_eq!(provider.search_count().await, 1);
/// ```
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    state: Arc<ProviderState>,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
    results_per_page: u32,
    /// Return `InvalidQueryError` for queries without content.
    require_content: bool,
    /// Configured torrents to return.
    torrents: Arc<RwLock<Vec<TorrentDescription>>>,
    /// Total reported across all pages; `None` means a single page.
    total_torrents: Arc<RwLock<Option<u32>>>,
    /// Recorded search queries.
    searches: Arc<RwLock<Vec<RecordedQuery>>>,
    /// If set, the next search will fail with this error.
    next_error: Arc<RwLock<Option<ProviderError>>>,
    /// If set, searches panic with this message.
    panic_message: Arc<RwLock<Option<String>>>,
    /// Simulated response latency.
    delay: Arc<RwLock<Option<Duration>>>,
    /// Recorded resolve inputs.
    resolves: Arc<RwLock<Vec<Vec<TorrentDescription>>>>,
    /// If set, the next resolve will fail with this error.
    next_resolve_error: Arc<RwLock<Option<ProviderError>>>,
    /// If set, resolves panic with this message.
    resolve_panic_message: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("enabled", &self.state.is_enabled())
            .field("categories", &self.categories.keys().collect::<Vec<_>>())
            .field("results_per_page", &self.results_per_page)
            .field("torrents", &"<torrents>")
            .field("searches", &"<searches>")
            .finish()
    }
}

impl MockProvider {
    /// Create an enabled mock provider with no categories and no torrents.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(ProviderState::new(true)),
            categories: HashMap::new(),
            search_params: HashMap::new(),
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            require_content: false,
            torrents: Arc::new(RwLock::new(Vec::new())),
            total_torrents: Arc::new(RwLock::new(None)),
            searches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            panic_message: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            resolves: Arc::new(RwLock::new(Vec::new())),
            next_resolve_error: Arc::new(RwLock::new(None)),
            resolve_panic_message: Arc::new(RwLock::new(None)),
        }
    }

    /// Declare the categories this provider supports.
    pub fn with_categories(mut self, categories: &[Category]) -> Self {
        self.categories = categories
            .iter()
            .map(|category| (*category, format!("{:?}", category).to_lowercase()))
            .collect();
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        if enabled {
            self.state.enable(Default::default());
        } else {
            self.state.disable();
        }
        self
    }

    pub fn with_results_per_page(mut self, results_per_page: u32) -> Self {
        self.results_per_page = results_per_page;
        self
    }

    /// Reject queries without content, like most real providers.
    pub fn requiring_content(mut self) -> Self {
        self.require_content = true;
        self
    }

    /// Set the torrents to return for subsequent searches.
    pub async fn set_torrents(&self, torrents: Vec<TorrentDescription>) {
        *self.torrents.write().await = torrents;
    }

    /// Report `total` torrents across all pages, enabling pagination.
    pub async fn set_total_torrents(&self, total: u32) {
        *self.total_torrents.write().await = Some(total);
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: ProviderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every search panic with `message`.
    pub async fn set_panic(&self, message: &str) {
        *self.panic_message.write().await = Some(message.to_string());
    }

    /// Delay every search and resolve by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Configure the next resolve to fail with the given error.
    pub async fn set_next_resolve_error(&self, error: ProviderError) {
        *self.next_resolve_error.write().await = Some(error);
    }

    /// Make every resolve panic with `message`.
    pub async fn set_resolve_panic(&self, message: &str) {
        *self.resolve_panic_message.write().await = Some(message.to_string());
    }

    /// Get recorded search queries.
    pub async fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.searches.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Get the torrent lists passed to `resolve`.
    pub async fn recorded_resolves(&self) -> Vec<Vec<TorrentDescription>> {
        self.resolves.read().await.clone()
    }

    async fn wait(&self) {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TorrentProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        "mock://"
    }

    fn search_path(&self) -> &str {
        ""
    }

    fn search_params(&self) -> &HashMap<SearchParam, String> {
        &self.search_params
    }

    fn categories(&self) -> &HashMap<Category, String> {
        &self.categories
    }

    fn results_per_page(&self) -> u32 {
        self.results_per_page
    }

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        // Record the search
        self.searches.write().await.push(RecordedQuery {
            query: query.clone(),
            timestamp: Instant::now(),
        });

        self.wait().await;

        let panic_message = self.panic_message.read().await.clone();
        if let Some(message) = panic_message {
            panic!("{}", message);
        }

        // Check for injected error
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if self.require_content && query.search_text().is_none() {
            return Ok(ProviderResult::invalid_query(
                &self.name,
                format!("{} requires a query string", self.name),
            ));
        }

        let torrents = self.torrents.read().await.clone();
        let torrents: Vec<TorrentDescription> = match query.limit {
            Some(limit) => torrents.into_iter().take(limit as usize).collect(),
            None => torrents,
        };

        let success = ProviderSuccess::new(&self.name, torrents);
        let success = match *self.total_torrents.read().await {
            Some(total) => success.with_page(query.page, self.results_per_page, total),
            None => success,
        };
        Ok(success.into())
    }

    async fn resolve(
        &self,
        torrents: &[TorrentDescription],
    ) -> Result<ResolveResult, ProviderError> {
        self.resolves.write().await.push(torrents.to_vec());

        self.wait().await;

        let panic_message = self.resolve_panic_message.read().await.clone();
        if let Some(message) = panic_message {
            panic!("{}", message);
        }

        if let Some(err) = self.next_resolve_error.write().await.take() {
            return Err(err);
        }

        let resolved = torrents
            .iter()
            .map(|torrent| {
                let hash = format!("{:040x}", torrent.title.len());
                torrent
                    .clone()
                    .with_magnet(format!("magnet:?xt=urn:btih:{}", hash))
            })
            .collect();
        Ok(ResolveResult::success(&self.name, resolved))
    }
}
