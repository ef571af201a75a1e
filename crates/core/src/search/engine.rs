//! Per-query aggregation engine.
//!
//! A `SearchResult` starts one task per selected provider as soon as it is
//! created. Each task checks the cache, queries the provider and appends
//! exactly one `ProviderResult` to a shared buffer. Consumer views read the
//! buffer with their own cursor, so every view sees the same results no
//! matter when it subscribes, and nothing is fetched twice.

use futures::future::{self, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    ErrorCause, ProviderFailure, ProviderResult, ProviderSuccess, TorrentDescription, TorrentQuery,
};
use crate::cache::TorrentProviderCache;
use crate::provider::TorrentProvider;

/// The results of one query across a set of providers.
///
/// Provider requests run until they complete or `cancel` is called.
/// Dropping a `SearchResult` does not cancel it: views returned earlier
/// keep draining the buffer.
pub struct SearchResult {
    inner: Arc<Inner>,
}

struct Inner {
    /// Scope that follow-up pages are created in.
    parent: CancellationToken,
    /// Scope of this page's provider tasks.
    token: CancellationToken,
    providers: Vec<Arc<dyn TorrentProvider>>,
    cache: Option<Arc<dyn TorrentProviderCache>>,
    query: TorrentQuery,
    previous_results: Vec<ProviderResult>,
    results: Mutex<Vec<ProviderResult>>,
    completed: watch::Sender<usize>,
}

impl SearchResult {
    /// Start querying `providers` with `query`.
    ///
    /// The search runs in a child scope of `parent`; cancelling `parent`
    /// cancels it too. `previous_results` are replayed ahead of this page's
    /// results by every view.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, as `tokio::spawn` does.
    pub fn new(
        parent: &CancellationToken,
        providers: Vec<Arc<dyn TorrentProvider>>,
        cache: Option<Arc<dyn TorrentProviderCache>>,
        query: TorrentQuery,
        previous_results: Vec<ProviderResult>,
    ) -> Self {
        let (completed, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            parent: parent.clone(),
            token: parent.child_token(),
            results: Mutex::new(Vec::with_capacity(providers.len())),
            providers,
            cache,
            query,
            previous_results,
            completed,
        });

        for provider in &inner.providers {
            spawn_provider_task(Arc::clone(&inner), Arc::clone(provider));
        }

        Self { inner }
    }

    /// The query this page was created for.
    pub fn query(&self) -> &TorrentQuery {
        &self.inner.query
    }

    /// All torrents from successful results, previous pages first.
    ///
    /// With `cancel_on_complete` the search is cancelled once the stream
    /// ends or is dropped.
    pub fn torrents(&self, cancel_on_complete: bool) -> BoxStream<'static, TorrentDescription> {
        self.provider_results(cancel_on_complete)
            .flat_map(|result| {
                let torrents = match result {
                    ProviderResult::Success(success) => success.torrents,
                    ProviderResult::Error(_) => Vec::new(),
                };
                stream::iter(torrents)
            })
            .boxed()
    }

    /// Every provider result, previous pages first, then this page's in
    /// completion order.
    ///
    /// Ends after one result per provider, or early if the search is
    /// cancelled.
    pub fn provider_results(&self, cancel_on_complete: bool) -> BoxStream<'static, ProviderResult> {
        let previous = stream::iter(self.inner.previous_results.clone());
        let cursor = Cursor {
            completed: self.inner.completed.subscribe(),
            inner: Arc::clone(&self.inner),
            index: 0,
            _guard: cancel_on_complete.then(|| CancelOnDrop(self.inner.token.clone())),
        };

        let current = stream::unfold(cursor, |mut cursor| async move {
            let result = cursor.next().await?;
            Some((result, cursor))
        });

        previous.chain(current).boxed()
    }

    /// Only the failed provider results.
    pub fn errors(&self, cancel_on_complete: bool) -> BoxStream<'static, ProviderFailure> {
        self.provider_results(cancel_on_complete)
            .filter_map(|result| {
                future::ready(match result {
                    ProviderResult::Error(failure) => Some(failure),
                    ProviderResult::Success(_) => None,
                })
            })
            .boxed()
    }

    /// Snapshot of previous results plus everything completed so far.
    pub fn current_provider_results(&self) -> Vec<ProviderResult> {
        let mut results = self.inner.previous_results.clone();
        results.extend(self.inner.snapshot());
        results
    }

    /// True once every selected provider has produced a result.
    pub fn is_completed(&self) -> bool {
        self.inner.completed_count() == self.inner.providers.len()
    }

    /// True once the search or its parent scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Number of providers selected for this page.
    pub fn provider_count(&self) -> usize {
        self.inner.providers.len()
    }

    /// Number of results this instance can hold, carried-over ones included.
    pub fn provider_result_count(&self) -> usize {
        self.inner.providers.len() + self.inner.previous_results.len()
    }

    /// Wait for this page to complete and report whether any provider has
    /// another page.
    ///
    /// Returns early with the results completed so far if the search is
    /// cancelled.
    pub async fn has_next_result(&self) -> bool {
        self.inner.wait_completed().await;
        self.inner.any_more_results()
    }

    /// Non-blocking variant of `has_next_result`; `None` while pending.
    pub fn has_next_result_now(&self) -> Option<bool> {
        self.is_completed().then(|| self.inner.any_more_results())
    }

    /// Wait for this page to complete and start the next one.
    ///
    /// The new search only queries providers that reported more results,
    /// with the page advanced by one, and carries every result completed so
    /// far. Returns `None` when no provider has another page or the search
    /// was cancelled.
    pub async fn next_result(&self) -> Option<SearchResult> {
        self.inner.wait_completed().await;
        if self.is_cancelled() {
            return None;
        }

        let current = self.inner.snapshot();
        let next_names: Vec<&str> = current
            .iter()
            .filter(|result| result.has_more_results())
            .map(ProviderResult::provider_name)
            .collect();
        if next_names.is_empty() {
            return None;
        }

        let providers: Vec<Arc<dyn TorrentProvider>> = self
            .inner
            .providers
            .iter()
            .filter(|provider| next_names.contains(&provider.name()))
            .cloned()
            .collect();

        let mut previous_results = self.inner.previous_results.clone();
        previous_results.extend(current.iter().cloned());

        let query = self.inner.query.next_page();
        debug!(
            page = query.page,
            providers = providers.len(),
            "Starting next result page"
        );

        Some(SearchResult::new(
            &self.inner.parent,
            providers,
            self.inner.cache.clone(),
            query,
            previous_results,
        ))
    }

    /// Cancel pending provider requests.
    ///
    /// Cancelled providers never produce a result, so `is_completed` stays
    /// false and views end early.
    pub fn cancel(&self) {
        if !self.inner.token.is_cancelled() {
            debug!(page = self.inner.query.page, "Cancelling search");
        }
        self.inner.token.cancel();
    }
}

impl fmt::Debug for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<&str> = self.inner.providers.iter().map(|p| p.name()).collect();
        let has_next_result = match self.has_next_result_now() {
            Some(has_next) => has_next.to_string(),
            None => "(pending)".to_string(),
        };

        f.debug_struct("SearchResult")
            .field("is_completed", &self.is_completed())
            .field("is_cancelled", &self.is_cancelled())
            .field("has_next_result", &has_next_result)
            .field("providers", &providers)
            .field("query", &self.inner.query)
            .field("completed", &self.inner.completed_count())
            .finish()
    }
}

impl Inner {
    fn lock_results(&self) -> std::sync::MutexGuard<'_, Vec<ProviderResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<ProviderResult> {
        self.lock_results().clone()
    }

    fn result_at(&self, index: usize) -> Option<ProviderResult> {
        self.lock_results().get(index).cloned()
    }

    fn completed_count(&self) -> usize {
        self.lock_results().len()
    }

    fn any_more_results(&self) -> bool {
        self.lock_results().iter().any(ProviderResult::has_more_results)
    }

    fn publish(&self, result: ProviderResult) {
        let mut results = self.lock_results();
        results.push(result);
        self.completed.send_replace(results.len());
    }

    /// Wait until every provider completed or the search is cancelled.
    async fn wait_completed(&self) {
        let mut completed = self.completed.subscribe();
        loop {
            if self.completed_count() >= self.providers.len() {
                return;
            }
            tokio::select! {
                changed = completed.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = self.token.cancelled() => return,
            }
        }
    }
}

/// A consumer's position in the shared result buffer.
struct Cursor {
    inner: Arc<Inner>,
    completed: watch::Receiver<usize>,
    index: usize,
    _guard: Option<CancelOnDrop>,
}

impl Cursor {
    async fn next(&mut self) -> Option<ProviderResult> {
        if self.index >= self.inner.providers.len() {
            return None;
        }
        loop {
            if let Some(result) = self.inner.result_at(self.index) {
                self.index += 1;
                return Some(result);
            }
            if self.inner.token.is_cancelled() {
                return None;
            }
            tokio::select! {
                changed = self.completed.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                _ = self.inner.token.cancelled() => return None,
            }
        }
    }
}

/// Cancels the search when a `cancel_on_complete` view ends or is dropped.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn spawn_provider_task(inner: Arc<Inner>, provider: Arc<dyn TorrentProvider>) {
    let token = inner.token.clone();

    tokio::spawn(async move {
        let name = provider.name().to_string();
        debug!(provider = %name, page = inner.query.page, "Dispatching provider search");

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(provider = %name, "Provider search cancelled");
            }
            result = run_provider(provider.as_ref(), inner.cache.as_deref(), &inner.query) => {
                debug!(
                    provider = %name,
                    success = result.is_success(),
                    "Provider search complete"
                );
                inner.publish(result);
            }
        }
    });
}

/// One provider's pipeline: cache lookup, live search, cache store.
async fn run_provider(
    provider: &dyn TorrentProvider,
    cache: Option<&dyn TorrentProviderCache>,
    query: &TorrentQuery,
) -> ProviderResult {
    let name = provider.name();
    let cache = cache.filter(|_| !query.skip_cache);

    if let Some(cache) = cache {
        match cache.load_results(name, query).await {
            Ok(Some(torrents)) => {
                debug!(provider = %name, results = torrents.len(), "Cache hit");
                let count = torrents.len() as u32;
                return ProviderSuccess::new(name, torrents)
                    .with_page(query.page, count, count)
                    .cached()
                    .into();
            }
            Ok(None) => {}
            Err(e) => warn!(provider = %name, error = %e, "Failed to load cached results"),
        }
    }

    let result = match AssertUnwindSafe(provider.search(query)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(provider = %name, error = %e, "Provider search failed");
            let message = e.to_string();
            let cause: ErrorCause = Arc::new(e);
            ProviderResult::unknown_error(name, message, Some(cause))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(provider = %name, error = %message, "Provider search panicked");
            ProviderResult::unknown_error(name, message, None)
        }
    };

    if let (Some(cache), ProviderResult::Success(success)) = (cache, &result) {
        if !success.from_cache && !success.torrents.is_empty() {
            if let Err(e) = cache.save_results(name, query, &success.torrents).await {
                warn!(provider = %name, error = %e, "Failed to cache results");
            }
        }
    }

    result
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "provider panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockProvider};
    use tokio::time::Duration;

    fn providers(mocks: &[&MockProvider]) -> Vec<Arc<dyn TorrentProvider>> {
        mocks
            .iter()
            .map(|mock| Arc::new((*mock).clone()) as Arc<dyn TorrentProvider>)
            .collect()
    }

    fn query(content: &str) -> TorrentQuery {
        TorrentQuery::builder().content(content).build()
    }

    #[tokio::test]
    async fn test_no_providers_completes_immediately() {
        let search = SearchResult::new(
            &CancellationToken::new(),
            Vec::new(),
            None,
            query("anything"),
            Vec::new(),
        );

        assert!(search.is_completed());
        assert_eq!(search.provider_count(), 0);
        assert_eq!(search.provider_results(false).count().await, 0);
        assert!(!search.has_next_result().await);
        assert!(search.next_result().await.is_none());
    }

    #[tokio::test]
    async fn test_results_are_replayed_to_every_view() {
        let mock = MockProvider::new("mock");
        mock.set_torrents(vec![fixtures::torrent("mock", "Sintel", "aaa")])
            .await;

        let search = SearchResult::new(
            &CancellationToken::new(),
            providers(&[&mock]),
            None,
            query("sintel"),
            Vec::new(),
        );

        let first: Vec<_> = search.torrents(false).collect().await;
        let second: Vec<_> = search.torrents(false).collect().await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(mock.search_count().await, 1);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_unknown_error() {
        let mock = MockProvider::new("broken");
        mock.set_next_error(crate::provider::ProviderError::Parse("bad html".into()))
            .await;

        let search = SearchResult::new(
            &CancellationToken::new(),
            providers(&[&mock]),
            None,
            query("x"),
            Vec::new(),
        );

        let errors: Vec<_> = search.errors(false).collect().await;
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ProviderFailure::UnknownError {
                provider_name,
                message,
                cause,
            } => {
                assert_eq!(provider_name, "broken");
                assert!(message.contains("bad html"));
                assert!(cause.is_some());
            }
            other => panic!("expected unknown error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_ends_views_early() {
        let mock = MockProvider::new("slow");
        mock.set_delay(Duration::from_secs(30)).await;

        let search = SearchResult::new(
            &CancellationToken::new(),
            providers(&[&mock]),
            None,
            query("x"),
            Vec::new(),
        );
        let view = search.provider_results(false);
        search.cancel();

        assert!(search.is_cancelled());
        assert_eq!(view.count().await, 0);
        assert!(!search.is_completed());
        assert!(search.next_result().await.is_none());
    }

    #[tokio::test]
    async fn test_debug_reports_pending_state() {
        let mock = MockProvider::new("slow");
        mock.set_delay(Duration::from_secs(30)).await;

        let search = SearchResult::new(
            &CancellationToken::new(),
            providers(&[&mock]),
            None,
            query("x"),
            Vec::new(),
        );

        let debug = format!("{:?}", search);
        assert!(debug.contains("is_completed: false"));
        assert!(debug.contains("(pending)"));
        assert!(debug.contains("\"slow\""));
        search.cancel();
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "provider panicked");
    }
}
