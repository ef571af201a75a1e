use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::state::{Credentials, ProviderState};
use crate::search::{
    Category, ProviderResult, ResolveResult, SearchParam, TorrentDescription, TorrentQuery,
};
use crate::transport::{HttpResponse, TransportError};

/// Default page size advertised by a provider.
pub const DEFAULT_RESULTS_PER_PAGE: u32 = 100;

/// Failures raised while a provider executes.
///
/// Returning `Err` is the provider equivalent of throwing: the engine turns
/// it into `ProviderFailure::UnknownError` for that provider only.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// A torrent indexing backend.
///
/// This is the only extension point for adding a backend: implementations
/// build their own requests and parse their own responses, and report
/// per-query problems as `ProviderResult` data.
#[async_trait]
pub trait TorrentProvider: Send + Sync {
    /// Registry key, unique across providers.
    fn name(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Path used to acquire an auth token, empty when none is needed.
    fn token_path(&self) -> &str {
        ""
    }

    fn search_path(&self) -> &str;

    /// Provider-specific names for the parameters it understands.
    fn search_params(&self) -> &HashMap<SearchParam, String>;

    /// Provider-specific identifiers for the categories it supports.
    fn categories(&self) -> &HashMap<Category, String>;

    /// Advisory page size when a response omits paging data.
    fn results_per_page(&self) -> u32 {
        DEFAULT_RESULTS_PER_PAGE
    }

    /// Enablement and credentials.
    fn state(&self) -> &ProviderState;

    fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    fn enable(&self, credentials: Credentials) {
        self.state().enable(credentials);
    }

    fn disable(&self) {
        self.state().disable();
    }

    /// True when the provider can serve `category` (`None` and `All` always).
    fn supports_category(&self, category: Option<Category>) -> bool {
        match category {
            None | Some(Category::All) => true,
            Some(category) => self.categories().contains_key(&category),
        }
    }

    /// Execute `query`, returning one result for the requested page.
    ///
    /// Prefer `InvalidQueryError` when the query cannot be served and
    /// `RequestError` when the transport returns a non-success status.
    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError>;

    /// Fetch magnets and hashes for torrents this provider returned unresolved.
    ///
    /// Providers whose search results are complete keep the default no-op.
    async fn resolve(
        &self,
        torrents: &[TorrentDescription],
    ) -> Result<ResolveResult, ProviderError> {
        let _ = torrents;
        Ok(ResolveResult::success(self.name(), Vec::new()))
    }
}

/// Convert a non-success response into a `RequestError` result.
pub fn request_failure(provider_name: &str, response: HttpResponse) -> ProviderResult {
    ProviderResult::request_error(provider_name, Some(response.status), Some(response.body))
}

/// Decode a JSON response body, mapping failures to `ProviderError::Decode`.
pub fn decode_json<T: serde::de::DeserializeOwned>(
    response: &HttpResponse,
) -> Result<T, ProviderError> {
    response.json().map_err(|e| ProviderError::Decode {
        url: response.url.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ProviderFailure;
    use crate::testing::MockProvider;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            url: "https://example.org/api".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_supports_category_defaults() {
        let provider = MockProvider::new("mock").with_categories(&[Category::Movies]);
        assert!(provider.supports_category(None));
        assert!(provider.supports_category(Some(Category::All)));
        assert!(provider.supports_category(Some(Category::Movies)));
        assert!(!provider.supports_category(Some(Category::Tv)));
    }

    #[test]
    fn test_request_failure_keeps_status_and_body() {
        let result = request_failure("mock", response(503, "down"));
        match result.as_error() {
            Some(ProviderFailure::RequestError {
                http_status, body, ..
            }) => {
                assert_eq!(*http_status, Some(503));
                assert_eq!(body.as_deref(), Some("down"));
            }
            other => panic!("expected request error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_error_names_url() {
        let result: Result<Vec<u32>, _> = decode_json(&response(200, "not json"));
        match result {
            Err(ProviderError::Decode { url, .. }) => assert_eq!(url, "https://example.org/api"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_resolve_is_noop() {
        struct Bare(ProviderState, HashMap<SearchParam, String>, HashMap<Category, String>);

        #[async_trait]
        impl TorrentProvider for Bare {
            fn name(&self) -> &str {
                "bare"
            }
            fn base_url(&self) -> &str {
                ""
            }
            fn search_path(&self) -> &str {
                ""
            }
            fn search_params(&self) -> &HashMap<SearchParam, String> {
                &self.1
            }
            fn categories(&self) -> &HashMap<Category, String> {
                &self.2
            }
            fn state(&self) -> &ProviderState {
                &self.0
            }
            async fn search(&self, _: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
                Ok(ProviderResult::invalid_query("bare", "unused"))
            }
        }

        let bare = Bare(ProviderState::new(true), HashMap::new(), HashMap::new());
        let result = bare.resolve(&[]).await.unwrap();
        assert!(!result.is_error());
        assert!(result.torrents().is_empty());
        assert_eq!(bare.results_per_page(), DEFAULT_RESULTS_PER_PAGE);
    }
}
