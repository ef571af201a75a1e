//! Per-provider outcomes of searches and resolutions.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use super::TorrentDescription;

/// The original error behind an `UnknownError`, shared between replays.
pub type ErrorCause = Arc<dyn StdError + Send + Sync>;

/// The outcome of a single provider query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderResult {
    Success(ProviderSuccess),
    Error(ProviderFailure),
}

impl ProviderResult {
    /// Name of the provider which produced this result.
    pub fn provider_name(&self) -> &str {
        match self {
            ProviderResult::Success(success) => &success.provider_name,
            ProviderResult::Error(failure) => failure.provider_name(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProviderResult::Success(_))
    }

    pub fn as_success(&self) -> Option<&ProviderSuccess> {
        match self {
            ProviderResult::Success(success) => Some(success),
            ProviderResult::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ProviderFailure> {
        match self {
            ProviderResult::Success(_) => None,
            ProviderResult::Error(failure) => Some(failure),
        }
    }

    /// True when this is a success reporting further pages.
    pub fn has_more_results(&self) -> bool {
        self.as_success()
            .map(ProviderSuccess::has_more_results)
            .unwrap_or(false)
    }

    /// A `RequestError` for a non-success HTTP response.
    pub fn request_error(
        provider_name: impl Into<String>,
        http_status: Option<u16>,
        body: Option<String>,
    ) -> Self {
        let message = match (&body, http_status) {
            (Some(body), _) if !body.is_empty() => body.chars().take(200).collect(),
            (_, Some(status)) => format!("HTTP {}", status),
            _ => "Request failed".to_string(),
        };
        ProviderResult::Error(ProviderFailure::RequestError {
            provider_name: provider_name.into(),
            http_status,
            body,
            message,
        })
    }

    pub fn invalid_query(provider_name: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderResult::Error(ProviderFailure::InvalidQueryError {
            provider_name: provider_name.into(),
            message: message.into(),
        })
    }

    pub fn unknown_error(
        provider_name: impl Into<String>,
        message: impl Into<String>,
        cause: Option<ErrorCause>,
    ) -> Self {
        ProviderResult::Error(ProviderFailure::UnknownError {
            provider_name: provider_name.into(),
            message: message.into(),
            cause,
        })
    }
}

impl From<ProviderSuccess> for ProviderResult {
    fn from(success: ProviderSuccess) -> Self {
        ProviderResult::Success(success)
    }
}

impl From<ProviderFailure> for ProviderResult {
    fn from(failure: ProviderFailure) -> Self {
        ProviderResult::Error(failure)
    }
}

/// Torrents returned by a successful provider query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSuccess {
    pub provider_name: String,
    pub torrents: Vec<TorrentDescription>,
    /// Loaded from the provider cache rather than the network.
    #[serde(default)]
    pub from_cache: bool,
    /// Page number containing `torrents`.
    pub page: u32,
    /// Size (or limit) of each page.
    pub page_size: u32,
    /// Total number of torrents the provider reports for the query.
    pub total_torrents: u32,
    /// Torrents need a `resolve` pass before they carry magnets.
    #[serde(default)]
    pub requires_resolution: bool,
}

impl ProviderSuccess {
    /// A single, complete page holding `torrents`.
    pub fn new(provider_name: impl Into<String>, torrents: Vec<TorrentDescription>) -> Self {
        let count = torrents.len() as u32;
        Self {
            provider_name: provider_name.into(),
            torrents,
            from_cache: false,
            page: 1,
            page_size: count,
            total_torrents: count,
            requires_resolution: false,
        }
    }

    pub fn with_page(mut self, page: u32, page_size: u32, total_torrents: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self.total_torrents = total_torrents;
        self
    }

    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    pub fn requiring_resolution(mut self) -> Self {
        self.requires_resolution = true;
        self
    }

    /// The provider reported more torrents than the pages fetched so far.
    pub fn has_more_results(&self) -> bool {
        self.total_torrents > 0
            && u64::from(self.page) * u64::from(self.page_size) < u64::from(self.total_torrents)
    }
}

/// A failed provider query.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderFailure {
    /// Network or HTTP level failure.
    RequestError {
        provider_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        message: String,
    },
    /// The query lacks what the provider requires.
    InvalidQueryError {
        provider_name: String,
        message: String,
    },
    /// Anything else raised while the provider executed.
    UnknownError {
        provider_name: String,
        message: String,
        #[serde(skip)]
        cause: Option<ErrorCause>,
    },
}

impl ProviderFailure {
    pub fn provider_name(&self) -> &str {
        match self {
            ProviderFailure::RequestError { provider_name, .. }
            | ProviderFailure::InvalidQueryError { provider_name, .. }
            | ProviderFailure::UnknownError { provider_name, .. } => provider_name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderFailure::RequestError { message, .. }
            | ProviderFailure::InvalidQueryError { message, .. }
            | ProviderFailure::UnknownError { message, .. } => message,
        }
    }
}

impl fmt::Debug for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::RequestError {
                provider_name,
                http_status,
                message,
                ..
            } => f
                .debug_struct("RequestError")
                .field("provider_name", provider_name)
                .field("http_status", http_status)
                .field("message", message)
                .finish(),
            ProviderFailure::InvalidQueryError {
                provider_name,
                message,
            } => f
                .debug_struct("InvalidQueryError")
                .field("provider_name", provider_name)
                .field("message", message)
                .finish(),
            ProviderFailure::UnknownError {
                provider_name,
                message,
                cause,
            } => f
                .debug_struct("UnknownError")
                .field("provider_name", provider_name)
                .field("message", message)
                .field("cause", &cause.as_ref().map(|c| c.to_string()))
                .finish(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::RequestError {
                provider_name,
                http_status: Some(status),
                message,
                ..
            } => write!(f, "{}: HTTP {}: {}", provider_name, status, message),
            _ => write!(f, "{}: {}", self.provider_name(), self.message()),
        }
    }
}

/// The outcome of resolving torrents with a single provider.
///
/// Resolution may take one request per torrent, so an error can still
/// carry the torrents that were resolved before it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveResult {
    Success {
        provider_name: String,
        torrents: Vec<TorrentDescription>,
    },
    Error(ResolveFailure),
}

impl ResolveResult {
    pub fn success(provider_name: impl Into<String>, torrents: Vec<TorrentDescription>) -> Self {
        ResolveResult::Success {
            provider_name: provider_name.into(),
            torrents,
        }
    }

    pub fn provider_name(&self) -> &str {
        match self {
            ResolveResult::Success { provider_name, .. } => provider_name,
            ResolveResult::Error(failure) => failure.provider_name(),
        }
    }

    /// Torrents resolved, even when the result is an error.
    pub fn torrents(&self) -> &[TorrentDescription] {
        match self {
            ResolveResult::Success { torrents, .. } => torrents,
            ResolveResult::Error(failure) => failure.torrents(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResolveResult::Error(_))
    }
}

/// A failed (possibly partially failed) resolution.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveFailure {
    RequestError {
        provider_name: String,
        torrents: Vec<TorrentDescription>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        message: String,
    },
    UnknownError {
        provider_name: String,
        message: String,
        #[serde(skip)]
        cause: Option<ErrorCause>,
        torrents: Vec<TorrentDescription>,
    },
}

impl ResolveFailure {
    pub fn provider_name(&self) -> &str {
        match self {
            ResolveFailure::RequestError { provider_name, .. }
            | ResolveFailure::UnknownError { provider_name, .. } => provider_name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResolveFailure::RequestError { message, .. }
            | ResolveFailure::UnknownError { message, .. } => message,
        }
    }

    pub fn torrents(&self) -> &[TorrentDescription] {
        match self {
            ResolveFailure::RequestError { torrents, .. }
            | ResolveFailure::UnknownError { torrents, .. } => torrents,
        }
    }
}

impl fmt::Debug for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, status) = match self {
            ResolveFailure::RequestError { http_status, .. } => ("RequestError", *http_status),
            ResolveFailure::UnknownError { .. } => ("UnknownError", None),
        };
        f.debug_struct(kind)
            .field("provider_name", &self.provider_name())
            .field("http_status", &status)
            .field("message", &self.message())
            .field("torrents", &self.torrents().len())
            .finish()
    }
}

/// Resolution outcomes across every provider involved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveResultSet {
    /// Raw per-provider results.
    pub results: Vec<ResolveResult>,
    /// Every torrent resolved, including those from partially failed providers.
    pub resolved: Vec<TorrentDescription>,
    /// Providers that failed to resolve at least one torrent.
    pub failed: Vec<ResolveFailure>,
    pub has_errors: bool,
}

impl ResolveResultSet {
    pub fn new(results: Vec<ResolveResult>) -> Self {
        let resolved = results
            .iter()
            .flat_map(|r| r.torrents().iter().cloned())
            .collect();
        let failed: Vec<ResolveFailure> = results
            .iter()
            .filter_map(|r| match r {
                ResolveResult::Error(failure) => Some(failure.clone()),
                ResolveResult::Success { .. } => None,
            })
            .collect();
        Self {
            has_errors: !failed.is_empty(),
            results,
            resolved,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrents(count: usize) -> Vec<TorrentDescription> {
        (0..count)
            .map(|i| TorrentDescription::new("test", format!("Torrent {}", i)))
            .collect()
    }

    #[test]
    fn test_success_defaults_to_single_page() {
        let success = ProviderSuccess::new("test", torrents(3));
        assert_eq!(success.page, 1);
        assert_eq!(success.page_size, 3);
        assert_eq!(success.total_torrents, 3);
        assert!(!success.from_cache);
        assert!(!success.has_more_results());
    }

    #[test]
    fn test_has_more_results() {
        let success = ProviderSuccess::new("test", torrents(10)).with_page(1, 10, 25);
        assert!(success.has_more_results());

        let last = ProviderSuccess::new("test", torrents(5)).with_page(3, 10, 25);
        assert!(!last.has_more_results());

        let empty = ProviderSuccess::new("test", Vec::new()).with_page(1, 10, 0);
        assert!(!empty.has_more_results());
    }

    #[test]
    fn test_request_error_message_falls_back_to_status() {
        let result = ProviderResult::request_error("test", Some(503), None);
        let failure = result.as_error().unwrap();
        assert_eq!(failure.message(), "HTTP 503");
        assert_eq!(failure.provider_name(), "test");
        assert!(!result.is_success());
    }

    #[test]
    fn test_request_error_message_truncates_body() {
        let body = "x".repeat(500);
        let result = ProviderResult::request_error("test", Some(500), Some(body));
        assert_eq!(result.as_error().unwrap().message().len(), 200);
    }

    #[test]
    fn test_provider_result_serialization() {
        let result: ProviderResult = ProviderSuccess::new("test", torrents(1)).into();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"success\""));

        let parsed: ProviderResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.provider_name(), "test");
        assert!(parsed.is_success());

        let failure = ProviderResult::invalid_query("test", "needs content");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"kind\":\"invalid_query_error\""));
    }

    #[test]
    fn test_unknown_error_cause_is_not_serialized() {
        let cause: ErrorCause = Arc::new(std::io::Error::other("boom"));
        let result = ProviderResult::unknown_error("test", "boom", Some(cause));
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("cause"));
        assert!(format!("{:?}", result).contains("boom"));
    }

    #[test]
    fn test_resolve_result_set() {
        let set = ResolveResultSet::new(vec![
            ResolveResult::success("a", torrents(2)),
            ResolveResult::Error(ResolveFailure::UnknownError {
                provider_name: "b".to_string(),
                message: "failed".to_string(),
                cause: None,
                torrents: torrents(1),
            }),
        ]);

        assert!(set.has_errors);
        assert_eq!(set.resolved.len(), 3);
        assert_eq!(set.failed.len(), 1);
        assert_eq!(set.failed[0].provider_name(), "b");
    }

    #[test]
    fn test_empty_resolve_result_set() {
        let set = ResolveResultSet::new(Vec::new());
        assert!(!set.has_errors);
        assert!(set.resolved.is_empty());
    }
}
