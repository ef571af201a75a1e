//! Query and torrent types shared by every provider.

use serde::{Deserialize, Serialize};

/// A category describing the content of a torrent, used to filter results.
///
/// Providers map the subset they support to their own identifiers; a
/// category missing from a provider's map means it cannot filter by it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    All,
    Audio,
    Video,
    Movies,
    Tv,
    Music,
    Apps,
    Books,
    Games,
    Xxx,
    Other,
}

/// A parameter a provider may consume when executing a query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchParam {
    Query,
    Category,
    Limit,
    Token,
    TmdbId,
    ImdbId,
    TvdbId,
    Page,
}

/// Everything needed to search for a torrent across providers.
///
/// A query is handed to a `SearchResult` by value and never mutated
/// afterwards; pagination produces a copy through [`TorrentQuery::next_page`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TorrentQuery {
    /// Free-text search string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Category to filter results for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// imdb.com id (`tt0000000`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// themoviedb.org id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u32>,
    /// thetvdb.com id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<u32>,
    /// Ignore cached results and do not cache results for this query.
    #[serde(default)]
    pub skip_cache: bool,
    /// Per-provider result limit. `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

impl Default for TorrentQuery {
    fn default() -> Self {
        Self {
            content: None,
            category: None,
            imdb_id: None,
            tmdb_id: None,
            tvdb_id: None,
            skip_cache: false,
            limit: None,
            page: default_page(),
        }
    }
}

impl TorrentQuery {
    /// Start building a query.
    pub fn builder() -> TorrentQueryBuilder {
        TorrentQueryBuilder::default()
    }

    /// The search text, if present and not blank.
    pub fn search_text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The imdb id, if present and not blank.
    pub fn imdb(&self) -> Option<&str> {
        self.imdb_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True when the query has no text and no external id.
    pub fn is_empty(&self) -> bool {
        self.search_text().is_none()
            && self.imdb().is_none()
            && self.tmdb_id.is_none()
            && self.tvdb_id.is_none()
    }

    /// True when the query does not restrict the category.
    pub fn is_any_category(&self) -> bool {
        matches!(self.category, None | Some(Category::All))
    }

    /// A copy of this query for the following page.
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }
}

/// Builder for [`TorrentQuery`].
#[derive(Debug, Clone, Default)]
pub struct TorrentQueryBuilder {
    query: TorrentQuery,
}

impl TorrentQueryBuilder {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.query.content = Some(content.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.query.category = Some(category);
        self
    }

    pub fn imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.query.imdb_id = Some(imdb_id.into());
        self
    }

    pub fn tmdb_id(mut self, tmdb_id: u32) -> Self {
        self.query.tmdb_id = Some(tmdb_id);
        self
    }

    pub fn tvdb_id(mut self, tvdb_id: u32) -> Self {
        self.query.tvdb_id = Some(tvdb_id);
        self
    }

    pub fn skip_cache(mut self, skip_cache: bool) -> Self {
        self.query.skip_cache = skip_cache;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Pages start at 1; 0 is treated as 1.
    pub fn page(mut self, page: u32) -> Self {
        self.query.page = page.max(1);
        self
    }

    pub fn build(self) -> TorrentQuery {
        self.query
    }
}

/// A torrent listed by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentDescription {
    /// Name of the provider which returned the torrent.
    pub provider: String,
    /// Magnet URI, absent until resolved for scraped providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_url: Option<String>,
    /// The provider's title, not always the torrent's file name.
    pub title: String,
    /// Size of the contents in bytes (0 when unknown).
    pub size: u64,
    pub seeds: u32,
    pub peers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themoviedb_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// The provider's HTML info page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
    /// Info hash, as found in the magnet URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl TorrentDescription {
    /// Create a description with only a provider and title set.
    pub fn new(provider: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            magnet_url: None,
            title: title.into(),
            size: 0,
            seeds: 0,
            peers: 0,
            themoviedb_id: None,
            tvdb_id: None,
            imdb_id: None,
            info_url: None,
            hash: None,
        }
    }

    /// Set the magnet URI and derive the hash from it.
    pub fn with_magnet(mut self, magnet_url: impl Into<String>) -> Self {
        let magnet_url = magnet_url.into();
        self.hash = hash_from_magnet_url(&magnet_url);
        self.magnet_url = Some(magnet_url);
        self
    }

    /// Both a magnet URI and an info hash are known.
    pub fn is_resolved(&self) -> bool {
        self.magnet_url.is_some() && self.hash.is_some()
    }
}

const BTIH_PREFIX: &str = "xt=urn:btih:";

/// Extract the info hash from a magnet URI's `xt=urn:btih:` parameter.
pub fn hash_from_magnet_url(magnet_url: &str) -> Option<String> {
    let start = magnet_url.find(BTIH_PREFIX)? + BTIH_PREFIX.len();
    let hash = magnet_url[start..].split('&').next().unwrap_or_default();
    if hash.is_empty() {
        None
    } else {
        Some(hash.to_string())
    }
}

/// Build a magnet URI from an info hash, display name and tracker list.
pub fn format_magnet(info_hash: &str, name: &str, trackers: &[&str]) -> String {
    let mut magnet = format!(
        "magnet:?{}{}&dn={}",
        BTIH_PREFIX,
        info_hash,
        urlencoding::encode(name)
    );
    for tracker in trackers {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}
