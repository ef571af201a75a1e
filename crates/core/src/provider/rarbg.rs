//! RARBG torrentapi: token gated and rate limited.
//!
//! Every call to the API needs a token from the same endpoint. The token is
//! fetched once under a mutex, persisted through the cache and shared by
//! concurrent searches. Calls are spaced at least three seconds apart.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::{
    decode_json, request_failure, ProviderError, ProviderState, RequestThrottle, TorrentProvider,
};
use crate::cache::TorrentProviderCache;
use crate::search::{
    Category, ProviderResult, ProviderSuccess, SearchParam, TorrentDescription, TorrentQuery,
};
use crate::transport::HttpTransport;

const BASE_URL: &str = "https://torrentapi.org";
const API_PATH: &str = "/pubapi_v2.php";
const APP_ID: &str = "TorrentSearch";
const API_REQUEST_DELAY: Duration = Duration::from_millis(3000);

/// `error_code` for an empty result set.
const ERROR_NO_RESULTS: u32 = 20;
/// `error_code` for an expired or invalid token.
const ERROR_INVALID_TOKEN: u32 = 4;

pub struct RarbgProvider {
    transport: HttpTransport,
    cache: Option<Arc<dyn TorrentProviderCache>>,
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
    token: Mutex<TokenState>,
    throttle: RequestThrottle,
}

#[derive(Debug, Default)]
struct TokenState {
    current: Option<String>,
    /// Last token the API refused; a cached copy of it is never reused.
    rejected: Option<String>,
}

impl RarbgProvider {
    pub const NAME: &'static str = "rarbg";

    /// Disabled until explicitly enabled; the public API is frequently offline.
    pub fn new(transport: HttpTransport, cache: Option<Arc<dyn TorrentProviderCache>>) -> Self {
        Self::with_enabled(transport, cache, false)
    }

    pub fn with_enabled(
        transport: HttpTransport,
        cache: Option<Arc<dyn TorrentProviderCache>>,
        enabled: bool,
    ) -> Self {
        let categories = [
            (
                Category::All,
                "1;4;14;15;16;17;21;22;42;18;19;41;27;28;29;30;31;32;40;23;24;25;26;33;34;43;44;45;46;47;48;49;50;51;52",
            ),
            (Category::Movies, "14;17;42;44;45;46;47;48;50;51;52"),
            (Category::Xxx, "1;4"),
            (Category::Games, "1;27;28;29;30;31;32;40"),
            (Category::Tv, "1;18;41;49"),
            (Category::Music, "1;23;24;25;26"),
            (Category::Apps, "1;33;34;43"),
            (Category::Books, "35"),
        ]
        .into_iter()
        .map(|(category, codes)| (category, codes.to_string()))
        .collect();

        Self {
            transport,
            cache,
            state: ProviderState::new(enabled),
            categories,
            search_params: HashMap::from([
                (SearchParam::Query, "search_string".to_string()),
                (SearchParam::Category, "category".to_string()),
                (SearchParam::Limit, "limit".to_string()),
                (SearchParam::Token, "token".to_string()),
                (SearchParam::ImdbId, "search_imdb".to_string()),
                (SearchParam::TmdbId, "search_themoviedb".to_string()),
                (SearchParam::TvdbId, "search_tvdb".to_string()),
            ]),
            token: Mutex::new(TokenState::default()),
            throttle: RequestThrottle::new(API_REQUEST_DELAY),
        }
    }

    fn param(&self, param: SearchParam) -> &str {
        self.search_params
            .get(&param)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Search parameters without the token, `None` if nothing is searchable.
    fn build_params(&self, query: &TorrentQuery) -> Option<Vec<(&str, String)>> {
        let mut params = vec![
            ("app_id", APP_ID.to_string()),
            ("mode", "search".to_string()),
            ("format", "json_extended".to_string()),
            ("sort", "seeders".to_string()),
        ];
        let mut searchable = false;

        if let Some(content) = query.search_text() {
            params.push((self.param(SearchParam::Query), content.to_string()));
            searchable = true;
        }
        if let Some(imdb_id) = query.imdb() {
            params.push((self.param(SearchParam::ImdbId), imdb_id.to_string()));
            searchable = true;
        }
        if let Some(tmdb_id) = query.tmdb_id {
            params.push((self.param(SearchParam::TmdbId), tmdb_id.to_string()));
            searchable = true;
        }
        if let Some(tvdb_id) = query.tvdb_id {
            params.push((self.param(SearchParam::TvdbId), tvdb_id.to_string()));
            searchable = true;
        }
        if !searchable {
            return None;
        }

        let category = query.category.unwrap_or(Category::All);
        if let Some(codes) = self.categories.get(&category) {
            params.push((self.param(SearchParam::Category), codes.clone()));
        }
        if let Some(limit) = query.limit {
            params.push((self.param(SearchParam::Limit), limit.to_string()));
        }
        Some(params)
    }

    /// Return the current token, loading it from the cache or the API.
    async fn read_token(&self) -> Result<String, ProviderError> {
        let mut state = self.token.lock().await;
        if let Some(token) = state.current.as_ref() {
            return Ok(token.clone());
        }

        if let Some(cached) = self.load_cached_token(state.rejected.as_deref()).await {
            debug!(provider = Self::NAME, "Loaded token from cache");
            state.current = Some(cached.clone());
            return Ok(cached);
        }

        let fetched = self.fetch_token().await?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save_token(Self::NAME, &fetched).await {
                warn!(provider = Self::NAME, error = %e, "Failed to save token");
            }
        }
        state.current = Some(fetched.clone());
        state.rejected = None;
        Ok(fetched)
    }

    /// Cached token, unless it is the one the API last rejected.
    async fn load_cached_token(&self, rejected: Option<&str>) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.load_token(Self::NAME).await {
            Ok(Some(cached)) if Some(cached.as_str()) == rejected => {
                debug!(provider = Self::NAME, "Ignoring rejected cached token");
                None
            }
            Ok(cached) => cached,
            Err(e) => {
                warn!(provider = Self::NAME, error = %e, "Failed to load token");
                None
            }
        }
    }

    async fn fetch_token(&self) -> Result<String, ProviderError> {
        self.throttle.acquire().await;

        let url = format!("{}{}", BASE_URL, API_PATH);
        let params = [
            ("get_token", "get_token".to_string()),
            ("app_id", APP_ID.to_string()),
        ];
        let response = self.transport.get(&url, &params).await?;
        if !response.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "token request returned HTTP {}",
                response.status
            )));
        }

        let body: TokenResponse = decode_json(&response)?;
        debug!(provider = Self::NAME, "Fetched new token");
        Ok(body.token)
    }

    /// Drop the current token after the API refused it.
    async fn reject_token(&self) {
        let mut state = self.token.lock().await;
        if let Some(token) = state.current.take() {
            state.rejected = Some(token);
        }
    }
}

#[async_trait]
impl TorrentProvider for RarbgProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn token_path(&self) -> &str {
        API_PATH
    }

    fn search_path(&self) -> &str {
        API_PATH
    }

    fn search_params(&self) -> &HashMap<SearchParam, String> {
        &self.search_params
    }

    fn categories(&self) -> &HashMap<Category, String> {
        &self.categories
    }

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        let Some(mut params) = self.build_params(query) else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "Rarbg requires a query string or an external id",
            ));
        };

        let token = self.read_token().await?;
        params.push((self.param(SearchParam::Token), token));

        self.throttle.acquire().await;
        let url = format!("{}{}", BASE_URL, API_PATH);
        let response = self.transport.get(&url, &params).await?;
        if !response.is_success() {
            return Ok(request_failure(Self::NAME, response));
        }

        let body: SearchResponse = decode_json(&response)?;
        match body.error_code {
            None => {
                let torrents = parse_results(body.torrent_results);
                debug!(
                    provider = Self::NAME,
                    results = torrents.len(),
                    "Rarbg search complete"
                );
                Ok(ProviderSuccess::new(Self::NAME, torrents).into())
            }
            Some(ERROR_NO_RESULTS) => Ok(ProviderSuccess::new(Self::NAME, Vec::new()).into()),
            Some(code) => {
                if code == ERROR_INVALID_TOKEN {
                    self.reject_token().await;
                }
                let message = body
                    .error
                    .unwrap_or_else(|| format!("Rarbg error code {}", code));
                Ok(ProviderResult::request_error(
                    Self::NAME,
                    Some(response.status),
                    Some(message),
                ))
            }
        }
    }
}

fn parse_results(results: Vec<RarbgTorrent>) -> Vec<TorrentDescription> {
    results
        .into_iter()
        .map(|torrent| {
            let episode = torrent.episode_info.unwrap_or_default();
            TorrentDescription {
                size: torrent.size,
                seeds: torrent.seeders,
                peers: torrent.leechers,
                imdb_id: episode.imdb,
                themoviedb_id: episode.themoviedb.and_then(|id| id.parse().ok()),
                tvdb_id: episode.tvdb.and_then(|id| id.parse().ok()),
                info_url: torrent.info_page,
                ..TorrentDescription::new(RarbgProvider::NAME, torrent.title)
                    .with_magnet(torrent.download)
            }
        })
        .collect()
}

// torrentapi response types
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    torrent_results: Vec<RarbgTorrent>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RarbgTorrent {
    title: String,
    download: String,
    #[serde(default)]
    seeders: u32,
    #[serde(default)]
    leechers: u32,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    info_page: Option<String>,
    #[serde(default)]
    episode_info: Option<EpisodeInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct EpisodeInfo {
    #[serde(default)]
    imdb: Option<String>,
    #[serde(default)]
    tvdb: Option<String>,
    #[serde(default)]
    themoviedb: Option<String>,
}
