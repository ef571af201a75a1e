//! YTS movie API.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{decode_json, request_failure, ProviderError, ProviderState, TorrentProvider};
use crate::search::{
    format_magnet, Category, ProviderResult, ProviderSuccess, SearchParam, TorrentDescription,
    TorrentQuery,
};
use crate::transport::HttpTransport;

const BASE_URL: &str = "https://yts.mx/api/v2/";
const SEARCH_PATH: &str = "list_movies.json";
const DETAILS_PATH: &str = "movie_details.json";

const TRACKERS: &[&str] = &[
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.openbittorrent.com:80",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://glotorrents.pw:6969/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://torrent.gresille.org:80/announce",
    "udp://p4p.arenabg.com:1337",
    "udp://tracker.leechers-paradise.org:6969",
];

/// YTS: movies only, searchable by text or imdb id.
pub struct YtsProvider {
    transport: HttpTransport,
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
}

impl YtsProvider {
    pub const NAME: &'static str = "yts";

    pub fn new(transport: HttpTransport) -> Self {
        Self::with_enabled(transport, true)
    }

    pub fn with_enabled(transport: HttpTransport, enabled: bool) -> Self {
        Self {
            transport,
            state: ProviderState::new(enabled),
            categories: HashMap::from([(Category::Movies, String::new())]),
            search_params: HashMap::from([
                (SearchParam::Query, "query_term".to_string()),
                (SearchParam::Limit, "limit".to_string()),
                (SearchParam::ImdbId, "imdb_id".to_string()),
                (SearchParam::Page, "page".to_string()),
            ]),
        }
    }

    fn param(&self, param: SearchParam) -> &str {
        self.search_params
            .get(&param)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Build the request URL and parameters, `None` if the query is unsupported.
    fn build_request(&self, query: &TorrentQuery) -> Option<(String, Vec<(&str, String)>)> {
        if let Some(content) = query.search_text() {
            let mut params = vec![
                (self.param(SearchParam::Query), content.to_string()),
                (self.param(SearchParam::Page), query.page.to_string()),
                ("sort_by", "date_added".to_string()),
            ];
            if let Some(limit) = query.limit {
                params.push((self.param(SearchParam::Limit), limit.to_string()));
            }
            return Some((format!("{}{}", BASE_URL, SEARCH_PATH), params));
        }

        query.imdb().map(|imdb_id| {
            (
                format!("{}{}", BASE_URL, DETAILS_PATH),
                vec![(self.param(SearchParam::ImdbId), imdb_id.to_string())],
            )
        })
    }
}

#[async_trait]
impl TorrentProvider for YtsProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn search_path(&self) -> &str {
        SEARCH_PATH
    }

    fn search_params(&self) -> &HashMap<SearchParam, String> {
        &self.search_params
    }

    fn categories(&self) -> &HashMap<Category, String> {
        &self.categories
    }

    fn results_per_page(&self) -> u32 {
        20
    }

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        let Some((url, params)) = self.build_request(query) else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "YTS requires a query string or imdb id",
            ));
        };

        let response = self.transport.get(&url, &params).await?;
        if !response.is_success() {
            return Ok(request_failure(Self::NAME, response));
        }

        let body: YtsResponse = decode_json(&response)?;
        let result = parse_response(body, self.results_per_page());
        debug!(
            provider = Self::NAME,
            results = result.torrents.len(),
            "YTS search complete"
        );
        Ok(result.into())
    }
}

fn parse_response(body: YtsResponse, default_page_size: u32) -> ProviderSuccess {
    let data = body.data;
    let total = data
        .movie_count
        .unwrap_or(if data.movie.is_some() { 1 } else { 0 });
    let movies = match data.movie {
        Some(movie) => vec![movie],
        None => data.movies,
    };

    let torrents = movies
        .into_iter()
        .flat_map(|movie| {
            let YtsMovie {
                title_long,
                imdb_code,
                torrents,
            } = movie;
            torrents.into_iter().map(move |torrent| TorrentDescription {
                seeds: torrent.seeds,
                peers: torrent.peers,
                size: torrent.size_bytes,
                info_url: Some(torrent.url),
                imdb_id: imdb_code.clone(),
                ..TorrentDescription::new(
                    YtsProvider::NAME,
                    format!("{} {} {}", title_long, torrent.quality, torrent.kind),
                )
                .with_magnet(format_magnet(&torrent.hash, &title_long, TRACKERS))
            })
        })
        .collect();

    ProviderSuccess::new(YtsProvider::NAME, torrents).with_page(
        data.page_number,
        data.limit.unwrap_or(default_page_size),
        total,
    )
}

// YTS API response types
#[derive(Debug, Deserialize)]
struct YtsResponse {
    data: YtsData,
}

#[derive(Debug, Deserialize)]
struct YtsData {
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default = "first_page")]
    page_number: u32,
    #[serde(default)]
    movies: Vec<YtsMovie>,
    #[serde(default)]
    movie: Option<YtsMovie>,
    #[serde(default)]
    movie_count: Option<u32>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    title_long: String,
    #[serde(default)]
    imdb_code: Option<String>,
    #[serde(default)]
    torrents: Vec<YtsTorrent>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    url: String,
    hash: String,
    #[serde(default)]
    seeds: u32,
    #[serde(default)]
    peers: u32,
    quality: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_RESPONSE: &str = r#"{
        "status": "ok",
        "data": {
            "movie_count": 45,
            "limit": 20,
            "page_number": 1,
            "movies": [{
                "id": 1,
                "title_long": "Airplane! (1980)",
                "imdb_code": "tt0080339",
                "torrents": [
                    {"url": "https://yts.mx/torrent/download/AAA", "hash": "AAA", "quality": "720p",
                     "type": "bluray", "seeds": 10, "peers": 2, "size_bytes": 734003200},
                    {"url": "https://yts.mx/torrent/download/BBB", "hash": "BBB", "quality": "1080p",
                     "type": "bluray", "seeds": 20, "peers": 4, "size_bytes": 1503238554}
                ]
            }]
        }
    }"#;

    fn provider() -> YtsProvider {
        YtsProvider::new(HttpTransport::with_defaults().unwrap())
    }

    #[test]
    fn test_declares_movies_only() {
        let provider = provider();
        assert!(provider.categories().contains_key(&Category::Movies));
        assert!(provider.supports_category(None));
        assert!(provider.supports_category(Some(Category::All)));
        assert!(provider.supports_category(Some(Category::Movies)));
        assert!(!provider.supports_category(Some(Category::Tv)));
    }

    #[test]
    fn test_build_request_with_content() {
        let provider = provider();
        let query = TorrentQuery::builder().content("Airplane").limit(5).page(2).build();

        let (url, params) = provider.build_request(&query).unwrap();
        assert_eq!(url, "https://yts.mx/api/v2/list_movies.json");
        assert!(params.contains(&("query_term", "Airplane".to_string())));
        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("limit", "5".to_string())));
    }

    #[test]
    fn test_build_request_with_imdb_id() {
        let provider = provider();
        let query = TorrentQuery::builder().imdb_id("tt0080339").build();

        let (url, params) = provider.build_request(&query).unwrap();
        assert_eq!(url, "https://yts.mx/api/v2/movie_details.json");
        assert_eq!(params, vec![("imdb_id", "tt0080339".to_string())]);
    }

    #[test]
    fn test_build_request_unsupported() {
        let query = TorrentQuery::builder().tmdb_id(813).build();
        assert!(provider().build_request(&query).is_none());
    }

    #[tokio::test]
    async fn test_search_without_content_or_imdb_is_invalid() {
        let result = provider().search(&TorrentQuery::default()).await.unwrap();
        assert!(matches!(
            result.as_error(),
            Some(crate::search::ProviderFailure::InvalidQueryError { .. })
        ));
    }

    #[test]
    fn test_parse_list_response() {
        let body: YtsResponse = serde_json::from_str(LIST_RESPONSE).unwrap();
        let success = parse_response(body, 20);

        assert_eq!(success.torrents.len(), 2);
        assert_eq!(success.page, 1);
        assert_eq!(success.page_size, 20);
        assert_eq!(success.total_torrents, 45);
        assert!(success.has_more_results());

        let torrent = &success.torrents[1];
        assert_eq!(torrent.title, "Airplane! (1980) 1080p bluray");
        assert_eq!(torrent.hash.as_deref(), Some("BBB"));
        assert_eq!(torrent.imdb_id.as_deref(), Some("tt0080339"));
        assert_eq!(torrent.seeds, 20);
        assert!(torrent.is_resolved());
    }

    #[test]
    fn test_parse_details_response() {
        let json = r#"{"data": {"movie": {"title_long": "Sintel (2010)", "torrents": [
            {"url": "u", "hash": "CCC", "quality": "720p", "type": "web"}
        ]}}}"#;
        let body: YtsResponse = serde_json::from_str(json).unwrap();
        let success = parse_response(body, 20);

        assert_eq!(success.torrents.len(), 1);
        assert_eq!(success.total_torrents, 1);
        assert!(!success.has_more_results());
    }

    #[test]
    fn test_parse_empty_response() {
        let body: YtsResponse =
            serde_json::from_str(r#"{"data": {"movie_count": 0, "limit": 20, "page_number": 1}}"#)
                .unwrap();
        let success = parse_response(body, 20);
        assert!(success.torrents.is_empty());
        assert!(!success.has_more_results());
    }
}
