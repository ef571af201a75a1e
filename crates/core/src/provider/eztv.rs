//! EZTV television API, searchable by imdb id only.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{decode_json, request_failure, ProviderError, ProviderState, TorrentProvider};
use crate::search::{
    Category, ProviderResult, ProviderSuccess, SearchParam, TorrentDescription, TorrentQuery,
};
use crate::transport::HttpTransport;

const BASE_URL: &str = "https://eztvx.to/api/";
const SEARCH_PATH: &str = "get-torrents";

pub struct EztvProvider {
    transport: HttpTransport,
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
}

impl EztvProvider {
    pub const NAME: &'static str = "eztv";

    pub fn new(transport: HttpTransport) -> Self {
        Self::with_enabled(transport, true)
    }

    pub fn with_enabled(transport: HttpTransport, enabled: bool) -> Self {
        Self {
            transport,
            state: ProviderState::new(enabled),
            categories: HashMap::from([(Category::Tv, String::new())]),
            search_params: HashMap::from([
                (SearchParam::ImdbId, "imdb_id".to_string()),
                (SearchParam::Page, "page".to_string()),
                (SearchParam::Limit, "limit".to_string()),
            ]),
        }
    }

    fn param(&self, param: SearchParam) -> &str {
        self.search_params
            .get(&param)
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn build_params(&self, query: &TorrentQuery) -> Option<Vec<(&str, String)>> {
        // EZTV wants the numeric part only: "tt0944947" -> "0944947"
        let imdb_id = query.imdb()?.trim_start_matches('t');
        if imdb_id.is_empty() {
            return None;
        }

        let mut params = vec![
            (self.param(SearchParam::ImdbId), imdb_id.to_string()),
            (self.param(SearchParam::Page), query.page.to_string()),
        ];
        if let Some(limit) = query.limit {
            params.push((self.param(SearchParam::Limit), limit.to_string()));
        }
        Some(params)
    }
}

#[async_trait]
impl TorrentProvider for EztvProvider {
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
        30
    }

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        let Some(params) = self.build_params(query) else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "EZTV requires an imdb id",
            ));
        };

        let url = format!("{}{}", BASE_URL, SEARCH_PATH);
        let response = self.transport.get(&url, &params).await?;
        if !response.is_success() {
            return Ok(request_failure(Self::NAME, response));
        }

        let body: EztvResponse = decode_json(&response)?;
        let result = parse_response(body, self.results_per_page());
        debug!(
            provider = Self::NAME,
            results = result.torrents.len(),
            "EZTV search complete"
        );
        Ok(result.into())
    }
}

fn parse_response(body: EztvResponse, default_page_size: u32) -> ProviderSuccess {
    let torrents = body
        .torrents
        .into_iter()
        .map(|torrent| TorrentDescription {
            size: torrent.size_bytes.0,
            seeds: torrent.seeds,
            peers: torrent.peers,
            imdb_id: torrent
                .imdb_id
                .filter(|id| !id.is_empty())
                .map(|id| format!("tt{}", id)),
            info_url: torrent.episode_url,
            ..TorrentDescription::new(EztvProvider::NAME, torrent.title)
                .with_magnet(torrent.magnet_url)
        })
        .collect();

    ProviderSuccess::new(EztvProvider::NAME, torrents).with_page(
        body.page,
        body.limit.unwrap_or(default_page_size),
        body.torrents_count,
    )
}

// EZTV API response types
#[derive(Debug, Deserialize)]
struct EztvResponse {
    #[serde(default)]
    torrents_count: u32,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    torrents: Vec<EztvTorrent>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct EztvTorrent {
    title: String,
    magnet_url: String,
    #[serde(default)]
    episode_url: Option<String>,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    seeds: u32,
    #[serde(default)]
    peers: u32,
    #[serde(default)]
    size_bytes: SizeBytes,
}

/// EZTV reports sizes as a decimal string.
#[derive(Debug, Default)]
struct SizeBytes(u64);

impl<'de> Deserialize<'de> for SizeBytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => SizeBytes(n),
            Raw::Text(s) => SizeBytes(s.trim().parse().unwrap_or(0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ProviderFailure;

    fn provider() -> EztvProvider {
        EztvProvider::new(HttpTransport::with_defaults().unwrap())
    }

    #[test]
    fn test_build_params_strips_tt_prefix() {
        let provider = provider();
        let query = TorrentQuery::builder().imdb_id("tt0944947").page(3).build();

        let params = provider.build_params(&query).unwrap();
        assert_eq!(params[0], ("imdb_id", "0944947".to_string()));
        assert_eq!(params[1], ("page", "3".to_string()));
    }

    #[test]
    fn test_build_params_requires_imdb() {
        let query = TorrentQuery::builder().content("Game of Thrones").build();
        assert!(provider().build_params(&query).is_none());
    }

    #[tokio::test]
    async fn test_search_without_imdb_is_invalid() {
        let query = TorrentQuery::builder().content("Game of Thrones").build();
        let result = provider().search(&query).await.unwrap();
        assert!(matches!(
            result.as_error(),
            Some(ProviderFailure::InvalidQueryError { .. })
        ));
    }

    #[test]
    fn test_parse_response() {
        let json = r#"{
            "imdb_id": "0944947",
            "torrents_count": 95,
            "limit": 30,
            "page": 1,
            "torrents": [{
                "id": 1,
                "title": "Game of Thrones S08E06 1080p WEB H264-MEMENTO EZTV",
                "magnet_url": "magnet:?xt=urn:btih:ABCDEF&dn=Game.of.Thrones",
                "episode_url": "https://eztvx.to/ep/1/",
                "imdb_id": "0944947",
                "seeds": 120,
                "peers": 15,
                "size_bytes": "2147483648"
            }]
        }"#;
        let body: EztvResponse = serde_json::from_str(json).unwrap();
        let success = parse_response(body, 30);

        assert_eq!(success.torrents.len(), 1);
        assert_eq!(success.total_torrents, 95);
        assert!(success.has_more_results());

        let torrent = &success.torrents[0];
        assert_eq!(torrent.size, 2_147_483_648);
        assert_eq!(torrent.imdb_id.as_deref(), Some("tt0944947"));
        assert_eq!(torrent.hash.as_deref(), Some("ABCDEF"));
    }

    #[test]
    fn test_parse_missing_limit_uses_default() {
        let body: EztvResponse =
            serde_json::from_str(r#"{"torrents_count": 0, "page": 1}"#).unwrap();
        let success = parse_response(body, 30);
        assert_eq!(success.page_size, 30);
        assert!(success.torrents.is_empty());
    }
}
