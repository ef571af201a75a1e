//! The Pirate Bay, through the apibay.org JSON mirror.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tracing::debug;

use super::{decode_json, request_failure, ProviderError, ProviderState, TorrentProvider};
use crate::search::{
    format_magnet, Category, ProviderResult, ProviderSuccess, SearchParam, TorrentDescription,
    TorrentQuery,
};
use crate::transport::HttpTransport;

const BASE_URL: &str = "https://apibay.org";
const SEARCH_PATH: &str = "/q.php";
const INFO_URL: &str = "https://thepiratebay.org/description.php?id=";

const TRACKERS: &[&str] = &[
    "udp://tracker.coppersurfer.tk:6969/announce",
    "udp://9.rarbg.to:2920/announce",
    "udp://tracker.opentrackr.org:1337",
    "udp://tracker.internetwarriors.net:1337/announce",
    "udp://tracker.leechers-paradise.org:6969/announce",
    "udp://tracker.pirateparty.gr:6969/announce",
    "udp://tracker.cyberia.is:6969/announce",
];

pub struct PirateBayProvider {
    transport: HttpTransport,
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
}

impl PirateBayProvider {
    pub const NAME: &'static str = "thepiratebay";

    pub fn new(transport: HttpTransport) -> Self {
        Self::with_enabled(transport, true)
    }

    pub fn with_enabled(transport: HttpTransport, enabled: bool) -> Self {
        let categories = [
            (Category::All, ""),
            (Category::Audio, "100"),
            (Category::Music, "101"),
            (Category::Video, "200"),
            (Category::Movies, "201"),
            (Category::Tv, "205"),
            (Category::Apps, "300"),
            (Category::Games, "400"),
            (Category::Xxx, "500"),
            (Category::Other, "600"),
        ]
        .into_iter()
        .map(|(category, code)| (category, code.to_string()))
        .collect();

        Self {
            transport,
            state: ProviderState::new(enabled),
            categories,
            search_params: HashMap::from([
                (SearchParam::Query, "q".to_string()),
                (SearchParam::Category, "cat".to_string()),
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
        let content = query.search_text()?;
        let mut params = vec![(self.param(SearchParam::Query), content.to_string())];
        let category = query
            .category
            .and_then(|category| self.categories.get(&category))
            .filter(|code| !code.is_empty());
        if let Some(code) = category {
            params.push((self.param(SearchParam::Category), code.clone()));
        }
        Some(params)
    }
}

#[async_trait]
impl TorrentProvider for PirateBayProvider {
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

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        let Some(params) = self.build_params(query) else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "ThePirateBay requires a query string",
            ));
        };

        let url = format!("{}{}", BASE_URL, SEARCH_PATH);
        let response = self.transport.get(&url, &params).await?;
        if !response.is_success() {
            return Ok(request_failure(Self::NAME, response));
        }

        let entries: Vec<ApiBayEntry> = decode_json(&response)?;
        let torrents = parse_entries(entries, query.limit);
        debug!(
            provider = Self::NAME,
            results = torrents.len(),
            "ThePirateBay search complete"
        );
        Ok(ProviderSuccess::new(Self::NAME, torrents).into())
    }
}

fn parse_entries(entries: Vec<ApiBayEntry>, limit: Option<u32>) -> Vec<TorrentDescription> {
    // apibay answers an empty search with one placeholder row
    let no_results = matches!(entries.as_slice(), [only] if only.info_hash.chars().all(|c| c == '0'));
    if no_results {
        return Vec::new();
    }

    let limit = limit.map_or(usize::MAX, |limit| limit as usize);
    entries
        .into_iter()
        .take(limit)
        .map(|entry| {
            let magnet = format_magnet(&entry.info_hash, &entry.name, TRACKERS);
            TorrentDescription {
                size: entry.size,
                seeds: entry.seeders as u32,
                peers: entry.leechers as u32,
                imdb_id: entry.imdb.filter(|id| !id.is_empty()),
                info_url: Some(format!("{}{}", INFO_URL, entry.id)),
                ..TorrentDescription::new(PirateBayProvider::NAME, entry.name).with_magnet(magnet)
            }
        })
        .collect()
}

// apibay encodes every number as a string
#[derive(Debug, Deserialize)]
struct ApiBayEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default = "unknown_name")]
    name: String,
    info_hash: String,
    #[serde(default, deserialize_with = "lenient_number")]
    size: u64,
    #[serde(default, deserialize_with = "lenient_number")]
    seeders: u64,
    #[serde(default, deserialize_with = "lenient_number")]
    leechers: u64,
    #[serde(default)]
    imdb: Option<String>,
}

fn unknown_name() -> String {
    "<unknown>".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Number(u64),
    Text(String),
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => n,
        StringOrNumber::Text(s) => s.trim().parse().unwrap_or(0),
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => n.to_string(),
        StringOrNumber::Text(s) => s,
    })
}
