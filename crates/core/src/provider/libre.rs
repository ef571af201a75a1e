//! Freely licensed films, served from memory.

use async_trait::async_trait;
use std::collections::HashMap;

use super::{ProviderError, ProviderState, TorrentProvider};
use crate::search::{
    Category, ProviderResult, ProviderSuccess, SearchParam, TorrentDescription, TorrentQuery,
};

const TRACKERS: &str = "&tr=udp%3A%2F%2Fexplodie.org%3A6969&tr=udp%3A%2F%2Ftracker.coppersurfer.tk%3A6969&tr=udp%3A%2F%2Ftracker.empire-js.us%3A1337&tr=udp%3A%2F%2Ftracker.leechers-paradise.org%3A6969&tr=udp%3A%2F%2Ftracker.opentrackr.org%3A1337&tr=wss%3A%2F%2Ftracker.btorrent.xyz&tr=wss%3A%2F%2Ftracker.fastcast.nz&tr=wss%3A%2F%2Ftracker.openwebtorrent.com&ws=https%3A%2F%2Fwebtorrent.io%2Ftorrents%2F";

/// (title, info hash, torrent file slug, tmdb id, imdb id)
const CATALOG: &[(&str, &str, &str, u32, &str)] = &[
    ("Sintel", "08ada5a7a6183aae1e09d831df6748d566095a10", "sintel", 45745, "tt1727587"),
    ("Big Buck Bunny", "dd8255ecdc7ca55fb0bbf81323d87062db1f6d1c", "big-buck-bunny", 10378, "tt1254207"),
    ("Cosmos Laundromat", "c9e15763f722f23e98a29decdfae341b98d53056", "cosmos-laundromat", 358332, "tt4957236"),
    ("Tears of Steel", "209c8226b299b308beaf2b9cd3fb49212dbd13ec", "tears-of-steel", 133701, "tt2285752"),
];

/// A provider that needs no network: Blender open movies seeded by webtorrent.io.
#[derive(Debug)]
pub struct LibreProvider {
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
    torrents: Vec<TorrentDescription>,
}

impl Default for LibreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LibreProvider {
    pub const NAME: &'static str = "libre";

    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    pub fn with_enabled(enabled: bool) -> Self {
        let torrents = CATALOG
            .iter()
            .map(|(title, hash, slug, tmdb_id, imdb_id)| {
                let magnet = format!(
                    "magnet:?xt=urn:btih:{}&dn={}{}&xs=https%3A%2F%2Fwebtorrent.io%2Ftorrents%2F{}.torrent",
                    hash,
                    title.replace(' ', "+"),
                    TRACKERS,
                    slug
                );
                TorrentDescription {
                    themoviedb_id: Some(*tmdb_id),
                    imdb_id: Some(imdb_id.to_string()),
                    ..TorrentDescription::new(Self::NAME, *title).with_magnet(magnet)
                }
            })
            .collect();

        Self {
            state: ProviderState::new(enabled),
            categories: HashMap::from([(Category::Movies, String::new())]),
            search_params: HashMap::new(),
            torrents,
        }
    }
}

#[async_trait]
impl TorrentProvider for LibreProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn base_url(&self) -> &str {
        ""
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

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        let Some(content) = query.search_text() else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "Libre provider requires query content string.",
            ));
        };

        let content = content.to_lowercase();
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let results: Vec<_> = self
            .torrents
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&content))
            .take(limit)
            .cloned()
            .collect();

        Ok(ProviderSuccess::new(Self::NAME, results).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_matches_title() {
        let provider = LibreProvider::new();
        let query = TorrentQuery::builder()
            .content("big buck")
            .category(Category::Movies)
            .build();

        let result = provider.search(&query).await.unwrap();
        let success = result.as_success().unwrap();
        assert_eq!(success.torrents.len(), 1);

        let torrent = &success.torrents[0];
        assert_eq!(torrent.title, "Big Buck Bunny");
        assert_eq!(torrent.provider, "libre");
        assert_eq!(
            torrent.hash.as_deref(),
            Some("dd8255ecdc7ca55fb0bbf81323d87062db1f6d1c")
        );
        assert_eq!(torrent.themoviedb_id, Some(10378));
        assert!(torrent.is_resolved());
    }

    #[tokio::test]
    async fn test_search_requires_content() {
        let provider = LibreProvider::new();
        let result = provider.search(&TorrentQuery::default()).await.unwrap();
        assert!(matches!(
            result.as_error(),
            Some(crate::search::ProviderFailure::InvalidQueryError { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_applies_limit() {
        let provider = LibreProvider::new();
        // "n" appears in three titles
        let query = TorrentQuery::builder().content("n").limit(2).build();
        let result = provider.search(&query).await.unwrap();
        assert_eq!(result.as_success().unwrap().torrents.len(), 2);
    }

    #[test]
    fn test_categories() {
        let provider = LibreProvider::new();
        assert!(provider.supports_category(Some(Category::Movies)));
        assert!(provider.supports_category(None));
        assert!(!provider.supports_category(Some(Category::Music)));
    }
}
