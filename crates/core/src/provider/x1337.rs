//! 1337x, scraped from HTML listings.
//!
//! Listings carry no magnet links, so results come back unresolved and
//! `resolve` visits each torrent's detail page.

use async_trait::async_trait;
use futures::future::join_all;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::html::{element_text, parse_count, parse_size, select_text, selector};
use super::{request_failure, ProviderError, ProviderState, TorrentProvider};
use crate::search::{
    hash_from_magnet_url, Category, ProviderResult, ProviderSuccess, ResolveFailure,
    ResolveResult, SearchParam, TorrentDescription, TorrentQuery,
};
use crate::transport::{HttpResponse, HttpTransport, TransportError};

const BASE_URL: &str = "https://1337x.to/";
const SEARCH_PATH: &str = "search";
const CATEGORY_SEARCH_PATH: &str = "category-search";

pub struct X1337Provider {
    transport: HttpTransport,
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
}

impl X1337Provider {
    pub const NAME: &'static str = "1337x";

    pub fn new(transport: HttpTransport) -> Self {
        Self::with_enabled(transport, true)
    }

    pub fn with_enabled(transport: HttpTransport, enabled: bool) -> Self {
        let categories = [
            (Category::All, ""),
            (Category::Tv, "TV"),
            (Category::Movies, "Movies"),
            (Category::Games, "Games"),
            (Category::Music, "Music"),
            (Category::Apps, "Apps"),
            (Category::Xxx, "XXX"),
        ]
        .into_iter()
        .map(|(category, path)| (category, path.to_string()))
        .collect();

        Self {
            transport,
            state: ProviderState::new(enabled),
            categories,
            search_params: HashMap::new(),
        }
    }

    fn build_url(&self, query: &TorrentQuery) -> Option<String> {
        let content = urlencoding::encode(query.search_text()?);
        let category = query
            .category
            .and_then(|category| self.categories.get(&category))
            .filter(|path| !path.is_empty());

        Some(match category {
            Some(path) => format!(
                "{}{}/{}/{}/{}/",
                BASE_URL, CATEGORY_SEARCH_PATH, content, path, query.page
            ),
            None => format!("{}{}/{}/{}/", BASE_URL, SEARCH_PATH, content, query.page),
        })
    }

    /// GET a page, sending any cookies stored with the credentials.
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        match self.state.cookie_header() {
            Some(cookies) => {
                self.transport
                    .get_with_headers(url, &[], &[("Cookie", cookies.as_str())])
                    .await
            }
            None => self.transport.get(url, &[]).await,
        }
    }

    async fn resolve_one(
        &self,
        torrent: &TorrentDescription,
    ) -> Result<TorrentDescription, (Option<u16>, String)> {
        let Some(info_url) = torrent.info_url.as_deref() else {
            return Err((None, format!("{} has no info url", torrent.title)));
        };

        let response = self
            .fetch(info_url)
            .await
            .map_err(|e| (None, e.to_string()))?;
        if !response.is_success() {
            let message = format!("{} returned HTTP {}", info_url, response.status);
            return Err((Some(response.status), message));
        }

        let (magnet_url, hash) =
            parse_detail(&response.body).map_err(|e| (Some(response.status), e.to_string()))?;
        let Some(magnet_url) = magnet_url else {
            let message = format!("{} has no magnet link", info_url);
            return Err((Some(response.status), message));
        };

        let hash = hash.or_else(|| hash_from_magnet_url(&magnet_url));
        Ok(TorrentDescription {
            magnet_url: Some(magnet_url),
            hash,
            ..torrent.clone()
        })
    }
}

#[async_trait]
impl TorrentProvider for X1337Provider {
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
        let Some(url) = self.build_url(query) else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "1337x requires a query string",
            ));
        };

        let response = self.fetch(&url).await?;
        if !response.is_success() {
            return Ok(request_failure(Self::NAME, response));
        }

        let result = parse_listing(&response.body)?;
        debug!(
            provider = Self::NAME,
            results = result.torrents.len(),
            page = result.page,
            "1337x search complete"
        );
        Ok(result.into())
    }

    async fn resolve(
        &self,
        torrents: &[TorrentDescription],
    ) -> Result<ResolveResult, ProviderError> {
        let outcomes = join_all(torrents.iter().map(|torrent| self.resolve_one(torrent))).await;

        let mut resolved = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(torrent) => resolved.push(torrent),
                Err(failure) => failures.push(failure),
            }
        }

        let Some((http_status, first_message)) = failures.first().cloned() else {
            return Ok(ResolveResult::success(Self::NAME, resolved));
        };
        warn!(
            provider = Self::NAME,
            failed = failures.len(),
            total = torrents.len(),
            error = %first_message,
            "Failed to resolve some torrents"
        );
        Ok(ResolveResult::Error(ResolveFailure::RequestError {
            provider_name: Self::NAME.to_string(),
            torrents: resolved,
            http_status,
            body: None,
            message: format!(
                "Failed to resolve {} of {} torrents: {}",
                failures.len(),
                torrents.len(),
                first_message
            ),
        }))
    }
}

fn parse_listing(html: &str) -> Result<ProviderSuccess, ProviderError> {
    let document = Html::parse_document(html);
    let row_selector = selector("table.table-list tbody tr")?;
    let pagination_selector = selector(".box-info-detail .pagination")?;
    let active_selector = selector("ul li.active")?;
    let last_selector = selector("ul li.last a")?;

    let absolute_base = BASE_URL.trim_end_matches('/');
    let mut torrents = Vec::new();
    for row in document.select(&row_selector) {
        if let Some(torrent) = parse_row(row, absolute_base)? {
            torrents.push(torrent);
        }
    }

    let pagination = document.select(&pagination_selector).next();
    let current_page = pagination
        .and_then(|p| select_text(p, &active_selector))
        .and_then(|text| parse_count(&text))
        .unwrap_or(1);
    let page_count = pagination
        .and_then(|p| p.select(&last_selector).next())
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| href.trim_matches('/').rsplit('/').next())
        .and_then(|last| last.parse::<u32>().ok())
        .unwrap_or(1);

    let count = torrents.len() as u32;
    Ok(ProviderSuccess::new(X1337Provider::NAME, torrents)
        .with_page(current_page, count, count.saturating_mul(page_count))
        .requiring_resolution())
}

fn parse_row(
    row: ElementRef<'_>,
    absolute_base: &str,
) -> Result<Option<TorrentDescription>, ProviderError> {
    let name_selector = selector("td.name a[href*=\"/torrent/\"]")?;
    let seeds_selector = selector("td.seeds")?;
    let leeches_selector = selector("td.leeches")?;
    let size_selector = selector("td.size")?;

    let Some(link) = row.select(&name_selector).next() else {
        return Ok(None);
    };
    let Some(seeds) = select_text(row, &seeds_selector).and_then(|text| parse_count(&text)) else {
        return Ok(None);
    };
    let peers = select_text(row, &leeches_selector)
        .and_then(|text| parse_count(&text))
        .unwrap_or(0);
    // the size cell repeats the seed count in a nested span
    let size = row
        .select(&size_selector)
        .next()
        .and_then(|cell| cell.text().next())
        .and_then(parse_size)
        .unwrap_or(0);

    Ok(Some(TorrentDescription {
        size,
        seeds,
        peers,
        info_url: link
            .value()
            .attr("href")
            .map(|href| format!("{}{}", absolute_base, href)),
        ..TorrentDescription::new(X1337Provider::NAME, element_text(link))
    }))
}

/// Magnet link and info hash from a torrent detail page.
fn parse_detail(html: &str) -> Result<(Option<String>, Option<String>), ProviderError> {
    let document = Html::parse_document(html);
    let magnet_selector = selector("a[href^=\"magnet:\"]")?;
    let hash_selector = selector(".infohash-box p span")?;

    let magnet_url = document
        .select(&magnet_selector)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string);
    let hash = document
        .select(&hash_selector)
        .next()
        .map(element_text)
        .filter(|hash| !hash.is_empty());
    Ok((magnet_url, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
    <html><body>
    <table class="table-list table table-responsive table-striped">
      <thead><tr><th class="coll-1 name">name</th></tr></thead>
      <tbody>
        <tr>
          <td class="coll-1 name">
            <a href="/sub/42/0/" class="icon"><i class="flaticon-hd"></i></a>
            <a href="/torrent/1001/Big-Buck-Bunny-1080p/">Big Buck Bunny 1080p</a>
          </td>
          <td class="coll-2 seeds">1,204</td>
          <td class="coll-3 leeches">37</td>
          <td class="coll-date">Oct. 1st '21</td>
          <td class="coll-4 size mob-uploader">1.5 GB<span class="seeds">1204</span></td>
        </tr>
        <tr>
          <td class="coll-1 name">
            <a href="/torrent/1002/Big-Buck-Bunny-720p/">Big Buck Bunny 720p</a>
          </td>
          <td class="coll-2 seeds">88</td>
          <td class="coll-3 leeches">4</td>
          <td class="coll-4 size">700 MB<span class="seeds">88</span></td>
        </tr>
        <tr><td class="coll-1 name">advert</td></tr>
      </tbody>
    </table>
    <div class="box-info-detail"><div class="pagination"><ul>
      <li class="active"><a href="/search/big+buck+bunny/1/">1</a></li>
      <li><a href="/search/big+buck+bunny/2/">2</a></li>
      <li class="last"><a href="/search/big+buck+bunny/5/">Last</a></li>
    </ul></div></div>
    </body></html>"#;

    const DETAIL: &str = r#"
    <html><body>
      <ul><li><a class="torrentdown1" href="magnet:?xt=urn:btih:DD8255ECDC7CA55FB0BBF81323D87062DB1F6D1C&dn=Big+Buck+Bunny">Magnet Download</a></li></ul>
      <div class="infohash-box"><p><strong>Infohash :</strong> <span>DD8255ECDC7CA55FB0BBF81323D87062DB1F6D1C</span></p></div>
    </body></html>"#;

    fn provider() -> X1337Provider {
        X1337Provider::new(HttpTransport::with_defaults().unwrap())
    }

    #[test]
    fn test_build_url() {
        let provider = provider();
        let query = TorrentQuery::builder().content("big buck bunny").page(2).build();
        assert_eq!(
            provider.build_url(&query).unwrap(),
            "https://1337x.to/search/big%20buck%20bunny/2/"
        );
    }

    #[test]
    fn test_build_url_with_category() {
        let provider = provider();
        let query = TorrentQuery::builder()
            .content("sintel")
            .category(Category::Movies)
            .build();
        assert_eq!(
            provider.build_url(&query).unwrap(),
            "https://1337x.to/category-search/sintel/Movies/1/"
        );
    }

    #[test]
    fn test_build_url_requires_content() {
        let query = TorrentQuery::builder().imdb_id("tt1254207").build();
        assert!(provider().build_url(&query).is_none());
    }

    #[test]
    fn test_parse_listing() {
        let success = parse_listing(LISTING).unwrap();

        assert_eq!(success.torrents.len(), 2);
        assert!(success.requires_resolution);
        assert_eq!(success.page, 1);
        assert_eq!(success.page_size, 2);
        assert_eq!(success.total_torrents, 10);
        assert!(success.has_more_results());

        let first = &success.torrents[0];
        assert_eq!(first.title, "Big Buck Bunny 1080p");
        assert_eq!(first.seeds, 1204);
        assert_eq!(first.peers, 37);
        assert_eq!(first.size, 1_610_612_736);
        assert_eq!(
            first.info_url.as_deref(),
            Some("https://1337x.to/torrent/1001/Big-Buck-Bunny-1080p/")
        );
        assert!(!first.is_resolved());
    }

    #[test]
    fn test_parse_listing_without_pagination() {
        let success = parse_listing("<html><body><p>No results were returned.</p></body></html>")
            .unwrap();
        assert!(success.torrents.is_empty());
        assert!(!success.has_more_results());
    }

    #[test]
    fn test_parse_detail() {
        let (magnet, hash) = parse_detail(DETAIL).unwrap();
        assert!(magnet.unwrap().starts_with("magnet:?xt=urn:btih:DD8255"));
        assert_eq!(
            hash.as_deref(),
            Some("DD8255ECDC7CA55FB0BBF81323D87062DB1F6D1C")
        );
    }

    #[tokio::test]
    async fn test_resolve_without_info_url_is_partial_failure() {
        let torrent = TorrentDescription::new(X1337Provider::NAME, "orphan");
        let result = provider().resolve(&[torrent]).await.unwrap();

        match result {
            ResolveResult::Error(ResolveFailure::RequestError { torrents, message, .. }) => {
                assert!(torrents.is_empty());
                assert!(message.contains("1 of 1"));
            }
            other => panic!("expected request error, got {:?}", other),
        }
    }
}
