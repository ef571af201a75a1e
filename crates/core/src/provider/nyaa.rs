//! nyaa.si, scraped from HTML listings. Magnets are present in the listing.

use async_trait::async_trait;
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use tracing::debug;

use super::html::{element_text, parse_count, parse_size, select_text, selector};
use super::{request_failure, ProviderError, ProviderState, TorrentProvider};
use crate::search::{
    Category, ProviderResult, ProviderSuccess, SearchParam, TorrentDescription, TorrentQuery,
};
use crate::transport::HttpTransport;

const BASE_URL: &str = "https://nyaa.si/";
const RESULTS_PER_PAGE: u32 = 75;

pub struct NyaaProvider {
    transport: HttpTransport,
    state: ProviderState,
    categories: HashMap<Category, String>,
    search_params: HashMap<SearchParam, String>,
}

impl NyaaProvider {
    pub const NAME: &'static str = "nyaa";

    pub fn new(transport: HttpTransport) -> Self {
        Self::with_enabled(transport, true)
    }

    pub fn with_enabled(transport: HttpTransport, enabled: bool) -> Self {
        let categories = [
            (Category::All, "0_0"),
            (Category::Audio, "2_0"),
            (Category::Movies, "1_0"),
            (Category::Tv, "1_0"),
            (Category::Games, "6_2"),
            (Category::Music, "2_0"),
            (Category::Apps, "6_1"),
            (Category::Books, "3_0"),
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
                (SearchParam::Category, "c".to_string()),
                (SearchParam::Page, "p".to_string()),
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
        let category = query
            .category
            .and_then(|category| self.categories.get(&category))
            .or_else(|| self.categories.get(&Category::All))
            .cloned()
            .unwrap_or_default();

        Some(vec![
            (self.param(SearchParam::Query), content.to_string()),
            (self.param(SearchParam::Page), query.page.to_string()),
            (self.param(SearchParam::Category), category),
        ])
    }
}

#[async_trait]
impl TorrentProvider for NyaaProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn base_url(&self) -> &str {
        BASE_URL
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

    fn results_per_page(&self) -> u32 {
        RESULTS_PER_PAGE
    }

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn search(&self, query: &TorrentQuery) -> Result<ProviderResult, ProviderError> {
        let Some(params) = self.build_params(query) else {
            return Ok(ProviderResult::invalid_query(
                Self::NAME,
                "nyaa requires a query string",
            ));
        };

        let response = self.transport.get(BASE_URL, &params).await?;
        if !response.is_success() {
            return Ok(request_failure(Self::NAME, response));
        }

        let result = parse_listing(&response.body)?;
        debug!(
            provider = Self::NAME,
            results = result.torrents.len(),
            page = result.page,
            "nyaa search complete"
        );
        Ok(result.into())
    }
}

fn parse_listing(html: &str) -> Result<ProviderSuccess, ProviderError> {
    let document = Html::parse_document(html);
    let row_selector = selector("table.torrent-list tbody tr")?;
    let active_selector = selector("ul.pagination li.active")?;
    let info_selector = selector(".pagination-page-info")?;

    let absolute_base = BASE_URL.trim_end_matches('/');
    let mut torrents = Vec::new();
    for row in document.select(&row_selector) {
        if let Some(torrent) = parse_row(row, absolute_base)? {
            torrents.push(torrent);
        }
    }

    let root = document.root_element();
    let current_page = select_text(root, &active_selector)
        .and_then(|text| parse_count(&text))
        .unwrap_or(1);
    // "Displaying results 1-75 out of 1000 results."
    let total = select_text(root, &info_selector)
        .and_then(|text| total_from_page_info(&text))
        .unwrap_or(torrents.len() as u32);

    Ok(ProviderSuccess::new(NyaaProvider::NAME, torrents).with_page(
        current_page,
        RESULTS_PER_PAGE,
        total,
    ))
}

fn total_from_page_info(text: &str) -> Option<u32> {
    let re = Regex::new(r"out of ([\d,]+)").ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_count(m.as_str()))
}

fn parse_row(
    row: ElementRef<'_>,
    absolute_base: &str,
) -> Result<Option<TorrentDescription>, ProviderError> {
    let name_selector = selector("td:nth-child(2) a:last-child")?;
    let magnet_selector = selector("td:nth-child(3) a[href^=\"magnet:\"]")?;
    let size_selector = selector("td:nth-child(4)")?;
    let seeds_selector = selector("td:nth-child(6)")?;
    let peers_selector = selector("td:nth-child(7)")?;

    let Some(link) = row.select(&name_selector).next() else {
        return Ok(None);
    };
    let Some(magnet_url) = row
        .select(&magnet_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
    else {
        return Ok(None);
    };
    let Some(seeds) = select_text(row, &seeds_selector).and_then(|text| parse_count(&text)) else {
        return Ok(None);
    };
    let peers = select_text(row, &peers_selector)
        .and_then(|text| parse_count(&text))
        .unwrap_or(0);
    let size = select_text(row, &size_selector)
        .and_then(|text| parse_size(&text))
        .unwrap_or(0);

    Ok(Some(TorrentDescription {
        size,
        seeds,
        peers,
        info_url: link
            .value()
            .attr("href")
            .map(|href| format!("{}{}", absolute_base, href)),
        ..TorrentDescription::new(NyaaProvider::NAME, element_text(link)).with_magnet(magnet_url)
    }))
}
