//! Helpers shared by the HTML scraping providers.

use scraper::{ElementRef, Selector};

use super::ProviderError;

/// Parse a CSS selector, mapping failures to `ProviderError::Parse`.
pub fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse(format!("selector {}: {}", css, e)))
}

/// Parse a human readable size ("1.4 GiB", "700 MB", "1,024 KB") into bytes.
pub fn parse_size(size: &str) -> Option<u64> {
    let normalized = size.trim().to_uppercase();
    let mut parts = normalized.split_whitespace();
    let value: f64 = parts.next()?.replace(',', "").parse().ok()?;
    let multiplier: f64 = match parts.next()? {
        "B" | "BYTES" => 1.0,
        "KB" | "KIB" => 1024.0,
        "MB" | "MIB" => 1024.0 * 1024.0,
        "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TIB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier) as u64)
}

/// Whitespace-normalized text of an element and its descendants.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching `selector` below `element`.
pub fn select_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(element_text)
}

/// Parse the first whitespace separated token of `text` as a number.
pub fn parse_count(text: &str) -> Option<u32> {
    text.split_whitespace()
        .next()?
        .replace(',', "")
        .parse()
        .ok()
}
