//! Normalization of provider-specific partial results into canonical
//! [`SearchResult`] values.
//!
//! Providers hand over whatever fields their backend returned; this module
//! fills the gaps, derives the domain, synthesizes a favicon URL, and
//! assigns the 1-based rank. Local malformations (missing snippet,
//! unparsable published date) degrade silently instead of failing the
//! whole search.

use crate::types::SearchResult;
use chrono::NaiveDate;
use url::Url;

/// Title used when the backend returned none.
const UNTITLED: &str = "Untitled";

/// Favicon service template, keyed on the result's domain.
const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons?sz=32&domain=";

/// A raw result as extracted from a backend response, before normalization.
#[derive(Debug, Clone, Default)]
pub struct PartialResult {
    pub title: Option<String>,
    pub url: String,
    pub snippet: Option<String>,
    pub published_date: Option<String>,
    pub favicon: Option<String>,
}

impl PartialResult {
    /// Start a partial result from its URL, the only required field.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Convert one partial result into a canonical [`SearchResult`] at the
/// given 1-based rank.
pub fn normalize(partial: PartialResult, rank: usize) -> SearchResult {
    let domain = domain_of(&partial.url);
    let favicon = partial
        .favicon
        .filter(|f| !f.is_empty())
        .or_else(|| Some(format!("{FAVICON_SERVICE}{domain}")));

    SearchResult {
        title: partial
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        url: partial.url,
        snippet: partial
            .snippet
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        domain,
        published_date: partial.published_date.as_deref().and_then(validate_date),
        favicon,
        rank,
    }
}

/// Normalize a batch in order, assigning ranks `1..=N`.
pub fn normalize_all(partials: Vec<PartialResult>) -> Vec<SearchResult> {
    partials
        .into_iter()
        .enumerate()
        .map(|(index, partial)| normalize(partial, index + 1))
        .collect()
}

/// Extract the host component of a URL. Returns an empty string when the
/// URL does not parse, never an error.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Keep a published-date string only if it parses as RFC 3339 or a plain
/// `YYYY-MM-DD` date.
fn validate_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parses = chrono::DateTime::parse_from_rfc3339(trimmed).is_ok()
        || NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok();
    parses.then(|| trimmed.to_string())
}
