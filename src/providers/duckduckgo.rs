//! Free scraping backend over DuckDuckGo's HTML-only results page.
//!
//! The HTML itself comes from the [`SearchRenderer`] capability; this
//! backend only parses. Selector sets are layered: the page's markup has
//! changed before, so when the primary result selector matches nothing we
//! fall back to progressively looser ones. Links that stay on the
//! engine's own host (ad redirects, internal navigation) are skipped.

use crate::capabilities::SearchRenderer;
use crate::config::{ProviderConfig, ScrapeConfig, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS};
use crate::error::{ProviderError, Result};
use crate::normalize::{self, PartialResult};
use crate::provider::SearchBackend;
use crate::types::{
    PricingInfo, PricingModel, ProviderCategory, ProviderKind, ProviderMetadata, SearchOptions,
    SearchResult,
};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Result-node selectors, tried in order until one matches.
const RESULT_SELECTORS: &[&str] = &[
    ".result.results_links.results_links_deep",
    ".web-result",
    "div.result",
];

/// Link selectors within a result node, tried in order.
const LINK_SELECTORS: &[&str] = &["a.result__a", "a.result__url", "a[href]"];

const SNIPPET_SELECTOR: &str = ".result__snippet";

/// The free HTML-scraping provider. Always valid, always costs nothing.
pub struct DuckDuckGoProvider {
    config: ScrapeConfig,
    renderer: Arc<dyn SearchRenderer>,
}

impl DuckDuckGoProvider {
    pub fn new(config: ScrapeConfig, renderer: Arc<dyn SearchRenderer>) -> Self {
        Self { config, renderer }
    }

    /// Resolve a raw href into an external result URL.
    ///
    /// Protocol-relative hrefs get an `https:` prefix. Redirect wrappers
    /// (`duckduckgo.com/l/?uddg=...`) are unwrapped to their target.
    /// Anything else that stays on the engine's own host, and anything
    /// that does not parse as an absolute URL, yields `None`.
    fn resolve_link(href: &str) -> Option<String> {
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let parsed = Url::parse(&absolute).ok()?;
        let host = parsed.host_str()?;
        if host == "duckduckgo.com" || host.ends_with(".duckduckgo.com") {
            return parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned());
        }
        Some(absolute)
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DuckDuckGo
    }

    async fn execute(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let max_results = options
            .max_results
            .or(self.config.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        tracing::trace!(query, max_results, "DuckDuckGo search");

        let html = self
            .renderer
            .render(query, max_results)
            .await
            .map_err(|e| {
                ProviderError::network(self.kind().tag(), format!("search render failed: {e}"))
            })?;

        tracing::trace!(bytes = html.len(), "search HTML received");

        let results = parse_results(&html, max_results)?;
        if results.is_empty() {
            return Err(ProviderError::no_results(self.kind().tag()));
        }
        Ok(results)
    }

    fn validate_config(&self) -> bool {
        true
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.kind().display_name().to_string(),
            category: ProviderCategory::Free,
            description: "Scrapes DuckDuckGo's HTML results page. No account required.".into(),
            pricing: PricingInfo {
                model: PricingModel::Free,
                free_tier: None,
                paid_tier: None,
                cost_per_search: None,
            },
            features: vec![
                "No API key".into(),
                "No usage limits".into(),
                "Privacy-aligned".into(),
            ],
            limitations: vec![
                "Result quality depends on page markup".into(),
                "No date filtering".into(),
            ],
            setup_instructions: "Works out of the box.".into(),
        }
    }

    fn apply_config(&mut self, patch: &ProviderConfig) {
        let merged = ProviderConfig::DuckDuckGo(self.config.clone()).merge(patch);
        if let ProviderConfig::DuckDuckGo(config) = merged {
            self.config = config;
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Parse a rendered results page into normalized results.
///
/// Separate function so it can be exercised with fixture HTML.
pub(crate) fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let tag = ProviderKind::DuckDuckGo.tag();
    let document = Html::parse_document(html);

    let snippet_sel = Selector::parse(SNIPPET_SELECTOR)
        .map_err(|e| ProviderError::parse(tag, format!("invalid snippet selector: {e:?}")))?;

    let mut partials = Vec::new();
    for &result_selector in RESULT_SELECTORS {
        let result_sel = Selector::parse(result_selector)
            .map_err(|e| ProviderError::parse(tag, format!("invalid result selector: {e:?}")))?;

        let nodes: Vec<ElementRef> = document.select(&result_sel).collect();
        if nodes.is_empty() {
            continue;
        }
        tracing::trace!(selector = result_selector, count = nodes.len(), "result nodes matched");

        for node in nodes {
            let Some((title, url)) = extract_link(node)? else {
                continue;
            };

            let snippet = node
                .select(&snippet_sel)
                .next()
                .map(|el| el.text().collect::<String>());

            partials.push(PartialResult {
                title,
                url,
                snippet,
                published_date: None,
                favicon: None,
            });
            if partials.len() >= max_results {
                break;
            }
        }
        break;
    }

    let results = normalize::normalize_all(partials);
    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}

/// Pull the first usable external link out of a result node, together
/// with its text as a title candidate.
fn extract_link(node: ElementRef) -> Result<Option<(Option<String>, String)>> {
    let tag = ProviderKind::DuckDuckGo.tag();
    for link_selector in LINK_SELECTORS {
        let link_sel = Selector::parse(link_selector)
            .map_err(|e| ProviderError::parse(tag, format!("invalid link selector: {e:?}")))?;

        for anchor in node.select(&link_sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(url) = DuckDuckGoProvider::resolve_link(href) {
                let title = Some(anchor.text().collect::<String>());
                return Ok(Some((title, url)));
            }
        }
    }
    Ok(None)
}
