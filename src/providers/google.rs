//! Google Custom Search JSON API backend.
//!
//! Pay-per-search. Needs an API key and a Custom Search Engine id; both
//! travel as query parameters, so the single GET goes through the
//! [`HttpProxy`] capability unchanged.

use crate::capabilities::{HttpProxy, ProxyRequest};
use crate::config::{GoogleConfig, ProviderConfig, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS};
use crate::error::{ProviderError, Result};
use crate::normalize::{self, PartialResult};
use crate::provider::SearchBackend;
use crate::providers::classify_api_error;
use crate::types::{
    DateRange, PricingInfo, PricingModel, ProviderCategory, ProviderKind, ProviderMetadata,
    QuotaDescriptor, QuotaPeriod, SearchOptions, SearchResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// The API returns at most 10 results per request.
const API_MAX_RESULTS: usize = 10;

const COST_PER_SEARCH: f64 = 0.005;

/// Google Custom Search backend.
pub struct GoogleProvider {
    config: GoogleConfig,
    http: Arc<dyn HttpProxy>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig, http: Arc<dyn HttpProxy>) -> Self {
        Self { config, http }
    }

    fn build_url(&self, key: &str, cx: &str, query: &str, options: &SearchOptions) -> Result<String> {
        let max_results = options
            .max_results
            .or(self.config.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .min(API_MAX_RESULTS);

        let mut url = Url::parse(ENDPOINT)
            .map_err(|e| ProviderError::parse(self.kind().tag(), format!("bad endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("cx", cx)
            .append_pair("q", query)
            .append_pair("num", &max_results.to_string());

        if let Some(range) = options.date_range {
            let restrict = match range {
                DateRange::Day => "d1",
                DateRange::Week => "w1",
                DateRange::Month => "m1",
                DateRange::Year => "y1",
            };
            url.query_pairs_mut().append_pair("dateRestrict", restrict);
        }
        Ok(url.into())
    }
}

#[async_trait]
impl SearchBackend for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn execute(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let tag = self.kind().tag();
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::configuration(tag, "missing API key"))?;
        let cx = self
            .config
            .search_engine_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::configuration(tag, "missing search engine id"))?;

        tracing::trace!(query, "Google Custom Search request");

        let url = self.build_url(key, cx, query, options)?;
        let body = self
            .http
            .fetch(ProxyRequest::get(url))
            .await
            .map_err(|e| ProviderError::network(tag, format!("request failed: {e}")))?;

        parse_response(&body)
    }

    fn validate_config(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self
                .config
                .search_engine_id
                .as_deref()
                .is_some_and(|c| !c.is_empty())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.kind().display_name().to_string(),
            category: ProviderCategory::Paid,
            description: "Google results through the Custom Search JSON API.".into(),
            pricing: PricingInfo {
                model: PricingModel::PayPerUse,
                free_tier: Some(QuotaDescriptor {
                    searches: 100,
                    period: QuotaPeriod::Day,
                }),
                paid_tier: None,
                cost_per_search: Some(COST_PER_SEARCH),
            },
            features: vec![
                "Google index quality".into(),
                "Date restriction".into(),
                "Site-scoped engines".into(),
            ],
            limitations: vec![
                "10 results per request".into(),
                "Requires API key and engine id".into(),
            ],
            setup_instructions:
                "Create an API key in Google Cloud Console and a Programmable Search Engine id, then enter both here."
                    .into(),
        }
    }

    fn apply_config(&mut self, patch: &ProviderConfig) {
        let merged = ProviderConfig::Google(self.config.clone()).merge(patch);
        if let ProviderConfig::Google(config) = merged {
            self.config = config;
        }
    }

    fn cost_per_search(&self) -> f64 {
        COST_PER_SEARCH
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Parse a Custom Search JSON body into normalized results.
pub(crate) fn parse_response(body: &str) -> Result<Vec<SearchResult>> {
    let tag = ProviderKind::Google.tag();
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(tag, format!("invalid JSON response: {e}")))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .unwrap_or("unspecified API error");
        return Err(classify_api_error(tag, message));
    }

    let items = value
        .get("items")
        .and_then(|i| i.as_array())
        .filter(|items| !items.is_empty())
        .ok_or_else(|| ProviderError::no_results(tag))?;

    let partials: Vec<PartialResult> = items
        .iter()
        .filter_map(|item| {
            let url = item.get("link").and_then(|l| l.as_str())?;
            Some(PartialResult {
                title: item.get("title").and_then(|t| t.as_str()).map(str::to_string),
                url: url.to_string(),
                snippet: item
                    .get("snippet")
                    .and_then(|s| s.as_str())
                    .map(str::to_string),
                published_date: item
                    .pointer("/pagemap/metatags/0/article:published_time")
                    .and_then(|d| d.as_str())
                    .map(str::to_string),
                favicon: None,
            })
        })
        .collect();

    if partials.is_empty() {
        return Err(ProviderError::no_results(tag));
    }
    Ok(normalize::normalize_all(partials))
}
