//! SerpAPI backend.
//!
//! Pay-per-search Google results through SerpAPI's JSON endpoint. The key
//! travels as a query parameter. Account balance is available through a
//! separate introspection endpoint.

use crate::capabilities::{HttpProxy, ProxyRequest};
use crate::config::{ProviderConfig, SerpApiConfig, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS};
use crate::error::{ProviderError, Result};
use crate::normalize::{self, PartialResult};
use crate::provider::SearchBackend;
use crate::providers::classify_api_error;
use crate::types::{
    ApiUsageData, DateRange, PricingInfo, PricingModel, ProviderCategory, ProviderKind,
    ProviderMetadata, QuotaDescriptor, QuotaPeriod, SearchOptions, SearchResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";
const ACCOUNT_ENDPOINT: &str = "https://serpapi.com/account.json";

const COST_PER_SEARCH: f64 = 0.015;

/// SerpAPI backend.
pub struct SerpApiProvider {
    config: SerpApiConfig,
    http: Arc<dyn HttpProxy>,
}

impl SerpApiProvider {
    pub fn new(config: SerpApiConfig, http: Arc<dyn HttpProxy>) -> Self {
        Self { config, http }
    }

    fn build_url(&self, key: &str, query: &str, options: &SearchOptions) -> Result<String> {
        let max_results = options
            .max_results
            .or(self.config.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let mut url = Url::parse(SEARCH_ENDPOINT)
            .map_err(|e| ProviderError::parse(self.kind().tag(), format!("bad endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api_key", key)
            .append_pair("engine", "google")
            .append_pair("q", query)
            .append_pair("num", &max_results.to_string());

        if let Some(range) = options.date_range {
            let qdr = match range {
                DateRange::Day => "d",
                DateRange::Week => "w",
                DateRange::Month => "m",
                DateRange::Year => "y",
            };
            url.query_pairs_mut().append_pair("as_qdr", qdr);
        }
        Ok(url.into())
    }
}

#[async_trait]
impl SearchBackend for SerpApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SerpApi
    }

    async fn execute(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let tag = self.kind().tag();
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::configuration(tag, "missing API key"))?;

        tracing::trace!(query, "SerpAPI request");

        let url = self.build_url(key, query, options)?;
        let body = self
            .http
            .fetch(ProxyRequest::get(url))
            .await
            .map_err(|e| ProviderError::network(tag, format!("request failed: {e}")))?;

        parse_response(&body)
    }

    fn validate_config(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.kind().display_name().to_string(),
            category: ProviderCategory::Paid,
            description: "Google results proxied through SerpAPI.".into(),
            pricing: PricingInfo {
                model: PricingModel::Subscription,
                free_tier: Some(QuotaDescriptor {
                    searches: 100,
                    period: QuotaPeriod::Month,
                }),
                paid_tier: Some(QuotaDescriptor {
                    searches: 5000,
                    period: QuotaPeriod::Month,
                }),
                cost_per_search: Some(COST_PER_SEARCH),
            },
            features: vec![
                "Full Google result pages".into(),
                "Date restriction".into(),
                "Account balance introspection".into(),
            ],
            limitations: vec!["Monthly search quota".into()],
            setup_instructions: "Create a SerpAPI account and paste the API key here.".into(),
        }
    }

    fn apply_config(&mut self, patch: &ProviderConfig) {
        let merged = ProviderConfig::SerpApi(self.config.clone()).merge(patch);
        if let ProviderConfig::SerpApi(config) = merged {
            self.config = config;
        }
    }

    fn cost_per_search(&self) -> f64 {
        COST_PER_SEARCH
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    async fn api_usage(&self) -> Option<ApiUsageData> {
        let key = self.config.api_key.as_deref().filter(|k| !k.is_empty())?;

        let mut url = Url::parse(ACCOUNT_ENDPOINT).ok()?;
        url.query_pairs_mut().append_pair("api_key", key);

        let body = match self.http.fetch(ProxyRequest::get(String::from(url))).await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(error = %err, "SerpAPI account lookup failed");
                return None;
            }
        };
        parse_account(&body)
    }
}

/// Parse a SerpAPI search body into normalized results.
pub(crate) fn parse_response(body: &str) -> Result<Vec<SearchResult>> {
    let tag = ProviderKind::SerpApi.tag();
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(tag, format!("invalid JSON response: {e}")))?;

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(classify_api_error(tag, error));
    }

    let organic = value
        .get("organic_results")
        .and_then(|r| r.as_array())
        .filter(|results| !results.is_empty())
        .ok_or_else(|| ProviderError::no_results(tag))?;

    let partials: Vec<PartialResult> = organic
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
                published_date: item.get("date").and_then(|d| d.as_str()).map(str::to_string),
                favicon: item
                    .get("favicon")
                    .and_then(|f| f.as_str())
                    .map(str::to_string),
            })
        })
        .collect();

    if partials.is_empty() {
        return Err(ProviderError::no_results(tag));
    }
    Ok(normalize::normalize_all(partials))
}

/// Parse the account-introspection body into a usage snapshot.
fn parse_account(body: &str) -> Option<ApiUsageData> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let used = value.get("this_month_usage").and_then(|u| u.as_u64())?;
    Some(ApiUsageData {
        used,
        limit: value.get("searches_per_month").and_then(|l| l.as_u64()),
        remaining: value.get("total_searches_left").and_then(|r| r.as_u64()),
        reset_date: None,
        period: QuotaPeriod::Month,
    })
}
