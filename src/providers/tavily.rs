//! Tavily search API backend.
//!
//! The only POST-based backend: the key and every parameter travel in a
//! JSON body. Request construction and response parsing are shared with
//! the shared-credential variant.

use crate::capabilities::{HttpProxy, ProxyRequest};
use crate::config::{ProviderConfig, TavilyConfig, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS};
use crate::error::{ProviderError, Result};
use crate::normalize::{self, PartialResult};
use crate::provider::SearchBackend;
use crate::providers::classify_api_error;
use crate::types::{
    ApiUsageData, DateRange, PricingInfo, PricingModel, ProviderCategory, ProviderKind,
    ProviderMetadata, QuotaDescriptor, QuotaPeriod, SearchOptions, SearchResult,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";
const ACCOUNT_ENDPOINT: &str = "https://api.tavily.com/account";

const COST_PER_SEARCH: f64 = 0.008;

/// Tavily backend with a user-supplied key.
pub struct TavilyProvider {
    config: TavilyConfig,
    http: Arc<dyn HttpProxy>,
}

impl TavilyProvider {
    pub fn new(config: TavilyConfig, http: Arc<dyn HttpProxy>) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl SearchBackend for TavilyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tavily
    }

    async fn execute(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let tag = self.kind().tag();
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::configuration(tag, "missing API key"))?;

        tracing::trace!(query, "Tavily request");

        let max_results = options
            .max_results
            .or(self.config.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        let body = build_search_body(
            key,
            query,
            max_results,
            self.config.search_depth.as_deref(),
            options.date_range,
        );

        let response = self
            .http
            .fetch(ProxyRequest::post(SEARCH_ENDPOINT, body))
            .await
            .map_err(|e| ProviderError::network(tag, format!("request failed: {e}")))?;

        parse_search_response(tag, &response)
    }

    fn validate_config(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.kind().display_name().to_string(),
            category: ProviderCategory::Paid,
            description: "Search API built for LLM applications, with content snippets.".into(),
            pricing: PricingInfo {
                model: PricingModel::PayPerUse,
                free_tier: Some(QuotaDescriptor {
                    searches: 1000,
                    period: QuotaPeriod::Month,
                }),
                paid_tier: None,
                cost_per_search: Some(COST_PER_SEARCH),
            },
            features: vec![
                "Content-rich snippets".into(),
                "Date restriction".into(),
                "Basic and advanced search depth".into(),
            ],
            limitations: vec!["Smaller index than general-purpose engines".into()],
            setup_instructions: "Create a Tavily account and paste the API key here.".into(),
        }
    }

    fn apply_config(&mut self, patch: &ProviderConfig) {
        let merged = ProviderConfig::Tavily(self.config.clone()).merge(patch);
        if let ProviderConfig::Tavily(config) = merged {
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
        fetch_account_usage(self.http.as_ref(), key).await
    }
}

/// Build the Tavily search request body.
pub(crate) fn build_search_body(
    key: &str,
    query: &str,
    max_results: usize,
    search_depth: Option<&str>,
    date_range: Option<DateRange>,
) -> serde_json::Value {
    let depth = match search_depth.map(str::trim) {
        Some(d) if d.eq_ignore_ascii_case("advanced") => "advanced",
        Some(d) if !d.is_empty() && !d.eq_ignore_ascii_case("basic") => {
            tracing::warn!(depth = d, "unsupported search depth, using basic");
            "basic"
        }
        _ => "basic",
    };

    let mut body = json!({
        "api_key": key,
        "query": query,
        "max_results": max_results,
        "search_depth": depth,
    });
    if let Some(range) = date_range {
        let token = match range {
            DateRange::Day => "day",
            DateRange::Week => "week",
            DateRange::Month => "month",
            DateRange::Year => "year",
        };
        body["time_range"] = json!(token);
    }
    body
}

/// Parse a Tavily search body into normalized results.
///
/// Takes the provider tag so the shared-credential variant reports errors
/// under its own name.
pub(crate) fn parse_search_response(tag: &str, body: &str) -> Result<Vec<SearchResult>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(tag, format!("invalid JSON response: {e}")))?;

    let error_message = value
        .get("error")
        .and_then(|e| e.as_str())
        .or_else(|| value.pointer("/detail/error").and_then(|e| e.as_str()));
    if let Some(message) = error_message {
        return Err(classify_api_error(tag, message));
    }

    let results = value
        .get("results")
        .and_then(|r| r.as_array())
        .filter(|results| !results.is_empty())
        .ok_or_else(|| ProviderError::no_results(tag))?;

    let partials: Vec<PartialResult> = results
        .iter()
        .filter_map(|item| {
            let url = item.get("url").and_then(|u| u.as_str())?;
            Some(PartialResult {
                title: item.get("title").and_then(|t| t.as_str()).map(str::to_string),
                url: url.to_string(),
                snippet: item
                    .get("content")
                    .and_then(|c| c.as_str())
                    .map(str::to_string),
                published_date: item
                    .get("published_date")
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

/// Best-effort account-balance lookup, shared with the shared-credential
/// variant. Any failure resolves to `None`.
pub(crate) async fn fetch_account_usage(http: &dyn HttpProxy, key: &str) -> Option<ApiUsageData> {
    let body = match http
        .fetch(ProxyRequest::post(ACCOUNT_ENDPOINT, json!({"api_key": key})))
        .await
    {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(error = %err, "Tavily account lookup failed");
            return None;
        }
    };

    let value: serde_json::Value = serde_json::from_str(&body).ok()?;
    let usage = value
        .pointer("/key/usage")
        .or_else(|| value.get("usage"))
        .and_then(|u| u.as_u64())?;
    let limit = value
        .pointer("/key/limit")
        .or_else(|| value.get("limit"))
        .and_then(|l| l.as_u64());
    Some(ApiUsageData {
        used: usage,
        limit,
        remaining: limit.map(|l| l.saturating_sub(usage)),
        reset_date: None,
        period: QuotaPeriod::Month,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityError;
    use crate::error::ErrorKind;

    struct FixedProxy(String);

    #[async_trait]
    impl HttpProxy for FixedProxy {
        async fn fetch(&self, _request: ProxyRequest) -> std::result::Result<String, CapabilityError> {
            Ok(self.0.clone())
        }
    }

    struct CapturingProxy(std::sync::Mutex<Vec<ProxyRequest>>, String);

    #[async_trait]
    impl HttpProxy for CapturingProxy {
        async fn fetch(&self, request: ProxyRequest) -> std::result::Result<String, CapabilityError> {
            self.0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(request);
            Ok(self.1.clone())
        }
    }

    fn configured(body: &str) -> TavilyProvider {
        TavilyProvider::new(
            TavilyConfig {
                api_key: Some("tvly-key".into()),
                ..Default::default()
            },
            Arc::new(FixedProxy(body.to_string())),
        )
    }

    const OK_BODY: &str = r#"{
        "results": [
            {"title": "Serde", "url": "https://serde.rs/", "content": "Serialization framework.", "published_date": "2024-05-01"},
            {"title": "Serde JSON", "url": "https://docs.rs/serde_json", "content": "JSON support."}
        ]
    }"#;

    #[tokio::test]
    async fn parses_results_with_content_as_snippet() {
        let provider = configured(OK_BODY);
        let results = provider
            .execute("serde", &SearchOptions::default())
            .await
            .expect("search should succeed");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].snippet, "Serialization framework.");
        assert_eq!(results[0].published_date.as_deref(), Some("2024-05-01"));
        assert_eq!(results[1].rank, 2);
    }

    #[tokio::test]
    async fn request_is_post_with_json_body() {
        let proxy = Arc::new(CapturingProxy(
            std::sync::Mutex::new(vec![]),
            OK_BODY.to_string(),
        ));
        let provider = TavilyProvider::new(
            TavilyConfig {
                api_key: Some("tvly-key".into()),
                search_depth: Some("advanced".into()),
                ..Default::default()
            },
            proxy.clone(),
        );
        let options = SearchOptions {
            max_results: Some(4),
            date_range: Some(DateRange::Month),
            ..Default::default()
        };
        provider.execute("serde derive", &options).await.expect("search");

        let requests = proxy.0.lock().expect("lock").clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, SEARCH_ENDPOINT);
        let body = requests[0].body.as_ref().expect("body present");
        assert_eq!(body["api_key"], "tvly-key");
        assert_eq!(body["query"], "serde derive");
        assert_eq!(body["max_results"], 4);
        assert_eq!(body["search_depth"], "advanced");
        assert_eq!(body["time_range"], "month");
    }

    #[test]
    fn unsupported_depth_falls_back_to_basic() {
        let body = build_search_body("k", "q", 5, Some("exhaustive"), None);
        assert_eq!(body["search_depth"], "basic");
        let body = build_search_body("k", "q", 5, None, None);
        assert_eq!(body["search_depth"], "basic");
    }

    #[tokio::test]
    async fn auth_error_detected() {
        let provider = configured(r#"{"error": "Unauthorized: invalid API key"}"#);
        let err = provider
            .execute("q", &SearchOptions::default())
            .await
            .expect_err("should fail");
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn nested_detail_error_detected() {
        let provider = configured(r#"{"detail": {"error": "403 Forbidden"}}"#);
        let err = provider
            .execute("q", &SearchOptions::default())
            .await
            .expect_err("should fail");
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn empty_results_is_no_results() {
        let provider = configured(r#"{"results": []}"#);
        let err = provider
            .execute("q", &SearchOptions::default())
            .await
            .expect_err("should fail");
        assert_eq!(err.kind, ErrorKind::NoResults);
    }

    #[tokio::test]
    async fn account_usage_parsed_from_key_object() {
        let provider = configured(r#"{"key": {"usage": 120, "limit": 1000}}"#);
        let usage = provider.api_usage().await.expect("usage available");
        assert_eq!(usage.used, 120);
        assert_eq!(usage.limit, Some(1000));
        assert_eq!(usage.remaining, Some(880));
    }

    #[tokio::test]
    async fn account_usage_tolerates_failure() {
        struct FailingProxy;

        #[async_trait]
        impl HttpProxy for FailingProxy {
            async fn fetch(&self, _request: ProxyRequest) -> std::result::Result<String, CapabilityError> {
                Err(CapabilityError("offline".into()))
            }
        }

        let provider = TavilyProvider::new(
            TavilyConfig {
                api_key: Some("k".into()),
                ..Default::default()
            },
            Arc::new(FailingProxy),
        );
        assert!(provider.api_usage().await.is_none());
    }

    #[test]
    fn validate_requires_key() {
        let proxy: Arc<dyn HttpProxy> = Arc::new(FixedProxy(String::new()));
        assert!(!TavilyProvider::new(TavilyConfig::default(), proxy.clone()).validate_config());
        assert!(TavilyProvider::new(
            TavilyConfig {
                api_key: Some("k".into()),
                ..Default::default()
            },
            proxy
        )
        .validate_config());
    }
}
