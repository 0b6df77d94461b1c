//! Tavily with a build-time shared credential and a client-local monthly
//! allowance.
//!
//! Request and parse logic is identical to the keyed Tavily backend. On
//! top of it: the credential is compiled in rather than user-supplied, and
//! a per-installation usage record gates every search before any network
//! traffic. The local counter only moves after a verified-successful
//! response, so failed searches never consume allowance.
//!
//! The local counter is never reconciled against the remote account
//! balance; installations sharing the credential drift independently.

use crate::capabilities::{HttpProxy, ProxyRequest};
use crate::config::{ProviderConfig, SharedConfig, DEFAULT_MAX_RESULTS, DEFAULT_TIMEOUT_SECS};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::error::{ProviderError, Result};
use crate::provider::SearchBackend;
use crate::providers::tavily;
use crate::quota::{SharedUsage, SharedUsageStore};
use crate::types::{
    ApiUsageData, PricingInfo, PricingModel, ProviderCategory, ProviderKind, ProviderMetadata,
    QuotaDescriptor, QuotaPeriod, SearchOptions, SearchResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Searches allowed per installation per calendar month.
pub const MONTHLY_LIMIT: u32 = 100;

/// Shared credential baked in at build time, if any.
const SHARED_API_KEY: Option<&str> = option_env!("TAVILY_SHARED_API_KEY");

/// Tavily backend using the compiled-in shared credential.
pub struct TavilySharedProvider {
    config: SharedConfig,
    http: Arc<dyn HttpProxy>,
    usage_store: Arc<dyn SharedUsageStore>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    credential: Option<String>,
}

impl TavilySharedProvider {
    pub fn new(
        config: SharedConfig,
        http: Arc<dyn HttpProxy>,
        usage_store: Arc<dyn SharedUsageStore>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self::with_credential(
            config,
            http,
            usage_store,
            diagnostics,
            SHARED_API_KEY.map(str::to_string),
        )
    }

    /// Construct with an explicit credential instead of the compiled-in
    /// one. Used by tests and self-hosted builds.
    pub fn with_credential(
        config: SharedConfig,
        http: Arc<dyn HttpProxy>,
        usage_store: Arc<dyn SharedUsageStore>,
        diagnostics: Arc<dyn DiagnosticsSink>,
        credential: Option<String>,
    ) -> Self {
        Self {
            config,
            http,
            usage_store,
            diagnostics,
            credential: credential.filter(|c| !c.is_empty()),
        }
    }

    fn save_usage(&self, usage: &SharedUsage) {
        if let Err(err) = self.usage_store.save(usage) {
            tracing::warn!(error = %err, "failed to persist shared usage record");
            self.diagnostics.record(DiagnosticEvent::UsageSaveFailed {
                reason: err.to_string(),
            });
        }
    }

    /// Current usage record with the window rolled forward.
    fn current_usage(&self) -> SharedUsage {
        let now = Utc::now();
        let mut usage = self
            .usage_store
            .load()
            .unwrap_or_else(|| SharedUsage::fresh(now));
        if usage.roll_forward(now) {
            self.save_usage(&usage);
        }
        usage
    }
}

#[async_trait]
impl SearchBackend for TavilySharedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::TavilyShared
    }

    async fn execute(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let tag = self.kind().tag();
        let key = self
            .credential
            .as_deref()
            .ok_or_else(|| ProviderError::configuration(tag, "no shared credential compiled in"))?;

        // Quota gate runs before any network traffic.
        let mut usage = self.current_usage();
        if usage.count >= MONTHLY_LIMIT {
            return Err(ProviderError::rate_limit(
                tag,
                format!(
                    "shared monthly allowance of {MONTHLY_LIMIT} searches used, resets {}",
                    usage.reset_at.format("%Y-%m-%d")
                ),
            ));
        }

        tracing::trace!(query, used = usage.count, "shared Tavily request");

        let max_results = options
            .max_results
            .or(self.config.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        let body = tavily::build_search_body(key, query, max_results, None, options.date_range);

        let response = self
            .http
            .fetch(ProxyRequest::post(tavily::SEARCH_ENDPOINT, body))
            .await
            .map_err(|e| ProviderError::network(tag, format!("request failed: {e}")))?;

        let results = tavily::parse_search_response(tag, &response)?;

        // Only verified successes consume allowance.
        usage.count += 1;
        self.save_usage(&usage);

        Ok(results)
    }

    fn validate_config(&self) -> bool {
        if self.credential.is_none() {
            tracing::warn!("shared search credential was not compiled into this build");
            return false;
        }
        true
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: self.kind().display_name().to_string(),
            category: ProviderCategory::Free,
            description: format!(
                "Tavily search over a shared credential, limited to {MONTHLY_LIMIT} searches per month per installation."
            ),
            pricing: PricingInfo {
                model: PricingModel::Free,
                free_tier: Some(QuotaDescriptor {
                    searches: MONTHLY_LIMIT,
                    period: QuotaPeriod::Month,
                }),
                paid_tier: None,
                cost_per_search: None,
            },
            features: vec![
                "No account required".into(),
                "Content-rich snippets".into(),
            ],
            limitations: vec![
                format!("{MONTHLY_LIMIT} searches per month"),
                "Allowance is tracked locally, not against the shared account".into(),
            ],
            setup_instructions: "Works out of the box when the build carries a shared credential."
                .into(),
        }
    }

    fn apply_config(&mut self, patch: &ProviderConfig) {
        let merged = ProviderConfig::TavilyShared(self.config.clone()).merge(patch);
        if let ProviderConfig::TavilyShared(config) = merged {
            self.config = config;
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    async fn api_usage(&self) -> Option<ApiUsageData> {
        let usage = self.current_usage();
        Some(ApiUsageData {
            used: u64::from(usage.count),
            limit: Some(u64::from(MONTHLY_LIMIT)),
            remaining: Some(u64::from(MONTHLY_LIMIT.saturating_sub(usage.count))),
            reset_date: Some(usage.reset_at),
            period: QuotaPeriod::Month,
        })
    }
}
