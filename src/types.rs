//! Core types shared by every provider: results, options, metadata, stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single normalized search result.
///
/// `rank` is assigned by the normalization step, 1-based and strictly
/// increasing within one response. Upstream backends never supply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The title of the result page. `"Untitled"` when the backend gave none.
    pub title: String,
    /// The URL of the result.
    pub url: String,
    /// A text snippet summarising the page. Empty when the backend gave none.
    pub snippet: String,
    /// Host component of `url`. Empty when `url` does not parse.
    pub domain: String,
    /// Publication date as reported by the backend, if it parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// Favicon URL, synthesized from a favicon service when missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// 1-based position within the response.
    pub rank: usize,
}

/// The provider backends this crate can construct.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Free HTML-scraping backend. Always available, never removable.
    DuckDuckGo,
    /// Google Custom Search JSON API. Needs an API key and engine id.
    Google,
    /// SerpAPI. Needs an API key.
    SerpApi,
    /// Tavily search API. Needs an API key.
    Tavily,
    /// Tavily with a build-time shared credential and a local monthly allowance.
    #[serde(rename = "tavily_shared")]
    TavilyShared,
}

impl ProviderKind {
    /// Stable lowercase tag used in settings documents and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Google => "google",
            Self::SerpApi => "serpapi",
            Self::Tavily => "tavily",
            Self::TavilyShared => "tavily_shared",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "DuckDuckGo",
            Self::Google => "Google Custom Search",
            Self::SerpApi => "SerpAPI",
            Self::Tavily => "Tavily",
            Self::TavilyShared => "Tavily (shared)",
        }
    }

    /// Parse a tag string back into a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "duckduckgo" => Some(Self::DuckDuckGo),
            "google" => Some(Self::Google),
            "serpapi" => Some(Self::SerpApi),
            "tavily" => Some(Self::Tavily),
            "tavily_shared" => Some(Self::TavilyShared),
            _ => None,
        }
    }

    /// All known kinds, in registration/display order.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::DuckDuckGo,
            Self::Google,
            Self::SerpApi,
            Self::Tavily,
            Self::TavilyShared,
        ]
    }

    /// Whether searches through this backend cost money per call.
    pub fn category(&self) -> ProviderCategory {
        match self {
            Self::DuckDuckGo | Self::TavilyShared => ProviderCategory::Free,
            Self::Google | Self::SerpApi | Self::Tavily => ProviderCategory::Paid,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Free vs. pay-per-search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderCategory {
    Free,
    Paid,
}

/// Abstract date-range restriction, mapped to engine-specific syntax
/// by each provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Day,
    Week,
    Month,
    Year,
}

/// Per-call search options. All fields fall back to the provider's
/// configuration, then to crate defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    /// Maximum number of results to return.
    pub max_results: Option<usize>,
    /// Per-call deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Restrict results to a recent window.
    pub date_range: Option<DateRange>,
}

/// Reset cadence of a quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    Day,
    Month,
}

impl fmt::Display for QuotaPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Month => "month",
        })
    }
}

/// A quota allowance: so many searches per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDescriptor {
    pub searches: u32,
    pub period: QuotaPeriod,
}

/// How a backend charges for usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    Free,
    Subscription,
    PayPerUse,
}

/// Pricing shape of a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingInfo {
    pub model: PricingModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_tier: Option<QuotaDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_tier: Option<QuotaDescriptor>,
    /// Cost per search in USD, for pay-per-use backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_search: Option<f64>,
}

/// Static descriptive record for a provider. Constructed fresh on each
/// request, never cached, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub name: String,
    pub category: ProviderCategory,
    pub description: String,
    pub pricing: PricingInfo,
    pub features: Vec<String>,
    pub limitations: Vec<String>,
    pub setup_instructions: String,
}

/// Per-provider usage statistics, maintained by the orchestration wrapper.
///
/// Invariant: `total_searches == successful_searches + failed_searches`
/// after every call. `average_response_time_ms` is the mean of the most
/// recent 100 sampled durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub total_searches: u64,
    pub successful_searches: u64,
    pub failed_searches: u64,
    pub average_response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    /// Accumulated cost estimate in USD for paid backends.
    pub estimated_cost: f64,
}

/// Best-effort snapshot of a remote account balance. Not every backend
/// exposes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsageData {
    pub used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_date: Option<DateTime<Utc>>,
    pub period: QuotaPeriod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_round_trip() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::from_tag(kind.tag()), Some(*kind));
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(ProviderKind::from_tag("doesnotexist"), None);
        assert_eq!(ProviderKind::from_tag(""), None);
        assert_eq!(ProviderKind::from_tag("DuckDuckGo"), None);
    }

    #[test]
    fn kind_serde_uses_tags() {
        let json = serde_json::to_string(&ProviderKind::TavilyShared).expect("serialize");
        assert_eq!(json, "\"tavily_shared\"");
        let decoded: ProviderKind = serde_json::from_str("\"serpapi\"").expect("deserialize");
        assert_eq!(decoded, ProviderKind::SerpApi);
    }

    #[test]
    fn kind_as_map_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(ProviderKind::Google, 1u32);
        map.insert(ProviderKind::TavilyShared, 2u32);
        let json = serde_json::to_string(&map).expect("serialize");
        assert!(json.contains("\"google\""));
        assert!(json.contains("\"tavily_shared\""));
        let decoded: BTreeMap<ProviderKind, u32> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.get(&ProviderKind::Google), Some(&1));
    }

    #[test]
    fn all_kinds_ordered_with_free_first() {
        let all = ProviderKind::all();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], ProviderKind::DuckDuckGo);
    }

    #[test]
    fn categories() {
        assert_eq!(ProviderKind::DuckDuckGo.category(), ProviderCategory::Free);
        assert_eq!(ProviderKind::Google.category(), ProviderCategory::Paid);
        assert_eq!(ProviderKind::TavilyShared.category(), ProviderCategory::Free);
    }

    #[test]
    fn display_names() {
        assert_eq!(ProviderKind::DuckDuckGo.display_name(), "DuckDuckGo");
        assert_eq!(ProviderKind::Google.display_name(), "Google Custom Search");
    }

    #[test]
    fn stats_default_is_zeroed() {
        let stats = ProviderStats::default();
        assert_eq!(stats.total_searches, 0);
        assert_eq!(stats.successful_searches, 0);
        assert_eq!(stats.failed_searches, 0);
        assert!(stats.last_used.is_none());
        assert_eq!(stats.estimated_cost, 0.0);
    }

    #[test]
    fn search_options_default_is_empty() {
        let options = SearchOptions::default();
        assert!(options.max_results.is_none());
        assert!(options.timeout_secs.is_none());
        assert!(options.date_range.is_none());
    }

    #[test]
    fn search_options_deserializes_missing_fields() {
        let options: SearchOptions = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(options, SearchOptions::default());
    }

    #[test]
    fn date_range_serde() {
        let json = serde_json::to_string(&DateRange::Week).expect("serialize");
        assert_eq!(json, "\"week\"");
    }
}
