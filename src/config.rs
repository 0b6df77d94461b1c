//! Typed per-provider configuration.
//!
//! Each provider type carries exactly the fields it needs, as one variant
//! of [`ProviderConfig`]. Variants are tagged in serialized form so a
//! persisted settings document round-trips unambiguously. Unset fields
//! fall back to the provider's defaults at search time.

use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};

/// Default result count when neither options nor config specify one.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Default per-search deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the free scraping backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrapeConfig {
    pub max_results: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Configuration for Google Custom Search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    /// Custom Search Engine id (the `cx` request parameter).
    pub search_engine_id: Option<String>,
    pub max_results: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Configuration for SerpAPI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerpApiConfig {
    pub api_key: Option<String>,
    pub max_results: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Configuration for Tavily.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TavilyConfig {
    pub api_key: Option<String>,
    /// `"basic"` or `"advanced"`. Anything else falls back to basic.
    pub search_depth: Option<String>,
    pub max_results: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Configuration for the shared-credential Tavily variant. The credential
/// itself is baked in at build time, so only tuning knobs remain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SharedConfig {
    pub max_results: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// One tagged configuration variant per provider type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    DuckDuckGo(ScrapeConfig),
    Google(GoogleConfig),
    SerpApi(SerpApiConfig),
    Tavily(TavilyConfig),
    #[serde(rename = "tavily_shared")]
    TavilyShared(SharedConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::DuckDuckGo(ScrapeConfig::default())
    }
}

impl ProviderConfig {
    /// Which provider type this configuration belongs to.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::DuckDuckGo(_) => ProviderKind::DuckDuckGo,
            Self::Google(_) => ProviderKind::Google,
            Self::SerpApi(_) => ProviderKind::SerpApi,
            Self::Tavily(_) => ProviderKind::Tavily,
            Self::TavilyShared(_) => ProviderKind::TavilyShared,
        }
    }

    /// The empty configuration for a given provider type.
    pub fn default_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::DuckDuckGo => Self::DuckDuckGo(ScrapeConfig::default()),
            ProviderKind::Google => Self::Google(GoogleConfig::default()),
            ProviderKind::SerpApi => Self::SerpApi(SerpApiConfig::default()),
            ProviderKind::Tavily => Self::Tavily(TavilyConfig::default()),
            ProviderKind::TavilyShared => Self::TavilyShared(SharedConfig::default()),
        }
    }

    /// Shallow-merge a patch onto this configuration: fields set in the
    /// patch win, unset fields keep their current value. A patch for a
    /// different provider type replaces the configuration wholesale.
    pub fn merge(&self, patch: &ProviderConfig) -> ProviderConfig {
        match (self, patch) {
            (Self::DuckDuckGo(cur), Self::DuckDuckGo(p)) => Self::DuckDuckGo(ScrapeConfig {
                max_results: p.max_results.or(cur.max_results),
                timeout_secs: p.timeout_secs.or(cur.timeout_secs),
            }),
            (Self::Google(cur), Self::Google(p)) => Self::Google(GoogleConfig {
                api_key: p.api_key.clone().or_else(|| cur.api_key.clone()),
                search_engine_id: p
                    .search_engine_id
                    .clone()
                    .or_else(|| cur.search_engine_id.clone()),
                max_results: p.max_results.or(cur.max_results),
                timeout_secs: p.timeout_secs.or(cur.timeout_secs),
            }),
            (Self::SerpApi(cur), Self::SerpApi(p)) => Self::SerpApi(SerpApiConfig {
                api_key: p.api_key.clone().or_else(|| cur.api_key.clone()),
                max_results: p.max_results.or(cur.max_results),
                timeout_secs: p.timeout_secs.or(cur.timeout_secs),
            }),
            (Self::Tavily(cur), Self::Tavily(p)) => Self::Tavily(TavilyConfig {
                api_key: p.api_key.clone().or_else(|| cur.api_key.clone()),
                search_depth: p
                    .search_depth
                    .clone()
                    .or_else(|| cur.search_depth.clone()),
                max_results: p.max_results.or(cur.max_results),
                timeout_secs: p.timeout_secs.or(cur.timeout_secs),
            }),
            (Self::TavilyShared(cur), Self::TavilyShared(p)) => {
                Self::TavilyShared(SharedConfig {
                    max_results: p.max_results.or(cur.max_results),
                    timeout_secs: p.timeout_secs.or(cur.timeout_secs),
                })
            }
            (cur, p) => {
                tracing::warn!(
                    current = %cur.kind(),
                    patch = %p.kind(),
                    "config patch targets a different provider type, replacing wholesale"
                );
                p.clone()
            }
        }
    }

    /// Configured result cap, if any.
    pub fn max_results(&self) -> Option<usize> {
        match self {
            Self::DuckDuckGo(c) => c.max_results,
            Self::Google(c) => c.max_results,
            Self::SerpApi(c) => c.max_results,
            Self::Tavily(c) => c.max_results,
            Self::TavilyShared(c) => c.max_results,
        }
    }

    /// Configured deadline in seconds, if any.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            Self::DuckDuckGo(c) => c.timeout_secs,
            Self::Google(c) => c.timeout_secs,
            Self::SerpApi(c) => c.timeout_secs,
            Self::Tavily(c) => c.timeout_secs,
            Self::TavilyShared(c) => c.timeout_secs,
        }
    }
}
