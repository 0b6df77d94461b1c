//! The provider contract and the shared orchestration wrapper.
//!
//! Concrete backends implement [`SearchBackend`]: execute, validate,
//! describe. [`Provider`] wraps any backend and layers on the behaviour
//! every provider shares: statistics, the validation gate, the deadline
//! race, and cost accounting. Callers only ever talk to [`Provider`].

use crate::config::{ProviderConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::{ErrorKind, ProviderError, Result};
use crate::types::{
    ApiUsageData, ProviderCategory, ProviderKind, ProviderMetadata, ProviderStats, SearchOptions,
    SearchResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Response-time samples kept for the rolling average.
const RESPONSE_TIME_WINDOW: usize = 100;

/// A pluggable search backend.
///
/// Implementors supply the three required operations (`execute`,
/// `validate_config`, `metadata`) plus configuration merging. Everything
/// else has a default. All implementations must be `Send + Sync`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Which provider type this backend implements.
    fn kind(&self) -> ProviderKind;

    /// Perform one search. Called only after `validate_config` passed;
    /// runs under the deadline enforced by [`Provider::search`].
    async fn execute(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>>;

    /// Whether the backend has everything it needs to search.
    fn validate_config(&self) -> bool;

    /// Static descriptive record, built fresh on each call.
    fn metadata(&self) -> ProviderMetadata;

    /// Shallow-merge a configuration patch onto the current config.
    fn apply_config(&mut self, patch: &ProviderConfig);

    /// Cost of one search in USD. Paid backends override this.
    fn cost_per_search(&self) -> f64 {
        0.0
    }

    /// Deadline for one search when the caller does not pass one.
    fn timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }

    /// Best-effort remote account balance. `None` when the backend has no
    /// introspection endpoint or the call failed.
    async fn api_usage(&self) -> Option<ApiUsageData> {
        None
    }
}

#[derive(Debug, Default)]
struct StatsWindow {
    stats: ProviderStats,
    samples: VecDeque<f64>,
}

impl StatsWindow {
    fn record_sample(&mut self, elapsed_ms: f64) {
        self.samples.push_back(elapsed_ms);
        if self.samples.len() > RESPONSE_TIME_WINDOW {
            self.samples.pop_front();
        }
        self.stats.average_response_time_ms =
            self.samples.iter().sum::<f64>() / self.samples.len() as f64;
    }
}

/// A live provider instance: one backend plus its statistics.
///
/// Statistics are guarded by a mutex so a registry can hand the same
/// instance to concurrent callers. The mutex is never held across an
/// await point.
pub struct Provider {
    backend: Box<dyn SearchBackend>,
    stats: Mutex<StatsWindow>,
}

impl Provider {
    pub fn new(backend: Box<dyn SearchBackend>) -> Self {
        Self {
            backend,
            stats: Mutex::new(StatsWindow::default()),
        }
    }

    fn stats_window(&self) -> MutexGuard<'_, StatsWindow> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Which provider type this instance wraps.
    pub fn kind(&self) -> ProviderKind {
        self.backend.kind()
    }

    /// The single entry point for all searches.
    ///
    /// Counts the attempt, gates on configuration validity, races the
    /// backend against the effective deadline, and updates statistics from
    /// the outcome. Statistics are written exactly once per call, after
    /// the race resolves, so an abandoned slow operation cannot corrupt
    /// them.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let started = Instant::now();
        {
            let mut window = self.stats_window();
            window.stats.total_searches += 1;
            window.stats.last_used = Some(Utc::now());
        }

        let outcome = self.run_gated(query, options).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut window = self.stats_window();
        window.record_sample(elapsed_ms);
        match &outcome {
            Ok(results) => {
                window.stats.successful_searches += 1;
                if self.kind().category() == ProviderCategory::Paid {
                    window.stats.estimated_cost += self.backend.cost_per_search();
                }
                tracing::debug!(
                    provider = %self.kind(),
                    count = results.len(),
                    elapsed_ms,
                    "search succeeded"
                );
            }
            Err(err) => {
                window.stats.failed_searches += 1;
                tracing::debug!(provider = %self.kind(), error = %err, "search failed");
            }
        }

        outcome
    }

    async fn run_gated(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if !self.backend.validate_config() {
            return Err(ProviderError::configuration(
                self.kind().tag(),
                "provider is not configured",
            ));
        }

        let deadline = options
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.backend.timeout());

        match tokio::time::timeout(deadline, self.backend.execute(query, options)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(
                self.kind().tag(),
                format!("search exceeded {}s deadline", deadline.as_secs()),
            )),
        }
    }

    /// Probe the backend with a one-result test query. Never fails:
    /// any error resolves to `false`.
    pub async fn test_connection(&self) -> bool {
        let options = SearchOptions {
            max_results: Some(1),
            ..Default::default()
        };
        match self.search("test", &options).await {
            Ok(_) => true,
            Err(err) if err.kind == ErrorKind::Authentication => {
                tracing::warn!(provider = %self.kind(), error = %err, "connection test rejected credentials");
                false
            }
            Err(err) => {
                tracing::error!(provider = %self.kind(), error = %err, "connection test failed");
                false
            }
        }
    }

    /// Shallow-merge a configuration patch onto the backend's config.
    pub fn configure(&mut self, patch: &ProviderConfig) {
        self.backend.apply_config(patch);
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> ProviderStats {
        self.stats_window().stats.clone()
    }

    /// Zero all counters, the rolling window, and the cost estimate.
    pub fn reset_stats(&self) {
        *self.stats_window() = StatsWindow::default();
    }

    pub fn validate_config(&self) -> bool {
        self.backend.validate_config()
    }

    pub fn metadata(&self) -> ProviderMetadata {
        self.backend.metadata()
    }

    pub async fn api_usage(&self) -> Option<ApiUsageData> {
        self.backend.api_usage().await
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}
