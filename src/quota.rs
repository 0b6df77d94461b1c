//! Quota windows: per-provider counters with a lazy reset cadence.
//!
//! A window never rolls forward on a timer. Any read or increment that
//! finds `reset_at` in the past first resets the count to zero and
//! recomputes `reset_at` before proceeding.

use crate::types::{ProviderKind, QuotaPeriod};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// A rolling usage allowance persisted inside the settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageWindow {
    /// Searches counted in the current window.
    pub count: u32,
    /// Allowance per window.
    pub limit: u32,
    /// When the window resets.
    pub reset_at: DateTime<Utc>,
}

impl UsageWindow {
    /// A fresh window starting now.
    pub fn new(limit: u32, period: QuotaPeriod, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            limit,
            reset_at: next_reset(period, now),
        }
    }

    /// Reset the window if `reset_at` has passed. Returns whether a reset
    /// happened.
    pub fn roll_forward(&mut self, period: QuotaPeriod, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        self.count = 0;
        self.reset_at = next_reset(period, now);
        true
    }

    /// Whether the allowance is used up.
    pub fn exhausted(&self) -> bool {
        self.count >= self.limit
    }

    /// Searches left in the current window.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Compute the next reset boundary after `now`: the next midnight (UTC)
/// for daily windows, the first day of the following month for monthly.
pub fn next_reset(period: QuotaPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let boundary = match period {
        QuotaPeriod::Day => today.checked_add_days(Days::new(1)),
        QuotaPeriod::Month => NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
            .and_then(|first| first.checked_add_months(Months::new(1))),
    };
    boundary
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map_or(now, |at_midnight| Utc.from_utc_datetime(&at_midnight))
}

/// Built-in free-tier allowance for a provider, if it has one.
pub fn default_quota(kind: ProviderKind) -> Option<(QuotaPeriod, u32)> {
    match kind {
        ProviderKind::DuckDuckGo => None,
        ProviderKind::Google => Some((QuotaPeriod::Day, 100)),
        ProviderKind::SerpApi => Some((QuotaPeriod::Month, 100)),
        ProviderKind::Tavily => Some((QuotaPeriod::Month, 1000)),
        ProviderKind::TavilyShared => Some((QuotaPeriod::Month, 100)),
    }
}

/// Local usage record for the shared-credential provider. Lives outside
/// the settings document: one record per installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedUsage {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl SharedUsage {
    /// A zeroed record whose window ends at the next monthly boundary.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            reset_at: next_reset(QuotaPeriod::Month, now),
        }
    }

    /// Reset if the window has passed. Returns whether a reset happened.
    pub fn roll_forward(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        self.count = 0;
        self.reset_at = next_reset(QuotaPeriod::Month, now);
        true
    }
}

/// Persistence seam for the shared provider's local usage record.
///
/// Reads and writes are synchronous. A failed write must never fail a
/// search; callers log it and move on.
pub trait SharedUsageStore: Send + Sync {
    /// Load the record, or `None` when absent or unreadable.
    fn load(&self) -> Option<SharedUsage>;
    /// Persist the record.
    fn save(&self, usage: &SharedUsage) -> io::Result<()>;
}

/// JSON file store for the shared usage record.
#[derive(Debug)]
pub struct JsonFileUsageStore {
    path: PathBuf,
}

impl JsonFileUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SharedUsageStore for JsonFileUsageStore {
    fn load(&self) -> Option<SharedUsage> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(usage) => Some(usage),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "unreadable shared usage record, starting fresh");
                None
            }
        }
    }

    fn save(&self, usage: &SharedUsage) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let doc = serde_json::to_string_pretty(usage).map_err(io::Error::other)?;
        std::fs::write(&self.path, doc)
    }
}

/// In-memory store for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    inner: Mutex<Option<SharedUsage>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a preloaded record.
    pub fn preloaded(usage: SharedUsage) -> Self {
        Self {
            inner: Mutex::new(Some(usage)),
        }
    }
}

impl SharedUsageStore for MemoryUsageStore {
    fn load(&self) -> Option<SharedUsage> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, usage: &SharedUsage) -> io::Result<()> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(usage.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid date")
    }

    #[test]
    fn daily_reset_is_next_midnight() {
        let now = at(2024, 3, 5, 15);
        assert_eq!(next_reset(QuotaPeriod::Day, now), at(2024, 3, 6, 0));
    }

    #[test]
    fn monthly_reset_is_first_of_next_month() {
        let now = at(2024, 3, 5, 15);
        assert_eq!(next_reset(QuotaPeriod::Month, now), at(2024, 4, 1, 0));
    }

    #[test]
    fn monthly_reset_rolls_over_year_boundary() {
        let now = at(2024, 12, 20, 10);
        assert_eq!(next_reset(QuotaPeriod::Month, now), at(2025, 1, 1, 0));
    }

    #[test]
    fn fresh_window_is_zeroed() {
        let window = UsageWindow::new(100, QuotaPeriod::Day, at(2024, 3, 5, 15));
        assert_eq!(window.count, 0);
        assert_eq!(window.limit, 100);
        assert!(!window.exhausted());
        assert_eq!(window.remaining(), 100);
    }

    #[test]
    fn roll_forward_noop_inside_window() {
        let now = at(2024, 3, 5, 15);
        let mut window = UsageWindow::new(10, QuotaPeriod::Day, now);
        window.count = 4;
        assert!(!window.roll_forward(QuotaPeriod::Day, at(2024, 3, 5, 20)));
        assert_eq!(window.count, 4);
    }

    #[test]
    fn roll_forward_resets_past_window() {
        let mut window = UsageWindow::new(10, QuotaPeriod::Day, at(2024, 3, 5, 15));
        window.count = 10;
        assert!(window.exhausted());

        let later = at(2024, 3, 7, 9);
        assert!(window.roll_forward(QuotaPeriod::Day, later));
        assert_eq!(window.count, 0);
        assert_eq!(window.reset_at, at(2024, 3, 8, 0));
        assert!(!window.exhausted());
    }

    #[test]
    fn roll_forward_at_exact_boundary_resets() {
        let mut window = UsageWindow::new(10, QuotaPeriod::Day, at(2024, 3, 5, 15));
        let boundary = window.reset_at;
        assert!(window.roll_forward(QuotaPeriod::Day, boundary));
    }

    #[test]
    fn shared_usage_roll_forward() {
        let mut usage = SharedUsage {
            count: 42,
            reset_at: at(2024, 3, 1, 0),
        };
        assert!(usage.roll_forward(at(2024, 3, 10, 12)));
        assert_eq!(usage.count, 0);
        assert_eq!(usage.reset_at, at(2024, 4, 1, 0));
    }

    #[test]
    fn default_quotas() {
        assert!(default_quota(ProviderKind::DuckDuckGo).is_none());
        assert_eq!(
            default_quota(ProviderKind::Google),
            Some((QuotaPeriod::Day, 100))
        );
        assert_eq!(
            default_quota(ProviderKind::TavilyShared),
            Some((QuotaPeriod::Month, 100))
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryUsageStore::new();
        assert!(store.load().is_none());

        let usage = SharedUsage::fresh(at(2024, 3, 5, 15));
        store.save(&usage).expect("save");
        assert_eq!(store.load(), Some(usage));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileUsageStore::new(dir.path().join("nested").join("usage.json"));
        assert!(store.load().is_none());

        let usage = SharedUsage {
            count: 7,
            reset_at: at(2024, 4, 1, 0),
        };
        store.save(&usage).expect("save");
        assert_eq!(store.load(), Some(usage));
    }

    #[test]
    fn file_store_tolerates_corrupt_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("usage.json");
        std::fs::write(&path, "not json").expect("write");
        let store = JsonFileUsageStore::new(path);
        assert!(store.load().is_none());
    }

    #[test]
    fn usage_window_serde_round_trip() {
        let window = UsageWindow::new(50, QuotaPeriod::Month, at(2024, 3, 5, 15));
        let json = serde_json::to_string(&window).expect("serialize");
        assert!(json.contains("resetAt"));
        let decoded: UsageWindow = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, window);
    }
}
