//! Injectable diagnostics for swallowed persistence failures.
//!
//! Settings and usage-record writes are best-effort: a failed save must
//! never make a mutation throw. Failures still need to be observable, so
//! they go through a [`DiagnosticsSink`] instead of a bare log call.

use std::sync::Mutex;

/// A degraded-path event worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// The persisted settings document could not be read or parsed.
    SettingsLoadFailed { reason: String },
    /// The settings document could not be written.
    SettingsSaveFailed { reason: String },
    /// The shared provider's local usage record could not be written.
    UsageSaveFailed { reason: String },
}

/// Receiver for diagnostic events.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Default sink: forwards events to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::SettingsLoadFailed { reason } => {
                tracing::warn!(%reason, "failed to load persisted settings");
            }
            DiagnosticEvent::SettingsSaveFailed { reason } => {
                tracing::warn!(%reason, "failed to persist settings");
            }
            DiagnosticEvent::UsageSaveFailed { reason } => {
                tracing::warn!(%reason, "failed to persist shared usage record");
            }
        }
    }
}

/// Capturing sink for tests: remembers every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn record(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
