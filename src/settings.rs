//! The persisted settings document and its manager.
//!
//! One JSON document holds everything the user can configure: which
//! providers are enabled, their typed configurations, quota windows, the
//! default provider, and global options. [`SettingsManager`] owns the
//! document, migrates legacy keys on load, merges onto defaults so new
//! fields always materialize, and keeps the [`ProviderRegistry`] in sync
//! with every mutation.
//!
//! Persistence is best-effort: a failed save is reported through the
//! diagnostics sink and logged, never thrown to the caller.

use crate::config::ProviderConfig;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::factory::ProviderFactory;
use crate::quota::{default_quota, UsageWindow};
use crate::registry::ProviderRegistry;
use crate::types::ProviderKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Retired tag for the Google provider, relocated on load.
const LEGACY_GOOGLE_TAG: &str = "google_cse";

/// Global options applied across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalSearchOptions {
    /// Let the application decide when a prompt needs a web search.
    pub auto_detect: bool,
    /// Show result sources alongside answers.
    pub show_sources: bool,
    /// Cache search results (consumed by the orchestration layer).
    pub cache_results: bool,
    /// Cache lifetime in seconds.
    pub cache_duration_secs: u64,
    /// Default per-search deadline in seconds.
    pub timeout_secs: u64,
    /// Default result count.
    pub max_results: usize,
}

impl Default for GlobalSearchOptions {
    fn default() -> Self {
        Self {
            auto_detect: true,
            show_sources: true,
            cache_results: true,
            cache_duration_secs: 600,
            timeout_secs: 10,
            max_results: 10,
        }
    }
}

/// Per-provider persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSettings {
    pub enabled: bool,
    pub config: ProviderConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageWindow>,
}

/// The persisted document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSearchSettings {
    pub enabled: bool,
    pub default_provider: ProviderKind,
    pub auto_fallback: bool,
    pub smart_selection: bool,
    pub providers: BTreeMap<ProviderKind, ProviderSettings>,
    pub options: GlobalSearchOptions,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        let mut settings = Self {
            enabled: true,
            default_provider: ProviderKind::DuckDuckGo,
            auto_fallback: true,
            smart_selection: false,
            providers: BTreeMap::new(),
            options: GlobalSearchOptions::default(),
        };
        backfill(&mut settings);
        settings
    }
}

/// Default per-provider settings: free backends start enabled, keyed
/// backends start disabled until configured.
fn default_settings_for(kind: ProviderKind) -> ProviderSettings {
    ProviderSettings {
        enabled: matches!(
            kind,
            ProviderKind::DuckDuckGo | ProviderKind::TavilyShared
        ),
        config: ProviderConfig::default_for(kind),
        usage: default_usage_for(kind),
    }
}

fn default_usage_for(kind: ProviderKind) -> Option<UsageWindow> {
    default_quota(kind).map(|(period, limit)| UsageWindow::new(limit, period, Utc::now()))
}

/// Ensure every known provider has an entry with a matching config and a
/// usage window where its quota calls for one.
fn backfill(settings: &mut WebSearchSettings) {
    for kind in ProviderKind::all() {
        let entry = settings
            .providers
            .entry(*kind)
            .or_insert_with(|| default_settings_for(*kind));
        if entry.config.kind() != *kind {
            tracing::warn!(
                kind = %kind,
                found = %entry.config.kind(),
                "persisted config does not match its provider key, resetting"
            );
            entry.config = ProviderConfig::default_for(*kind);
        }
        if entry.usage.is_none() {
            entry.usage = default_usage_for(*kind);
        }
    }
}

/// Rewrite legacy keys on the raw JSON document before deserialization.
///
/// The retired `google_cse` tag relocates to `google`, both in the
/// providers map and as the default provider. Unknown provider tags are
/// dropped so one stale entry cannot invalidate the whole document.
pub(crate) fn migrate_legacy(value: &mut serde_json::Value) {
    if let Some(providers) = value.get_mut("providers").and_then(|p| p.as_object_mut()) {
        if let Some(mut legacy) = providers.remove(LEGACY_GOOGLE_TAG) {
            tracing::debug!("migrating legacy google_cse provider entry");
            if let Some(kind) = legacy.pointer_mut("/config/kind") {
                if kind.as_str() == Some(LEGACY_GOOGLE_TAG) {
                    *kind = serde_json::Value::String(ProviderKind::Google.tag().into());
                }
            }
            if !providers.contains_key(ProviderKind::Google.tag()) {
                providers.insert(ProviderKind::Google.tag().to_string(), legacy);
            }
        }

        let unknown: Vec<String> = providers
            .keys()
            .filter(|key| ProviderKind::from_tag(key).is_none())
            .cloned()
            .collect();
        for key in unknown {
            tracing::warn!(tag = %key, "dropping unknown provider entry from settings");
            providers.remove(&key);
        }
    }

    if let Some(default) = value.get("defaultProvider").and_then(|d| d.as_str()) {
        if default == LEGACY_GOOGLE_TAG {
            value["defaultProvider"] =
                serde_json::Value::String(ProviderKind::Google.tag().into());
        } else if ProviderKind::from_tag(default).is_none() {
            tracing::warn!(tag = %default, "dropping unknown default provider from settings");
            if let Some(obj) = value.as_object_mut() {
                obj.remove("defaultProvider");
            }
        }
    }
}

/// Persistence seam for the settings document. Reads and writes are
/// synchronous and operate on the whole document.
pub trait SettingsStore: Send + Sync {
    /// Load the document, `None` when nothing was persisted yet.
    fn load(&self) -> io::Result<Option<String>>;
    /// Persist the whole document.
    fn save(&self, document: &str) -> io::Result<()>;
}

/// JSON file store for the settings document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(doc) => Ok(Some(doc)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn save(&self, document: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, document)
    }
}

/// In-memory store for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a preloaded document.
    pub fn preloaded(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail, for exercising degraded paths.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The currently stored document.
    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.document())
    }

    fn save(&self, document: &str) -> io::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io::Error::other("save disabled"));
        }
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(document.to_string());
        Ok(())
    }
}

/// An import document that could not be applied.
#[derive(Debug, thiserror::Error)]
#[error("invalid settings document: {0}")]
pub struct ImportError(String);

/// Owns the settings document and the provider registry built from it.
pub struct SettingsManager {
    settings: WebSearchSettings,
    store: Box<dyn SettingsStore>,
    factory: ProviderFactory,
    registry: ProviderRegistry,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl SettingsManager {
    /// Load persisted settings (or defaults), migrate and merge them, and
    /// build one registered provider per known kind.
    pub fn load(
        store: Box<dyn SettingsStore>,
        factory: ProviderFactory,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let settings = match store.load() {
            Ok(Some(document)) => Self::parse_document(&document, diagnostics.as_ref()),
            Ok(None) => WebSearchSettings::default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted settings, using defaults");
                diagnostics.record(DiagnosticEvent::SettingsLoadFailed {
                    reason: err.to_string(),
                });
                WebSearchSettings::default()
            }
        };

        let registry = Self::build_registry(&factory, &settings);
        Self {
            settings,
            store,
            factory,
            registry,
            diagnostics,
        }
    }

    fn parse_document(document: &str, diagnostics: &dyn DiagnosticsSink) -> WebSearchSettings {
        let parsed = serde_json::from_str::<serde_json::Value>(document)
            .map_err(|e| e.to_string())
            .and_then(|mut value| {
                migrate_legacy(&mut value);
                serde_json::from_value::<WebSearchSettings>(value).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(mut settings) => {
                backfill(&mut settings);
                settings
            }
            Err(reason) => {
                tracing::warn!(%reason, "unparsable settings document, using defaults");
                diagnostics.record(DiagnosticEvent::SettingsLoadFailed { reason });
                WebSearchSettings::default()
            }
        }
    }

    /// Construct and register one provider per known kind, enabled or
    /// not, so the surrounding application can always enumerate every
    /// option. Then set the default from the document.
    fn build_registry(
        factory: &ProviderFactory,
        settings: &WebSearchSettings,
    ) -> ProviderRegistry {
        let config_for = |kind: ProviderKind| {
            settings
                .providers
                .get(&kind)
                .map(|entry| entry.config.clone())
        };

        let free = factory.create_kind(ProviderRegistry::FREE_KIND, config_for(ProviderRegistry::FREE_KIND));
        let mut registry = ProviderRegistry::new(free);
        for kind in ProviderKind::all() {
            if *kind == ProviderRegistry::FREE_KIND {
                continue;
            }
            registry.register(factory.create_kind(*kind, config_for(*kind)));
        }
        registry.set_default(settings.default_provider);
        registry
    }

    fn rebuild_registry(&mut self) {
        self.registry = Self::build_registry(&self.factory, &self.settings);
    }

    /// Persist the whole document. Best-effort: failures are reported
    /// through the diagnostics sink, never returned.
    fn persist(&self) {
        let document = match serde_json::to_string_pretty(&self.settings) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize settings");
                self.diagnostics.record(DiagnosticEvent::SettingsSaveFailed {
                    reason: err.to_string(),
                });
                return;
            }
        };
        if let Err(err) = self.store.save(&document) {
            tracing::warn!(error = %err, "failed to persist settings");
            self.diagnostics.record(DiagnosticEvent::SettingsSaveFailed {
                reason: err.to_string(),
            });
        }
    }

    /// The current in-memory document.
    pub fn settings(&self) -> &WebSearchSettings {
        &self.settings
    }

    /// The registry built from the current document.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    /// Shallow-merge a configuration patch into a provider's settings and
    /// replace its live registry instance so existing references observe
    /// the new behaviour.
    pub fn update_provider_config(&mut self, kind: ProviderKind, patch: &ProviderConfig) {
        let entry = self
            .settings
            .providers
            .entry(kind)
            .or_insert_with(|| default_settings_for(kind));
        entry.config = entry.config.merge(patch);
        let config = entry.config.clone();

        let provider = self.factory.create_kind(kind, Some(config));
        self.registry.register(provider);
        self.persist();
    }

    pub fn set_provider_enabled(&mut self, kind: ProviderKind, enabled: bool) {
        self.settings
            .providers
            .entry(kind)
            .or_insert_with(|| default_settings_for(kind))
            .enabled = enabled;
        self.persist();
    }

    /// Change the default provider, in the document and the registry.
    pub fn set_default_provider(&mut self, kind: ProviderKind) {
        self.settings.default_provider = kind;
        self.registry.set_default(kind);
        self.persist();
    }

    pub fn update_options(&mut self, options: GlobalSearchOptions) {
        self.settings.options = options;
        self.persist();
    }

    pub fn set_auto_fallback(&mut self, enabled: bool) {
        self.settings.auto_fallback = enabled;
        self.persist();
    }

    pub fn set_smart_selection(&mut self, enabled: bool) {
        self.settings.smart_selection = enabled;
        self.persist();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        self.persist();
    }

    /// Count one search against a provider's quota window, rolling the
    /// window forward first when its reset time has passed.
    pub fn increment_usage(&mut self, kind: ProviderKind) {
        if let Some(entry) = self.settings.providers.get_mut(&kind) {
            if let (Some(usage), Some((period, _))) = (entry.usage.as_mut(), default_quota(kind)) {
                usage.roll_forward(period, Utc::now());
                usage.count += 1;
            }
        }
        self.persist();
    }

    /// A provider's current quota window, rolled forward on read.
    pub fn provider_usage(&mut self, kind: ProviderKind) -> Option<UsageWindow> {
        let entry = self.settings.providers.get_mut(&kind)?;
        let usage = entry.usage.as_mut()?;
        let rolled = default_quota(kind)
            .map(|(period, _)| usage.roll_forward(period, Utc::now()))
            .unwrap_or(false);
        let snapshot = usage.clone();
        if rolled {
            self.persist();
        }
        Some(snapshot)
    }

    /// The whole document as pretty-printed JSON.
    pub fn export_settings(&self) -> String {
        serde_json::to_string_pretty(&self.settings).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to serialize settings for export");
            "{}".to_string()
        })
    }

    /// Replace the document from an exported one. Runs the same migration
    /// and merge as a load, rebuilds the registry, and persists. A
    /// document that does not parse leaves everything unchanged.
    pub fn import_settings(&mut self, document: &str) -> Result<(), ImportError> {
        let mut value = serde_json::from_str::<serde_json::Value>(document)
            .map_err(|e| ImportError(e.to_string()))?;
        migrate_legacy(&mut value);
        let mut settings = serde_json::from_value::<WebSearchSettings>(value)
            .map_err(|e| ImportError(e.to_string()))?;
        backfill(&mut settings);

        self.settings = settings;
        self.rebuild_registry();
        self.persist();
        Ok(())
    }

    /// Replace the document with defaults and rebuild the registry.
    pub fn reset_to_defaults(&mut self) {
        self.settings = WebSearchSettings::default();
        self.rebuild_registry();
        self.persist();
    }
}
