//! Provider construction from type tags.
//!
//! The factory owns the capability handles and hands each backend the ones
//! it needs. Construction never fails: unknown tags and mismatched
//! configurations degrade to sane substitutes with a warning.

use crate::capabilities::{HttpProxy, ReqwestProxy, ReqwestRenderer, SearchRenderer};
use crate::config::ProviderConfig;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::provider::{Provider, SearchBackend};
use crate::providers::{
    DuckDuckGoProvider, GoogleProvider, SerpApiProvider, TavilyProvider, TavilySharedProvider,
};
use crate::quota::{JsonFileUsageStore, SharedUsageStore};
use crate::types::ProviderKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// External collaborators injected into providers at construction.
#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpProxy>,
    pub renderer: Arc<dyn SearchRenderer>,
    pub shared_usage: Arc<dyn SharedUsageStore>,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}

impl Capabilities {
    /// Standalone defaults: reqwest transports, a JSON file for the shared
    /// usage record, and tracing diagnostics.
    pub fn with_defaults() -> Self {
        Self {
            http: Arc::new(ReqwestProxy::new()),
            renderer: Arc::new(ReqwestRenderer::new()),
            shared_usage: Arc::new(JsonFileUsageStore::new(default_usage_path())),
            diagnostics: Arc::new(TracingSink),
        }
    }
}

/// Returns `~/.websearch/shared_usage.json`, falling back to a temp
/// location when no home directory is available.
fn default_usage_path() -> PathBuf {
    let base = match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home),
        None => std::env::temp_dir(),
    };
    base.join(".websearch").join("shared_usage.json")
}

/// Constructs provider instances from type tags. Never fails.
pub struct ProviderFactory {
    caps: Capabilities,
}

impl ProviderFactory {
    pub fn new(caps: Capabilities) -> Self {
        Self { caps }
    }

    /// Build a provider for a raw type tag. Unrecognized tags substitute
    /// the free provider.
    pub fn create(&self, tag: &str, config: Option<ProviderConfig>) -> Provider {
        match ProviderKind::from_tag(tag) {
            Some(kind) => self.create_kind(kind, config),
            None => {
                tracing::warn!(tag, "unknown provider type, substituting the free provider");
                self.create_kind(ProviderKind::DuckDuckGo, None)
            }
        }
    }

    /// Build a provider for a known kind. A configuration for a different
    /// kind is discarded in favour of the kind's defaults.
    pub fn create_kind(&self, kind: ProviderKind, config: Option<ProviderConfig>) -> Provider {
        let config = match config {
            Some(config) if config.kind() == kind => config,
            Some(config) => {
                tracing::warn!(
                    kind = %kind,
                    config_kind = %config.kind(),
                    "configuration does not match provider type, using defaults"
                );
                ProviderConfig::default_for(kind)
            }
            None => ProviderConfig::default_for(kind),
        };

        let backend: Box<dyn SearchBackend> = match config {
            ProviderConfig::DuckDuckGo(c) => Box::new(DuckDuckGoProvider::new(
                c,
                Arc::clone(&self.caps.renderer),
            )),
            ProviderConfig::Google(c) => {
                Box::new(GoogleProvider::new(c, Arc::clone(&self.caps.http)))
            }
            ProviderConfig::SerpApi(c) => {
                Box::new(SerpApiProvider::new(c, Arc::clone(&self.caps.http)))
            }
            ProviderConfig::Tavily(c) => {
                Box::new(TavilyProvider::new(c, Arc::clone(&self.caps.http)))
            }
            ProviderConfig::TavilyShared(c) => Box::new(TavilySharedProvider::new(
                c,
                Arc::clone(&self.caps.http),
                Arc::clone(&self.caps.shared_usage),
                Arc::clone(&self.caps.diagnostics),
            )),
        };
        Provider::new(backend)
    }

    /// Build one provider per known kind, using the supplied configs.
    pub fn create_all(
        &self,
        configs: &HashMap<ProviderKind, ProviderConfig>,
    ) -> Vec<Provider> {
        ProviderKind::all()
            .iter()
            .map(|kind| self.create_kind(*kind, configs.get(kind).cloned()))
            .collect()
    }

    /// The fixed, ordered list of known provider kinds.
    pub fn available_kinds() -> &'static [ProviderKind] {
        ProviderKind::all()
    }

    /// Reverse lookup from a display name back to its kind.
    pub fn kind_from_name(name: &str) -> Option<ProviderKind> {
        let wanted = name.trim();
        ProviderKind::all()
            .iter()
            .copied()
            .find(|kind| kind.display_name().eq_ignore_ascii_case(wanted))
    }
}
