//! Live provider instances keyed by type, with a tracked default.
//!
//! The registry always holds an irremovable free entry, so lookups can
//! degrade instead of failing: an unknown id falls back to the default,
//! and a missing default falls back to the free provider.

use crate::provider::Provider;
use crate::types::{ProviderKind, ProviderStats};
use std::collections::HashMap;
use std::sync::Arc;

/// Holds one live [`Provider`] per registered kind.
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<Provider>>,
    free: Arc<Provider>,
    default_kind: ProviderKind,
}

impl ProviderRegistry {
    /// The irremovable fallback entry.
    pub const FREE_KIND: ProviderKind = ProviderKind::DuckDuckGo;

    /// Seed the registry with the free provider, which becomes the
    /// initial default.
    pub fn new(free: Provider) -> Self {
        let free = Arc::new(free);
        let mut providers = HashMap::new();
        providers.insert(Self::FREE_KIND, Arc::clone(&free));
        Self {
            providers,
            free,
            default_kind: Self::FREE_KIND,
        }
    }

    /// Register (or replace) the instance for a provider kind.
    pub fn register(&mut self, provider: Provider) {
        let kind = provider.kind();
        let provider = Arc::new(provider);
        if kind == Self::FREE_KIND {
            self.free = Arc::clone(&provider);
        }
        self.providers.insert(kind, provider);
    }

    /// Look up a provider. `None` means the current default. Never fails:
    /// unknown kinds fall back to the default, and a missing default falls
    /// back to the free entry, each with a warning.
    pub fn get(&self, kind: Option<ProviderKind>) -> Arc<Provider> {
        if let Some(kind) = kind {
            if let Some(provider) = self.providers.get(&kind) {
                return Arc::clone(provider);
            }
            tracing::warn!(kind = %kind, "provider not registered, using default");
        }
        if let Some(provider) = self.providers.get(&self.default_kind) {
            return Arc::clone(provider);
        }
        tracing::warn!(default = %self.default_kind, "default provider missing, using free provider");
        Arc::clone(&self.free)
    }

    /// The current default provider.
    pub fn get_default(&self) -> Arc<Provider> {
        self.get(None)
    }

    /// Which kind is currently the default.
    pub fn default_kind(&self) -> ProviderKind {
        self.default_kind
    }

    /// Change the default. A no-op (logged as an error) when the kind is
    /// not registered.
    pub fn set_default(&mut self, kind: ProviderKind) {
        if !self.providers.contains_key(&kind) {
            tracing::error!(kind = %kind, "cannot set unregistered provider as default");
            return;
        }
        self.default_kind = kind;
    }

    pub fn has(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// All registered providers, in kind order.
    pub fn list(&self) -> Vec<Arc<Provider>> {
        ProviderKind::all()
            .iter()
            .filter_map(|kind| self.providers.get(kind).cloned())
            .collect()
    }

    /// Registered providers whose configuration currently validates.
    pub fn list_configured(&self) -> Vec<Arc<Provider>> {
        self.list()
            .into_iter()
            .filter(|provider| provider.validate_config())
            .collect()
    }

    /// Remove a provider. The free entry is irremovable; removing the
    /// current default reverts the default to the free entry.
    pub fn remove(&mut self, kind: ProviderKind) -> bool {
        if kind == Self::FREE_KIND {
            tracing::warn!("the free provider cannot be removed");
            return false;
        }
        let removed = self.providers.remove(&kind).is_some();
        if removed && self.default_kind == kind {
            tracing::warn!(removed = %kind, "removed the default provider, reverting to free");
            self.default_kind = Self::FREE_KIND;
        }
        removed
    }

    /// Drop everything except the free entry and reset the default.
    pub fn clear(&mut self) {
        self.providers.retain(|kind, _| *kind == Self::FREE_KIND);
        self.default_kind = Self::FREE_KIND;
    }

    /// Statistics snapshot across all registered providers.
    pub fn all_stats(&self) -> HashMap<ProviderKind, ProviderStats> {
        self.providers
            .iter()
            .map(|(kind, provider)| (*kind, provider.stats()))
            .collect()
    }
}
