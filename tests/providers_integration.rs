//! Integration tests across the full stack: settings document → migration
//! → registry → provider search → statistics.
//!
//! Capability collaborators are scripted in-process; no network calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use websearch::capabilities::{CapabilityError, HttpProxy, ProxyRequest, SearchRenderer};
use websearch::config::{GoogleConfig, ProviderConfig};
use websearch::diagnostics::RecordingSink;
use websearch::error::ErrorKind;
use websearch::factory::{Capabilities, ProviderFactory};
use websearch::quota::MemoryUsageStore;
use websearch::settings::{MemoryStore, SettingsManager, SettingsStore};
use websearch::types::{ProviderKind, SearchOptions};

const GOOGLE_BODY: &str = r#"{
    "items": [
        {"title": "Rust", "link": "https://www.rust-lang.org/", "snippet": "The language."},
        {"title": "Docs", "link": "https://doc.rust-lang.org/", "snippet": "The docs."}
    ]
}"#;

const RESULTS_HTML: &str = r#"<html><body>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="https://www.rust-lang.org/">Rust Programming Language</a>
    <div class="result__snippet">A language empowering everyone.</div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.rs%2F&rut=x">Docs.rs</a>
    <div class="result__snippet">Crate documentation.</div>
</div>
</body></html>"#;

/// HTTP proxy that always answers with one canned body and counts calls.
struct ScriptedProxy {
    body: String,
    calls: AtomicUsize,
}

impl ScriptedProxy {
    fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpProxy for ScriptedProxy {
    async fn fetch(&self, _request: ProxyRequest) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Small real delay so deadline races resolve the same way they
        // would against a network transport.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(self.body.clone())
    }
}

struct ScriptedRenderer(String);

#[async_trait]
impl SearchRenderer for ScriptedRenderer {
    async fn render(&self, _query: &str, _max_results: usize) -> Result<String, CapabilityError> {
        Ok(self.0.clone())
    }
}

struct SharedStore(Arc<MemoryStore>);

impl SettingsStore for SharedStore {
    fn load(&self) -> std::io::Result<Option<String>> {
        self.0.load()
    }
    fn save(&self, document: &str) -> std::io::Result<()> {
        self.0.save(document)
    }
}

fn scripted_factory(http_body: &str) -> (ProviderFactory, Arc<ScriptedProxy>) {
    let proxy = Arc::new(ScriptedProxy::new(http_body));
    let factory = ProviderFactory::new(Capabilities {
        http: proxy.clone(),
        renderer: Arc::new(ScriptedRenderer(RESULTS_HTML.to_string())),
        shared_usage: Arc::new(MemoryUsageStore::new()),
        diagnostics: Arc::new(RecordingSink::new()),
    });
    (factory, proxy)
}

#[tokio::test]
async fn legacy_document_to_search_through_migrated_provider() {
    // A persisted document from an older build: retired google_cse tag as
    // both a provider entry and the default.
    let legacy = r#"{
        "defaultProvider": "google_cse",
        "providers": {
            "google_cse": {
                "enabled": true,
                "config": {"kind": "google_cse", "apiKey": "legacy-key", "searchEngineId": "cx"}
            }
        }
    }"#;

    let store = Arc::new(MemoryStore::preloaded(legacy));
    let (factory, proxy) = scripted_factory(GOOGLE_BODY);
    let manager = SettingsManager::load(
        Box::new(SharedStore(store)),
        factory,
        Arc::new(RecordingSink::new()),
    );

    // The retired tag is gone and the replacement is the default.
    assert_eq!(manager.settings().default_provider, ProviderKind::Google);
    assert!(!manager.export_settings().contains("google_cse"));

    // The default provider is the migrated Google instance, fully
    // configured from the legacy entry.
    let provider = manager.registry().get_default();
    assert_eq!(provider.kind(), ProviderKind::Google);

    let results = provider
        .search("rust", &SearchOptions::default())
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 2);
    assert_eq!(
        results.iter().map(|r| r.rank).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(proxy.calls.load(Ordering::SeqCst), 1);

    let stats = provider.stats();
    assert_eq!(stats.total_searches, 1);
    assert_eq!(stats.successful_searches, 1);
    assert!(stats.estimated_cost > 0.0, "paid search accrues cost");
}

#[tokio::test]
async fn free_provider_scrape_path_end_to_end() {
    let (factory, _) = scripted_factory("{}");
    let manager = SettingsManager::load(
        Box::new(SharedStore(Arc::new(MemoryStore::new()))),
        factory,
        Arc::new(RecordingSink::new()),
    );

    let provider = manager.registry().get_default();
    assert_eq!(provider.kind(), ProviderKind::DuckDuckGo);

    let results = provider
        .search("rust", &SearchOptions::default())
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 2);
    // Redirect wrapper unwrapped during parsing.
    assert_eq!(results[1].url, "https://docs.rs/");
    assert_eq!(results[1].domain, "docs.rs");
    assert!(results[1].favicon.is_some());
}

#[tokio::test]
async fn config_change_visible_through_registry_without_refetching() {
    let (factory, _) = scripted_factory(GOOGLE_BODY);
    let mut manager = SettingsManager::load(
        Box::new(SharedStore(Arc::new(MemoryStore::new()))),
        factory,
        Arc::new(RecordingSink::new()),
    );

    // Unconfigured Google fails the validation gate with a typed error.
    let err = manager
        .registry()
        .get(Some(ProviderKind::Google))
        .search("rust", &SearchOptions::default())
        .await
        .expect_err("unconfigured search must fail");
    assert_eq!(err.kind, ErrorKind::Configuration);
    assert!(!err.retryable);

    manager.update_provider_config(
        ProviderKind::Google,
        &ProviderConfig::Google(GoogleConfig {
            api_key: Some("key".into()),
            search_engine_id: Some("cx".into()),
            ..Default::default()
        }),
    );

    // A fresh lookup observes the re-registered, configured instance.
    manager
        .registry()
        .get(Some(ProviderKind::Google))
        .search("rust", &SearchOptions::default())
        .await
        .expect("configured search should succeed");
}

#[tokio::test]
async fn auth_failure_body_surfaces_as_typed_error() {
    let (factory, _) = scripted_factory(r#"{"error": "403 Forbidden - Invalid API key"}"#);
    let mut manager = SettingsManager::load(
        Box::new(SharedStore(Arc::new(MemoryStore::new()))),
        factory,
        Arc::new(RecordingSink::new()),
    );
    manager.update_provider_config(
        ProviderKind::Google,
        &ProviderConfig::Google(GoogleConfig {
            api_key: Some("bad".into()),
            search_engine_id: Some("cx".into()),
            ..Default::default()
        }),
    );

    let provider = manager.registry().get(Some(ProviderKind::Google));
    let err = provider
        .search("rust", &SearchOptions::default())
        .await
        .expect_err("should fail");
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert!(!err.retryable);

    // Failed connection test logs and resolves to false, never panics.
    assert!(!provider.test_connection().await);
}

#[tokio::test]
async fn registry_lookup_never_fails() {
    let (factory, _) = scripted_factory("{}");
    let mut manager = SettingsManager::load(
        Box::new(SharedStore(Arc::new(MemoryStore::new()))),
        factory,
        Arc::new(RecordingSink::new()),
    );

    // Remove everything removable, then look up a removed kind.
    manager.registry_mut().remove(ProviderKind::Tavily);
    manager.registry_mut().remove(ProviderKind::DuckDuckGo); // refused
    let provider = manager.registry().get(Some(ProviderKind::Tavily));
    assert_eq!(provider.kind(), ProviderKind::DuckDuckGo);
    assert!(manager.registry().has(ProviderKind::DuckDuckGo));
}

#[tokio::test]
async fn usage_windows_track_across_settings_and_provider() {
    let store = Arc::new(MemoryStore::new());
    let (factory, _) = scripted_factory(GOOGLE_BODY);
    let mut manager = SettingsManager::load(
        Box::new(SharedStore(store.clone())),
        factory,
        Arc::new(RecordingSink::new()),
    );

    for _ in 0..3 {
        manager.increment_usage(ProviderKind::Google);
    }
    let window = manager
        .provider_usage(ProviderKind::Google)
        .expect("google tracks usage");
    assert_eq!(window.count, 3);
    assert_eq!(window.remaining(), 97);

    // Counts survive a reload from the same store.
    let (factory, _) = scripted_factory(GOOGLE_BODY);
    let mut reloaded = SettingsManager::load(
        Box::new(SharedStore(store)),
        factory,
        Arc::new(RecordingSink::new()),
    );
    assert_eq!(
        reloaded
            .provider_usage(ProviderKind::Google)
            .map(|w| w.count),
        Some(3)
    );
}

#[tokio::test]
async fn stats_invariant_holds_across_mixed_outcomes() {
    let (factory, _) = scripted_factory(GOOGLE_BODY);
    let mut manager = SettingsManager::load(
        Box::new(SharedStore(Arc::new(MemoryStore::new()))),
        factory,
        Arc::new(RecordingSink::new()),
    );
    manager.update_provider_config(
        ProviderKind::Google,
        &ProviderConfig::Google(GoogleConfig {
            api_key: Some("key".into()),
            search_engine_id: Some("cx".into()),
            ..Default::default()
        }),
    );

    let provider = manager.registry().get(Some(ProviderKind::Google));
    for _ in 0..2 {
        let _ = provider.search("ok", &SearchOptions::default()).await;
    }
    // Force failures through an impossible deadline.
    let options = SearchOptions {
        timeout_secs: Some(0),
        ..Default::default()
    };
    let err = provider
        .search("slow", &options)
        .await
        .expect_err("zero deadline must time out");
    assert_eq!(err.kind, ErrorKind::Timeout);

    let stats = provider.stats();
    assert_eq!(stats.total_searches, 3);
    assert_eq!(
        stats.total_searches,
        stats.successful_searches + stats.failed_searches
    );

    provider.reset_stats();
    let stats = provider.stats();
    assert_eq!(stats.total_searches, 0);
    assert_eq!(stats.estimated_cost, 0.0);
}
