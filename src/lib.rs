//! # websearch
//!
//! Pluggable multi-provider web search: one free HTML-scraping backend and
//! several paid JSON-API backends behind a single contract, with
//! per-provider statistics, quota windows, and persistent user settings.
//!
//! ## Design
//!
//! - Every backend implements [`SearchBackend`]; the [`Provider`] wrapper
//!   adds the shared behaviour (statistics, validation gate, deadline race,
//!   cost accounting)
//! - Results are normalized to one shape regardless of backend, with ranks
//!   assigned locally
//! - Failures are typed [`ProviderError`]s; callers branch on `kind` and
//!   `retryable`, never on message text
//! - The [`ProviderRegistry`] holds live instances and never fails a
//!   lookup: unknown ids degrade to the default, then to the free entry
//! - [`SettingsManager`] owns the persisted document, migrates legacy
//!   keys, merges onto defaults, and keeps the registry in sync
//!
//! No retries and no cross-provider fallback happen at this layer; the
//! `retryable` flag is advisory for the orchestration above.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() {
//! use websearch::factory::{Capabilities, ProviderFactory};
//! use websearch::settings::{JsonFileStore, SettingsManager};
//! use websearch::types::SearchOptions;
//! use std::sync::Arc;
//!
//! let factory = ProviderFactory::new(Capabilities::with_defaults());
//! let manager = SettingsManager::load(
//!     Box::new(JsonFileStore::new("websearch.json")),
//!     factory,
//!     Arc::new(websearch::diagnostics::TracingSink),
//! );
//!
//! let provider = manager.registry().get_default();
//! match provider.search("rust async runtime", &SearchOptions::default()).await {
//!     Ok(results) => {
//!         for result in &results {
//!             println!("{}. {} ({})", result.rank, result.title, result.url);
//!         }
//!     }
//!     Err(err) => eprintln!("search failed ({}): {err}", err.kind),
//! }
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod normalize;
pub mod provider;
pub mod providers;
pub mod quota;
pub mod registry;
pub mod settings;
pub mod types;

pub use config::ProviderConfig;
pub use error::{ErrorKind, ProviderError, Result};
pub use factory::{Capabilities, ProviderFactory};
pub use provider::{Provider, SearchBackend};
pub use registry::ProviderRegistry;
pub use settings::{SettingsManager, WebSearchSettings};
pub use types::{ProviderKind, ProviderStats, SearchOptions, SearchResult};
