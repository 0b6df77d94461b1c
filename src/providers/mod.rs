//! Concrete provider backends.

pub mod duckduckgo;
pub mod google;
pub mod serpapi;
pub mod tavily;
pub mod tavily_shared;

pub use duckduckgo::DuckDuckGoProvider;
pub use google::GoogleProvider;
pub use serpapi::SerpApiProvider;
pub use tavily::TavilyProvider;
pub use tavily_shared::TavilySharedProvider;

use crate::error::ProviderError;

/// Substrings in an API error message that indicate rejected credentials.
const AUTH_SIGNATURES: &[&str] = &["403", "forbidden", "invalid api key", "401", "unauthorized"];

/// Classify an error message reported inside a JSON payload.
///
/// Authentication-failure signatures produce a non-retryable
/// authentication error; everything else is unknown.
pub(crate) fn classify_api_error(provider: &str, message: &str) -> ProviderError {
    let lowered = message.to_lowercase();
    if AUTH_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
        ProviderError::authentication(provider, message)
    } else {
        ProviderError::unknown(provider, message)
    }
}
