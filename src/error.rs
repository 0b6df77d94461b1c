//! Typed errors crossing the provider boundary.
//!
//! Every failure a provider surfaces is a [`ProviderError`] carrying a
//! structured [`ErrorKind`] and an advisory `retryable` flag, so callers
//! branch on fields instead of parsing message text. No API keys or other
//! sensitive data appear in error messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The provider is missing required configuration (API key, engine id).
    Configuration,
    /// The backend rejected the credentials.
    Authentication,
    /// A quota or rate limit was exhausted.
    RateLimit,
    /// The outbound request failed at the transport level.
    Network,
    /// The operation exceeded its deadline.
    Timeout,
    /// The response body could not be parsed.
    Parse,
    /// The backend answered but returned zero results.
    NoResults,
    /// Anything that does not fit the other kinds.
    Unknown,
}

impl ErrorKind {
    /// Stable lowercase label for logging and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::NoResults => "no_results",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure from a search provider.
///
/// `retryable` is advisory only: it indicates whether reissuing the same
/// request unchanged might succeed. No retries happen inside this crate.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    /// Which class of failure occurred.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Whether reissuing the same request might succeed unchanged.
    pub retryable: bool,
    /// Tag of the provider that produced the error.
    pub provider: String,
}

impl ProviderError {
    /// Build an error with an explicit kind and retryable flag.
    pub fn new(
        kind: ErrorKind,
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            provider: provider.into(),
        }
    }

    /// Missing or invalid configuration. Not retryable.
    pub fn configuration(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, provider, message, false)
    }

    /// Rejected credentials. Not retryable.
    pub fn authentication(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, provider, message, false)
    }

    /// Exhausted quota or rate limit. Not retryable.
    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, provider, message, false)
    }

    /// Transport-level failure. Retryable.
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, provider, message, true)
    }

    /// Deadline exceeded. Retryable.
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, provider, message, true)
    }

    /// Unparsable response payload. Not retryable.
    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, provider, message, false)
    }

    /// The backend returned zero results. Not retryable.
    pub fn no_results(provider: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NoResults,
            provider,
            "no results returned",
            false,
        )
    }

    /// Unclassified failure. Retryable.
    pub fn unknown(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, provider, message, true)
    }
}

/// Convenience type alias for provider results.
pub type Result<T> = std::result::Result<T, ProviderError>;
