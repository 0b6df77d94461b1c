//! Outbound capability seams: the HTTP proxy and the search-and-render
//! collaborator.
//!
//! Paid providers issue exactly one HTTP call per search through
//! [`HttpProxy`]; the free provider obtains rendered HTML through
//! [`SearchRenderer`]. Both are traits so a host shell can substitute its
//! own transport; the `Reqwest*` implementations here make the crate work
//! standalone. Capability failures are opaque strings at this boundary;
//! providers pattern-match on response bodies, not on transport errors.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::time::Duration;

/// HTTP method for a proxied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request handed to the [`HttpProxy`] capability.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub url: String,
    pub method: HttpMethod,
    /// JSON body for POST requests.
    pub body: Option<serde_json::Value>,
}

impl ProxyRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            body: Some(body),
        }
    }
}

/// Opaque capability failure. The message is all a caller gets.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

/// Outbound HTTP proxy: returns the raw response body as text, for any
/// response status. Exists so browser-hosted shells can bypass
/// cross-origin restrictions; the crate only depends on the contract.
#[async_trait]
pub trait HttpProxy: Send + Sync {
    async fn fetch(&self, request: ProxyRequest) -> Result<String, CapabilityError>;
}

/// Search-and-render: produce HTML for a query, for the scraping provider
/// to parse.
#[async_trait]
pub trait SearchRenderer: Send + Sync {
    async fn render(&self, query: &str, max_results: usize) -> Result<String, CapabilityError>;
}

/// Realistic browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Select a random User-Agent string from the rotation list.
fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Default [`HttpProxy`] backed by reqwest.
///
/// Returns the body text for any response status: API backends report
/// failures inside their JSON payloads, and providers inspect those.
#[derive(Debug, Clone)]
pub struct ReqwestProxy {
    timeout: Duration,
}

impl ReqwestProxy {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ReqwestProxy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpProxy for ReqwestProxy {
    async fn fetch(&self, request: ProxyRequest) -> Result<String, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(random_user_agent())
            .build()
            .map_err(|e| CapabilityError(format!("failed to build HTTP client: {e}")))?;

        let builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => {
                let builder = client.post(&request.url);
                match request.body {
                    Some(body) => builder.json(&body),
                    None => builder,
                }
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CapabilityError(format!("request failed: {e}")))?;

        response
            .text()
            .await
            .map_err(|e| CapabilityError(format!("response read failed: {e}")))
    }
}

/// Default [`SearchRenderer`] that fetches DuckDuckGo's HTML-only endpoint.
///
/// The endpoint requires a POST with form data and no JavaScript, which
/// makes it usable without a headless browser. Hosts with a real
/// render-capable shell should supply their own implementation.
#[derive(Debug, Clone)]
pub struct ReqwestRenderer {
    timeout: Duration,
}

impl ReqwestRenderer {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ReqwestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchRenderer for ReqwestRenderer {
    async fn render(&self, query: &str, _max_results: usize) -> Result<String, CapabilityError> {
        tracing::trace!(query, "rendering search HTML");

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .user_agent(random_user_agent())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CapabilityError(format!("failed to build HTTP client: {e}")))?;

        let params = [("q", query), ("kl", "wt-wt")];
        let response = client
            .post("https://html.duckduckgo.com/html/")
            .form(&params)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| CapabilityError(format!("search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| CapabilityError(format!("search HTTP error: {e}")))?;

        response
            .text()
            .await
            .map_err(|e| CapabilityError(format!("search response read failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn random_user_agent_returns_valid_ua() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
        assert!(ua.contains("Mozilla/5.0"));
    }

    #[test]
    fn proxy_request_constructors() {
        let get = ProxyRequest::get("https://example.com");
        assert_eq!(get.method, HttpMethod::Get);
        assert!(get.body.is_none());

        let post = ProxyRequest::post("https://example.com", serde_json::json!({"q": "x"}));
        assert_eq!(post.method, HttpMethod::Post);
        assert!(post.body.is_some());
    }

    #[tokio::test]
    async fn reqwest_proxy_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let proxy = ReqwestProxy::new();
        let body = proxy
            .fetch(ProxyRequest::get(format!("{}/data", server.uri())))
            .await
            .expect("fetch should succeed");
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn reqwest_proxy_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(serde_json::json!({"query": "rust"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let proxy = ReqwestProxy::new();
        let body = proxy
            .fetch(ProxyRequest::post(
                format!("{}/search", server.uri()),
                serde_json::json!({"query": "rust"}),
            ))
            .await
            .expect("fetch should succeed");
        assert!(body.contains("ok"));
    }

    #[tokio::test]
    async fn reqwest_proxy_returns_error_body_text() {
        // Non-2xx responses still return the body; providers inspect it.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("{\"error\":\"403 Forbidden\"}"),
            )
            .mount(&server)
            .await;

        let proxy = ReqwestProxy::new();
        let body = proxy
            .fetch(ProxyRequest::get(server.uri()))
            .await
            .expect("fetch should succeed");
        assert!(body.contains("Forbidden"));
    }

    #[tokio::test]
    async fn reqwest_proxy_unreachable_host_is_capability_error() {
        let proxy = ReqwestProxy::with_timeout(Duration::from_millis(500));
        let result = proxy
            .fetch(ProxyRequest::get("http://127.0.0.1:1/nothing"))
            .await;
        assert!(result.is_err());
    }
}
