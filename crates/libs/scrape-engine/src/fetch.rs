//! Network layer used by scrapers
//!
//! Scrapers never talk to `reqwest` directly: every outbound call goes through
//! a [`Fetcher`], so the host application decides how requests leave the
//! process (directly, or relayed through a proxy).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Header the simple proxy uses to report the URL it ended up at
const FINAL_DESTINATION_HEADER: &str = "x-final-destination";

/// Request body variants
#[derive(Debug, Clone, PartialEq)]
pub enum FetchBody {
    Json(serde_json::Value),
    Form(BTreeMap<String, String>),
    Text(String),
}

/// Options for a single outbound request
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Prefix joined in front of the request path
    pub base_url: Option<String>,

    pub method: Method,

    pub headers: BTreeMap<String, String>,

    /// Query parameters set on the resolved URL (existing keys are replaced)
    pub query: BTreeMap<String, String>,

    pub body: Option<FetchBody>,
}

impl FetchOptions {
    /// Options with only a base URL set
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }
}

/// Buffered response of an outbound request
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,

    /// URL the response was actually served from
    pub final_url: String,

    /// Response headers, lowercased names
    pub headers: BTreeMap<String, String>,

    pub body: String,
}

impl FetchResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Outbound request dispatcher
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a request for `url` (resolved against `ops.base_url` when set)
    async fn fetch(&self, url: &str, ops: FetchOptions) -> Result<FetchResponse, FetchError>;
}

/// Join `base_url` and `url` with exactly one slash
///
/// A trailing slash on the base and a leading slash on the path are both
/// tolerated. Without a base the URL is used as-is.
pub fn join_url(url: &str, base_url: Option<&str>) -> String {
    match base_url.filter(|b| !b.is_empty()) {
        Some(base) => {
            let base = base.strip_suffix('/').unwrap_or(base);
            let path = url.strip_prefix('/').unwrap_or(url);
            format!("{}/{}", base, path)
        }
        None => url.to_string(),
    }
}

/// Resolve the final URL of a request: base joining, scheme check, query merge
pub fn make_full_url(url: &str, ops: &FetchOptions) -> Result<Url, FetchError> {
    let full = join_url(url, ops.base_url.as_deref());

    if !full.starts_with("http://") && !full.starts_with("https://") {
        return Err(FetchError::InvalidUrl(format!(
            "URL doesn't start with a http scheme: '{}'",
            full
        )));
    }

    let mut parsed = Url::parse(&full).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    if !ops.query.is_empty() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !ops.query.contains_key(k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (k, v) in kept.iter() {
            pairs.append_pair(k, v);
        }
        for (k, v) in ops.query.iter() {
            pairs.append_pair(k, v);
        }
        drop(pairs);
    }

    Ok(parsed)
}

fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Request(format!("Failed to create HTTP client: {}", e)))
}

fn apply_options(mut builder: RequestBuilder, ops: &FetchOptions) -> RequestBuilder {
    for (name, value) in ops.headers.iter() {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match &ops.body {
        Some(FetchBody::Json(value)) => builder.json(value),
        Some(FetchBody::Form(fields)) => builder.form(fields),
        Some(FetchBody::Text(text)) => builder.body(text.clone()),
        None => builder,
    }
}

async fn read_response(
    response: reqwest::Response,
    fallback_url: &str,
) -> Result<FetchResponse, FetchError> {
    let status = response.status().as_u16();

    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let final_url = headers
        .get(FINAL_DESTINATION_HEADER)
        .cloned()
        .unwrap_or_else(|| fallback_url.to_string());

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))?;

    Ok(FetchResponse {
        status,
        final_url,
        headers,
        body,
    })
}

/// Fetcher issuing requests directly from this process
#[derive(Clone)]
pub struct StandardFetcher {
    client: Client,
}

impl StandardFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self::with_client(build_client(timeout)?))
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for StandardFetcher {
    async fn fetch(&self, url: &str, ops: FetchOptions) -> Result<FetchResponse, FetchError> {
        let full = make_full_url(url, &ops)?;

        tracing::debug!(method = %ops.method, url = %full, "Direct fetch");

        let builder = apply_options(self.client.request(ops.method.clone(), full.clone()), &ops);
        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let served_from = response.url().to_string();
        read_response(response, &served_from).await
    }
}

/// Fetcher relaying requests through a "simple proxy" endpoint
///
/// The proxy receives the resolved target in its `destination` query
/// parameter; method, headers and body are forwarded unchanged.
#[derive(Clone)]
pub struct SimpleProxyFetcher {
    proxy_url: String,
    client: Client,
}

impl SimpleProxyFetcher {
    /// Create a proxy fetcher for `proxy_url`
    pub fn new(proxy_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self::with_client(proxy_url, build_client(timeout)?))
    }

    /// Wrap an existing client
    pub fn with_client(proxy_url: impl Into<String>, client: Client) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            client,
        }
    }

    /// Proxy endpoint URL
    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    /// URL actually requested for a given target
    pub fn relay_url(&self, target: &Url) -> Result<Url, FetchError> {
        let mut relay = Url::parse(&self.proxy_url)
            .map_err(|e| FetchError::InvalidUrl(format!("proxy url: {}", e)))?;
        relay
            .query_pairs_mut()
            .append_pair("destination", target.as_str());
        Ok(relay)
    }
}

#[async_trait]
impl Fetcher for SimpleProxyFetcher {
    async fn fetch(&self, url: &str, ops: FetchOptions) -> Result<FetchResponse, FetchError> {
        let target = make_full_url(url, &ops)?;
        let relay = self.relay_url(&target)?;

        tracing::debug!(method = %ops.method, url = %target, proxy = %self.proxy_url, "Proxied fetch");

        let builder = apply_options(self.client.request(ops.method.clone(), relay), &ops);
        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        read_response(response, target.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, routing::get, Router};
    use std::collections::HashMap;

    #[test]
    fn test_join_url_slash_combinations() {
        let expected = "https://api.example.com/v1/movies";
        assert_eq!(join_url("v1/movies", Some("https://api.example.com")), expected);
        assert_eq!(join_url("/v1/movies", Some("https://api.example.com")), expected);
        assert_eq!(join_url("v1/movies", Some("https://api.example.com/")), expected);
        assert_eq!(join_url("/v1/movies", Some("https://api.example.com/")), expected);
    }

    #[test]
    fn test_join_url_without_base() {
        assert_eq!(join_url("https://a.example/x", None), "https://a.example/x");
        assert_eq!(join_url("https://a.example/x", Some("")), "https://a.example/x");
    }

    #[test]
    fn test_make_full_url_rejects_non_http() {
        let ops = FetchOptions::default();
        assert!(matches!(
            make_full_url("/relative/path", &ops),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            make_full_url("ftp://files.example.com", &ops),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_make_full_url_merges_query() {
        let mut ops = FetchOptions::with_base_url("https://api.example.com/");
        ops.query.insert("page".to_string(), "2".to_string());
        ops.query.insert("q".to_string(), "heat 1995".to_string());

        let url = make_full_url("/search?page=1&lang=en", &ops).unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("api.example.com"));
        assert_eq!(url.path(), "/search");
        assert_eq!(pairs.get("page").map(String::as_str), Some("2"));
        assert_eq!(pairs.get("lang").map(String::as_str), Some("en"));
        assert_eq!(pairs.get("q").map(String::as_str), Some("heat 1995"));
    }

    #[test]
    fn test_relay_url_carries_destination() {
        let fetcher = SimpleProxyFetcher::with_client("https://proxy.example.com/", Client::new());
        let target = Url::parse("https://showbox.shegu.net/api?x=1").unwrap();

        let relay = fetcher.relay_url(&target).unwrap();
        let pairs: HashMap<String, String> = relay.query_pairs().into_owned().collect();

        assert_eq!(relay.host_str(), Some("proxy.example.com"));
        assert_eq!(
            pairs.get("destination").map(String::as_str),
            Some("https://showbox.shegu.net/api?x=1")
        );
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_standard_fetcher_direct_request() {
        let router = Router::new().route(
            "/api/item",
            get(|Query(q): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                let agent = headers
                    .get("x-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                format!("id={};agent={}", q.get("id").cloned().unwrap_or_default(), agent)
            }),
        );
        let base = spawn_server(router).await;

        let fetcher = StandardFetcher::new(Duration::from_secs(5)).unwrap();
        let mut ops = FetchOptions::with_base_url(format!("{}/", base));
        ops.query.insert("id".to_string(), "42".to_string());
        ops.headers.insert("x-agent".to_string(), "test".to_string());

        let response = fetcher.fetch("/api/item", ops).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.body, "id=42;agent=test");
        assert!(response.final_url.starts_with(&base));
    }

    #[tokio::test]
    async fn test_proxy_fetcher_sends_destination() {
        let router = Router::new().route(
            "/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                q.get("destination").cloned().unwrap_or_default()
            }),
        );
        let proxy = spawn_server(router).await;

        let fetcher = SimpleProxyFetcher::new(format!("{}/", proxy), Duration::from_secs(5)).unwrap();
        let response = fetcher
            .fetch(
                "movie/949",
                FetchOptions::with_base_url("https://mbpapi.shegu.net/api"),
            )
            .await
            .unwrap();

        assert_eq!(response.body, "https://mbpapi.shegu.net/api/movie/949");
        assert_eq!(response.final_url, "https://mbpapi.shegu.net/api/movie/949");
    }
}
