//! Direct vs. proxied outbound fetches
//!
//! Some hosts refuse requests from datacenter IPs; requests to them are relayed
//! through the configured simple proxy. Everything else, including URLs that
//! fail to resolve, goes out directly.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediascrape_engine::fetch::{
    make_full_url, FetchError, FetchOptions, FetchResponse, Fetcher, SimpleProxyFetcher,
    StandardFetcher,
};

use crate::config::ProxyConfig;

/// Path chosen for one outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxy,
}

/// Fetcher choosing between a direct and a proxied fetcher per hostname
pub struct FetchRouter {
    direct: Arc<dyn Fetcher>,
    proxy: Option<Arc<dyn Fetcher>>,
    hosts: HashSet<String>,
}

impl FetchRouter {
    /// Create a router; `proxy` of `None` routes every request directly
    pub fn new<I>(direct: Arc<dyn Fetcher>, proxy: Option<Arc<dyn Fetcher>>, hosts: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            direct,
            proxy,
            hosts: hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }

    /// Build the router from proxy configuration
    pub fn from_config(config: &ProxyConfig, timeout: Duration) -> Result<Self, FetchError> {
        let direct: Arc<dyn Fetcher> = Arc::new(StandardFetcher::new(timeout)?);

        let proxy = match config.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                let fetcher: Arc<dyn Fetcher> = Arc::new(SimpleProxyFetcher::new(url, timeout)?);
                Some(fetcher)
            }
            None => None,
        };

        if proxy.is_none() && !config.hosts.is_empty() {
            tracing::info!("No proxy URL configured, proxied hosts will be fetched directly");
        }

        Ok(Self::new(direct, proxy, config.hosts.iter().cloned()))
    }

    /// Decide how a request would be issued
    pub fn route_for(&self, url: &str, ops: &FetchOptions) -> Route {
        if self.proxy.is_none() {
            return Route::Direct;
        }

        let resolved = match make_full_url(url, ops) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Unresolvable URL, fetching directly");
                return Route::Direct;
            }
        };

        match resolved.host_str() {
            Some(host) if self.hosts.contains(&host.to_ascii_lowercase()) => Route::Proxy,
            _ => Route::Direct,
        }
    }
}

#[async_trait]
impl Fetcher for FetchRouter {
    async fn fetch(&self, url: &str, ops: FetchOptions) -> Result<FetchResponse, FetchError> {
        match (self.route_for(url, &ops), &self.proxy) {
            (Route::Proxy, Some(proxy)) => proxy.fetch(url, ops).await,
            _ => self.direct.fetch(url, ops).await,
        }
    }
}
