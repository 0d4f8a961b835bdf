//! Network access for the cache manager
//!
//! A [`Fetcher`] turns a request into a response. Every HTTP status counts as
//! a response; only transport failures (DNS, refused connection, reset,
//! timeout) are errors. Deciding what a 404 means is up to the caller.

use crate::error::{ShellcacheError, ShellcacheResult};
use crate::store::CachedResponse;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// HTTP cache behaviour for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Let intermediaries answer from their caches
    #[default]
    Default,
    /// Force revalidation with the origin
    Reload,
}

/// A request seen by the cache manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub cache_mode: CacheMode,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            cache_mode: CacheMode::Default,
        }
    }

    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            cache_mode: CacheMode::Default,
        }
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Performs network requests
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> ShellcacheResult<CachedResponse>;
}

/// Response headers worth keeping in the cache
const KEPT_HEADERS: &[&str] = &[
    "content-type",
    "content-encoding",
    "cache-control",
    "etag",
    "last-modified",
];

/// Fetcher backed by a blocking `ureq` agent run on tokio's blocking pool
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn fetch_blocking(agent: &ureq::Agent, request: &FetchRequest) -> ShellcacheResult<CachedResponse> {
        if !request.is_get() {
            return Err(ShellcacheError::User(format!(
                "Only GET requests can be fetched, got {}",
                request
            )));
        }

        let builder = agent.get(request.url.as_str());
        let builder = match request.cache_mode {
            CacheMode::Default => builder,
            CacheMode::Reload => builder
                .header("Cache-Control", "no-cache")
                .header("Pragma", "no-cache"),
        };

        let mut response = builder
            .call()
            .map_err(|e| ShellcacheError::network(&request.url, e.to_string()))?;

        let status = response.status().as_u16();
        let mut cached = CachedResponse::new(status, Vec::new());
        for (name, value) in response.headers() {
            if KEPT_HEADERS.contains(&name.as_str()) {
                if let Ok(value) = value.to_str() {
                    cached = cached.with_header(name.as_str(), value);
                }
            }
        }

        cached.body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| ShellcacheError::network(&request.url, e.to_string()))?;

        Ok(cached)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> ShellcacheResult<CachedResponse> {
        debug!("Fetching {}", request);
        let agent = self.agent.clone();
        let owned = request.clone();

        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &owned))
            .await
            .map_err(|e| ShellcacheError::Internal(format!("fetch task failed: {}", e)))?
    }
}
