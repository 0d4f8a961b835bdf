//! Test doubles for the fetch and storage seams
//!
//! Used by the unit and integration tests; also handy for embedding the
//! manager without a network.

use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{FetchRequest, Fetcher};
use crate::store::{CacheStorage, CachedResponse, MemoryStorage};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Route {
    Respond(CachedResponse),
    Fail(String),
    Hang,
}

/// Fetcher answering from a fixed route table
///
/// Unknown URLs get a 404 response, like a real server would send.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with a 200 carrying `body`
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.serve_response(url, CachedResponse::new(200, body))
    }

    pub fn serve_response(&self, url: &str, response: CachedResponse) -> &Self {
        self.set(url, Route::Respond(response))
    }

    /// Fail requests for `url` with a transport error
    pub fn fail(&self, url: &str) -> &Self {
        self.set(url, Route::Fail("connection refused".to_string()))
    }

    /// Never answer requests for `url`
    pub fn hang(&self, url: &str) -> &Self {
        self.set(url, Route::Hang)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    fn set(&self, url: &str, route: Route) -> &Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), route);
        }
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: &FetchRequest) -> ShellcacheResult<CachedResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let route = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(&request.url).cloned());

        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(reason)) => Err(ShellcacheError::network(&request.url, reason)),
            Some(Route::Hang) => std::future::pending().await,
            None => Ok(CachedResponse::new(404, "not found")),
        }
    }
}

/// Memory storage that can be told to fail operations on chosen stores
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    failing_puts: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` into `store` fail
    pub fn fail_puts_to(&self, store: &str) {
        if let Ok(mut set) = self.failing_puts.lock() {
            set.insert(store.to_string());
        }
    }

    /// Make `delete_store` of `store` fail
    pub fn fail_deletes_of(&self, store: &str) {
        if let Ok(mut set) = self.failing_deletes.lock() {
            set.insert(store.to_string());
        }
    }

    /// Let all operations succeed again
    pub fn heal(&self) {
        if let Ok(mut set) = self.failing_puts.lock() {
            set.clear();
        }
        if let Ok(mut set) = self.failing_deletes.lock() {
            set.clear();
        }
    }

    fn fails(set: &Mutex<HashSet<String>>, store: &str) -> bool {
        set.lock().map(|s| s.contains(store)).unwrap_or(false)
    }

    fn injected(store: &str, operation: &str) -> ShellcacheError {
        ShellcacheError::io(
            format!("{} on store {}", operation, store),
            std::io::Error::other("injected failure"),
        )
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn keys(&self, store: &str) -> ShellcacheResult<Vec<String>> {
        self.inner.keys(store).await
    }

    async fn get(&self, store: &str, key: &str) -> ShellcacheResult<Option<CachedResponse>> {
        self.inner.get(store, key).await
    }

    async fn put(&self, store: &str, key: &str, response: &CachedResponse) -> ShellcacheResult<()> {
        if Self::fails(&self.failing_puts, store) {
            return Err(Self::injected(store, "put"));
        }
        self.inner.put(store, key, response).await
    }

    async fn remove(&self, store: &str, key: &str) -> ShellcacheResult<bool> {
        self.inner.remove(store, key).await
    }

    async fn delete_store(&self, store: &str) -> ShellcacheResult<bool> {
        if Self::fails(&self.failing_deletes, store) {
            return Err(Self::injected(store, "delete"));
        }
        self.inner.delete_store(store).await
    }

    async fn has_store(&self, store: &str) -> ShellcacheResult<bool> {
        self.inner.has_store(store).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky-memory"
    }
}
