//! Named cache stores
//!
//! A store is a persistent map from request key to a cached response. The
//! cache manager works with three of them:
//!
//! | Store | Contents |
//! |-------|----------|
//! | manifest | One entry, `manifest`: the last applied resource manifest |
//! | temp | Core resources staged during install |
//! | content | Resources served to intercepted requests |
//!
//! Stores are created lazily by the first `put` and removed as a whole with
//! `delete_store`.

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::config::Config;
use crate::error::ShellcacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// A response as held by a cache store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, lowercase names
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Raw body bytes
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header, normalizing the name to lowercase
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Whether the status is in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Names of the three stores used by one cache manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    pub manifest: String,
    pub temp: String,
    pub content: String,
}

impl StoreNames {
    pub fn from_config(config: &Config) -> Self {
        Self {
            manifest: config.cache.manifest_store.clone(),
            temp: config.cache.temp_store.clone(),
            content: config.cache.content_store.clone(),
        }
    }

    /// All store names, in the order they are reset
    pub fn all(&self) -> [&str; 3] {
        [&self.content, &self.temp, &self.manifest]
    }
}

impl Default for StoreNames {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Backend holding named cache stores
///
/// Implementations must serialize individual operations on the same store;
/// no ordering is promised across independent callers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Keys currently held by a store, sorted; empty if the store does not exist
    async fn keys(&self, store: &str) -> ShellcacheResult<Vec<String>>;

    /// Look up one entry
    async fn get(&self, store: &str, key: &str) -> ShellcacheResult<Option<CachedResponse>>;

    /// Insert or overwrite an entry, creating the store if needed
    async fn put(&self, store: &str, key: &str, response: &CachedResponse) -> ShellcacheResult<()>;

    /// Remove one entry, returning whether it existed
    async fn remove(&self, store: &str, key: &str) -> ShellcacheResult<bool>;

    /// Drop a whole store, returning whether it existed
    async fn delete_store(&self, store: &str) -> ShellcacheResult<bool>;

    /// Whether a store exists
    async fn has_store(&self, store: &str) -> ShellcacheResult<bool>;

    /// Human-readable backend name for logs and status output
    fn backend_name(&self) -> &'static str;
}

/// Delete every named store
///
/// Each store is attempted even if an earlier deletion fails; the first error
/// is returned afterwards. Returns how many stores existed.
pub async fn delete_stores(storage: &dyn CacheStorage, names: &StoreNames) -> ShellcacheResult<usize> {
    let mut deleted = 0;
    let mut first_error = None;

    for store in names.all() {
        match storage.delete_store(store).await {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to delete store {}: {}", store, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("Deleted {} stores", deleted);
            Ok(deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_stores_counts_existing() {
        let storage = MemoryStorage::new();
        let names = StoreNames::default();
        storage.put(&names.content, "k", &CachedResponse::new(200, "")).await.unwrap();
        storage.put(&names.manifest, "manifest", &CachedResponse::new(200, "{}")).await.unwrap();

        assert_eq!(delete_stores(&storage, &names).await.unwrap(), 2);
        assert_eq!(delete_stores(&storage, &names).await.unwrap(), 0);
    }

    #[test]
    fn response_ok_range() {
        assert!(CachedResponse::new(200, "x").is_ok());
        assert!(CachedResponse::new(204, "").is_ok());
        assert!(!CachedResponse::new(304, "").is_ok());
        assert!(!CachedResponse::new(503, "down").is_ok());
    }

    #[test]
    fn header_names_are_lowercased() {
        let response = CachedResponse::new(200, "{}").with_header("Content-Type", "application/json");
        assert_eq!(response.content_type(), Some("application/json"));
    }

    #[test]
    fn store_names_follow_config() {
        let mut config = Config::default();
        config.cache.content_store = "shell-content".to_string();

        let names = StoreNames::from_config(&config);
        assert_eq!(names.content, "shell-content");
        assert_eq!(names.all(), ["shell-content", "flutter-temp-cache", "flutter-app-manifest"]);
    }
}
