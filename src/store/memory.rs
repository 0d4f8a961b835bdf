//! In-process store backend

use super::{CacheStorage, CachedResponse};
use crate::error::ShellcacheResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// Stores kept in memory; lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: Mutex<HashMap<String, BTreeMap<String, CachedResponse>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn keys(&self, store: &str) -> ShellcacheResult<Vec<String>> {
        let stores = self.stores.lock().await;
        Ok(stores
            .get(store)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, store: &str, key: &str) -> ShellcacheResult<Option<CachedResponse>> {
        let stores = self.stores.lock().await;
        Ok(stores.get(store).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(&self, store: &str, key: &str, response: &CachedResponse) -> ShellcacheResult<()> {
        let mut stores = self.stores.lock().await;
        stores
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn remove(&self, store: &str, key: &str) -> ShellcacheResult<bool> {
        let mut stores = self.stores.lock().await;
        Ok(stores
            .get_mut(store)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn delete_store(&self, store: &str) -> ShellcacheResult<bool> {
        let mut stores = self.stores.lock().await;
        Ok(stores.remove(store).is_some())
    }

    async fn has_store(&self, store: &str) -> ShellcacheResult<bool> {
        let stores = self.stores.lock().await;
        Ok(stores.contains_key(store))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
