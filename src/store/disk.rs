//! Filesystem store backend
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<store>/<sha256(key)>.json   key, status, headers, stored_at
//! <root>/<store>/<sha256(key)>.body   raw response bytes
//! ```
//!
//! Both files are written under a unique temp name and renamed into place,
//! body first, so a key is only listed once both files are complete.

use super::{CacheStorage, CachedResponse};
use crate::error::{ShellcacheError, ShellcacheResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Metadata file contents for one entry
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    stored_at: DateTime<Utc>,
}

/// Stores persisted as directories below a root
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> ShellcacheResult<PathBuf> {
        let valid = !store.is_empty()
            && store != "."
            && store != ".."
            && !store.contains(['/', '\\']);
        if !valid {
            return Err(ShellcacheError::User(format!(
                "Invalid store name '{}'",
                store
            )));
        }
        Ok(self.root.join(store))
    }

    fn digest(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Write through a uniquely named temp file so concurrent writers of the
    /// same entry never share one
    async fn write_atomic(path: &Path, contents: &[u8]) -> ShellcacheResult<()> {
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, contents)
            .await
            .map_err(|e| ShellcacheError::io(format!("writing {}", tmp_path.display()), e))?;
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ShellcacheError::io(format!("committing {}", path.display()), e));
        }
        Ok(())
    }

    async fn read_meta(store: &str, path: &Path) -> ShellcacheResult<EntryMeta> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ShellcacheError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&content).map_err(|e| ShellcacheError::StoreCorrupt {
            store: store.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn keys(&self, store: &str) -> ShellcacheResult<Vec<String>> {
        let dir = self.store_dir(store)?;
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut keys = vec![];
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("reading store {}", dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShellcacheError::io("reading store entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                keys.push(Self::read_meta(store, &path).await?.key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get(&self, store: &str, key: &str) -> ShellcacheResult<Option<CachedResponse>> {
        let dir = self.store_dir(store)?;
        let digest = Self::digest(key);
        let meta_path = dir.join(format!("{}.json", digest));
        if !meta_path.exists() {
            return Ok(None);
        }

        let meta = Self::read_meta(store, &meta_path).await?;
        let body_path = dir.join(format!("{}.body", digest));
        let body = fs::read(&body_path)
            .await
            .map_err(|e| ShellcacheError::StoreCorrupt {
                store: store.to_string(),
                reason: format!("body for {} unreadable: {}", key, e),
            })?;

        Ok(Some(CachedResponse {
            status: meta.status,
            headers: meta.headers,
            body,
        }))
    }

    async fn put(&self, store: &str, key: &str, response: &CachedResponse) -> ShellcacheResult<()> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("creating store {}", dir.display()), e))?;

        let digest = Self::digest(key);
        let body_path = dir.join(format!("{}.body", digest));
        Self::write_atomic(&body_path, &response.body).await?;

        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: Utc::now(),
        };
        let meta_path = dir.join(format!("{}.json", digest));
        Self::write_atomic(&meta_path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;

        debug!("Stored {} in {} ({} bytes)", key, store, response.len());
        Ok(())
    }

    async fn remove(&self, store: &str, key: &str) -> ShellcacheResult<bool> {
        let dir = self.store_dir(store)?;
        let digest = Self::digest(key);
        let meta_path = dir.join(format!("{}.json", digest));
        if !meta_path.exists() {
            return Ok(false);
        }

        fs::remove_file(&meta_path)
            .await
            .map_err(|e| ShellcacheError::io(format!("deleting {}", meta_path.display()), e))?;

        let body_path = dir.join(format!("{}.body", digest));
        if body_path.exists() {
            fs::remove_file(&body_path)
                .await
                .map_err(|e| ShellcacheError::io(format!("deleting {}", body_path.display()), e))?;
        }

        Ok(true)
    }

    async fn delete_store(&self, store: &str) -> ShellcacheResult<bool> {
        let dir = self.store_dir(store)?;
        if !dir.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("deleting store {}", dir.display()), e))?;
        debug!("Deleted store {}", dir.display());
        Ok(true)
    }

    async fn has_store(&self, store: &str) -> ShellcacheResult<bool> {
        Ok(self.store_dir(store)?.is_dir())
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
