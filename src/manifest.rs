//! Resource manifest parsing and generation
//!
//! A manifest maps every resource path of a deployed shell to a content hash.
//! The root document is aliased as `/`. Two manifests with the same hash for a
//! key mean the cached copy of that key can be reused across deployments.

use crate::error::{ShellcacheError, ShellcacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Key under which the root document is recorded
pub const ROOT_KEY: &str = "/";

/// Resource path to content hash, one per deployed version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest(BTreeMap<String, String>);

impl ResourceManifest {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// Parse a manifest from its JSON form
    ///
    /// `origin` names where the text came from and is only used in errors.
    pub fn parse(content: &str, origin: &str) -> ShellcacheResult<Self> {
        serde_json::from_str(content).map_err(|e| ShellcacheError::ManifestInvalid {
            origin: origin.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a manifest file
    pub async fn from_file(path: &Path) -> ShellcacheResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ShellcacheError::io(format!("reading manifest {}", path.display()), e)
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn to_json(&self) -> ShellcacheResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn to_json_pretty(&self) -> ShellcacheResult<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Content hash recorded for a key
    pub fn hash(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Generate a manifest by hashing every file below `dir`
    ///
    /// Keys are `/`-separated paths relative to `dir`. When `index` exists its
    /// hash is recorded a second time under [`ROOT_KEY`].
    pub fn build_from_dir(dir: &Path, index: &str) -> ShellcacheResult<Self> {
        let mut entries = BTreeMap::new();
        collect_hashes(dir, dir, &mut entries)?;

        if let Some(hash) = entries.get(index).cloned() {
            entries.insert(ROOT_KEY.to_string(), hash);
        }

        debug!("Hashed {} resources under {}", entries.len(), dir.display());
        Ok(Self(entries))
    }
}

impl FromIterator<(String, String)> for ResourceManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Content hash of a resource: SHA256, first 32 hex chars
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

fn collect_hashes(
    root: &Path,
    dir: &Path,
    entries: &mut BTreeMap<String, String>,
) -> ShellcacheResult<()> {
    let read_dir = fs::read_dir(dir)
        .map_err(|e| ShellcacheError::io(format!("reading directory {}", dir.display()), e))?;

    let mut paths = Vec::new();
    for entry in read_dir {
        let entry = entry
            .map_err(|e| ShellcacheError::io(format!("reading entry in {}", dir.display()), e))?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_hashes(root, &path, entries)?;
            continue;
        }

        let relative = path.strip_prefix(root).map_err(|_| {
            ShellcacheError::Internal(format!("{} escaped {}", path.display(), root.display()))
        })?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let contents = fs::read(&path)
            .map_err(|e| ShellcacheError::io(format!("reading {}", path.display()), e))?;
        entries.insert(key, content_hash(&contents));
    }

    Ok(())
}

/// Resources that must be cached before the shell works offline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorePaths(Vec<String>);

impl CorePaths {
    /// Build the core set, rejecting paths the manifest does not list
    ///
    /// Order is preserved and duplicates are dropped.
    pub fn new<I, S>(paths: I, manifest: &ResourceManifest) -> ShellcacheResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut core: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !manifest.contains(&path) {
                return Err(ShellcacheError::CorePathUnknown(path));
            }
            if !core.contains(&path) {
                core.push(path);
            }
        }
        Ok(Self(core))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
