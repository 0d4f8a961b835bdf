//! Manifest diffing, independent of any storage backend

use crate::manifest::ResourceManifest;
use std::collections::BTreeSet;

/// Outcome of comparing cached keys against an old and a new manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Keys that are gone from the new manifest or whose hash changed
    pub to_evict: BTreeSet<String>,
    /// Keys whose cached copy is still valid under the new manifest
    pub retained: BTreeSet<String>,
}

/// Decide which cached keys survive an upgrade from `old` to `new`
///
/// A key is kept only if the new manifest lists it with the same hash the old
/// manifest recorded. Keys the old manifest never knew are evicted because
/// their cached content has no verifiable version.
pub fn reconcile(
    old: &ResourceManifest,
    new: &ResourceManifest,
    content_keys: &BTreeSet<String>,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    for key in content_keys {
        let unchanged = match (new.hash(key), old.hash(key)) {
            (Some(current), Some(previous)) => current == previous,
            _ => false,
        };

        if unchanged {
            result.retained.insert(key.clone());
        } else {
            result.to_evict.insert(key.clone());
        }
    }

    result
}

/// Manifest keys that have no entry in the content store, in manifest order
pub fn missing_keys(manifest: &ResourceManifest, content_keys: &BTreeSet<String>) -> Vec<String> {
    manifest
        .keys()
        .filter(|key| !content_keys.contains(*key))
        .map(str::to_string)
        .collect()
}

/// Key-level differences between two manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

pub fn diff_manifests(old: &ResourceManifest, new: &ResourceManifest) -> ManifestDiff {
    let mut diff = ManifestDiff::default();

    for key in new.keys() {
        match old.hash(key) {
            None => diff.added.push(key.to_string()),
            Some(previous) if new.hash(key) != Some(previous) => diff.changed.push(key.to_string()),
            Some(_) => {}
        }
    }
    diff.removed = old
        .keys()
        .filter(|key| !new.contains(key))
        .map(str::to_string)
        .collect();

    diff
}
