//! Asset cache manager
//!
//! One [`AssetCacheManager`] is one lifecycle generation of the offline cache
//! for a deployed manifest:
//!
//! | Step | Effect |
//! |------|--------|
//! | install | Core resources fetched (revalidated) into the temp store |
//! | activate | Content store reconciled against the previous manifest, temp promoted |
//! | fetch | GETs for manifest keys answered from the content store or the network |
//! | message | `skipWaiting` / `downloadOffline` |
//!
//! Activation trusts nothing it cannot finish: any failure while touching the
//! stores deletes all three of them so the next generation starts clean.

mod lifecycle;
mod message;

pub use lifecycle::LifecycleState;
pub use message::{ControlMessage, MessageOutcome};

use crate::config::Config;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{CacheMode, FetchRequest, Fetcher};
use crate::key::Origin;
use crate::manifest::{CorePaths, ResourceManifest, ROOT_KEY};
use crate::reconcile::{missing_keys, reconcile};
use crate::store::{delete_stores, CacheStorage, CachedResponse, StoreNames};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Key of the single entry in the manifest store
pub const MANIFEST_ENTRY: &str = "manifest";

/// Parallel requests during install and offline download
const FETCH_CONCURRENCY: usize = 8;

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Core resources staged in the temp store
    pub staged: usize,
    /// Total body bytes staged
    pub bytes: u64,
}

/// Result of a successful activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// No previous manifest was stored, so the content store was rebuilt
    pub fresh_install: bool,
    /// Keys removed from the content store
    pub evicted: Vec<String>,
    /// Entries carried over unchanged from the previous generation
    pub retained: usize,
    /// Entries copied from the temp store into the content store
    pub promoted: usize,
}

/// Result of `downloadOffline`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    /// Resources fetched and stored by this call
    pub fetched: usize,
    /// Manifest resources that were already cached
    pub already_cached: usize,
}

/// How an intercepted request was answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not ours; the caller should perform the request itself
    Passthrough,
    /// Served from the content store
    Cached(CachedResponse),
    /// Served from the network
    Network(CachedResponse),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&CachedResponse> {
        match self {
            Self::Passthrough => None,
            Self::Cached(response) | Self::Network(response) => Some(response),
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Cached(_) => "cache",
            Self::Network(_) => "network",
        }
    }
}

/// Relation between the stored manifest and the one this generation carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredManifest {
    Absent,
    Current,
    Outdated,
}

/// Snapshot of the cache stores
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub generation: Uuid,
    pub state: LifecycleState,
    pub backend: &'static str,
    pub origin: String,
    pub manifest_entries: usize,
    pub stored_manifest: StoredManifest,
    pub content_entries: usize,
    pub temp_entries: usize,
    /// Manifest keys with no content entry
    pub missing: Vec<String>,
}

/// Offline cache for one deployed resource manifest
pub struct AssetCacheManager {
    generation: Uuid,
    origin: Origin,
    manifest: ResourceManifest,
    core: CorePaths,
    stores: StoreNames,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    root_timeout: Duration,
    skip_waiting_on_install: bool,
    state: Mutex<LifecycleState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl AssetCacheManager {
    /// Create a generation with default store names and timeouts
    pub fn new(
        origin: Origin,
        manifest: ResourceManifest,
        core: CorePaths,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let defaults = Config::default();
        Self {
            generation: Uuid::new_v4(),
            origin,
            manifest,
            core,
            stores: StoreNames::default(),
            storage,
            fetcher,
            root_timeout: defaults.network.root_timeout(),
            skip_waiting_on_install: defaults.lifecycle.skip_waiting_on_install,
            state: Mutex::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        }
    }

    /// Create a generation from configuration and an already loaded manifest
    pub fn from_config(
        config: &Config,
        manifest: ResourceManifest,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> ShellcacheResult<Self> {
        let origin = Origin::parse(&config.app.origin)?;
        let core = CorePaths::new(config.app.core.iter().cloned(), &manifest)?;

        Ok(Self::new(origin, manifest, core, storage, fetcher)
            .with_store_names(StoreNames::from_config(config))
            .with_root_timeout(config.network.root_timeout())
            .with_skip_waiting_on_install(config.lifecycle.skip_waiting_on_install))
    }

    pub fn with_store_names(mut self, stores: StoreNames) -> Self {
        self.stores = stores;
        self
    }

    /// Bound on how long the root document waits for the network
    pub fn with_root_timeout(mut self, timeout: Duration) -> Self {
        self.root_timeout = timeout;
        self
    }

    pub fn with_skip_waiting_on_install(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    pub fn stores(&self) -> &StoreNames {
        &self.stores
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether activation has taken control of open pages
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!(generation = %self.generation, "Lifecycle {} -> {}", *state, next);
        *state = next;
    }

    fn transition(
        &self,
        operation: &'static str,
        from: LifecycleState,
        to: LifecycleState,
    ) -> ShellcacheResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != from {
            return Err(ShellcacheError::LifecycleState {
                operation,
                state: state.to_string(),
            });
        }
        debug!(generation = %self.generation, "Lifecycle {} -> {}", *state, to);
        *state = to;
        Ok(())
    }

    /// Fetch the core resources into the temp store
    ///
    /// All-or-nothing: every core resource must come back with a 2xx status
    /// before anything is staged. The temp store is emptied first, so entries
    /// left by a generation that never activated cannot be promoted later. On
    /// failure the temp store is emptied again and the generation is redundant.
    pub async fn install(&self) -> ShellcacheResult<InstallReport> {
        self.transition("install", LifecycleState::Parsed, LifecycleState::Installing)?;
        info!(generation = %self.generation, "Installing {} core resources", self.core.len());

        if let Err(source) = self.storage.delete_store(&self.stores.temp).await {
            return Err(self.fail_install(self.stores.temp.clone(), source).await);
        }

        let keys: Vec<String> = self.core.iter().map(str::to_string).collect();
        let fetched = match self.fetch_all(keys, CacheMode::Reload).await {
            Ok(fetched) => fetched,
            Err((path, source)) => return Err(self.fail_install(path, source).await),
        };

        let mut bytes = 0u64;
        for (key, response) in &fetched {
            let url = self.origin.url_for(key);
            if let Err(source) = self.storage.put(&self.stores.temp, &url, response).await {
                return Err(self.fail_install(key.clone(), source).await);
            }
            bytes += response.len() as u64;
        }

        self.set_state(LifecycleState::Installed);
        info!(generation = %self.generation, "Installed, {} resources staged", fetched.len());

        if self.skip_waiting_on_install {
            self.skip_waiting();
        }

        Ok(InstallReport {
            staged: fetched.len(),
            bytes,
        })
    }

    async fn fail_install(&self, path: String, source: ShellcacheError) -> ShellcacheError {
        warn!(generation = %self.generation, "Install failed on {}: {}", path, source);
        if let Err(e) = self.storage.delete_store(&self.stores.temp).await {
            warn!(generation = %self.generation, "Could not clear {}: {}", self.stores.temp, e);
        }
        self.set_state(LifecycleState::Redundant);
        ShellcacheError::InstallFailed {
            path,
            source: Box::new(source),
        }
    }

    /// Request activation without waiting for old pages to close
    ///
    /// Returns true when this generation is installed and can be activated now.
    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting.store(true, Ordering::SeqCst);
        self.state().is_waiting()
    }

    /// Whether the host should call [`activate`](Self::activate) now
    pub fn should_activate(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst) && self.state().is_waiting()
    }

    /// Reconcile the stores against this generation's manifest
    ///
    /// On any failure all three stores are deleted and `ActivationFailed` is
    /// returned; the next generation then installs from scratch.
    pub async fn activate(&self) -> ShellcacheResult<ActivationReport> {
        self.transition("activate", LifecycleState::Installed, LifecycleState::Activating)?;
        info!(generation = %self.generation, "Activating");

        match self.reconcile_stores().await {
            Ok(report) => {
                self.set_state(LifecycleState::Activated);
                self.claim_clients();
                info!(
                    generation = %self.generation,
                    fresh = report.fresh_install,
                    "Activated: {} evicted, {} retained, {} promoted",
                    report.evicted.len(),
                    report.retained,
                    report.promoted
                );
                Ok(report)
            }
            Err(source) => {
                error!(generation = %self.generation, "Failed to upgrade cache: {}", source);
                if let Err(e) = self.reset().await {
                    error!(generation = %self.generation, "Cache reset incomplete: {}", e);
                }
                self.set_state(LifecycleState::Redundant);
                Err(ShellcacheError::ActivationFailed {
                    source: Box::new(source),
                })
            }
        }
    }

    async fn reconcile_stores(&self) -> ShellcacheResult<ActivationReport> {
        let content = self.stores.content.as_str();
        let temp = self.stores.temp.as_str();

        let Some(old_manifest) = self.stored_manifest().await? else {
            debug!("No stored manifest, rebuilding {}", content);
            self.storage.delete_store(content).await?;
            let promoted = self.promote_temp().await?;
            self.storage.delete_store(temp).await?;
            self.write_manifest().await?;

            return Ok(ActivationReport {
                fresh_install: true,
                promoted,
                ..ActivationReport::default()
            });
        };

        let mut urls_by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut evicted = Vec::new();
        for url in self.storage.keys(content).await? {
            match self.origin.logical_key(&url) {
                Some(key) => urls_by_key.entry(key).or_default().push(url),
                None => {
                    self.storage.remove(content, &url).await?;
                    debug!("Evicted foreign entry {}", url);
                    evicted.push(url);
                }
            }
        }

        let cached: BTreeSet<String> = urls_by_key.keys().cloned().collect();
        let plan = reconcile(&old_manifest, &self.manifest, &cached);

        for key in &plan.to_evict {
            for url in urls_by_key.get(key).into_iter().flatten() {
                self.storage.remove(content, url).await?;
            }
            debug!("Evicted {}", key);
            evicted.push(key.clone());
        }

        let promoted = self.promote_temp().await?;
        self.storage.delete_store(temp).await?;
        self.write_manifest().await?;

        Ok(ActivationReport {
            fresh_install: false,
            evicted,
            retained: plan.retained.len(),
            promoted,
        })
    }

    /// Manifest saved by the last successful activation
    pub async fn stored_manifest(&self) -> ShellcacheResult<Option<ResourceManifest>> {
        let Some(entry) = self
            .storage
            .get(&self.stores.manifest, MANIFEST_ENTRY)
            .await?
        else {
            return Ok(None);
        };

        let text = String::from_utf8(entry.body).map_err(|e| ShellcacheError::StoreCorrupt {
            store: self.stores.manifest.clone(),
            reason: format!("manifest is not UTF-8: {}", e),
        })?;
        ResourceManifest::parse(&text, "stored manifest").map(Some)
    }

    async fn write_manifest(&self) -> ShellcacheResult<()> {
        let entry = CachedResponse::new(200, self.manifest.to_json()?)
            .with_header("content-type", "application/json");
        self.storage
            .put(&self.stores.manifest, MANIFEST_ENTRY, &entry)
            .await
    }

    /// Copy this generation's core resources from temp into the content store
    ///
    /// Only core URLs are read; a staged core resource that has gone missing
    /// fails the activation.
    async fn promote_temp(&self) -> ShellcacheResult<usize> {
        let mut promoted = 0;
        for key in self.core.iter() {
            let url = self.origin.url_for(key);
            let Some(response) = self.storage.get(&self.stores.temp, &url).await? else {
                return Err(ShellcacheError::StoreCorrupt {
                    store: self.stores.temp.clone(),
                    reason: format!("staged core resource {} is missing", key),
                });
            };
            self.storage
                .put(&self.stores.content, &url, &response)
                .await?;
            promoted += 1;
        }
        Ok(promoted)
    }

    fn claim_clients(&self) {
        self.clients_claimed.store(true, Ordering::SeqCst);
        debug!(generation = %self.generation, "Claimed open clients");
    }

    /// Delete all three stores
    pub async fn reset(&self) -> ShellcacheResult<usize> {
        delete_stores(self.storage.as_ref(), &self.stores).await
    }

    /// Answer an intercepted request
    ///
    /// Only GETs for keys listed in the manifest are handled; everything else
    /// is [`FetchOutcome::Passthrough`]. The root document goes to the network
    /// first; all other keys are served from cache and filled lazily.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> ShellcacheResult<FetchOutcome> {
        if !request.is_get() {
            return Ok(FetchOutcome::Passthrough);
        }

        let Some(key) = self.origin.request_key(&request.url) else {
            return Ok(FetchOutcome::Passthrough);
        };
        if !self.manifest.contains(&key) {
            debug!("Not in manifest, passing through: {}", request.url);
            return Ok(FetchOutcome::Passthrough);
        }

        if key == ROOT_KEY {
            self.online_first(request).await
        } else {
            self.cache_first(request, &key).await
        }
    }

    async fn online_first(&self, request: &FetchRequest) -> ShellcacheResult<FetchOutcome> {
        let url = self.origin.url_for(ROOT_KEY);

        let failure = match tokio::time::timeout(self.root_timeout, self.fetcher.fetch(request)).await
        {
            Ok(Ok(response)) => {
                if response.is_ok() {
                    self.store_copy(&url, &response).await;
                }
                return Ok(FetchOutcome::Network(response));
            }
            Ok(Err(e)) => e,
            Err(_) => ShellcacheError::Timeout {
                url: request.url.clone(),
                timeout: self.root_timeout,
            },
        };

        match self.storage.get(&self.stores.content, &url).await? {
            Some(cached) => {
                warn!("Serving cached {} after network failure: {}", url, failure);
                Ok(FetchOutcome::Cached(cached))
            }
            None => Err(failure),
        }
    }

    async fn cache_first(&self, request: &FetchRequest, key: &str) -> ShellcacheResult<FetchOutcome> {
        let url = self.origin.url_for(key);

        if let Some(cached) = self.storage.get(&self.stores.content, &url).await? {
            debug!("Cache hit for {}", key);
            return Ok(FetchOutcome::Cached(cached));
        }

        let response = self.fetcher.fetch(request).await?;
        if response.is_ok() {
            self.store_copy(&url, &response).await;
        }
        Ok(FetchOutcome::Network(response))
    }

    /// Lazy fill; a failed write never fails the request
    async fn store_copy(&self, url: &str, response: &CachedResponse) {
        if let Err(e) = self.storage.put(&self.stores.content, url, response).await {
            warn!("Could not cache {}: {}", url, e);
        }
    }

    /// Handle a control message from the page
    pub async fn handle_message(&self, message: ControlMessage) -> ShellcacheResult<MessageOutcome> {
        debug!(generation = %self.generation, "Message {}", message);
        match message {
            ControlMessage::SkipWaiting => Ok(MessageOutcome::SkipWaiting {
                activate_now: self.skip_waiting(),
            }),
            ControlMessage::DownloadOffline => {
                self.download_offline().await.map(MessageOutcome::DownloadOffline)
            }
        }
    }

    /// Fetch and store every manifest resource missing from the content store
    ///
    /// Nothing is stored unless every missing resource was fetched.
    pub async fn download_offline(&self) -> ShellcacheResult<DownloadReport> {
        let cached = self.content_keys().await?;
        let missing = missing_keys(&self.manifest, &cached);
        let already_cached = self.manifest.len() - missing.len();

        if missing.is_empty() {
            debug!("All {} resources already cached", already_cached);
            return Ok(DownloadReport {
                fetched: 0,
                already_cached,
            });
        }

        info!("Downloading {} resources for offline use", missing.len());
        let fetched = self
            .fetch_all(missing, CacheMode::Default)
            .await
            .map_err(|(_, e)| e)?;

        for (key, response) in &fetched {
            self.storage
                .put(&self.stores.content, &self.origin.url_for(key), response)
                .await?;
        }

        Ok(DownloadReport {
            fetched: fetched.len(),
            already_cached,
        })
    }

    /// Logical keys currently in the content store
    async fn content_keys(&self) -> ShellcacheResult<BTreeSet<String>> {
        Ok(self
            .storage
            .keys(&self.stores.content)
            .await?
            .iter()
            .filter_map(|url| self.origin.logical_key(url))
            .collect())
    }

    /// Snapshot of the stores relative to this generation's manifest
    pub async fn status(&self) -> ShellcacheResult<CacheStatus> {
        let stored_manifest = match self.stored_manifest().await? {
            None => StoredManifest::Absent,
            Some(m) if m == self.manifest => StoredManifest::Current,
            Some(_) => StoredManifest::Outdated,
        };
        let content = self.content_keys().await?;
        let temp_entries = self.storage.keys(&self.stores.temp).await?.len();

        Ok(CacheStatus {
            generation: self.generation,
            state: self.state(),
            backend: self.storage.backend_name(),
            origin: self.origin.to_string(),
            manifest_entries: self.manifest.len(),
            stored_manifest,
            content_entries: content.len(),
            temp_entries,
            missing: missing_keys(&self.manifest, &content),
        })
    }

    /// Fetch resources concurrently, requiring a 2xx for each
    ///
    /// Results arrive in completion order. On failure returns the key that
    /// failed with its error.
    async fn fetch_all(
        &self,
        keys: Vec<String>,
        mode: CacheMode,
    ) -> Result<Vec<(String, CachedResponse)>, (String, ShellcacheError)> {
        let results: Vec<(String, ShellcacheResult<CachedResponse>)> = stream::iter(keys)
            .map(|key| async move {
                let url = self.origin.url_for(&key);
                let request = FetchRequest::get(url.clone()).with_cache_mode(mode);
                let result = match self.fetcher.fetch(&request).await {
                    Ok(response) if response.is_ok() => Ok(response),
                    Ok(response) => Err(ShellcacheError::HttpStatus {
                        url,
                        status: response.status,
                    }),
                    Err(e) => Err(e),
                };
                (key, result)
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        for (key, result) in results {
            match result {
                Ok(response) => fetched.push((key, response)),
                Err(e) => return Err((key, e)),
            }
        }
        Ok(fetched)
    }
}
