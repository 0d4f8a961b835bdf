//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::config::{Config, ConfigManager};
use crate::error::ShellcacheResult;
use crate::fetch::HttpFetcher;
use crate::manager::AssetCacheManager;
use crate::manifest::ResourceManifest;
use crate::store::DiskStorage;
use std::sync::Arc;
use tracing::debug;

/// Loaded configuration shared by every command
pub struct AppContext {
    pub config_manager: ConfigManager,
    pub config: Config,
}

impl AppContext {
    pub fn new(config_manager: ConfigManager, config: Config) -> Self {
        Self {
            config_manager,
            config,
        }
    }

    /// Read the resource manifest named by the config
    pub async fn load_manifest(&self) -> ShellcacheResult<ResourceManifest> {
        let path = self.config_manager.manifest_path(&self.config);
        debug!("Loading manifest from {}", path.display());
        ResourceManifest::from_file(&path).await
    }

    pub fn storage(&self) -> Arc<DiskStorage> {
        Arc::new(DiskStorage::new(ConfigManager::cache_dir(&self.config)))
    }

    pub fn fetcher(&self) -> Arc<HttpFetcher> {
        Arc::new(HttpFetcher::new(self.config.network.request_timeout()))
    }

    /// A fresh lifecycle generation for the configured manifest
    pub async fn cache_manager(&self) -> ShellcacheResult<AssetCacheManager> {
        let manifest = self.load_manifest().await?;
        AssetCacheManager::from_config(&self.config, manifest, self.storage(), self.fetcher())
    }
}
