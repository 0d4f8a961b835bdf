//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache store location and names
    pub cache: CacheConfig,

    /// The application shell being cached
    pub app: AppConfig,

    /// Network timeouts
    pub network: NetworkConfig,

    /// Lifecycle behaviour
    pub lifecycle: LifecycleConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the stores (default: platform data dir)
    pub dir: Option<PathBuf>,

    /// Store holding the last applied manifest
    pub manifest_store: String,

    /// Staging store filled during install
    pub temp_store: String,

    /// Long-lived resource store served to fetches
    pub content_store: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            manifest_store: "flutter-app-manifest".to_string(),
            temp_store: "flutter-temp-cache".to_string(),
            content_store: "flutter-app-cache".to_string(),
        }
    }
}

/// Application shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin the resources are served from
    pub origin: String,

    /// Resource manifest JSON file (relative to the config file)
    pub manifest: PathBuf,

    /// Resources fetched during install
    pub core: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            manifest: PathBuf::from("resources.json"),
            core: vec![
                "main.dart.js".to_string(),
                "index.html".to_string(),
                "flutter_bootstrap.js".to_string(),
                "assets/AssetManifest.bin.json".to_string(),
                "assets/FontManifest.json".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Resolve the manifest path against the directory of the config file
    pub fn manifest_path(&self, config_dir: Option<&Path>) -> PathBuf {
        match config_dir {
            Some(dir) if self.manifest.is_relative() => dir.join(&self.manifest),
            _ => self.manifest.clone(),
        }
    }
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// How long the root document waits for the network before using the cache
    pub root_timeout_secs: u64,

    /// Upper bound for any single request
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            root_timeout_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

impl NetworkConfig {
    pub fn root_timeout(&self) -> Duration {
        Duration::from_secs(self.root_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Activate straight after a successful install
    pub skip_waiting_on_install: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            skip_waiting_on_install: true,
        }
    }
}
