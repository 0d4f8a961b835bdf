//! Shellcache - offline asset cache for web application shells
//!
//! Keeps a versioned copy of an app's static resources in local stores,
//! reconciles it against each new resource manifest, and answers requests
//! cache-first with the root document fetched online-first.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod key;
pub mod manager;
pub mod manifest;
pub mod reconcile;
pub mod store;

/// Test doubles for the fetch and storage seams; public so integration tests
/// and embedders can drive the manager without a network
#[doc(hidden)]
pub mod testing;

pub use error::{ShellcacheError, ShellcacheResult};
pub use key::Origin;
pub use manager::AssetCacheManager;
pub use manifest::ResourceManifest;
