//! Error types for shellcache
//!
//! All modules use `ShellcacheResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type ShellcacheResult<T> = Result<T, ShellcacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellcacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Manifest errors
    #[error("Invalid resource manifest {origin}: {reason}")]
    ManifestInvalid { origin: String, reason: String },

    #[error("Core path is not listed in the resource manifest: {0}")]
    CorePathUnknown(String),

    // Network errors
    #[error("Network request for {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Request for {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Request for {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // Lifecycle errors
    #[error("Install failed while fetching {path}: {source}")]
    InstallFailed {
        path: String,
        #[source]
        source: Box<ShellcacheError>,
    },

    #[error("Activation failed, all caches were reset: {source}")]
    ActivationFailed {
        #[source]
        source: Box<ShellcacheError>,
    },

    #[error("Cannot {operation} while generation is {state}")]
    LifecycleState {
        operation: &'static str,
        state: String,
    },

    #[error("Unknown control message: {0:?}")]
    UnknownMessage(String),

    // Storage errors
    #[error("Corrupt entry in store {store}: {reason}")]
    StoreCorrupt { store: String, reason: String },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network transport error
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the network rather than local state
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => true,
            Self::InstallFailed { source, .. } => source.is_network(),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => {
                Some("Check that app.origin in the config is reachable")
            }
            Self::InstallFailed { .. } => {
                Some("Nothing was committed; fix the origin and run: shellcache sync")
            }
            Self::ActivationFailed { .. } => Some("Run: shellcache sync to re-install from scratch"),
            Self::CorePathUnknown(_) => Some("Every app.core entry must be a key of the manifest"),
            Self::ConfigNotFound(_) => Some("Run: shellcache config init"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ShellcacheError::HttpStatus {
            url: "http://localhost/a.js".to_string(),
            status: 404,
        };
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn timeout_display_keeps_sub_second_precision() {
        let err = ShellcacheError::Timeout {
            url: "http://localhost/".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Request for http://localhost/ timed out after 250ms");
    }

    #[test]
    fn error_hint() {
        let err = ShellcacheError::ActivationFailed {
            source: Box::new(ShellcacheError::Internal("boom".to_string())),
        };
        assert_eq!(
            err.hint(),
            Some("Run: shellcache sync to re-install from scratch")
        );
        assert!(ShellcacheError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn install_failure_inherits_network_kind() {
        let err = ShellcacheError::InstallFailed {
            path: "main.dart.js".to_string(),
            source: Box::new(ShellcacheError::network("http://x/main.dart.js", "refused")),
        };
        assert!(err.is_network());
        assert!(!ShellcacheError::UnknownMessage("ping".to_string()).is_network());
    }
}
