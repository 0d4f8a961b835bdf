//! Lifecycle states of one cache generation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a generation is in its install → activate → ready cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Created, nothing fetched yet
    Parsed,
    /// Core resources are being fetched into the temp store
    Installing,
    /// Installed and waiting to be activated
    Installed,
    /// Stores are being reconciled against the manifest
    Activating,
    /// Ready to serve fetches from the content store
    Activated,
    /// Install or activation failed; this generation is discarded
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    /// Whether a waiting generation may be activated
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Installed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_installed_is_waiting() {
        assert!(LifecycleState::Installed.is_waiting());
        assert!(!LifecycleState::Parsed.is_waiting());
        assert!(!LifecycleState::Activated.is_waiting());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Redundant).unwrap();
        assert_eq!(json, "\"redundant\"");
        assert_eq!(LifecycleState::Activating.to_string(), "activating");
    }
}
