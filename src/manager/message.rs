//! Control messages sent to a running cache manager

use super::DownloadReport;
use crate::error::ShellcacheError;
use std::fmt;
use std::str::FromStr;

/// Explicit requests from the page that owns the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate a waiting generation now; the page must reload to see it
    SkipWaiting,
    /// Fetch every manifest resource the content store is missing
    DownloadOffline,
}

impl ControlMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipWaiting => "skipWaiting",
            Self::DownloadOffline => "downloadOffline",
        }
    }
}

impl FromStr for ControlMessage {
    type Err = ShellcacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipWaiting" => Ok(Self::SkipWaiting),
            "downloadOffline" => Ok(Self::DownloadOffline),
            other => Err(ShellcacheError::UnknownMessage(other.to_string())),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What handling a control message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// `activate_now` is true when a waiting generation can be activated
    SkipWaiting { activate_now: bool },
    DownloadOffline(DownloadReport),
}
