//! Request key normalization
//!
//! Every cached resource is identified by its logical key: the request URL
//! with the origin and the following `/` removed. The root document is `/`.

use crate::error::{ShellcacheError, ShellcacheResult};
use crate::manifest::ROOT_KEY;
use std::fmt;

/// Cache-busting query marker stripped before lookup
const VERSION_QUERY: &str = "?v=";

/// The origin whose requests are intercepted, without a trailing slash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(String);

impl Origin {
    /// Parse an origin such as `http://localhost:8080`
    pub fn parse(origin: &str) -> ShellcacheResult<Self> {
        let trimmed = origin.trim().trim_end_matches('/');
        let valid_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
        let host = trimmed.split_once("://").map(|(_, h)| h).unwrap_or_default();

        if !valid_scheme || host.is_empty() || host.contains('/') {
            return Err(ShellcacheError::User(format!(
                "Invalid origin '{}'. Expected scheme://host[:port]",
                origin
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical URL for a logical key; the store key for content entries
    pub fn url_for(&self, key: &str) -> String {
        if key == ROOT_KEY {
            format!("{}/", self.0)
        } else {
            format!("{}/{}", self.0, key.trim_start_matches('/'))
        }
    }

    /// Logical key of a stored URL, `None` when it belongs to another origin
    pub fn logical_key(&self, url: &str) -> Option<String> {
        let rest = self.relative(url)?;
        if rest.is_empty() {
            Some(ROOT_KEY.to_string())
        } else {
            Some(rest.to_string())
        }
    }

    /// Lookup key for an intercepted request
    ///
    /// Strips the `?v=` cache-busting suffix and maps the bare origin, hash
    /// navigation (`<origin>/#...`) and an empty path to `/`.
    pub fn request_key(&self, url: &str) -> Option<String> {
        let mut key = self.relative(url)?;
        if let Some((path, _)) = key.split_once(VERSION_QUERY) {
            key = path;
        }

        let hash_navigation = url
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with("/#"));

        if url == self.0 || hash_navigation || key.is_empty() {
            Some(ROOT_KEY.to_string())
        } else {
            Some(key.to_string())
        }
    }

    /// Part of `url` after `<origin>/`, empty for the origin itself
    fn relative<'a>(&self, url: &'a str) -> Option<&'a str> {
        let rest = url.strip_prefix(self.0.as_str())?;
        if rest.is_empty() {
            return Some("");
        }
        rest.strip_prefix('/')
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
