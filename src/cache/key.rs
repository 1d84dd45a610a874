//! Cache key derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::http::RequestOptions;

/// Identifies the cache slot of a request.
///
/// Built from, in order: the `Authorization` value (if any), the method, the
/// host (when enabled), the port, and the path. Segments are joined with `:`;
/// an absent authorization contributes nothing, not even a separator. No
/// normalization is applied, so callers must present canonically identical
/// requests to share an entry.
///
/// # Examples
///
/// ```
/// use revalidate::cache::CacheKey;
/// use revalidate::http::RequestOptions;
///
/// let options = RequestOptions::get("localhost", 8080, "/A.html");
/// assert_eq!(CacheKey::build(&options, false).as_str(), "GET:8080:/A.html");
/// assert_eq!(CacheKey::build(&options, true).as_str(), "GET:localhost:8080:/A.html");
///
/// let authed = options.header("Authorization", "Bearer t");
/// assert_eq!(CacheKey::build(&authed, false).as_str(), "Bearer t:GET:8080:/A.html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `options`. Pure and deterministic.
    ///
    /// `include_host` inserts the destination host between method and port so
    /// that two hosts serving the same port and path get separate slots.
    pub fn build(options: &RequestOptions, include_host: bool) -> Self {
        let mut key = String::with_capacity(options.path().len() + 32);

        if let Some(authorization) = options.headers().get("authorization") {
            key.push_str(authorization);
            key.push(':');
        }
        key.push_str(options.method().as_str());
        key.push(':');
        if include_host {
            key.push_str(options.host());
            key.push(':');
        }
        key.push_str(&options.port().to_string());
        key.push(':');
        key.push_str(options.path());

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
