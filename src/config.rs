//! Decorator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time-to-live applied to cache entries when none is configured, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Options recognised by [`CachedTransport`](crate::cached::CachedTransport).
///
/// Deserializes from camelCase JSON; an absent or `null` `cacheTtl` falls back
/// to [`DEFAULT_CACHE_TTL_SECS`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use revalidate::config::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "cacheTtl": null }"#).unwrap();
/// assert_eq!(config.ttl(), Some(Duration::from_secs(3600)));
/// assert!(config.include_host_in_key);
///
/// let forever = CacheConfig::from_json(r#"{ "cacheTtl": 0 }"#).unwrap();
/// assert_eq!(forever.ttl(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds. `0` keeps entries until overwritten.
    pub cache_ttl: Option<u64>,
    /// Whether the destination host participates in the cache key.
    pub include_host_in_key: bool,
}

impl CacheConfig {
    /// Parses a configuration object from JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl = Some(seconds);
        self
    }

    #[must_use]
    pub fn include_host_in_key(mut self, include: bool) -> Self {
        self.include_host_in_key = include;
        self
    }

    /// Effective entry lifetime; `None` means entries do not expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL_SECS) {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_ttl: None,
            include_host_in_key: true,
        }
    }
}
