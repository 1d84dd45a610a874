//! In-memory TTL store backed by [`moka`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache as MokaCache;
use tracing::trace;

use super::{CacheEntry, CacheKey, CacheResult, CacheStore};
use crate::transport::BoxFuture;

#[derive(Clone)]
struct StoredEntry {
    entry: Arc<CacheEntry>,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<CacheKey, StoredEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    // A rewrite restarts the clock with the new entry's TTL.
    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Unbounded in-process store; entries leave only when their TTL elapses or
/// they are overwritten.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use revalidate::cache::{CacheEntry, CacheKey, CacheStore, MemoryStore};
///
/// #[tokio::main]
/// async fn main() {
///     let store = MemoryStore::new();
///     let key = CacheKey::from("GET:localhost:80:/");
///     let entry: CacheEntry = serde_json::from_str(
///         r#"{"headers":{},"rawHeaders":[],"httpVersion":"1.1","trailers":{},
///             "rawTrailers":[],"method":null,"url":null,"data":[104,105]}"#,
///     ).unwrap();
///
///     store.set(key.clone(), Arc::new(entry), Some(Duration::from_secs(60))).await.unwrap();
///     assert_eq!(store.get(&key).await.unwrap().unwrap().data, "hi");
/// }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    cache: MokaCache<CacheKey, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cache: MokaCache::builder().expire_after(PerEntryTtl).build(),
        }
    }

    /// Drops the entry for `key`, if any.
    pub async fn remove(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, CacheResult<Option<Arc<CacheEntry>>>> {
        Box::pin(async move {
            let found = self.cache.get(key).await.map(|stored| stored.entry);
            trace!(key = %key, hit = found.is_some(), "memory store lookup");
            Ok(found)
        })
    }

    fn set(
        &self,
        key: CacheKey,
        entry: Arc<CacheEntry>,
        ttl: Option<Duration>,
    ) -> BoxFuture<'_, CacheResult<()>> {
        Box::pin(async move {
            trace!(key = %key, bytes = entry.data.len(), ?ttl, "memory store write");
            self.cache.insert(key, StoredEntry { entry, ttl }).await;
            Ok(())
        })
    }
}
