//! Caching layer: keys, stored entries, and the store abstraction.
//!
//! ## Core types
//!
//! - [`CacheKey`]: deterministic slot identifier derived from a request.
//! - [`CacheEntry`]: an immutable, fully buffered response.
//! - [`CacheStore`]: async key/value store with per-entry time-to-live.
//! - [`MemoryStore`]: the in-process store backing [`global_store`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;

use crate::transport::BoxFuture;

pub mod entry;
pub mod key;
pub mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use store::MemoryStore;

/// Failures reported by a [`CacheStore`].
///
/// The caching decorator treats every one of these as a miss (on read) or
/// drops it (on write); they never reach a caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache store rejected entry {key}: {reason}")]
    Rejected { key: String, reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// A shared key/value store for [`CacheEntry`] values.
///
/// # Contract
///
/// - `get` resolves to `Ok(None)` for a missing or expired key.
/// - `set` replaces any existing entry; `ttl` of `None` means the entry never expires.
/// - Entries are handed over whole, so readers never observe a partial write.
/// - Implementations are shared across tasks and must be `Send + Sync`.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, CacheResult<Option<Arc<CacheEntry>>>>;

    fn set(
        &self,
        key: CacheKey,
        entry: Arc<CacheEntry>,
        ttl: Option<Duration>,
    ) -> BoxFuture<'_, CacheResult<()>>;
}

static GLOBAL_STORE: OnceLock<Arc<MemoryStore>> = OnceLock::new();

/// The process-wide store used by decorators constructed without an explicit one.
pub fn global_store() -> Arc<dyn CacheStore> {
    let store = GLOBAL_STORE.get_or_init(|| Arc::new(MemoryStore::new()));
    Arc::clone(store) as Arc<dyn CacheStore>
}
