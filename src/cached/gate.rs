//! Request gate: holds a cacheable request back until it is safe to send.
//!
//! Two things must have happened before a cacheable request reaches the
//! transport: the cache lookup for its key has completed, and the caller has
//! finished the body. The lookup outcome decides whether an
//! `If-Modified-Since` header is added, so the request cannot go out earlier.
//! The two events may occur in either order; whichever comes second releases
//! the request, exactly once.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::http::RequestOptions;

/// Conditional request header carrying the stored validator.
pub(crate) const IF_MODIFIED_SINCE: &str = "if-modified-since";

/// The two preconditions of a single in-flight request.
///
/// Each `mark_*` returns `true` for exactly one call over the lifetime of the
/// state: the one that completes the pair.
#[derive(Debug, Default)]
pub(crate) struct PendingRequestState {
    cache_checked: bool,
    body_ended: bool,
    released: bool,
}

impl PendingRequestState {
    pub(crate) fn mark_cache_checked(&mut self) -> bool {
        self.cache_checked = true;
        self.try_release()
    }

    pub(crate) fn mark_body_ended(&mut self) -> bool {
        self.body_ended = true;
        self.try_release()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    fn try_release(&mut self) -> bool {
        if self.released || !(self.cache_checked && self.body_ended) {
            return false;
        }
        self.released = true;
        true
    }
}

/// Joins the cache lookup with the caller's end-of-body signal.
#[derive(Debug)]
pub(crate) struct RequestGate {
    key: CacheKey,
    state: PendingRequestState,
    lookup: Option<oneshot::Receiver<Option<Arc<CacheEntry>>>>,
    entry: Option<Arc<CacheEntry>>,
}

impl RequestGate {
    /// Starts the lookup for `key` on its own task.
    ///
    /// The lookup is always asynchronous, even against an in-memory store. A
    /// failing store is logged and treated as a miss.
    pub(crate) fn open(store: Arc<dyn CacheStore>, key: CacheKey) -> Self {
        let (tx, rx) = oneshot::channel();
        let lookup_key = key.clone();

        tokio::spawn(async move {
            let entry = match store.get(&lookup_key).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(key = %lookup_key, error = %e, "cache lookup failed, treating as miss");
                    None
                }
            };
            // The request may have been dropped without ever ending its body.
            let _ = tx.send(entry);
        });

        Self {
            key,
            state: PendingRequestState::default(),
            lookup: Some(rx),
            entry: None,
        }
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Records a finished lookup, if there is one, without waiting.
    fn poll_lookup(&mut self) -> bool {
        let Some(rx) = self.lookup.as_mut() else {
            return false;
        };
        match rx.try_recv() {
            Ok(entry) => self.finish_lookup(entry),
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => self.finish_lookup(None),
        }
    }

    /// Waits for the lookup to finish.
    async fn wait_lookup(&mut self) -> bool {
        match self.lookup.as_mut() {
            // A lookup task that died without answering counts as a miss.
            Some(rx) => {
                let entry = rx.await.unwrap_or(None);
                self.finish_lookup(entry)
            }
            None => false,
        }
    }

    fn finish_lookup(&mut self, entry: Option<Arc<CacheEntry>>) -> bool {
        self.lookup = None;
        self.entry = entry;
        self.state.mark_cache_checked()
    }

    /// Signals end-of-body and resolves once the request may be transmitted.
    ///
    /// On a hit, `If-Modified-Since` is set on `options` from the stored
    /// `Last-Modified` before returning the entry. Consuming `self` makes the
    /// release happen at most once.
    pub(crate) async fn release(mut self, options: &mut RequestOptions) -> Option<Arc<CacheEntry>> {
        // Observe a lookup that already finished first, so the state sees the
        // events in the order they actually happened.
        self.poll_lookup();
        let released = self.state.mark_body_ended() || self.wait_lookup().await;
        debug_assert!(released && self.state.is_released());

        if let Some(last_modified) = self.entry.as_ref().and_then(|e| e.last_modified()) {
            options.headers_mut().set(IF_MODIFIED_SINCE, last_modified);
        }

        debug!(key = %self.key, hit = self.entry.is_some(), "request gate released");
        self.entry
    }
}
