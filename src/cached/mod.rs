//! The caching decorator.
//!
//! [`CachedTransport`] wraps any [`Transport`] so that cacheable `GET`/`HEAD`
//! requests are revalidated against a local cache with `If-Modified-Since`:
//!
//! 1. [`CachedTransport::request`] derives the [`CacheKey`] and starts the
//!    cache lookup.
//! 2. [`ClientRequest::end`] waits until both the lookup and the body are done
//!    (the request gate), adding `If-Modified-Since` on a hit, then sends.
//! 3. A `304` against a stored entry is turned into a full response carrying
//!    the stored body and an `x-cached` marker; any other response is returned
//!    live, and stored on the way through when it has `Last-Modified`.
//!
//! Requests that are not flagged cacheable, or use another method, go straight
//! to the wrapped transport. Cache failures never reach the caller.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::cache::{CacheKey, CacheStore, global_store};
use crate::config::CacheConfig;
use crate::http::{IncomingResponse, RequestOptions};
use crate::transport::{self, BoxFuture, Transport, TransportError};

mod capture;
mod gate;
mod synthesize;

use capture::Capture;
use gate::RequestGate;

/// A [`Transport`] decorator that serves unchanged resources from a cache.
///
/// Decorators built with [`new`](Self::new) or [`for_protocol`](Self::for_protocol)
/// share the process-wide [`global_store`]; use [`with_store`](Self::with_store)
/// to give an instance its own store.
///
/// # Examples
///
/// ```rust,no_run
/// use revalidate::cached::CachedTransport;
/// use revalidate::config::CacheConfig;
/// use revalidate::http::RequestOptions;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = CachedTransport::for_protocol("http", CacheConfig::default())?;
///
///     let options = RequestOptions::get("localhost", 8080, "/A.html").cacheable(true);
///     let response = client.request(options).end().await?;
///     let cached = response.is_cached();
///     let body = response.into_body().bytes().await?;
///     println!("cached={cached} len={}", body.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CachedTransport {
    inner: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl CachedTransport {
    /// Wraps `inner`, storing entries in the process-wide store.
    pub fn new<T>(inner: T, config: CacheConfig) -> Self
    where
        T: Transport + 'static,
    {
        Self::with_store(inner, config, global_store())
    }

    /// Wraps `inner`, storing entries in `store`.
    pub fn with_store<T>(inner: T, config: CacheConfig, store: Arc<dyn CacheStore>) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            inner: Arc::new(inner),
            store,
            config,
        }
    }

    /// Wraps the transport registered for `protocol` (see [`transport::for_protocol`]).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnsupportedProtocol`] for unknown protocol names.
    pub fn for_protocol(protocol: &str, config: CacheConfig) -> Result<Self, TransportError> {
        Ok(Self {
            inner: transport::for_protocol(protocol)?,
            store: global_store(),
            config,
        })
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &Arc<dyn Transport> {
        &self.inner
    }

    /// The store entries are read from and written to.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// The configuration this decorator was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The key `options` would be cached under by this decorator.
    pub fn cache_key(&self, options: &RequestOptions) -> CacheKey {
        CacheKey::build(options, self.config.include_host_in_key)
    }

    /// Returns `true` if `options` takes the caching path: flagged cacheable
    /// and using `GET` or `HEAD`.
    pub fn is_cacheable(options: &RequestOptions) -> bool {
        options.is_cacheable() && options.method().is_cacheable()
    }

    /// Begins a request. Write the body (if any), then call [`ClientRequest::end`].
    ///
    /// For a cacheable request the cache lookup starts immediately on a
    /// spawned task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while `options` is cacheable.
    pub fn request(&self, options: RequestOptions) -> ClientRequest {
        let cache = Self::is_cacheable(&options).then(|| {
            let key = self.cache_key(&options);
            trace!(key = %key, "cacheable request");
            CachePath {
                gate: RequestGate::open(Arc::clone(&self.store), key.clone()),
                capture: Capture {
                    store: Arc::clone(&self.store),
                    key,
                    ttl: self.config.ttl(),
                },
            }
        });

        ClientRequest {
            options,
            body: BytesMut::new(),
            transport: Arc::clone(&self.inner),
            cache,
        }
    }
}

impl std::fmt::Debug for CachedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Transport for CachedTransport {
    fn send(
        &self,
        options: RequestOptions,
        body: Bytes,
    ) -> BoxFuture<'_, Result<IncomingResponse, TransportError>> {
        let mut request = self.request(options);
        request.write(&body);
        Box::pin(request.end())
    }
}

/// Per-request caching state: the gate that holds the request back and the
/// capture that may store its response.
struct CachePath {
    gate: RequestGate,
    capture: Capture,
}

/// A request in progress.
///
/// Nothing is transmitted until [`end`](Self::end) is called; a request that
/// is never ended is never sent.
pub struct ClientRequest {
    options: RequestOptions,
    body: BytesMut,
    transport: Arc<dyn Transport>,
    cache: Option<CachePath>,
}

impl ClientRequest {
    /// Appends to the request body.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// Sets a request header, replacing any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.headers_mut().set(name, value);
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Returns `true` if this request goes through the cache.
    pub fn is_cacheable(&self) -> bool {
        self.cache.is_some()
    }

    /// The cache slot of this request, if it is cacheable.
    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache.as_ref().map(|path| path.gate.key())
    }

    /// Finishes the body and resolves to the response.
    ///
    /// # Errors
    ///
    /// Only transport failures are returned, unchanged. Cache failures are
    /// absorbed.
    pub async fn end(self) -> Result<IncomingResponse, TransportError> {
        let Self {
            mut options,
            body,
            transport,
            cache,
        } = self;

        let Some(CachePath { gate, capture }) = cache else {
            return transport.send(options, body.freeze()).await;
        };

        let entry = gate.release(&mut options).await;
        let live = transport.send(options, body.freeze()).await?;
        Ok(synthesize::reconcile(live, entry, capture))
    }
}

impl std::fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRequest")
            .field("options", &self.options)
            .field("body_len", &self.body.len())
            .field("cache_key", &self.cache_key())
            .finish()
    }
}
