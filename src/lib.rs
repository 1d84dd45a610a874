//! # revalidate
//!
//! A transparent conditional-GET cache for async HTTP/1.1 clients.
//!
//! [`CachedTransport`] decorates any [`Transport`]. Cacheable `GET`/`HEAD`
//! responses that carry `Last-Modified` are stored whole; the next request for
//! the same resource goes out with `If-Modified-Since`, and a `304 Not Modified`
//! answer is handed back with the stored body and an `x-cached: true` header.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use revalidate::{CacheConfig, CachedTransport, RequestOptions, TcpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::default().cache_ttl(600);
//!     let client = CachedTransport::new(TcpTransport::new(), config);
//!
//!     for _ in 0..2 {
//!         let options = RequestOptions::get("127.0.0.1", 8080, "/A.html").cacheable(true);
//!         let response = client.request(options).end().await?;
//!         println!("{} cached={}", response.status_code(), response.is_cached());
//!         let body = response.into_body().bytes().await?;
//!         println!("{} bytes", body.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cached;
pub mod config;
pub mod http;
pub mod server;
pub mod transport;

pub use cache::{CacheEntry, CacheError, CacheKey, CacheStore, MemoryStore, global_store};
pub use cached::{CachedTransport, ClientRequest};
pub use config::CacheConfig;
pub use http::{
    Body, Headers, IncomingResponse, Method, Request, RequestOptions, Response, StatusCode,
    Version,
};
pub use server::{Server, ServerError};
pub use transport::{TcpTransport, Transport, TransportError};
