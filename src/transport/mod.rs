//! The underlying transport, whatever actually puts a request on the wire.
//!
//! [`Transport`] is the seam the caching decorator wraps. Futures are boxed so
//! the trait stays object-safe and transports can be stacked and stored as
//! `Arc<dyn Transport>`.

use std::{future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use thiserror::Error;

use crate::http::{IncomingResponse, RequestOptions};

pub mod tcp;

pub use tcp::TcpTransport;

/// A heap-allocated, `Send` future borrowing from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors surfaced by a transport. These are the only errors a caller of the
/// caching decorator ever sees.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("invalid chunk size in chunked response body")]
    InvalidChunkSize,

    #[error("connection closed before the response head was complete")]
    IncompleteResponse,

    #[error("response head exceeds maximum allowed size of {max_bytes} bytes")]
    HeadTooLarge { max_bytes: usize },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unsupported transport protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("connection closed before the response body was complete")]
    BodyInterrupted,
}

impl From<httparse::InvalidChunkSize> for TransportError {
    fn from(_: httparse::InvalidChunkSize) -> Self {
        TransportError::InvalidChunkSize
    }
}

/// Issues one HTTP exchange.
///
/// # Contract
///
/// - `send` transmits the request described by `options` with `body` as its
///   payload, and resolves once the response status line and headers are in.
/// - The response body streams afterwards through [`IncomingResponse::body_mut`].
/// - Implementations must not interpret the status code; a 404 or 500 is a
///   successful exchange.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        options: RequestOptions,
        body: Bytes,
    ) -> BoxFuture<'_, Result<IncomingResponse, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        options: RequestOptions,
        body: Bytes,
    ) -> BoxFuture<'_, Result<IncomingResponse, TransportError>> {
        (**self).send(options, body)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(
        &self,
        options: RequestOptions,
        body: Bytes,
    ) -> BoxFuture<'_, Result<IncomingResponse, TransportError>> {
        (**self).send(options, body)
    }
}

/// Resolves a transport by protocol name (`"http"`, optionally with a trailing `:`).
///
/// # Errors
///
/// Returns [`TransportError::UnsupportedProtocol`] for anything but plain HTTP.
pub fn for_protocol(name: &str) -> Result<Arc<dyn Transport>, TransportError> {
    let normalized = name.trim().trim_end_matches(':').to_ascii_lowercase();
    match normalized.as_str() {
        "http" => Ok(Arc::new(TcpTransport::new())),
        _ => Err(TransportError::UnsupportedProtocol(name.to_owned())),
    }
}
