//! Cached-response synthesizer and the 304-versus-live reconciliation.

use std::sync::Arc;

use tracing::debug;

use super::capture::Capture;
use crate::cache::CacheEntry;
use crate::http::body::{BodySender, Frame};
use crate::http::incoming::X_CACHED;
use crate::http::{Body, IncomingResponse, StatusCode};

/// Decides what the caller gets back for a released, cacheable request.
///
/// A `304` against a stored entry becomes a synthesized cache hit. Anything
/// else is the live response, with the capture tap attached when it is worth
/// storing.
pub(crate) fn reconcile(
    live: IncomingResponse,
    entry: Option<Arc<CacheEntry>>,
    capture: Capture,
) -> IncomingResponse {
    match entry {
        Some(entry) if live.status_code() == StatusCode::NotModified.as_u16() => {
            debug!(key = %capture.key, bytes = entry.data.len(), "not modified, serving cached entry");
            synthesize(live, entry)
        }
        // A 304 with nothing stored answers a conditional header the caller set
        // themselves; hand it over as-is.
        _ => capture.attach(live),
    }
}

/// Builds a cache hit from a fresh `304` and the stored entry.
///
/// Status line, headers, and trailers come from the `304`; HTTP version,
/// method, url, and body come from the entry. The `x-cached` marker is always
/// set. The stored body is pushed as a single chunk once the live (empty) body
/// has been drained.
pub(crate) fn synthesize(mut live: IncomingResponse, entry: Arc<CacheEntry>) -> IncomingResponse {
    let mut headers = live.headers().clone();
    headers.insert(X_CACHED.to_owned(), "true".to_owned());

    let upstream = live.take_body();
    let (tx, body) = Body::channel();
    tokio::spawn(replay(upstream, Arc::clone(&entry), tx));

    IncomingResponse::from_parts(
        StatusCode::NotModified.as_u16(),
        live.status_message().to_owned(),
        entry.http_version,
        headers,
        live.raw_headers().clone(),
        entry.method.clone(),
        entry.url.clone(),
        body,
        Some(entry),
    )
}

async fn replay(mut live: Body, entry: Arc<CacheEntry>, tx: BodySender) {
    let mut trailers = None;
    while let Some(frame) = live.frame().await {
        match frame {
            Ok(Frame::Data(_)) => {}
            Ok(Frame::Trailers(t)) => trailers = Some(t),
            Err(e) => {
                tx.send(Err(e)).await;
                return;
            }
        }
    }

    if !tx.send_data(entry.data.clone()).await {
        return;
    }
    if let Some(trailers) = trailers {
        tx.send(Ok(Frame::Trailers(trailers))).await;
    }
}
