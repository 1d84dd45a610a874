//! Cache capture, a passive tap that stores a live response as it streams.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::http::body::{BodySender, Frame};
use crate::http::{Body, Headers, IncomingResponse, Version};
use crate::http::headers::HeaderMap;
use crate::http::success_status;

/// Where, and for how long, a captured response is stored.
#[derive(Clone)]
pub(crate) struct Capture {
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) key: CacheKey,
    pub(crate) ttl: Option<Duration>,
}

/// Response metadata copied into the entry once the body is complete.
struct EntryHead {
    headers: HeaderMap,
    raw_headers: Headers,
    http_version: Version,
    method: Option<String>,
    url: Option<String>,
}

impl Capture {
    /// Attaches the tap to `live` if it is worth storing, and returns it.
    ///
    /// Only 2xx responses carrying `Last-Modified` are stored; anything else is
    /// returned untouched. The tap is in place before this returns, so it sees
    /// every byte no matter how the caller later reads (or drops) the body.
    pub(crate) fn attach(self, mut live: IncomingResponse) -> IncomingResponse {
        if !success_status(live.status_code()) {
            trace!(key = %self.key, status = live.status_code(), "not capturing non-success response");
            return live;
        }
        if live.header("last-modified").is_none() {
            trace!(key = %self.key, "not capturing response without last-modified");
            return live;
        }

        let head = EntryHead {
            headers: live.headers().clone(),
            raw_headers: live.raw_headers().clone(),
            http_version: live.http_version(),
            method: live.method().map(str::to_owned),
            url: live.url().map(str::to_owned),
        };

        let (tx, body) = Body::channel();
        let upstream = live.replace_body(body);
        tokio::spawn(self.tap(upstream, head, tx));
        live
    }

    /// Forwards `upstream` to `tx` while buffering it, then writes the entry.
    ///
    /// The entry is written before `tx` is dropped, so a caller that has read
    /// the body to the end can rely on the store being populated.
    async fn tap(self, mut upstream: Body, head: EntryHead, tx: BodySender) {
        let mut data = BytesMut::new();
        let mut raw_trailers = Headers::new();
        let mut forwarding = true;

        while let Some(frame) = upstream.frame().await {
            match frame {
                Ok(Frame::Data(chunk)) => {
                    data.extend_from_slice(&chunk);
                    if forwarding {
                        forwarding = tx.send(Ok(Frame::Data(chunk))).await;
                    }
                }
                Ok(Frame::Trailers(trailers)) => {
                    raw_trailers = trailers.clone();
                    if forwarding {
                        forwarding = tx.send(Ok(Frame::Trailers(trailers))).await;
                    }
                }
                Err(e) => {
                    debug!(key = %self.key, error = %e, "body interrupted, not caching");
                    tx.send(Err(e)).await;
                    return;
                }
            }
        }

        let entry = CacheEntry {
            headers: head.headers,
            raw_headers: head.raw_headers,
            http_version: head.http_version,
            trailers: raw_trailers.to_map(),
            raw_trailers,
            method: head.method,
            url: head.url,
            data: data.freeze(),
        };
        let bytes = entry.data.len();

        match self.store.set(self.key.clone(), Arc::new(entry), self.ttl).await {
            Ok(()) => debug!(key = %self.key, bytes, "response captured"),
            Err(e) => warn!(key = %self.key, error = %e, "cache write failed, response not stored"),
        }
        drop(tx);
    }
}
