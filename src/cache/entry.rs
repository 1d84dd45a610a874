//! Stored responses.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::Version;
use crate::http::headers::{HeaderMap, Headers};

/// A previously captured response, as persisted in a [`CacheStore`](super::CacheStore).
///
/// Built once, when a live response carrying `Last-Modified` has finished
/// streaming, and never mutated afterwards. Serializes to
/// `{headers, rawHeaders, httpVersion, trailers, rawTrailers, method, url, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Lowercase header name to value, last occurrence wins.
    pub headers: HeaderMap,
    /// Headers in wire order, duplicates preserved.
    pub raw_headers: Headers,
    pub http_version: Version,
    pub trailers: HeaderMap,
    pub raw_trailers: Headers,
    /// Method of the exchange that produced the response.
    pub method: Option<String>,
    /// Request target of the exchange that produced the response.
    pub url: Option<String>,
    /// The complete response body.
    pub data: Bytes,
}

impl CacheEntry {
    /// The validator sent back as `If-Modified-Since` on revalidation.
    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get("last-modified").map(String::as_str)
    }
}
