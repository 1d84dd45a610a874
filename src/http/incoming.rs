//! Responses as seen by a client.

use std::sync::Arc;

use super::headers::HeaderMap;
use super::{Body, Headers, StatusCode, Version};
use crate::cache::CacheEntry;

/// Header stamped onto responses that were served from the cache.
pub const X_CACHED: &str = "x-cached";

/// A response received from (or synthesized on behalf of) an origin server.
///
/// Exposes the status line, a flattened [`HeaderMap`] (`headers`, last value
/// wins) next to the ordered wire view (`raw_headers`), and a streamed
/// [`Body`]. Trailers are reachable through the body once it has been read.
#[derive(Debug)]
pub struct IncomingResponse {
    status_code: u16,
    status_message: String,
    http_version: Version,
    headers: HeaderMap,
    raw_headers: Headers,
    method: Option<String>,
    url: Option<String>,
    body: Body,
    cached_entry: Option<Arc<CacheEntry>>,
}

impl IncomingResponse {
    /// Builds a response from its status line, headers and body.
    pub fn new(
        status_code: u16,
        status_message: impl Into<String>,
        http_version: Version,
        raw_headers: Headers,
        body: Body,
    ) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            http_version,
            headers: raw_headers.to_map(),
            raw_headers,
            method: None,
            url: None,
            body,
            cached_entry: None,
        }
    }

    /// Records the method and target of the exchange that produced this response.
    #[must_use]
    pub fn with_exchange(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.url = Some(url.into());
        self
    }

    /// Assembles a response field by field. Used by the cached-response synthesizer.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        status_code: u16,
        status_message: String,
        http_version: Version,
        headers: HeaderMap,
        raw_headers: Headers,
        method: Option<String>,
        url: Option<String>,
        body: Body,
        cached_entry: Option<Arc<CacheEntry>>,
    ) -> Self {
        Self {
            status_code,
            status_message,
            http_version,
            headers,
            raw_headers,
            method,
            url,
            body,
            cached_entry,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The status as a known [`StatusCode`], if this crate has a variant for it.
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status_code)
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn http_version(&self) -> Version {
        self.http_version
    }

    /// Flattened headers keyed by lowercase name.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Looks up a flattened header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Headers in wire order, duplicates included.
    pub fn raw_headers(&self) -> &Headers {
        &self.raw_headers
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns `true` if the body was served from the cache.
    pub fn is_cached(&self) -> bool {
        self.headers.contains_key(X_CACHED)
    }

    /// The stored entry a cache hit was synthesized from.
    pub fn cached_entry(&self) -> Option<&Arc<CacheEntry>> {
        self.cached_entry.as_ref()
    }

    /// Trailer fields in wire order, once the body has been read to the end.
    pub fn trailers(&self) -> Option<&Headers> {
        self.body.trailers()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Swaps the body, returning the previous one.
    pub(crate) fn replace_body(&mut self, body: Body) -> Body {
        std::mem::replace(&mut self.body, body)
    }

    /// Splits off the body, keeping every other field.
    pub(crate) fn take_body(&mut self) -> Body {
        self.replace_body(Body::empty())
    }
}
