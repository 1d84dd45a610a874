//! HTTP/1.1 request parsing using the [`httparse`] crate.
//!
//! This is the origin side of the wire: the [`server`](crate::server) parses
//! what clients (including the caching decorator) send it.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, Version};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed HTTP/1.1 request as received by the origin.
///
/// The request target is split at `?`; only the path is kept, since origin
/// resources here are addressed by path alone.
///
/// # Examples
///
/// ```
/// use revalidate::http::request::Request;
///
/// let raw = b"GET /A.html HTTP/1.1\r\nHost: localhost\r\nIf-Modified-Since: x\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/A.html");
/// assert_eq!(request.if_modified_since(), Some("x"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    version: Version,
    headers: Headers,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses a request from `buf`.
    ///
    /// Returns the request and the offset at which its body begins, i.e. just
    /// past the blank line ending the head.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the head has not fully arrived yet.
    /// - [`RequestError::Parse`]: the head is malformed.
    /// - [`RequestError::MissingField`]: method, path or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut slots);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let Ok(method) = raw
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>();

        let target = raw
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let path = target.split('?').next().unwrap_or(target).to_owned();

        let version = raw
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let headers = raw
            .headers
            .iter()
            .filter_map(|h| Some((h.name, std::str::from_utf8(h.value).ok()?)))
            .collect();

        Ok((
            Self {
                method,
                path,
                version: Version::from_minor(version),
                headers,
                body: Bytes::copy_from_slice(&buf[body_offset..]),
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without any query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn http_version(&self) -> Version {
        self.version
    }

    /// Returns the `If-Modified-Since` validator sent by a revalidating client.
    pub fn if_modified_since(&self) -> Option<&str> {
        self.headers.get("if-modified-since")
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Bytes received past the head when the request was parsed.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should stay open after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive; HTTP/1.0 only with an explicit
    /// `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == Version::Http11,
        }
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}
