//! Client-side request descriptors.

use super::{Headers, Method};

/// Everything a transport needs to issue one request, minus the body.
///
/// Method, destination, path, headers, and the `cacheable` opt-in consumed by
/// [`CachedTransport`](crate::cached::CachedTransport).
///
/// # Examples
///
/// ```
/// use revalidate::http::{Method, RequestOptions};
///
/// let options = RequestOptions::get("localhost", 8080, "/A.html")
///     .header("Authorization", "Bearer abc")
///     .cacheable(true);
///
/// assert_eq!(options.method(), &Method::Get);
/// assert_eq!(options.port(), 8080);
/// assert!(options.is_cacheable());
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    host: String,
    port: u16,
    path: String,
    headers: Headers,
    cacheable: bool,
}

impl RequestOptions {
    /// Port used when none is given.
    pub const DEFAULT_PORT: u16 = 80;

    /// Creates options for `method` against `host:port` at `path` (path and query, verbatim).
    pub fn new(method: Method, host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            port,
            path: path.into(),
            headers: Headers::new(),
            cacheable: false,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self::new(Method::Get, host, port, path)
    }

    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Opts the request into (or out of) the caching path.
    ///
    /// Only `GET` and `HEAD` are ever cached, regardless of this flag.
    #[must_use]
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the raw `cacheable` flag as set by the caller.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// `host:port`, the form used both for connecting and for the `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get("localhost", Self::DEFAULT_PORT, "/")
    }
}
