//! HTTP/1.1 client transport over a plain Tokio TCP connection.
//!
//! One connection per exchange (`Connection: close`). The response head is
//! parsed with [`httparse`]; the body is decoded on a spawned task and streamed
//! into the response's [`Body`] so the caller gets the response as soon as the
//! headers are in.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{BoxFuture, Transport, TransportError};
use crate::http::body::{BodySender, Frame};
use crate::http::{Body, Headers, IncomingResponse, Method, RequestOptions, Version, bodiless_status};

/// Maximum number of headers (or trailers) we accept per response.
const MAX_HEADERS: usize = 64;

/// Maximum size of a response head we will buffer before giving up (64 KiB).
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Read buffer growth step.
const READ_CHUNK: usize = 8 * 1024;

/// Plain-HTTP transport.
///
/// # Examples
///
/// ```rust,no_run
/// use bytes::Bytes;
/// use revalidate::http::RequestOptions;
/// use revalidate::transport::{TcpTransport, Transport};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = TcpTransport::new();
///     let options = RequestOptions::get("localhost", 8080, "/");
///     let response = transport.send(options, Bytes::new()).await?;
///     println!("{} {}", response.status_code(), response.status_message());
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct TcpTransport {
    _priv: (),
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn exchange(
        &self,
        options: RequestOptions,
        body: Bytes,
    ) -> Result<IncomingResponse, TransportError> {
        let addr = options.authority();
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| TransportError::Connect {
                addr: addr.clone(),
                source: e,
            })?;

        stream.write_all(&encode_request(&options, &body)).await?;
        stream.flush().await?;

        debug!(
            addr = %addr,
            method = %options.method(),
            path = %options.path(),
            "request sent"
        );

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let head = loop {
            match ResponseHead::parse(&buf)? {
                // Interim 1xx responses (other than 101) precede the real one.
                Some(head) if (100..200).contains(&head.code) && head.code != 101 => {
                    let _ = buf.split_to(head.len);
                    continue;
                }
                Some(head) => break head,
                None => {}
            }
            if buf.len() > MAX_HEAD_SIZE {
                return Err(TransportError::HeadTooLarge {
                    max_bytes: MAX_HEAD_SIZE,
                });
            }
            buf.reserve(READ_CHUNK);
            if stream.read_buf(&mut buf).await? == 0 {
                return Err(TransportError::IncompleteResponse);
            }
        };
        let _ = buf.split_to(head.len);

        let framing = Framing::for_response(options.method(), head.code, &head.headers);
        trace!(status = head.code, ?framing, "response head parsed");

        let body = match framing {
            Framing::Empty => Body::empty(),
            framing => {
                let (tx, body) = Body::channel();
                tokio::spawn(pump_body(stream, buf, framing, tx));
                body
            }
        };

        Ok(IncomingResponse::new(
            head.code,
            head.reason,
            head.version,
            head.headers,
            body,
        )
        .with_exchange(options.method().as_str(), options.path()))
    }
}

impl Transport for TcpTransport {
    fn send(
        &self,
        options: RequestOptions,
        body: Bytes,
    ) -> BoxFuture<'_, Result<IncomingResponse, TransportError>> {
        Box::pin(self.exchange(options, body))
    }
}

/// Serializes the request line, headers and body in HTTP/1.1 wire format.
///
/// Adds `Host`, `Content-Length` (non-empty bodies only) and `Connection: close`
/// unless the caller already set them.
fn encode_request(options: &RequestOptions, body: &[u8]) -> BytesMut {
    let headers = options.headers();
    let mut buf = BytesMut::with_capacity(128 + headers.len() * 64 + body.len());

    buf.put(format!("{} {} HTTP/1.1\r\n", options.method(), options.path()).as_bytes());

    if !headers.contains("host") {
        buf.put(format!("Host: {}\r\n", options.authority()).as_bytes());
    }
    for (name, value) in headers.iter() {
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }
    if !body.is_empty() && !headers.contains("content-length") {
        buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    if !headers.contains("connection") {
        buf.put(&b"Connection: close\r\n"[..]);
    }

    buf.put(&b"\r\n"[..]);
    buf.put(body);
    buf
}

/// Parsed status line and headers of a response.
#[derive(Debug)]
struct ResponseHead {
    code: u16,
    reason: String,
    version: Version,
    headers: Headers,
    /// Length of the head in the buffer, terminator included.
    len: usize,
}

impl ResponseHead {
    /// Returns `Ok(None)` while the head is still incomplete.
    fn parse(buf: &[u8]) -> Result<Option<Self>, TransportError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut slots);

        let len = match raw.parse(buf)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };

        let code = raw
            .code
            .ok_or(TransportError::MissingField { field: "status" })?;
        let version = raw
            .version
            .ok_or(TransportError::MissingField { field: "version" })?;

        Ok(Some(Self {
            code,
            reason: raw.reason.unwrap_or_default().to_owned(),
            version: Version::from_minor(version),
            headers: collect_headers(raw.headers),
            len,
        }))
    }
}

fn collect_headers(parsed: &[httparse::Header<'_>]) -> Headers {
    let mut headers = Headers::with_capacity(parsed.len());
    for header in parsed {
        if let Ok(value) = std::str::from_utf8(header.value) {
            headers.insert(header.name, value);
        }
    }
    headers
}

/// How the end of a response body is determined (RFC 9112 §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

impl Framing {
    fn for_response(method: &Method, code: u16, headers: &Headers) -> Self {
        if *method == Method::Head || bodiless_status(code) {
            return Self::Empty;
        }
        let chunked = headers
            .get_all("transfer-encoding")
            .any(|te| te.to_ascii_lowercase().contains("chunked"));
        if chunked {
            return Self::Chunked;
        }
        match headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            Some(0) => Self::Empty,
            Some(len) => Self::Length(len),
            None => Self::UntilClose,
        }
    }
}

/// Decodes the body from `reader` (with `buf` holding bytes already read past the
/// head) and forwards it into `tx`. Errors are delivered in-band.
async fn pump_body<R>(mut reader: R, mut buf: BytesMut, framing: Framing, tx: BodySender)
where
    R: AsyncRead + Unpin,
{
    let result = match framing {
        Framing::Empty => Ok(()),
        Framing::Length(len) => read_length(&mut reader, &mut buf, len, &tx).await,
        Framing::Chunked => read_chunked(&mut reader, &mut buf, &tx).await,
        Framing::UntilClose => read_until_close(&mut reader, &mut buf, &tx).await,
    };
    if let Err(e) = result {
        debug!(error = %e, "response body failed");
        tx.send(Err(e)).await;
    }
}

/// Reads more bytes into `buf`; running out of input mid-body is an error.
async fn fill<R>(reader: &mut R, buf: &mut BytesMut) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    buf.reserve(READ_CHUNK);
    if reader.read_buf(buf).await? == 0 {
        return Err(TransportError::BodyInterrupted);
    }
    Ok(())
}

/// Forwards up to `remaining` bytes. Returns `false` once the consumer has hung up.
async fn forward<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    mut remaining: u64,
    tx: &BodySender,
) -> Result<bool, TransportError>
where
    R: AsyncRead + Unpin,
{
    while remaining > 0 {
        if buf.is_empty() {
            fill(reader, buf).await?;
        }
        let take = remaining.min(buf.len() as u64) as usize;
        remaining -= take as u64;
        if !tx.send_data(buf.split_to(take).freeze()).await {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn read_length<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    len: u64,
    tx: &BodySender,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    forward(reader, buf, len, tx).await.map(|_| ())
}

async fn read_until_close<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    tx: &BodySender,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if !buf.is_empty() && !tx.send_data(buf.split().freeze()).await {
            return Ok(());
        }
        buf.reserve(READ_CHUNK);
        if reader.read_buf(buf).await? == 0 {
            return Ok(());
        }
    }
}

async fn read_chunked<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    tx: &BodySender,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let (offset, size) = loop {
            match httparse::parse_chunk_size(buf)? {
                httparse::Status::Complete(pair) => break pair,
                httparse::Status::Partial => fill(reader, buf).await?,
            }
        };
        let _ = buf.split_to(offset);

        if size == 0 {
            break;
        }
        if !forward(reader, buf, size, tx).await? {
            return Ok(());
        }

        while buf.len() < 2 {
            fill(reader, buf).await?;
        }
        if &buf[..2] != b"\r\n" {
            return Err(TransportError::InvalidChunkSize);
        }
        let _ = buf.split_to(2);
    }

    // Trailer section, terminated by an empty line.
    let trailers = loop {
        let parsed = {
            let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
            match httparse::parse_headers(buf, &mut slots)? {
                httparse::Status::Complete((_, parsed)) => Some(collect_headers(parsed)),
                httparse::Status::Partial => None,
            }
        };
        match parsed {
            Some(trailers) => break trailers,
            None => fill(reader, buf).await?,
        }
    };

    if !trailers.is_empty() {
        tx.send(Ok(Frame::Trailers(trailers))).await;
    }
    Ok(())
}
