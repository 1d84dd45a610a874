//! Streamed response bodies.
//!
//! A [`Body`] is a finite, single-pass sequence of [`Bytes`] chunks, optionally
//! followed by trailers. It is backed by a bounded tokio channel so the producer
//! (a socket reader, the cache capture tap, or the cached-response synthesizer)
//! runs independently of the consumer. Live and cached bodies share this type,
//! so a caller cannot tell them apart structurally.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use super::Headers;
use crate::transport::TransportError;

/// Number of frames buffered between a body producer and its consumer.
pub(crate) const BODY_CHANNEL_CAPACITY: usize = 16;

/// One unit travelling through a body channel.
#[derive(Debug)]
pub(crate) enum Frame {
    Data(Bytes),
    Trailers(Headers),
}

pub(crate) type FrameResult = Result<Frame, TransportError>;

/// Producer half of a [`Body`]. Dropping it ends the stream.
#[derive(Debug, Clone)]
pub(crate) struct BodySender {
    tx: mpsc::Sender<FrameResult>,
}

impl BodySender {
    /// Sends a frame; returns `false` once the consumer has gone away.
    pub(crate) async fn send(&self, frame: FrameResult) -> bool {
        self.tx.send(frame).await.is_ok()
    }

    pub(crate) async fn send_data(&self, chunk: Bytes) -> bool {
        if chunk.is_empty() {
            return !self.tx.is_closed();
        }
        self.send(Ok(Frame::Data(chunk))).await
    }
}

/// A streamed message body.
///
/// # Examples
///
/// ```
/// use revalidate::http::Body;
///
/// #[tokio::main]
/// async fn main() {
///     let mut body = Body::from_bytes("hello");
///     assert_eq!(body.read_to_end().await.unwrap(), "hello");
///     assert!(body.is_end_stream());
/// }
/// ```
#[derive(Debug)]
pub struct Body {
    // `None` once the stream has ended (or for an empty body).
    rx: Option<mpsc::Receiver<FrameResult>>,
    trailers: Option<Headers>,
}

impl Body {
    /// Creates a connected producer/consumer pair.
    pub(crate) fn channel() -> (BodySender, Self) {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (
            BodySender { tx },
            Self {
                rx: Some(rx),
                trailers: None,
            },
        )
    }

    /// A body that ends immediately.
    pub fn empty() -> Self {
        Self {
            rx: None,
            trailers: None,
        }
    }

    /// A body made of exactly one buffered chunk followed by end-of-stream.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return Self::empty();
        }
        let (tx, rx) = mpsc::channel(1);
        // Capacity is one and the channel is fresh, so this cannot fail.
        let _ = tx.try_send(Ok(Frame::Data(data)));
        Self {
            rx: Some(rx),
            trailers: None,
        }
    }

    /// Receives the next raw frame, marking the body ended when the producer is gone.
    pub(crate) async fn frame(&mut self) -> Option<FrameResult> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Some(Err(e)) => {
                self.rx = None;
                Some(Err(e))
            }
            Some(frame) => Some(frame),
            None => {
                self.rx = None;
                None
            }
        }
    }

    /// Returns the next data chunk, `None` at end-of-stream.
    ///
    /// Trailers encountered along the way are retained and exposed through
    /// [`trailers`](Self::trailers).
    pub async fn chunk(&mut self) -> Option<Result<Bytes, TransportError>> {
        loop {
            match self.frame().await? {
                Ok(Frame::Data(chunk)) => return Some(Ok(chunk)),
                Ok(Frame::Trailers(trailers)) => self.trailers = Some(trailers),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Reads every remaining chunk into one contiguous buffer.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransportError`] reported by the producer.
    pub async fn read_to_end(&mut self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Consumes the body and returns all of its bytes.
    pub async fn bytes(mut self) -> Result<Bytes, TransportError> {
        self.read_to_end().await
    }

    /// Trailer fields, available once the stream has been read to the end.
    pub fn trailers(&self) -> Option<&Headers> {
        self.trailers.as_ref()
    }

    /// Returns `true` once no more frames will be produced.
    pub fn is_end_stream(&self) -> bool {
        self.rx.is_none()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}
