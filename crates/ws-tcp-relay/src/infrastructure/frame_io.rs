//! Length-prefixed framing over a byte stream.
//!
//! TCP is a *stream* protocol: a single `read()` may return part of a frame or
//! several frames at once.  [`FrameCodec`] restores the boundaries: it asks
//! the [`FrameLayout`] for the first complete frame in the buffer and splits
//! exactly that frame off.  The layout validates the header first, so a bad
//! header fails without waiting for its payload.  Bytes past the frame stay
//! buffered for the next call.
//!
//! [`StreamFrameSource`] and [`StreamFrameSink`] wrap any tokio byte stream in
//! the application's [`FrameSource`] / [`FrameSink`] seams.  The backend uses
//! them over the halves of a `TcpStream`; tests use them over in-memory pipes.

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use relay_core::{FrameError, FrameLayout};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, FramedRead};

use crate::application::{FrameSink, FrameSource, RelayError};

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Splits buffered bytes into complete frames (header included).
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    layout: FrameLayout,
}

impl FrameCodec {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = RelayError;

    /// Returns the next frame, or `None` until the whole frame is buffered.
    ///
    /// A malformed header fails as soon as the header is complete, before any
    /// payload is waited for.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, RelayError> {
        match self.layout.decode(&src[..]).map(<[u8]>::len) {
            Ok(len) => Ok(Some(src.split_to(len).to_vec())),
            Err(FrameError::Truncated { needed, available }) => {
                src.reserve(needed - available);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`decode`](Self::decode), but the stream has ended.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Closed`] if nothing is left in the buffer.
    /// - [`RelayError::Truncated`] if the stream ended inside a frame.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, RelayError> {
        match self.layout.decode(&src[..]).map(<[u8]>::len) {
            Ok(_) => self.decode(src),
            Err(FrameError::Truncated { .. }) if src.is_empty() => Err(RelayError::Closed),
            Err(FrameError::Truncated { needed, available }) => Err(RelayError::Truncated {
                needed,
                received: available,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes all of `frame` to `writer` and flushes it.
///
/// # Errors
///
/// [`RelayError::ShortWrite`] if the writer stops accepting bytes, or
/// [`RelayError::Write`] for transport errors.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < frame.len() {
        let n = writer
            .write(&frame[written..])
            .await
            .map_err(RelayError::Write)?;
        if n == 0 {
            return Err(RelayError::ShortWrite {
                expected: frame.len(),
                written,
            });
        }
        written += n;
    }
    writer.flush().await.map_err(RelayError::Write)
}

// ── Seam adapters ─────────────────────────────────────────────────────────────

/// Frames read from a byte stream.
pub struct StreamFrameSource<R> {
    frames: FramedRead<R, FrameCodec>,
}

impl<R: AsyncRead> StreamFrameSource<R> {
    pub fn new(reader: R, layout: FrameLayout) -> Self {
        Self {
            frames: FramedRead::new(reader, FrameCodec::new(layout)),
        }
    }
}

#[async_trait]
impl<R> FrameSource for StreamFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Cancel-safe: a partly received frame stays in the read buffer.
    async fn read_frame(&mut self) -> Result<Vec<u8>, RelayError> {
        // `decode_eof` reports the end of the stream, so `None` only follows
        // an error that was already returned.
        self.frames.next().await.unwrap_or(Err(RelayError::Closed))
    }
}

/// Frames written verbatim to a byte stream.
pub struct StreamFrameSink<W> {
    writer: W,
}

impl<W> StreamFrameSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> FrameSink for StreamFrameSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), RelayError> {
        write_frame(&mut self.writer, &frame).await
    }

    /// Shuts down the write direction, which sends FIN on a TCP stream.
    async fn close(&mut self) -> Result<(), RelayError> {
        self.writer.shutdown().await.map_err(RelayError::Write)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
