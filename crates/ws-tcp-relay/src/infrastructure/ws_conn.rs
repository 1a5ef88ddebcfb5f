//! The browser's WebSocket as a frame source and sink.
//!
//! Messages from the browser are treated as a byte stream: their bytes are
//! appended to a buffer and split into frames by the same [`FrameCodec`] the
//! backend side uses.  A message may carry several frames, and a frame may
//! span several messages.  In the other direction each frame becomes exactly
//! one message, tagged binary or text according to [`MessageMode`].
//!
//! Control messages are handled by tungstenite itself (pings are answered
//! automatically) and are skipped.  A Close message ends the source; it is a
//! clean close only if no partial frame is left in the buffer.

use std::io;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_core::FrameLayout;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::application::{FrameSink, FrameSource, RelayError};
use crate::domain::MessageMode;
use crate::infrastructure::frame_io::FrameCodec;

/// Splits an upgraded WebSocket into the session's client halves.
pub fn split_websocket<S>(
    ws: WebSocketStream<S>,
    layout: FrameLayout,
    mode: MessageMode,
) -> (WsFrameSource<S>, WsFrameSink<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    let source = WsFrameSource {
        stream,
        codec: FrameCodec::new(layout),
        buffer: BytesMut::new(),
    };
    (source, WsFrameSink { sink, mode })
}

/// Frames carried by messages from the browser.
pub struct WsFrameSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
    codec: FrameCodec,
    /// Message bytes not yet returned as a frame.
    buffer: BytesMut,
}

impl<S> WsFrameSource<S> {
    /// The browser is gone: anything still buffered is a truncated frame.
    fn end_of_stream(&mut self) -> Result<Vec<u8>, RelayError> {
        self.codec
            .decode_eof(&mut self.buffer)?
            .ok_or(RelayError::Closed)
    }
}

#[async_trait]
impl<S> FrameSource for WsFrameSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Vec<u8>, RelayError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(frame);
            }

            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => match read_error(e) {
                    RelayError::Closed => return self.end_of_stream(),
                    other => return Err(other),
                },
                None => return self.end_of_stream(),
            };

            match message {
                Message::Binary(bytes) => self.buffer.extend_from_slice(&bytes),
                Message::Text(text) => self.buffer.extend_from_slice(text.as_bytes()),
                Message::Close(_) => return self.end_of_stream(),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("skipping WebSocket control message");
                }
            }
        }
    }
}

/// Frames sent to the browser, one message each.
pub struct WsFrameSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    mode: MessageMode,
}

#[async_trait]
impl<S> FrameSink for WsFrameSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), RelayError> {
        let message = match self.mode {
            MessageMode::Binary => Message::Binary(frame),
            // Built as a raw frame so the bytes go out unchanged; a length
            // header byte of 0x80 or above is not valid UTF-8.
            MessageMode::Text => {
                Message::Frame(Frame::message(frame, OpCode::Data(Data::Text), true))
            }
        };
        self.sink.send(message).await.map_err(write_error)
    }

    /// Sends a Close message and flushes it.
    async fn close(&mut self) -> Result<(), RelayError> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(write_error(e)),
        }
    }
}

fn read_error(e: WsError) -> RelayError {
    match e {
        // A browser tab that goes away without a close handshake is still
        // just a closed connection.
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => RelayError::Closed,
        WsError::Io(e) => RelayError::Read(e),
        other => RelayError::Read(io::Error::new(io::ErrorKind::InvalidData, other)),
    }
}

fn write_error(e: WsError) -> RelayError {
    match e {
        WsError::Io(e) => RelayError::Write(e),
        other => RelayError::Write(io::Error::new(io::ErrorKind::BrokenPipe, other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
