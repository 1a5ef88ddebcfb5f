//! One-way frame forwarding.
//!
//! A [`Pump`] owns one connection's read side and the other connection's write
//! side.  It reads a whole frame, writes that whole frame, and repeats until
//! the source closes, an I/O error occurs, or the session cancels it.
//!
//! ```text
//!   FrameSource ──read_frame()──▶ Pump ──write_frame()──▶ FrameSink
//!                                   ▲
//!                     CancellationToken (session teardown)
//! ```
//!
//! Pumps never inspect payloads and never split or merge frames: whatever
//! `read_frame` returns is handed to `write_frame` as one unit.  Cancellation
//! interrupts a pending read at once, but a frame whose write has started gets
//! [`WRITE_GRACE`] to finish so the destination does not see half a frame.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::completion::CompletionSignal;
use crate::application::error::RelayError;
use crate::domain::{PumpDirection, PumpExit, PumpReport, SessionId};

/// How long a frame already being written may take to finish after the
/// session is cancelled.
pub const WRITE_GRACE: Duration = Duration::from_millis(250);

// ── Seams ─────────────────────────────────────────────────────────────────────

/// The read side of a connection, yielding one complete frame at a time.
#[async_trait]
pub trait FrameSource: Send {
    /// Returns the next frame, header included.
    ///
    /// # Errors
    ///
    /// [`RelayError::Closed`] when the peer closed cleanly between frames, or
    /// any other [`RelayError`] when the frame could not be read or was
    /// malformed.  Nothing is returned for a frame that was only partly read.
    async fn read_frame(&mut self) -> Result<Vec<u8>, RelayError>;
}

/// The write side of a connection, accepting one complete frame at a time.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes `frame` in full.
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), RelayError>;

    /// Closes the connection this sink writes to.
    async fn close(&mut self) -> Result<(), RelayError>;
}

// ── Pump ──────────────────────────────────────────────────────────────────────

/// Forwards frames from one connection to the other.
pub struct Pump<S, K> {
    direction: PumpDirection,
    session: SessionId,
    source: S,
    sink: K,
    idle_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl<S, K> Pump<S, K>
where
    S: FrameSource,
    K: FrameSink,
{
    pub fn new(
        direction: PumpDirection,
        session: SessionId,
        source: S,
        sink: K,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            direction,
            session,
            source,
            sink,
            idle_timeout: None,
            cancel,
        }
    }

    /// Fails the pump if no complete frame arrives within `limit`.
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    /// Runs until the pump stops, reports through `done`, and hands the
    /// connection halves back so the session can close them.
    pub async fn run(mut self, done: CompletionSignal) -> (S, K) {
        let report = self.forward().await;

        if report.exit.is_abnormal() {
            warn!(
                "session {}: {} pump stopped: {} ({} frames, {} bytes)",
                self.session, self.direction, report.exit, report.frames, report.bytes
            );
        } else {
            debug!(
                "session {}: {} pump stopped: {} ({} frames, {} bytes)",
                self.session, self.direction, report.exit, report.frames, report.bytes
            );
        }

        done.complete(report);
        (self.source, self.sink)
    }

    async fn forward(&mut self) -> PumpReport {
        let mut frames = 0u64;
        let mut bytes = 0u64;

        let exit = loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break PumpExit::Cancelled,
                read = next_frame(&mut self.source, self.idle_timeout) => match read {
                    Ok(frame) => frame,
                    Err(e) if e.is_clean_close() => break PumpExit::SourceClosed,
                    Err(e) => break PumpExit::ReadFailed(e.to_string()),
                },
            };

            let len = frame.len() as u64;
            let write = self.sink.write_frame(frame);
            tokio::pin!(write);
            tokio::select! {
                biased;
                written = &mut write => {
                    if let Err(e) = written {
                        break PumpExit::WriteFailed(e.to_string());
                    }
                }
                _ = self.cancel.cancelled() => {
                    // A started frame is finished, or the sink is abandoned
                    // once the grace period runs out.
                    if let Ok(Ok(())) = timeout(WRITE_GRACE, &mut write).await {
                        frames += 1;
                        bytes += len;
                    }
                    break PumpExit::Cancelled;
                }
            }

            frames += 1;
            bytes += len;
        };

        PumpReport {
            direction: self.direction,
            exit,
            frames,
            bytes,
        }
    }
}

async fn next_frame<S: FrameSource>(
    source: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Vec<u8>, RelayError> {
    match idle_timeout {
        Some(limit) => match timeout(limit, source.read_frame()).await {
            Ok(read) => read,
            Err(_) => Err(RelayError::IdleTimeout(limit)),
        },
        None => source.read_frame().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
