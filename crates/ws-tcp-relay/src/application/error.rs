//! Error type shared by pumps, sessions, and the transport adapters.

use std::io;
use std::time::Duration;

use relay_core::FrameError;
use thiserror::Error;

use crate::domain::FailureKind;

/// Everything that can stop a pump or prevent a session from starting.
///
/// None of these ever propagate past the session that hit them: the session
/// logs them, tears down, and the acceptor keeps running.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The backend refused or reset the connection attempt.
    #[error("failed to dial backend {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The backend did not answer within the dial timeout.
    #[error("timed out dialing backend {addr} after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },

    /// The browser's upgrade request was rejected.
    #[error("WebSocket upgrade failed: {0}")]
    Upgrade(String),

    /// The source closed cleanly between two frames.
    #[error("peer closed the connection")]
    Closed,

    /// The source closed part way through a frame.
    #[error("connection closed mid-frame: needed {needed} bytes, got {received}")]
    Truncated { needed: usize, received: usize },

    /// The frame header (or the message carrying it) is malformed.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    /// No complete frame arrived within the idle deadline.
    #[error("no frame within {0:?}")]
    IdleTimeout(Duration),

    /// The transport failed while reading.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The transport failed while writing.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// The destination stopped accepting bytes part way through a frame.
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { expected: usize, written: usize },
}

/// I/O errors surfacing through a frame decoder are read failures.
impl From<io::Error> for RelayError {
    fn from(e: io::Error) -> Self {
        Self::Read(e)
    }
}

impl RelayError {
    /// Maps the error onto the relay's failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Dial { .. } | Self::DialTimeout { .. } => FailureKind::Dial,
            Self::Upgrade(_) => FailureKind::Upgrade,
            Self::Closed
            | Self::Truncated { .. }
            | Self::Frame(_)
            | Self::IdleTimeout(_)
            | Self::Read(_) => FailureKind::FrameRead,
            Self::Write(_) | Self::ShortWrite { .. } => FailureKind::FrameWrite,
        }
    }

    /// Returns `true` for an orderly close by the peer.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
