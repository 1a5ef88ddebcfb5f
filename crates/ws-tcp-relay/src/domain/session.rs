//! Vocabulary for one relay session.
//!
//! A session pairs one browser WebSocket with one backend TCP connection and
//! runs two pumps between them.  This module names the pieces:
//!
//! ```text
//!            ClientToBackend pump
//! browser ───────────────────────────▶ backend
//!         ◀───────────────────────────
//!            BackendToClient pump
//! ```
//!
//! and the lifecycle every session walks through:
//!
//! ```text
//! Dialing ──▶ Established ──▶ Closing ──▶ Closed
//!    │                                      ▲
//!    └──────────── dial failure ────────────┘
//! ```

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

// ── Session identity ──────────────────────────────────────────────────────────

/// Identifies a session in log records.
///
/// The browser's peer address is unique for the lifetime of its connection,
/// which is exactly the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Creates an identifier from any label (used by tests and tools).
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for SessionId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// The states a relay session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opening the backend connection.
    Dialing,
    /// Both connections open, both pumps running.
    Established,
    /// One pump has stopped; the other is being unblocked.
    Closing,
    /// Both pumps stopped and both connections closed.
    Closed,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `next` is a legal step.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Dialing, Established) | (Dialing, Closed) | (Established, Closing) | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dialing => "dialing",
            Self::Established => "established",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// An attempted lifecycle step that is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid session transition {from} → {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Tracks a session's current state and rejects out-of-order steps.
#[derive(Debug)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl SessionLifecycle {
    /// Starts a new lifecycle in [`SessionState::Dialing`].
    pub fn new() -> Self {
        Self {
            state: SessionState::Dialing,
        }
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] and leaves the state unchanged if the step
    /// is not part of the lifecycle.
    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

// ── Pumps ─────────────────────────────────────────────────────────────────────

/// Which way a pump moves frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpDirection {
    /// Browser WebSocket → backend TCP.
    ClientToBackend,
    /// Backend TCP → browser WebSocket.
    BackendToClient,
}

impl fmt::Display for PumpDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToBackend => f.write_str("client→backend"),
            Self::BackendToClient => f.write_str("backend→client"),
        }
    }
}

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// The source closed cleanly between frames.
    SourceClosed,
    /// Reading or validating a frame failed.
    ReadFailed(String),
    /// Forwarding a frame failed.
    WriteFailed(String),
    /// The session tore down while this pump was still running.
    Cancelled,
    /// The pump's task ended without reporting (it panicked or was dropped).
    Aborted,
}

impl PumpExit {
    /// Returns `true` if the stop deserves a warning rather than a debug line.
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::ReadFailed(_) | Self::WriteFailed(_) | Self::Aborted)
    }
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceClosed => f.write_str("source closed"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::Cancelled => f.write_str("cancelled by session teardown"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// What one pump did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    pub direction: PumpDirection,
    pub exit: PumpExit,
    /// Frames fully read and fully written.
    pub frames: u64,
    /// Bytes of those frames, headers included.
    pub bytes: u64,
}

impl PumpReport {
    /// A report for a pump that vanished without reporting.
    pub fn aborted(direction: PumpDirection) -> Self {
        Self {
            direction,
            exit: PumpExit::Aborted,
            frames: 0,
            bytes: 0,
        }
    }
}

// ── Failure taxonomy ──────────────────────────────────────────────────────────

/// The classes of failure a relay can run into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend could not be reached in time.
    Dial,
    /// A frame could not be read or was malformed.
    FrameRead,
    /// A frame could not be forwarded.
    FrameWrite,
    /// The browser's upgrade request was not acceptable.
    Upgrade,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_starts_dialing() {
        assert_eq!(SessionLifecycle::new().state(), SessionState::Dialing);
    }

    #[test]
    fn test_lifecycle_happy_path() {
        // Arrange
        let mut lc = SessionLifecycle::new();

        // Act / Assert
        lc.advance(SessionState::Established).unwrap();
        lc.advance(SessionState::Closing).unwrap();
        lc.advance(SessionState::Closed).unwrap();
        assert_eq!(lc.state(), SessionState::Closed);
    }

    #[test]
    fn test_lifecycle_dial_failure_goes_straight_to_closed() {
        let mut lc = SessionLifecycle::new();
        assert!(lc.advance(SessionState::Closed).is_ok());
    }

    #[test]
    fn test_lifecycle_cannot_skip_closing() {
        // Arrange
        let mut lc = SessionLifecycle::new();
        lc.advance(SessionState::Established).unwrap();

        // Act
        let result = lc.advance(SessionState::Closed);

        // Assert: rejected, and the state is unchanged.
        assert_eq!(
            result,
            Err(InvalidTransition {
                from: SessionState::Established,
                to: SessionState::Closed
            })
        );
        assert_eq!(lc.state(), SessionState::Established);
    }

    #[test]
    fn test_lifecycle_closed_is_terminal() {
        let mut lc = SessionLifecycle::new();
        lc.advance(SessionState::Closed).unwrap();
        for next in [
            SessionState::Dialing,
            SessionState::Established,
            SessionState::Closing,
            SessionState::Closed,
        ] {
            assert!(lc.advance(next).is_err(), "Closed → {next} must be rejected");
        }
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = InvalidTransition {
            from: SessionState::Dialing,
            to: SessionState::Closing,
        };
        assert_eq!(err.to_string(), "invalid session transition dialing → closing");
    }

    #[test]
    fn test_session_id_from_peer_addr() {
        let addr: SocketAddr = "10.0.0.7:51234".parse().unwrap();
        assert_eq!(SessionId::from(addr).as_str(), "10.0.0.7:51234");
    }

    #[test]
    fn test_pump_exit_severity() {
        assert!(!PumpExit::SourceClosed.is_abnormal());
        assert!(!PumpExit::Cancelled.is_abnormal());
        assert!(PumpExit::ReadFailed("x".into()).is_abnormal());
        assert!(PumpExit::WriteFailed("x".into()).is_abnormal());
        assert!(PumpExit::Aborted.is_abnormal());
    }

    #[test]
    fn test_aborted_report_has_no_traffic() {
        let report = PumpReport::aborted(PumpDirection::BackendToClient);
        assert_eq!(report.exit, PumpExit::Aborted);
        assert_eq!(report.frames, 0);
        assert_eq!(report.bytes, 0);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(PumpDirection::ClientToBackend.to_string(), "client→backend");
        assert_eq!(PumpDirection::BackendToClient.to_string(), "backend→client");
    }
}
