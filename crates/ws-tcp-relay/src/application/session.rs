//! One relay session: dial the backend, run both pumps, tear down together.
//!
//! ```text
//! Dialing ── dial ok ──▶ Established ── first pump stops ──▶ Closing ──▶ Closed
//!    │                                    (cancel the other,
//!    │                                     wait for it, close
//!    │                                     both sinks once)
//!    └── dial failed ──▶ Closed   (client halves handed back to the caller)
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::completion::rendezvous;
use crate::application::error::RelayError;
use crate::application::pump::{FrameSink, FrameSource, Pump};
use crate::domain::{PumpDirection, PumpReport, SessionId, SessionLifecycle, SessionState};

/// Opens the backend connection for a session.
#[async_trait]
pub trait BackendDialer: Send + Sync {
    type Source: FrameSource + 'static;
    type Sink: FrameSink + 'static;

    /// Connects and returns the backend's read and write halves.
    async fn dial(&self) -> Result<(Self::Source, Self::Sink), RelayError>;

    /// The backend address, for log lines.
    fn backend(&self) -> &str;
}

/// What both pumps did during an established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub id: SessionId,
    pub client_to_backend: PumpReport,
    pub backend_to_client: PumpReport,
    pub duration: Duration,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome<S, K> {
    /// The backend could not be reached.  The client halves were never read
    /// from and are returned so the caller can close the WebSocket.
    DialFailed {
        error: RelayError,
        client_source: S,
        client_sink: K,
    },
    /// Both pumps ran and both connections are closed.
    Completed(SessionReport),
}

/// Drives one browser connection through its lifecycle.
pub struct RelaySession<D> {
    id: SessionId,
    dialer: D,
    idle_timeout: Option<Duration>,
    lifecycle: SessionLifecycle,
}

impl<D: BackendDialer> RelaySession<D> {
    pub fn new(id: SessionId, dialer: D) -> Self {
        Self {
            id,
            dialer,
            idle_timeout: None,
            lifecycle: SessionLifecycle::new(),
        }
    }

    /// Applies a per-frame read deadline to both pumps.
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Runs the session to completion.
    ///
    /// Returns once both pumps have stopped and both connections have been
    /// closed, or immediately if the backend cannot be dialed.
    pub async fn run<S, K>(mut self, client_source: S, client_sink: K) -> SessionOutcome<S, K>
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        let started = Instant::now();

        let (backend_source, backend_sink) = match self.dialer.dial().await {
            Ok(halves) => halves,
            Err(error) => {
                warn!("session {}: {error}", self.id);
                self.step(SessionState::Closed);
                return SessionOutcome::DialFailed {
                    error,
                    client_source,
                    client_sink,
                };
            }
        };
        self.step(SessionState::Established);
        info!("session {}: connected to backend {}", self.id, self.dialer.backend());

        let cancel = CancellationToken::new();
        let (to_backend_done, to_client_done, mut reports) = rendezvous();

        let to_backend = Pump::new(
            PumpDirection::ClientToBackend,
            self.id.clone(),
            client_source,
            backend_sink,
            cancel.clone(),
        )
        .with_idle_timeout(self.idle_timeout);
        let to_client = Pump::new(
            PumpDirection::BackendToClient,
            self.id.clone(),
            backend_source,
            client_sink,
            cancel.clone(),
        )
        .with_idle_timeout(self.idle_timeout);

        let to_backend_task = tokio::spawn(to_backend.run(to_backend_done));
        let to_client_task = tokio::spawn(to_client.run(to_client_done));

        let first = reports.next().await;
        self.step(SessionState::Closing);
        cancel.cancel();
        let second = reports.next().await;

        match to_backend_task.await {
            Ok((_client_source, mut backend_sink)) => self.close_sink("backend", &mut backend_sink).await,
            Err(e) => error!("session {}: client→backend pump task failed: {e}", self.id),
        }
        match to_client_task.await {
            Ok((_backend_source, mut client_sink)) => self.close_sink("client", &mut client_sink).await,
            Err(e) => error!("session {}: backend→client pump task failed: {e}", self.id),
        }
        self.step(SessionState::Closed);

        let mut client_to_backend = PumpReport::aborted(PumpDirection::ClientToBackend);
        let mut backend_to_client = PumpReport::aborted(PumpDirection::BackendToClient);
        for report in [first, second].into_iter().flatten() {
            match report.direction {
                PumpDirection::ClientToBackend => client_to_backend = report,
                PumpDirection::BackendToClient => backend_to_client = report,
            }
        }

        let report = SessionReport {
            id: self.id.clone(),
            client_to_backend,
            backend_to_client,
            duration: started.elapsed(),
        };
        info!(
            "session {}: closed after {:.1?} (client→backend {} frames / {} bytes, backend→client {} frames / {} bytes)",
            report.id,
            report.duration,
            report.client_to_backend.frames,
            report.client_to_backend.bytes,
            report.backend_to_client.frames,
            report.backend_to_client.bytes,
        );
        SessionOutcome::Completed(report)
    }

    async fn close_sink<K: FrameSink>(&self, side: &str, sink: &mut K) {
        // The peer may already be gone; that is not worth more than a debug line.
        if let Err(e) = sink.close().await {
            debug!("session {}: closing {side} connection: {e}", self.id);
        }
    }

    fn step(&mut self, next: SessionState) {
        match self.lifecycle.advance(next) {
            Ok(()) => debug!("session {}: {next}", self.id),
            Err(e) => error!("session {}: {e}", self.id),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pump::tests::{RecordingSink, ScriptedSource};
    use crate::domain::PumpExit;
    use std::io;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// Hands out one scripted backend, or fails.
    struct ScriptedDialer {
        halves: Mutex<Option<(ScriptedSource, RecordingSink)>>,
    }

    impl ScriptedDialer {
        fn connected(source: ScriptedSource, sink: RecordingSink) -> Self {
            Self {
                halves: Mutex::new(Some((source, sink))),
            }
        }

        fn refusing() -> Self {
            Self {
                halves: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BackendDialer for ScriptedDialer {
        type Source = ScriptedSource;
        type Sink = RecordingSink;

        async fn dial(&self) -> Result<(ScriptedSource, RecordingSink), RelayError> {
            self.halves.lock().unwrap().take().ok_or_else(|| RelayError::Dial {
                addr: self.backend().to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            })
        }

        fn backend(&self) -> &str {
            "127.0.0.1:7788"
        }
    }

    fn completed<S, K>(outcome: SessionOutcome<S, K>) -> SessionReport {
        match outcome {
            SessionOutcome::Completed(report) => report,
            SessionOutcome::DialFailed { error, .. } => panic!("expected Completed, got dial failure: {error}"),
        }
    }

    #[tokio::test]
    async fn test_dial_failure_returns_untouched_client_halves() {
        // Arrange
        let client_source = ScriptedSource::blocking(vec![Ok(vec![4, 0, 0, 0])]);
        let reads = client_source.calls.clone();
        let client_sink = RecordingSink::default();
        let session = RelaySession::new(SessionId::new("s1"), ScriptedDialer::refusing());

        // Act
        let outcome = session.run(client_source, client_sink.clone()).await;

        // Assert: nothing was read or written; the caller owns the close.
        match outcome {
            SessionOutcome::DialFailed { error, .. } => assert!(error.to_string().contains("127.0.0.1:7788")),
            SessionOutcome::Completed(_) => panic!("dial must fail"),
        }
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(client_sink.written().is_empty());
        assert_eq!(client_sink.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        // Arrange: the backend stays open until both frames have crossed.
        let up = vec![0x05, 0x00, 0x00, 0x00, 0x01];
        let down = vec![0x06, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        let release = Arc::new(Notify::new());
        let backend_sink = RecordingSink::default();
        let client_sink = RecordingSink::default();
        let dialer = ScriptedDialer::connected(
            ScriptedSource::closing_on(vec![Ok(down.clone())], release.clone()),
            backend_sink.clone(),
        );
        let session = RelaySession::new(SessionId::new("s2"), dialer);
        let task = tokio::spawn(
            session.run(ScriptedSource::blocking(vec![Ok(up.clone())]), client_sink.clone()),
        );

        // Act
        let deadline = Instant::now() + Duration::from_secs(5);
        while backend_sink.written().is_empty() || client_sink.written().is_empty() {
            assert!(Instant::now() < deadline, "frames did not cross");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        release.notify_one();
        let report = completed(task.await.unwrap());

        // Assert
        assert_eq!(backend_sink.written(), vec![up]);
        assert_eq!(client_sink.written(), vec![down]);
        assert_eq!(report.backend_to_client.exit, PumpExit::SourceClosed);
        assert_eq!(report.backend_to_client.frames, 1);
        assert_eq!(report.client_to_backend.exit, PumpExit::Cancelled);
        assert_eq!(report.client_to_backend.frames, 1);
    }

    #[tokio::test]
    async fn test_backend_close_cancels_blocked_client_pump() {
        // Arrange: the browser never sends; the backend closes at once.
        let dialer = ScriptedDialer::connected(ScriptedSource::closing(vec![]), RecordingSink::default());
        let session = RelaySession::new(SessionId::new("s3"), dialer);

        // Act
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            session.run(ScriptedSource::blocking(vec![]), RecordingSink::default()),
        )
        .await
        .expect("session must not wait for the idle browser");

        // Assert
        let report = completed(outcome);
        assert_eq!(report.backend_to_client.exit, PumpExit::SourceClosed);
        assert_eq!(report.client_to_backend.exit, PumpExit::Cancelled);
    }

    #[tokio::test]
    async fn test_client_close_cancels_blocked_backend_pump() {
        let dialer = ScriptedDialer::connected(ScriptedSource::blocking(vec![]), RecordingSink::default());
        let session = RelaySession::new(SessionId::new("s4"), dialer);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            session.run(ScriptedSource::closing(vec![]), RecordingSink::default()),
        )
        .await
        .expect("session must not wait for the idle backend");

        let report = completed(outcome);
        assert_eq!(report.client_to_backend.exit, PumpExit::SourceClosed);
        assert_eq!(report.backend_to_client.exit, PumpExit::Cancelled);
    }

    #[tokio::test]
    async fn test_each_connection_closed_exactly_once() {
        // Arrange
        let backend_sink = RecordingSink::default();
        let client_sink = RecordingSink::default();
        let dialer = ScriptedDialer::connected(ScriptedSource::closing(vec![]), backend_sink.clone());
        let session = RelaySession::new(SessionId::new("s5"), dialer);

        // Act
        completed(session.run(ScriptedSource::closing(vec![]), client_sink.clone()).await);

        // Assert
        assert_eq!(backend_sink.closes.load(Ordering::SeqCst), 1);
        assert_eq!(client_sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_failure_tears_down_session() {
        // Arrange: the browser is gone, so forwarding the backend frame fails.
        let dialer = ScriptedDialer::connected(
            ScriptedSource::blocking(vec![Ok(vec![4, 0, 0, 0])]),
            RecordingSink::default(),
        );
        let session = RelaySession::new(SessionId::new("s6"), dialer);

        // Act
        let report = completed(
            session
                .run(ScriptedSource::blocking(vec![]), RecordingSink::failing())
                .await,
        );

        // Assert
        assert!(matches!(report.backend_to_client.exit, PumpExit::WriteFailed(_)));
        assert_eq!(report.client_to_backend.exit, PumpExit::Cancelled);
    }

    #[test]
    fn test_new_session_is_dialing() {
        let session = RelaySession::new(SessionId::new("s7"), ScriptedDialer::refusing());
        assert_eq!(session.state(), SessionState::Dialing);
        assert_eq!(session.id().as_str(), "s7");
    }
}
