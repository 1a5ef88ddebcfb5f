//! The two-slot rendezvous a session waits on.
//!
//! Each pump gets a [`CompletionSignal`]; the session holds the matching
//! [`Rendezvous`].  A pump reports exactly once, either explicitly through
//! [`CompletionSignal::complete`] or, if its task dies first, through the
//! signal's `Drop` as [`PumpExit::Aborted`](crate::domain::PumpExit::Aborted).
//! The channel holds two reports, so a pump never waits on the session to
//! report.

use tokio::sync::mpsc;

use crate::domain::{PumpDirection, PumpReport};

/// Creates the signals for both pumps and the receiver the session waits on.
///
/// Returns `(client_to_backend, backend_to_client, rendezvous)`.
pub fn rendezvous() -> (CompletionSignal, CompletionSignal, Rendezvous) {
    let (tx, rx) = mpsc::channel(2);
    (
        CompletionSignal::new(PumpDirection::ClientToBackend, tx.clone()),
        CompletionSignal::new(PumpDirection::BackendToClient, tx),
        Rendezvous { rx },
    )
}

/// A pump's one-shot handle for reporting that it stopped.
#[derive(Debug)]
pub struct CompletionSignal {
    direction: PumpDirection,
    tx: Option<mpsc::Sender<PumpReport>>,
}

impl CompletionSignal {
    fn new(direction: PumpDirection, tx: mpsc::Sender<PumpReport>) -> Self {
        Self {
            direction,
            tx: Some(tx),
        }
    }

    pub fn direction(&self) -> PumpDirection {
        self.direction
    }

    /// Reports `report` and consumes the signal.
    pub fn complete(mut self, report: PumpReport) {
        self.send(report);
    }

    fn send(&mut self, report: PumpReport) {
        if let Some(tx) = self.tx.take() {
            // Capacity matches the number of signals, so this only fails once
            // the session has stopped listening.
            let _ = tx.try_send(report);
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        let report = PumpReport::aborted(self.direction);
        self.send(report);
    }
}

/// The session's side of the rendezvous.
#[derive(Debug)]
pub struct Rendezvous {
    rx: mpsc::Receiver<PumpReport>,
}

impl Rendezvous {
    /// Waits for the next pump to stop.
    ///
    /// Returns `None` once both pumps have reported.
    pub async fn next(&mut self) -> Option<PumpReport> {
        self.rx.recv().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
