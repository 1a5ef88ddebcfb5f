//! Application layer for ws-tcp-relay.
//!
//! The application layer orchestrates a relay session: it knows *what* to do
//! (dial, pump frames both ways, tear down together) but delegates *how*
//! frames are read and written to the infrastructure layer through the
//! [`FrameSource`], [`FrameSink`], and [`BackendDialer`] traits.
//!
//! # Responsibilities
//!
//! - Running one pump per direction and counting what it forwarded
//! - The completion rendezvous and symmetric teardown of a session
//! - Defining the `RelayError` type shared by every layer below `main`
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Frame header parsing (that is `relay-core`)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod completion;
pub mod error;
pub mod pump;
pub mod session;

pub use completion::{rendezvous, CompletionSignal, Rendezvous};
pub use error::RelayError;
pub use pump::{FrameSink, FrameSource, Pump};
pub use session::{BackendDialer, RelaySession, SessionOutcome, SessionReport};
