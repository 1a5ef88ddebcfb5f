//! Domain layer for ws-tcp-relay.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or async runtimes: the relay configuration and the vocabulary
//! used to describe a relay session (its identity, lifecycle states, pump
//! directions, and how a pump stopped).
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading
//! - Anything that could block or fail due to external state

pub mod config;
pub mod session;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::RelayConfig` instead of the longer path.
pub use config::{check_ws_path, MessageMode, RelayConfig, TlsFiles};
pub use session::{
    FailureKind, InvalidTransition, PumpDirection, PumpExit, PumpReport, SessionId,
    SessionLifecycle, SessionState,
};
