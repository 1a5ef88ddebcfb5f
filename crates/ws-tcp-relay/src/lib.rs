//! ws-tcp-relay library crate.
//!
//! Relays browser WebSocket connections to a TCP backend that speaks
//! length-prefixed frames.  Every backend frame becomes exactly one WebSocket
//! message, and the frames carried by browser messages are written to the
//! backend whole, so frame boundaries survive the trip through the byte
//! stream.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (WebSocket messages)
//!         ↕
//! [ws-tcp-relay]
//!   ├── domain/           Pure types: RelayConfig, session vocabulary
//!   ├── application/      Relay session: two pumps, one teardown
//!   └── infrastructure/
//!         ├── ws_server/   Accept loop, per-connection HTTP, TLS
//!         ├── http/        axum routes: upgrade, test console, 404
//!         ├── ws_conn/     WebSocket as a frame source/sink
//!         └── backend_conn/ TCP dialer and frame stream (relay-core codec)
//!         ↕
//! Backend (length-prefixed frames over TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O, no async, no frameworks.
//! - `application` depends on `domain` and `relay-core`, and reaches I/O only
//!   through the `FrameSource`, `FrameSink`, and `BackendDialer` traits.
//! - `infrastructure` depends on all other layers plus `tokio`, `axum`,
//!   `tungstenite`, and `rustls`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: relay sessions and frame pumps.
pub mod application;

/// Infrastructure layer: listener, WebSocket and backend connections.
pub mod infrastructure;
