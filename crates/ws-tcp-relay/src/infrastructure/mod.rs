//! Infrastructure layer for ws-tcp-relay.
//!
//! The infrastructure layer handles all I/O: accepting browser connections,
//! upgrading them to WebSockets, dialing the backend, and reading and writing
//! frames on both sides.
//!
//! # Responsibilities
//!
//! - Binding the listener and serving it over TLS when configured
//! - Routing each HTTP request to the upgrade, the test console, or a 404
//! - Opening TCP connections to the backend
//! - Reading and writing length-prefixed frames on the backend stream
//! - Adapting a WebSocket to the frame source/sink seams
//! - Loading the optional config file and installing the log subscriber
//!
//! # What does NOT belong here?
//!
//! - Session lifecycle and pump logic (that is the application layer)
//! - Configuration types (that is the domain layer)
//! - Merging CLI flags with the config file (that is done in `main.rs`)

pub mod backend_conn;
pub mod config_file;
pub mod frame_io;
pub mod http;
pub mod logging;
pub mod tls;
pub mod ws_conn;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use config_file::{load_file_config, FileConfig};
pub use logging::{init_logging, LogSettings};
pub use ws_server::{run_server, serve};
