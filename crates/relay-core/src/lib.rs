//! # relay-core
//!
//! Shared framing library for the WebSocket ↔ TCP relay.
//!
//! The relay sits between a browser (which speaks WebSocket, a transport that
//! delimits messages on its own) and a backend server (which speaks plain TCP,
//! a byte stream with no message boundaries at all).  To carry discrete
//! messages over the byte stream, both sides agree on a length-prefixed
//! framing convention:
//!
//! ```text
//! [length: 2 bytes LE, counts the whole frame][rest of header][payload]
//! |<------------- header_size -------------->|
//! |<----------------------- length ----------------------------------->|
//! ```
//!
//! This crate only knows how to *describe* and *validate* frames.  It has no
//! dependencies on sockets or async runtimes; the relay service performs the
//! actual reads and writes and calls into [`FrameLayout`] to decide how many
//! bytes belong to each frame.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::FrameLayout` instead of `relay_core::protocol::frame::FrameLayout`.
pub use protocol::codec::FrameError;
pub use protocol::frame::{
    FrameLayout, LayoutError, DEFAULT_HEADER_SIZE, DEFAULT_MAX_FRAME_SIZE, LENGTH_FIELD_SIZE,
};
