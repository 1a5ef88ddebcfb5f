//! Protocol module containing the frame layout and its codec.

pub mod codec;
pub mod frame;

pub use codec::FrameError;
pub use frame::{FrameLayout, LayoutError};
