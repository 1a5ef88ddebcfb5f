//! Frame layout: header size, length field, and size bound.
//!
//! Wire format of one frame on the TCP side:
//! ```text
//! [length:2 LE][extra header bytes: header_size-2][payload: length-header_size]
//! ```
//! The length field counts the header itself, so an empty frame declares
//! exactly `header_size`.  Any bytes of the header after the length field are
//! opaque to the relay and are forwarded verbatim.

use thiserror::Error;

/// Size of the little-endian length field at the start of every header.
pub const LENGTH_FIELD_SIZE: usize = 2;

/// Header size used when none is configured.
pub const DEFAULT_HEADER_SIZE: usize = 4;

/// Largest frame accepted when no bound is configured (the historical
/// 64 KiB scratch buffer).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors raised when constructing a [`FrameLayout`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The header cannot hold the 2-byte length field.
    #[error("header size {0} is smaller than the {LENGTH_FIELD_SIZE}-byte length field")]
    HeaderTooSmall(usize),

    /// The header alone would not fit in a 16-bit length field.
    #[error("header size {0} does not fit in a 16-bit length field")]
    HeaderTooLarge(usize),

    /// The frame bound is smaller than a header-only frame.
    #[error("max frame size {max} is smaller than the header size {header_size}")]
    MaxBelowHeader { max: usize, header_size: usize },
}

/// Describes how frames are laid out on the byte stream.
///
/// A layout is cheap to copy and is shared by every session of a relay.
///
/// # Examples
///
/// ```rust
/// use relay_core::FrameLayout;
///
/// let layout = FrameLayout::new(4, 1024).unwrap();
/// assert_eq!(layout.header_size(), 4);
/// assert_eq!(layout.max_payload_size(), 1020);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    header_size: usize,
    max_frame_size: usize,
}

impl FrameLayout {
    /// Creates a layout with the given header size and frame bound.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError`] if the header cannot hold the length field, if
    /// the header alone exceeds `u16::MAX`, or if `max_frame_size` is smaller
    /// than the header.
    pub fn new(header_size: usize, max_frame_size: usize) -> Result<Self, LayoutError> {
        if header_size < LENGTH_FIELD_SIZE {
            return Err(LayoutError::HeaderTooSmall(header_size));
        }
        if header_size > usize::from(u16::MAX) {
            return Err(LayoutError::HeaderTooLarge(header_size));
        }
        if max_frame_size < header_size {
            return Err(LayoutError::MaxBelowHeader {
                max: max_frame_size,
                header_size,
            });
        }
        Ok(Self {
            header_size,
            max_frame_size,
        })
    }

    /// Number of bytes in every frame header, length field included.
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Configured upper bound on a frame's declared length.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Largest declared length this layout will ever accept.
    ///
    /// This is the smaller of the configured bound and what the 16-bit length
    /// field can express.
    pub fn effective_max_frame_size(&self) -> usize {
        self.max_frame_size.min(usize::from(u16::MAX))
    }

    /// Largest payload that can be carried in one frame.
    pub fn max_payload_size(&self) -> usize {
        self.effective_max_frame_size() - self.header_size
    }
}

impl Default for FrameLayout {
    /// 4-byte header, 64 KiB bound.
    fn default() -> Self {
        Self {
            header_size: DEFAULT_HEADER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_has_four_byte_header() {
        let layout = FrameLayout::default();
        assert_eq!(layout.header_size(), 4);
        assert_eq!(layout.max_frame_size(), 65536);
    }

    #[test]
    fn test_two_byte_header_is_the_minimum() {
        assert!(FrameLayout::new(2, 100).is_ok());
        assert_eq!(
            FrameLayout::new(1, 100),
            Err(LayoutError::HeaderTooSmall(1))
        );
        assert_eq!(
            FrameLayout::new(0, 100),
            Err(LayoutError::HeaderTooSmall(0))
        );
    }

    #[test]
    fn test_header_larger_than_length_field_range_is_rejected() {
        assert_eq!(
            FrameLayout::new(70_000, 80_000),
            Err(LayoutError::HeaderTooLarge(70_000))
        );
    }

    #[test]
    fn test_max_frame_size_below_header_is_rejected() {
        assert_eq!(
            FrameLayout::new(4, 3),
            Err(LayoutError::MaxBelowHeader {
                max: 3,
                header_size: 4
            })
        );
    }

    #[test]
    fn test_header_only_bound_is_allowed() {
        // A layout that only carries empty frames is odd but well defined.
        let layout = FrameLayout::new(4, 4).unwrap();
        assert_eq!(layout.max_payload_size(), 0);
    }

    #[test]
    fn test_effective_max_is_capped_by_length_field() {
        // Arrange: the default 64 KiB bound is one byte above u16::MAX.
        let layout = FrameLayout::default();

        // Act / Assert
        assert_eq!(layout.effective_max_frame_size(), 65535);
        assert_eq!(layout.max_payload_size(), 65531);
    }

    #[test]
    fn test_effective_max_honours_smaller_bound() {
        let layout = FrameLayout::new(4, 512).unwrap();
        assert_eq!(layout.effective_max_frame_size(), 512);
        assert_eq!(layout.max_payload_size(), 508);
    }
}
