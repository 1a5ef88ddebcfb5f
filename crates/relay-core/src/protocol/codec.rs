//! Frame codec: decode, validate, and encode length-prefixed frames.
//!
//! Everything here works on byte slices.  Reading "exactly N bytes" from a
//! socket is the relay's job; it asks [`FrameLayout::payload_len`] how many
//! payload bytes follow a header it has already read.

use thiserror::Error;

use crate::protocol::frame::{FrameLayout, LENGTH_FIELD_SIZE};

/// Errors that can occur while decoding or validating a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The byte slice is shorter than the frame (or header) it must contain.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The declared length cannot even cover the header.
    #[error("declared length {declared} is smaller than the {header_size}-byte header")]
    DeclaredBelowHeader { declared: usize, header_size: usize },

    /// The declared length exceeds the configured frame bound.
    #[error("declared length {declared} exceeds the {max}-byte frame limit")]
    FrameTooLarge { declared: usize, max: usize },

    /// A payload is too large to be framed with this layout.
    #[error("payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { size: usize, max: usize },
}

impl FrameLayout {
    /// Reads the declared total length from the start of `header`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] if `header` is shorter than the
    /// configured header size.
    pub fn declared_length(&self, header: &[u8]) -> Result<usize, FrameError> {
        if header.len() < self.header_size() {
            return Err(FrameError::Truncated {
                needed: self.header_size(),
                available: header.len(),
            });
        }
        let mut field = [0u8; LENGTH_FIELD_SIZE];
        field.copy_from_slice(&header[..LENGTH_FIELD_SIZE]);
        Ok(usize::from(u16::from_le_bytes(field)))
    }

    /// Checks a declared length against the header size and frame bound and
    /// returns the number of payload bytes that follow the header.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::DeclaredBelowHeader`] for a length smaller than
    /// the header, and [`FrameError::FrameTooLarge`] for one above the bound.
    pub fn validate_declared(&self, declared: usize) -> Result<usize, FrameError> {
        if declared < self.header_size() {
            return Err(FrameError::DeclaredBelowHeader {
                declared,
                header_size: self.header_size(),
            });
        }
        if declared > self.max_frame_size() {
            return Err(FrameError::FrameTooLarge {
                declared,
                max: self.max_frame_size(),
            });
        }
        Ok(declared - self.header_size())
    }

    /// Decodes and validates a header, returning the payload length.
    ///
    /// # Errors
    ///
    /// Any error from [`declared_length`](Self::declared_length) or
    /// [`validate_declared`](Self::validate_declared).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relay_core::FrameLayout;
    ///
    /// let layout = FrameLayout::default();
    /// assert_eq!(layout.payload_len(&[0x06, 0x00, 0x00, 0x00]), Ok(2));
    /// assert!(layout.payload_len(&[0x02, 0x00, 0x00, 0x00]).is_err());
    /// ```
    pub fn payload_len(&self, header: &[u8]) -> Result<usize, FrameError> {
        self.validate_declared(self.declared_length(header)?)
    }

    /// Returns the first complete frame at the start of `bytes`.
    ///
    /// The returned slice includes the header; its length is the frame's
    /// declared length, so the caller can advance by `frame.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] if `bytes` does not yet hold the whole
    /// frame, or a validation error for a malformed header.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8], FrameError> {
        let payload_len = self.payload_len(bytes)?;
        let total = self.header_size() + payload_len;
        if bytes.len() < total {
            return Err(FrameError::Truncated {
                needed: total,
                available: bytes.len(),
            });
        }
        Ok(&bytes[..total])
    }

    /// Builds a frame around `payload`.
    ///
    /// Header bytes after the length field are zero.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] if the frame would exceed the
    /// bound or the 16-bit length field.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
        if payload.len() > self.max_payload_size() {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size(),
            });
        }
        let total = self.header_size() + payload.len();
        let mut buf = Vec::with_capacity(total);
        // `total` fits: max_payload_size() is capped by u16::MAX.
        buf.extend_from_slice(&(total as u16).to_le_bytes());
        buf.resize(self.header_size(), 0);
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// Returns the payload portion of a frame (everything after the header).
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        frame.get(self.header_size()..).unwrap_or(&[])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
