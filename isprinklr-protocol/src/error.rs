//! Frame error types.

use thiserror::Error;

/// Structural errors raised while decoding a frame.
///
/// None of these produce a reply on the link; the frame is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("bad frame markers: begin {begin:#04x}, end {end:#04x}")]
    BadMarkers { begin: u8, end: u8 },

    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("frame underrun: got {got} of {want} bytes")]
    Underrun { got: usize, want: usize },

    #[error("unknown type byte: {0:#04x}")]
    UnknownType(u8),

    #[error("unknown error reason byte: {0:#04x}")]
    UnknownReason(u8),
}

impl FrameError {
    /// Returns the label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            FrameError::BadMarkers { .. } => "bad_markers",
            FrameError::ChecksumMismatch { .. } => "checksum",
            FrameError::Underrun { .. } => "underrun",
            FrameError::UnknownType(_) => "unknown_type",
            FrameError::UnknownReason(_) => "unknown_reason",
        }
    }
}
