//! # isprinklr-protocol
//!
//! Serial link protocol spoken between the network-facing controller and the
//! zone bridge.
//!
//! This crate provides:
//! - Fletcher-16 checksum (modulus 255) over byte ranges
//! - Fixed 8-byte request and 7-byte response frames
//! - Frame validation (sentinels, checksum) and encoding
//! - Wire constants, message types and error reasons

pub mod checksum;
pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use checksum::{checksum, fletcher16};
pub use codec::{decode_request, decode_request_slice, decode_response, encode_response};
pub use error::FrameError;
pub use frame::{ChecksumEcho, RequestFrame, ResponseFrame, REQUEST_LEN, RESPONSE_LEN};
pub use message::{ErrorReason, MessageType, Reply};

/// Baud rate the bridge firmware listens on.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Per-frame read timeout used by the bridge firmware, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
