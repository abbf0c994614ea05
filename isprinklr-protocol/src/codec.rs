//! Frame validation and encoding.

use crate::checksum::checksum;
use crate::error::FrameError;
use crate::frame::{RequestFrame, ResponseFrame, REQUEST_LEN, RESPONSE_LEN};
use crate::message::{Reply, BEGIN, END};

/// Validates and decodes a request frame.
///
/// Sentinels are checked before the checksum; the first violation wins.
pub fn decode_request(bytes: &[u8; REQUEST_LEN]) -> Result<RequestFrame, FrameError> {
    check_markers(bytes[0], bytes[REQUEST_LEN - 1])?;

    let expected = checksum(bytes, 1, 5);
    let actual = u16::from_be_bytes([bytes[5], bytes[6]]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(RequestFrame {
        conn_id: bytes[1],
        type_byte: bytes[2],
        data1: bytes[3],
        data2: bytes[4],
        checksum: actual,
    })
}

/// Decodes a request from a read block, rejecting short blocks.
///
/// Only the leading `REQUEST_LEN` bytes are considered.
pub fn decode_request_slice(bytes: &[u8]) -> Result<RequestFrame, FrameError> {
    let block: &[u8; REQUEST_LEN] = bytes
        .get(..REQUEST_LEN)
        .and_then(|head| head.try_into().ok())
        .ok_or(FrameError::Underrun {
            got: bytes.len(),
            want: REQUEST_LEN,
        })?;
    decode_request(block)
}

/// Builds a response frame. The checksum is written big-endian.
pub fn encode_response(
    reply_byte1: u8,
    reply_byte2: u8,
    conn_id: u8,
    echoed_checksum: u16,
) -> [u8; RESPONSE_LEN] {
    let [hi, lo] = echoed_checksum.to_be_bytes();
    [BEGIN, conn_id, reply_byte1, reply_byte2, hi, lo, END]
}

/// Decodes a response frame, checking only its sentinels.
///
/// The echoed checksum cannot be verified without the request; see
/// [`ResponseFrame::answers`].
pub fn decode_response(bytes: &[u8; RESPONSE_LEN]) -> Result<ResponseFrame, FrameError> {
    check_markers(bytes[0], bytes[RESPONSE_LEN - 1])?;
    Ok(ResponseFrame {
        conn_id: bytes[1],
        reply: Reply(bytes[2], bytes[3]),
        checksum: u16::from_be_bytes([bytes[4], bytes[5]]),
    })
}

fn check_markers(begin: u8, end: u8) -> Result<(), FrameError> {
    if begin != BEGIN || end != END {
        return Err(FrameError::BadMarkers { begin, end });
    }
    Ok(())
}
