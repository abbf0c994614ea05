//! Fixed-size frames exchanged on the serial link.
//!
//! Request (8 bytes):
//!
//! ```text
//! +-------+---------+------+-------+-------+--------+--------+-----+
//! | BEGIN | conn_id | type | data1 | data2 | chk_hi | chk_lo | END |
//! +-------+---------+------+-------+-------+--------+--------+-----+
//! ```
//!
//! Response (7 bytes):
//!
//! ```text
//! +-------+---------+--------+--------+--------+--------+-----+
//! | BEGIN | conn_id | reply1 | reply2 | chk_hi | chk_lo | END |
//! +-------+---------+--------+--------+--------+--------+-----+
//! ```
//!
//! The response checksum is echoed from the request that triggered it, it is
//! never computed over the response itself.

use crate::checksum::{checksum, fletcher16};
use crate::error::FrameError;
use crate::message::{
    MessageType, Reply, ACK, BEGIN, EMPTY, END, START_SPRINKLER, STOP_SPRINKLER, SYN,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a request frame in bytes.
pub const REQUEST_LEN: usize = 8;

/// Length of a response frame in bytes.
pub const RESPONSE_LEN: usize = 7;

/// A validated request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    pub conn_id: u8,
    pub type_byte: u8,
    pub data1: u8,
    pub data2: u8,
    /// Checksum over `conn_id..=data2`.
    pub checksum: u16,
}

impl RequestFrame {
    /// Builds a frame and computes its checksum.
    pub fn new(conn_id: u8, type_byte: u8, data1: u8, data2: u8) -> Self {
        let checksum = checksum(&[conn_id, type_byte, data1, data2], 0, 4);
        Self {
            conn_id,
            type_byte,
            data1,
            data2,
            checksum,
        }
    }

    pub fn syn(conn_id: u8) -> Self {
        Self::new(conn_id, SYN, EMPTY, EMPTY)
    }

    pub fn ack(conn_id: u8) -> Self {
        Self::new(conn_id, ACK, EMPTY, EMPTY)
    }

    pub fn start(conn_id: u8, zone: u8, minutes: u8) -> Self {
        Self::new(conn_id, START_SPRINKLER, zone, minutes)
    }

    pub fn stop(conn_id: u8, zone: u8) -> Self {
        Self::new(conn_id, STOP_SPRINKLER, zone, EMPTY)
    }

    /// Encodes the frame, writing the stored checksum big-endian.
    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let [hi, lo] = self.checksum.to_be_bytes();
        [
            BEGIN,
            self.conn_id,
            self.type_byte,
            self.data1,
            self.data2,
            hi,
            lo,
            END,
        ]
    }

    /// Returns the message type, if the type byte is a known one.
    pub fn message_type(&self) -> Result<MessageType, FrameError> {
        MessageType::try_from(self.type_byte)
    }

    pub fn is_syn(&self) -> bool {
        self.type_byte == SYN
    }

    pub fn is_ack(&self) -> bool {
        self.type_byte == ACK
    }
}

impl fmt::Display for RequestFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message_type() {
            Ok(ty) => write!(f, "{}", ty)?,
            Err(_) => write!(f, "{:#04x}", self.type_byte)?,
        }
        write!(
            f,
            "(conn={}, {}, {}, chk={:#06x})",
            self.conn_id, self.data1, self.data2, self.checksum
        )
    }
}

/// A response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    pub conn_id: u8,
    pub reply: Reply,
    /// Echoed checksum, as it appears big-endian on the wire.
    pub checksum: u16,
}

impl ResponseFrame {
    pub fn new(conn_id: u8, reply: Reply, checksum: u16) -> Self {
        Self {
            conn_id,
            reply,
            checksum,
        }
    }

    /// Builds the response to `request`, echoing its checksum per `echo`.
    pub fn reply_to(request: &RequestFrame, reply: Reply, echo: ChecksumEcho) -> Self {
        Self::new(request.conn_id, reply, echo.echo(request))
    }

    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        crate::codec::encode_response(self.reply.0, self.reply.1, self.conn_id, self.checksum)
    }

    /// Returns whether this frame answers `request` under `echo`.
    pub fn answers(&self, request: &RequestFrame, echo: ChecksumEcho) -> bool {
        self.conn_id == request.conn_id && self.checksum == echo.echo(request)
    }
}

impl fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(conn={}, chk={:#06x})",
            self.reply.label(),
            self.conn_id,
            self.checksum
        )
    }
}

/// How the checksum field of a response is derived from the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumEcho {
    /// Echo the request's own checksum field unchanged.
    #[default]
    RequestField,
    /// Checksum over the whole 8-byte request, sent little-endian.
    ///
    /// This is what legacy bridge firmware emits.
    WholeFrameLe,
}

impl ChecksumEcho {
    /// Returns the value to place big-endian in the response checksum field.
    pub fn echo(&self, request: &RequestFrame) -> u16 {
        match self {
            ChecksumEcho::RequestField => request.checksum,
            ChecksumEcho::WholeFrameLe => fletcher16(&request.encode()).swap_bytes(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumEcho::RequestField => "request_field",
            ChecksumEcho::WholeFrameLe => "whole_frame_le",
        }
    }
}

impl fmt::Display for ChecksumEcho {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumEcho {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "request_field" => Ok(ChecksumEcho::RequestField),
            "whole_frame_le" | "legacy" => Ok(ChecksumEcho::WholeFrameLe),
            other => Err(format!(
                "unknown checksum echo mode '{}', expected request_field or whole_frame_le",
                other
            )),
        }
    }
}
