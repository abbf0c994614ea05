//! Wire constants, message types and reply pairs.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame start sentinel.
pub const BEGIN: u8 = 0xFF;
/// Frame end sentinel.
pub const END: u8 = 0xAF;

/// Handshake request, and first reply byte of the handshake response.
pub const SYN: u8 = 0xEE;
/// Acknowledge.
pub const ACK: u8 = 0xAE;
/// Error reply.
pub const ERR: u8 = 0xDD;

/// Start a zone: `data1` = zone, `data2` = minutes. ASCII `'e'`.
pub const START_SPRINKLER: u8 = 0x65;
/// Stop a zone: `data1` = zone. ASCII `'r'`.
pub const STOP_SPRINKLER: u8 = 0x72;

/// Unrecognized command code. ASCII `'i'`.
pub const BAD_CMD: u8 = 0x69;
/// Zone out of range. ASCII `'o'`.
pub const BAD_SPRINKLER: u8 = 0x6F;
/// Duration out of range. ASCII `'p'`.
pub const BAD_DURATION: u8 = 0x70;
/// Actuator returned a non-zero status. ASCII `'q'`.
pub const ACTUATOR_FAILURE: u8 = 0x71;

/// No-payload filler.
pub const EMPTY: u8 = 0x00;

/// Message types carried in the `type_byte` of a request frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Syn = SYN,
    Ack = ACK,
    Err = ERR,
    StartSprinkler = START_SPRINKLER,
    StopSprinkler = STOP_SPRINKLER,
}

impl MessageType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns whether this type is a zone command.
    pub fn is_command(self) -> bool {
        matches!(self, MessageType::StartSprinkler | MessageType::StopSprinkler)
    }

    /// Returns the name used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Syn => "SYN",
            MessageType::Ack => "ACK",
            MessageType::Err => "ERR",
            MessageType::StartSprinkler => "START_SPRINKLER",
            MessageType::StopSprinkler => "STOP_SPRINKLER",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            SYN => Ok(MessageType::Syn),
            ACK => Ok(MessageType::Ack),
            ERR => Ok(MessageType::Err),
            START_SPRINKLER => Ok(MessageType::StartSprinkler),
            STOP_SPRINKLER => Ok(MessageType::StopSprinkler),
            other => Err(FrameError::UnknownType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons carried in the second byte of an `ERR` reply.
///
/// These byte values are part of the wire contract and must remain stable.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    BadCmd = BAD_CMD,
    BadSprinkler = BAD_SPRINKLER,
    BadDuration = BAD_DURATION,
    ActuatorFailure = ACTUATOR_FAILURE,
}

impl ErrorReason {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns whether resending the same command could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorReason::ActuatorFailure)
    }
}

impl TryFrom<u8> for ErrorReason {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            BAD_CMD => Ok(ErrorReason::BadCmd),
            BAD_SPRINKLER => Ok(ErrorReason::BadSprinkler),
            BAD_DURATION => Ok(ErrorReason::BadDuration),
            ACTUATOR_FAILURE => Ok(ErrorReason::ActuatorFailure),
            other => Err(FrameError::UnknownReason(other)),
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::BadCmd => write!(f, "BAD_CMD"),
            ErrorReason::BadSprinkler => write!(f, "BAD_SPRINKLER"),
            ErrorReason::BadDuration => write!(f, "BAD_DURATION"),
            ErrorReason::ActuatorFailure => write!(f, "ACTUATOR_FAILURE"),
        }
    }
}

/// The two reply bytes of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reply(pub u8, pub u8);

impl Reply {
    /// `(SYN, ACK)`: handshake accepted.
    pub const SYN_ACK: Reply = Reply(SYN, ACK);

    /// `(ACK, EMPTY)`: command executed.
    pub const ACK: Reply = Reply(ACK, EMPTY);

    /// `(ERR, reason)`.
    pub fn error(reason: ErrorReason) -> Self {
        Reply(ERR, reason.as_byte())
    }

    pub fn is_ack(&self) -> bool {
        *self == Reply::ACK
    }

    pub fn is_syn_ack(&self) -> bool {
        *self == Reply::SYN_ACK
    }

    /// Returns the error reason if this is an `ERR` reply with a known code.
    pub fn error_reason(&self) -> Option<ErrorReason> {
        if self.0 != ERR {
            return None;
        }
        ErrorReason::try_from(self.1).ok()
    }

    /// Returns the label used for metrics and logs.
    pub fn label(&self) -> String {
        match (self.is_ack(), self.is_syn_ack(), self.error_reason()) {
            (true, _, _) => "ACK".to_string(),
            (_, true, _) => "SYN_ACK".to_string(),
            (_, _, Some(reason)) => reason.to_string(),
            _ => format!("{:#04x}/{:#04x}", self.0, self.1),
        }
    }
}

impl From<(u8, u8)> for Reply {
    fn from((first, second): (u8, u8)) -> Self {
        Reply(first, second)
    }
}

impl From<Reply> for (u8, u8) {
    fn from(reply: Reply) -> Self {
        (reply.0, reply.1)
    }
}
