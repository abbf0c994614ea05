//! Client error types.

use isprinklr_protocol::{ErrorReason, FrameError, ResponseFrame};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("handshake failed for connection {conn_id} after {attempts} attempts")]
    HandshakeFailed { conn_id: u8, attempts: u32 },

    #[error("command rejected: {0}")]
    Rejected(ErrorReason),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(ResponseFrame),
}

impl ClientError {
    /// Returns whether resending the request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout => true,
            ClientError::Frame(_) => true,
            ClientError::UnexpectedReply(_) => true,
            ClientError::Rejected(reason) => reason.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isprinklr_protocol::Reply;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Frame(FrameError::UnknownType(0x01)).is_retryable());
        assert!(ClientError::Rejected(ErrorReason::ActuatorFailure).is_retryable());
        assert!(!ClientError::Rejected(ErrorReason::BadSprinkler).is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::HandshakeFailed {
            conn_id: 1,
            attempts: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Rejected(ErrorReason::BadDuration);
        assert_eq!(err.to_string(), "command rejected: BAD_DURATION");

        let err = ClientError::UnexpectedReply(ResponseFrame::new(2, Reply::ACK, 0x1234));
        assert_eq!(err.to_string(), "unexpected reply: ACK(conn=2, chk=0x1234)");
    }
}
