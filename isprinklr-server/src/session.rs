//! Link session state machine.
//!
//! A single session exists per link. A `SYN` always starts a new handshake,
//! discarding whatever session was active before it.

use crate::handler::CommandHandler;
use isprinklr_protocol::{ChecksumEcho, Reply, RequestFrame, ResponseFrame};
use serde::Serialize;
use std::fmt;

/// Session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No handshake seen yet.
    #[default]
    Disconnected,
    /// `SYN` answered, waiting for the peer's `ACK`.
    AwaitingAck { conn_id: u8 },
    /// Handshake complete, commands accepted.
    Connected { conn_id: u8 },
}

impl SessionState {
    pub fn conn_id(&self) -> Option<u8> {
        match self {
            SessionState::Disconnected => None,
            SessionState::AwaitingAck { conn_id } | SessionState::Connected { conn_id } => {
                Some(*conn_id)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }
}

/// Why a valid frame produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Silence {
    /// The peer's `ACK` completed the handshake.
    HandshakeComplete,
    /// No session exists and the frame was not a `SYN`.
    NoSession,
    /// A handshake is pending and the frame was not the matching `ACK`.
    AwaitingAck,
    /// The frame belongs to a different connection.
    ConnIdMismatch { expected: u8, got: u8 },
}

impl Silence {
    /// Returns the label used for the dropped-frame metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Silence::HandshakeComplete => "handshake_complete",
            Silence::NoSession => "no_session",
            Silence::AwaitingAck => "awaiting_ack",
            Silence::ConnIdMismatch { .. } => "conn_mismatch",
        }
    }
}

impl fmt::Display for Silence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Silence::ConnIdMismatch { expected, got } => {
                write!(f, "conn_mismatch (expected {}, got {})", expected, got)
            }
            other => f.write_str(other.reason()),
        }
    }
}

/// Result of feeding one valid frame to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Reply(ResponseFrame),
    Silent(Silence),
}

impl Outcome {
    pub fn response(&self) -> Option<&ResponseFrame> {
        match self {
            Outcome::Reply(response) => Some(response),
            Outcome::Silent(_) => None,
        }
    }
}

/// The link session.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    echo: ChecksumEcho,
    handshakes: u64,
    commands: u64,
}

impl Session {
    pub fn new(echo: ChecksumEcho) -> Self {
        Self {
            echo,
            ..Default::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn echo(&self) -> ChecksumEcho {
        self.echo
    }

    /// Number of completed handshakes.
    pub fn handshakes(&self) -> u64 {
        self.handshakes
    }

    /// Number of frames dispatched to the command handler.
    pub fn commands(&self) -> u64 {
        self.commands
    }

    /// Processes a validated frame.
    pub fn process(&mut self, frame: &RequestFrame, handler: &CommandHandler) -> Outcome {
        if frame.is_syn() {
            if let Some(previous) = self.state.conn_id() {
                tracing::debug!(
                    "New handshake from {} replaces session {}",
                    frame.conn_id,
                    previous
                );
            }
            self.state = SessionState::AwaitingAck {
                conn_id: frame.conn_id,
            };
            tracing::debug!("Handshake started (conn_id={})", frame.conn_id);
            return self.reply(frame, Reply::SYN_ACK);
        }

        match self.state {
            SessionState::Disconnected => self.silent(frame, Silence::NoSession),
            SessionState::AwaitingAck { conn_id } => {
                if frame.is_ack() && frame.conn_id == conn_id {
                    self.state = SessionState::Connected { conn_id };
                    self.handshakes += 1;
                    tracing::debug!("Handshake complete (conn_id={})", conn_id);
                    Outcome::Silent(Silence::HandshakeComplete)
                } else {
                    self.silent(frame, Silence::AwaitingAck)
                }
            }
            SessionState::Connected { conn_id } => {
                if frame.conn_id != conn_id {
                    return self.silent(
                        frame,
                        Silence::ConnIdMismatch {
                            expected: conn_id,
                            got: frame.conn_id,
                        },
                    );
                }
                self.commands += 1;
                let reply = handler.dispatch(frame.type_byte, frame.data1, frame.data2);
                self.reply(frame, reply)
            }
        }
    }

    fn reply(&self, frame: &RequestFrame, reply: Reply) -> Outcome {
        Outcome::Reply(ResponseFrame::reply_to(frame, reply, self.echo))
    }

    fn silent(&self, frame: &RequestFrame, silence: Silence) -> Outcome {
        tracing::debug!("Frame ignored ({}): {}", silence, frame);
        Outcome::Silent(silence)
    }
}
