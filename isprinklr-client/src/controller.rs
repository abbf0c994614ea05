//! Controller side of the link: handshake and zone commands.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use isprinklr_protocol::{
    decode_response, ChecksumEcho, RequestFrame, ResponseFrame, RESPONSE_LEN,
};
use std::io::{ErrorKind, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sends per request before giving up.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Upper bound on reads when discarding stale input.
const MAX_DRAIN_READS: usize = 64;

/// Picks a connection id from the wall clock (`unix_seconds % 255`).
pub fn default_conn_id() -> u8 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    (secs % 255) as u8
}

/// Drives one bridge over a blocking byte stream.
///
/// Every request is sent up to `attempts` times. A send is retried when the
/// response times out, is malformed, does not echo the request, or reports a
/// transient actuator failure. Validation rejections are returned at once.
pub struct Controller<T> {
    io: T,
    echo: ChecksumEcho,
    attempts: u32,
    conn_id: Option<u8>,
}

impl Controller<Connection> {
    /// Opens the connection described by `config`.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let conn = Connection::open(config)?;
        Ok(Controller::new(conn)
            .with_echo(config.echo)
            .with_attempts(config.attempts))
    }
}

impl<T: Read + Write> Controller<T> {
    pub fn new(io: T) -> Self {
        Self {
            io,
            echo: ChecksumEcho::default(),
            attempts: DEFAULT_ATTEMPTS,
            conn_id: None,
        }
    }

    pub fn with_echo(mut self, echo: ChecksumEcho) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Returns the id of the established session, if any.
    pub fn conn_id(&self) -> Option<u8> {
        self.conn_id
    }

    pub fn echo(&self) -> ChecksumEcho {
        self.echo
    }

    pub fn get_ref(&self) -> &T {
        &self.io
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Opens a session: SYN, expect `(SYN, ACK)` echoing the SYN, then ACK.
    ///
    /// The bridge answers the final ACK with silence.
    pub fn handshake(&mut self, conn_id: u8) -> Result<(), ClientError> {
        self.conn_id = None;
        let syn = RequestFrame::syn(conn_id);

        let result = self.with_retries(|ctl| {
            let response = ctl.exchange_once(&syn)?;
            if response.reply.is_syn_ack() {
                Ok(())
            } else {
                Err(ClientError::UnexpectedReply(response))
            }
        });

        match result {
            Ok(()) => {}
            Err(e) if e.is_retryable() => {
                tracing::warn!("Handshake for connection {} failed: {}", conn_id, e);
                return Err(ClientError::HandshakeFailed {
                    conn_id,
                    attempts: self.attempts,
                });
            }
            Err(e) => return Err(e),
        }

        self.send(&RequestFrame::ack(conn_id))?;
        self.conn_id = Some(conn_id);
        tracing::debug!("Connection {} established", conn_id);
        Ok(())
    }

    pub fn start_zone(&mut self, zone: u8, minutes: u8) -> Result<(), ClientError> {
        let conn_id = self.conn_id.ok_or(ClientError::NotConnected)?;
        self.command(RequestFrame::start(conn_id, zone, minutes))
    }

    pub fn stop_zone(&mut self, zone: u8) -> Result<(), ClientError> {
        let conn_id = self.conn_id.ok_or(ClientError::NotConnected)?;
        self.command(RequestFrame::stop(conn_id, zone))
    }

    /// Writes raw bytes to the link, as line noise would.
    pub fn send_garbage(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        tracing::debug!("Sending {} bytes of noise", bytes.len());
        self.io.write_all(bytes)?;
        self.io.flush()?;
        Ok(())
    }

    fn command(&mut self, request: RequestFrame) -> Result<(), ClientError> {
        self.with_retries(|ctl| {
            let response = ctl.exchange_once(&request)?;
            if response.reply.is_ack() {
                return Ok(());
            }
            match response.reply.error_reason() {
                Some(reason) => Err(ClientError::Rejected(reason)),
                None => Err(ClientError::UnexpectedReply(response)),
            }
        })
    }

    fn with_retries<R>(
        &mut self,
        mut op: impl FnMut(&mut Self) -> Result<R, ClientError>,
    ) -> Result<R, ClientError> {
        let mut attempt = 1;
        loop {
            match op(self) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    tracing::debug!("Attempt {} of {} failed: {}", attempt, self.attempts, e);
                    self.drain();
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn exchange_once(&mut self, request: &RequestFrame) -> Result<ResponseFrame, ClientError> {
        self.send(request)?;

        let mut buf = [0u8; RESPONSE_LEN];
        self.io.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ClientError::Timeout,
            _ => ClientError::Io(e),
        })?;

        let response = decode_response(&buf)?;
        tracing::debug!("<- {}", response);
        if !response.answers(request, self.echo) {
            return Err(ClientError::UnexpectedReply(response));
        }
        Ok(response)
    }

    fn send(&mut self, request: &RequestFrame) -> Result<(), ClientError> {
        tracing::debug!("-> {}", request);
        self.io.write_all(&request.encode())?;
        self.io.flush()?;
        Ok(())
    }

    /// Discards whatever is already buffered on the link.
    fn drain(&mut self) {
        let mut buf = [0u8; 64];
        for _ in 0..MAX_DRAIN_READS {
            match self.io.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }
}
