//! Link driver: the polling loop that owns the session.
//!
//! Each iteration reads one fixed-size block, bounded by the transport's read
//! timeout, and processes it to completion before polling again. Short blocks
//! are discarded. Nothing that arrives on the link stops the loop; only
//! transport failure, end of stream or the shutdown flag do.

use crate::error::ServerError;
use crate::handler::CommandHandler;
use crate::metrics::Metrics;
use crate::session::{Outcome, Session, SessionState, Silence};
use isprinklr_protocol::{decode_request, ChecksumEcho, FrameError, REQUEST_LEN};
use parking_lot::RwLock;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Link state shared with the HTTP API.
#[derive(Debug, Default)]
pub struct LinkStatus {
    state: RwLock<SessionState>,
    frames: AtomicU64,
    dropped: AtomicU64,
    responses: AtomicU64,
}

impl LinkStatus {
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "session": self.state(),
            "frames": self.frames(),
            "dropped": self.dropped(),
            "responses": self.responses(),
        })
    }
}

/// Result of one poll iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// Nothing arrived within the read timeout.
    Idle,
    /// The transport reached end of stream.
    Closed,
    /// A block arrived but was structurally invalid.
    Dropped(FrameError),
    /// A valid frame was processed.
    Processed(Outcome),
}

/// Drives a [`Session`] over a blocking byte transport.
pub struct LinkDriver<T> {
    transport: T,
    session: Session,
    handler: Arc<CommandHandler>,
    status: Arc<LinkStatus>,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Read + Write> LinkDriver<T> {
    pub fn new(transport: T, handler: Arc<CommandHandler>, echo: ChecksumEcho) -> Self {
        Self {
            transport,
            session: Session::new(echo),
            handler,
            status: Arc::new(LinkStatus::default()),
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Shares link status with another component. The shared state is reset
    /// to this driver's fresh session.
    pub fn with_status(mut self, status: Arc<LinkStatus>) -> Self {
        status.set_state(self.session.state());
        self.status = status;
        self
    }

    pub fn status(&self) -> Arc<LinkStatus> {
        self.status.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Runs until the shutdown flag is set, the transport closes or the
    /// transport fails. The shared status reads as disconnected afterwards.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), ServerError> {
        tracing::info!("Link driver started (echo={})", self.session.echo());
        let result = loop {
            if shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.poll_once() {
                Ok(Poll::Closed) => {
                    tracing::info!("Link transport closed");
                    break Ok(());
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        self.status.set_state(SessionState::Disconnected);
        self.set_connected_gauge(false);
        tracing::info!("Link driver stopped");
        result
    }

    /// Reads and processes at most one block.
    pub fn poll_once(&mut self) -> Result<Poll, ServerError> {
        let mut block = [0u8; REQUEST_LEN];
        let (filled, eof) = self.read_block(&mut block)?;

        if filled == 0 {
            return Ok(if eof { Poll::Closed } else { Poll::Idle });
        }

        self.status.frames.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = self.metrics {
            metrics.frames_received_total.inc();
        }

        if filled < REQUEST_LEN {
            return Ok(self.drop_block(FrameError::Underrun {
                got: filled,
                want: REQUEST_LEN,
            }));
        }

        let frame = match decode_request(&block) {
            Ok(frame) => frame,
            Err(e) => return Ok(self.drop_block(e)),
        };
        tracing::debug!("Frame received: {}", frame);

        let outcome = self.session.process(&frame, &self.handler);
        match outcome {
            Outcome::Reply(response) => {
                self.transport.write_all(&response.encode())?;
                self.transport.flush()?;
                self.status.responses.fetch_add(1, Ordering::Relaxed);
                if let Some(ref metrics) = self.metrics {
                    let label = response.reply.label();
                    metrics
                        .responses_total
                        .with_label_values(&[label.as_str()])
                        .inc();
                }
                tracing::debug!("Response sent: {}", response);
            }
            Outcome::Silent(Silence::HandshakeComplete) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.handshakes_total.inc();
                }
                tracing::info!("Link connected (conn_id={})", frame.conn_id);
            }
            Outcome::Silent(silence) => {
                self.status.dropped.fetch_add(1, Ordering::Relaxed);
                if let Some(ref metrics) = self.metrics {
                    metrics
                        .frames_dropped_total
                        .with_label_values(&[silence.reason()])
                        .inc();
                }
            }
        }

        let state = self.session.state();
        self.status.set_state(state);
        self.set_connected_gauge(state.is_connected());
        Ok(Poll::Processed(outcome))
    }

    /// Fills `block` until it is full, the read times out, or the stream ends.
    fn read_block(&mut self, block: &mut [u8; REQUEST_LEN]) -> Result<(usize, bool), ServerError> {
        let mut filled = 0;
        while filled < REQUEST_LEN {
            match self.transport.read(&mut block[filled..]) {
                Ok(0) => return Ok((filled, true)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    break
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok((filled, false))
    }

    fn drop_block(&self, error: FrameError) -> Poll {
        tracing::debug!("Dropped block: {}", error);
        self.status.dropped.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = self.metrics {
            metrics
                .frames_dropped_total
                .with_label_values(&[error.reason()])
                .inc();
        }
        Poll::Dropped(error)
    }

    fn set_connected_gauge(&self, connected: bool) {
        if let Some(ref metrics) = self.metrics {
            metrics.link_connected.set(if connected { 1.0 } else { 0.0 });
        }
    }
}
