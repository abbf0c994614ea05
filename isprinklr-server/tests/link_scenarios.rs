//! End-to-end link scenarios: raw frames through the link driver, and the
//! host controller client against a live driver.

use isprinklr_client::{ClientError, Controller};
use isprinklr_core::{ActuatorCall, SimulatedController, ZoneActuator};
use isprinklr_protocol::{
    ChecksumEcho, ErrorReason, FrameError, Reply, RequestFrame, ResponseFrame,
};
use isprinklr_server::{
    CommandHandler, LinkDriver, Metrics, Outcome, Poll, SessionState, Silence,
};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// In-memory link. Each queued chunk is returned by one read; an empty chunk
/// reads as a timeout and an empty queue as end of stream.
#[derive(Default)]
struct MemoryLink {
    input: VecDeque<Vec<u8>>,
    output: Vec<u8>,
}

impl MemoryLink {
    fn push(&mut self, bytes: &[u8]) {
        self.input.push_back(bytes.to_vec());
    }

    fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.input.pop_front() {
            None => Ok(0),
            Some(chunk) if chunk.is_empty() => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
            }
            Some(mut chunk) => {
                let n = buf.len().min(chunk.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.input.push_front(chunk.split_off(n));
                }
                Ok(n)
            }
        }
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn driver(echo: ChecksumEcho) -> (LinkDriver<MemoryLink>, Arc<SimulatedController>) {
    let actuator = Arc::new(SimulatedController::default());
    let handler = Arc::new(CommandHandler::new(actuator.clone()));
    (
        LinkDriver::new(MemoryLink::default(), handler, echo),
        actuator,
    )
}

fn feed(driver: &mut LinkDriver<MemoryLink>, bytes: &[u8]) -> (Poll, Vec<u8>) {
    driver.transport_mut().push(bytes);
    let poll = driver.poll_once().unwrap();
    (poll, driver.transport_mut().take_output())
}

#[test]
fn test_scenarios_handshake_command_and_corruption() {
    let (mut driver, actuator) = driver(ChecksumEcho::RequestField);

    // Scenario 1: SYN is answered with (SYN, ACK) echoing the checksum
    let (poll, out) = feed(&mut driver, &[0xFF, 0x01, 0xEE, 0x00, 0x00, 0xD0, 0xEF, 0xAF]);
    assert!(matches!(poll, Poll::Processed(Outcome::Reply(_))));
    assert_eq!(out, vec![0xFF, 0x01, 0xEE, 0xAE, 0xD0, 0xEF, 0xAF]);
    assert_eq!(
        driver.session().state(),
        SessionState::AwaitingAck { conn_id: 1 }
    );

    // Scenario 2: ACK completes the handshake silently
    let (poll, out) = feed(&mut driver, &[0xFF, 0x01, 0xAE, 0x00, 0x00, 0x10, 0xAF, 0xAF]);
    assert_eq!(
        poll,
        Poll::Processed(Outcome::Silent(Silence::HandshakeComplete))
    );
    assert!(out.is_empty());
    assert_eq!(
        driver.session().state(),
        SessionState::Connected { conn_id: 1 }
    );

    // Scenario 3: start zone 3 for 5 minutes
    let (_, out) = feed(&mut driver, &[0xFF, 0x01, 0x65, 0x03, 0x05, 0x3F, 0x6E, 0xAF]);
    assert_eq!(out, vec![0xFF, 0x01, 0xAE, 0x00, 0x3F, 0x6E, 0xAF]);
    assert_eq!(
        actuator.calls(),
        vec![ActuatorCall::Start {
            zone: 3,
            minutes: 5
        }]
    );

    // Scenario 4: same command with one checksum bit flipped
    let (poll, out) = feed(&mut driver, &[0xFF, 0x01, 0x65, 0x03, 0x05, 0x3F, 0x6F, 0xAF]);
    assert!(matches!(
        poll,
        Poll::Dropped(FrameError::ChecksumMismatch { .. })
    ));
    assert!(out.is_empty());
    assert_eq!(actuator.calls().len(), 1);
    assert_eq!(
        driver.session().state(),
        SessionState::Connected { conn_id: 1 }
    );
}

#[test]
fn test_legacy_echo_handshake_bytes() {
    let (mut driver, _) = driver(ChecksumEcho::WholeFrameLe);
    let (_, out) = feed(&mut driver, &RequestFrame::syn(1).encode());
    assert_eq!(out, vec![0xFF, 0x01, 0xEE, 0xAE, 0x60, 0xA2, 0xAF]);
}

#[test]
fn test_new_syn_replaces_connected_session() {
    let (mut driver, actuator) = driver(ChecksumEcho::RequestField);
    feed(&mut driver, &RequestFrame::syn(1).encode());
    feed(&mut driver, &RequestFrame::ack(1).encode());

    let (_, out) = feed(&mut driver, &RequestFrame::syn(2).encode());
    assert_eq!(out.len(), 7);
    assert_eq!(
        driver.session().state(),
        SessionState::AwaitingAck { conn_id: 2 }
    );

    // Nothing but the matching ACK is accepted while the handshake is pending
    let (poll, out) = feed(&mut driver, &RequestFrame::start(2, 3, 5).encode());
    assert!(out.is_empty());
    assert_eq!(
        poll,
        Poll::Processed(Outcome::Silent(Silence::AwaitingAck))
    );

    feed(&mut driver, &RequestFrame::ack(2).encode());

    // The old id is dead
    let (poll, out) = feed(&mut driver, &RequestFrame::start(1, 3, 5).encode());
    assert!(out.is_empty());
    assert_eq!(
        poll,
        Poll::Processed(Outcome::Silent(Silence::ConnIdMismatch {
            expected: 2,
            got: 1
        }))
    );
    assert!(actuator.calls().is_empty());

    let (_, out) = feed(&mut driver, &RequestFrame::start(2, 3, 5).encode());
    let expected =
        ResponseFrame::reply_to(&RequestFrame::start(2, 3, 5), Reply::ACK, ChecksumEcho::RequestField);
    assert_eq!(out, expected.encode().to_vec());
    assert_eq!(actuator.calls().len(), 1);
}

#[test]
fn test_short_block_and_end_of_stream() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let handler = Arc::new(CommandHandler::new(Arc::new(SimulatedController::default())));
    let mut driver = LinkDriver::new(MemoryLink::default(), handler, ChecksumEcho::RequestField)
        .with_metrics(metrics.clone());

    driver.transport_mut().push(&[0xFF, 0x01, 0xEE]);
    driver.transport_mut().push(&[]);
    assert_eq!(
        driver.poll_once().unwrap(),
        Poll::Dropped(FrameError::Underrun { got: 3, want: 8 })
    );
    assert_eq!(driver.poll_once().unwrap(), Poll::Closed);

    let status = driver.status();
    assert_eq!(status.frames(), 1);
    assert_eq!(status.dropped(), 1);

    let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
    assert!(text.contains("isprinklr_frames_dropped_total{reason=\"underrun\"} 1"));
}

fn spawn_bridge(
    echo: ChecksumEcho,
    actuator: Arc<SimulatedController>,
) -> (String, thread::JoinHandle<SessionState>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handler = Arc::new(CommandHandler::new(actuator));

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let mut driver = LinkDriver::new(stream, handler, echo);
        driver.run(&AtomicBool::new(false)).unwrap();
        driver.session().state()
    });
    (addr, handle)
}

fn controller(addr: &str, echo: ChecksumEcho) -> Controller<TcpStream> {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    Controller::new(stream).with_echo(echo)
}

fn run_client_session(echo: ChecksumEcho) {
    let actuator = Arc::new(SimulatedController::default());
    let (addr, bridge) = spawn_bridge(echo, actuator.clone());
    let mut ctl = controller(&addr, echo);

    ctl.handshake(42).unwrap();
    ctl.start_zone(4, 15).unwrap();
    assert_eq!(actuator.running_zones().len(), 1);
    ctl.stop_zone(4).unwrap();

    assert!(matches!(
        ctl.start_zone(9, 5),
        Err(ClientError::Rejected(ErrorReason::BadSprinkler))
    ));
    assert!(matches!(
        ctl.start_zone(5, 61),
        Err(ClientError::Rejected(ErrorReason::BadDuration))
    ));

    drop(ctl);
    let final_state = bridge.join().unwrap();
    assert_eq!(final_state, SessionState::Connected { conn_id: 42 });
    assert_eq!(
        actuator.calls(),
        vec![
            ActuatorCall::Start {
                zone: 4,
                minutes: 15
            },
            ActuatorCall::Stop { zone: 4 },
        ]
    );
    assert!(actuator.running_zones().is_empty());
}

#[test]
fn test_client_against_bridge() {
    run_client_session(ChecksumEcho::RequestField);
}

#[test]
fn test_client_against_legacy_bridge() {
    run_client_session(ChecksumEcho::WholeFrameLe);
}

#[test]
fn test_client_recovers_from_line_noise() {
    let actuator = Arc::new(SimulatedController::default());
    let (addr, bridge) = spawn_bridge(ChecksumEcho::RequestField, actuator.clone());
    let mut ctl = controller(&addr, ChecksumEcho::RequestField);

    ctl.send_garbage(&[0x13, 0x37, 0xFF, 0xAF, 0x00]).unwrap();
    thread::sleep(Duration::from_millis(100));
    ctl.handshake(3).unwrap();
    ctl.start_zone(1, 1).unwrap();

    // Noise straight before a command, without settling, costs one resend
    ctl.send_garbage(&[0xEE, 0xEE, 0xEE]).unwrap();
    ctl.stop_zone(1).unwrap();

    drop(ctl);
    bridge.join().unwrap();
    assert_eq!(actuator.calls().len(), 2);
}

#[test]
fn test_client_handshake_mismatched_echo() {
    let actuator = Arc::new(SimulatedController::default());
    let (addr, bridge) = spawn_bridge(ChecksumEcho::WholeFrameLe, actuator);
    let mut ctl = controller(&addr, ChecksumEcho::RequestField).with_attempts(2);

    assert!(matches!(
        ctl.handshake(5),
        Err(ClientError::HandshakeFailed {
            conn_id: 5,
            attempts: 2
        })
    ));

    drop(ctl);
    assert_eq!(
        bridge.join().unwrap(),
        SessionState::AwaitingAck { conn_id: 5 }
    );
}
