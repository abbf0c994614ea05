//! Session and link driver benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use isprinklr_core::SimulatedController;
use isprinklr_protocol::{ChecksumEcho, RequestFrame};
use isprinklr_server::{CommandHandler, LinkDriver, Session};
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

/// Reads from a fixed script and discards writes.
struct ScriptedLink {
    input: Cursor<Vec<u8>>,
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn create_handler() -> Arc<CommandHandler> {
    Arc::new(CommandHandler::new(Arc::new(SimulatedController::default())))
}

fn connected_session(handler: &CommandHandler) -> Session {
    let mut session = Session::new(ChecksumEcho::RequestField);
    session.process(&RequestFrame::syn(1), handler);
    session.process(&RequestFrame::ack(1), handler);
    session
}

fn bench_handler_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let handler = create_handler();

    group.bench_function("start", |b| {
        b.iter(|| black_box(handler.dispatch(0x65, black_box(3), 5)));
    });
    group.bench_function("bad_sprinkler", |b| {
        b.iter(|| black_box(handler.dispatch(0x65, black_box(9), 5)));
    });

    group.finish();
}

fn bench_session_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");
    let handler = create_handler();

    group.bench_function("handshake", |b| {
        b.iter(|| {
            let mut session = Session::new(ChecksumEcho::RequestField);
            session.process(&RequestFrame::syn(1), &handler);
            black_box(session.process(&RequestFrame::ack(1), &handler))
        });
    });

    let mut session = connected_session(&handler);
    let start = RequestFrame::start(1, 3, 5);
    group.bench_function("command", |b| {
        b.iter(|| black_box(session.process(black_box(&start), &handler)));
    });

    let stranger = RequestFrame::start(2, 3, 5);
    group.bench_function("conn_id_mismatch", |b| {
        b.iter(|| black_box(session.process(black_box(&stranger), &handler)));
    });

    group.finish();
}

fn bench_link_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("link");
    let handler = create_handler();

    let frames = [
        RequestFrame::syn(1),
        RequestFrame::ack(1),
        RequestFrame::start(1, 3, 5),
        RequestFrame::stop(1, 3),
    ];
    let script: Vec<u8> = frames.iter().flat_map(|f| f.encode()).collect();

    group.throughput(Throughput::Elements(frames.len() as u64));
    group.bench_function("poll_session", |b| {
        b.iter(|| {
            let link = ScriptedLink {
                input: Cursor::new(script.clone()),
            };
            let mut driver = LinkDriver::new(link, handler.clone(), ChecksumEcho::RequestField);
            for _ in 0..frames.len() {
                black_box(driver.poll_once().unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_handler_dispatch,
    bench_session_process,
    bench_link_poll,
);

criterion_main!(benches);
