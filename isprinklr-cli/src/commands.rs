//! Command execution.

use crate::Commands;
use colored::Colorize;
use isprinklr_client::{default_conn_id, ClientError, Controller};
use isprinklr_protocol::message::{ACK, ERR, START_SPRINKLER, STOP_SPRINKLER, SYN};
use isprinklr_protocol::{fletcher16, ErrorReason, RequestFrame};
use rand::Rng;
use std::io::{Read, Write};
use std::time::Duration;

/// Pause after line noise so the bridge discards the partial block.
const GARBAGE_SETTLE: Duration = Duration::from_millis(250);

/// Executes a link command and returns the formatted output.
pub fn execute<T: Read + Write>(
    controller: &mut Controller<T>,
    cmd: Commands,
    conn_id: Option<u8>,
) -> Result<String, Box<dyn std::error::Error>> {
    let conn_id = conn_id.unwrap_or_else(default_conn_id);
    match cmd {
        Commands::Start { zone, minutes } => {
            controller.handshake(conn_id)?;
            controller.start_zone(zone, minutes)?;
            Ok(format!(
                "{} zone {} for {} min",
                "Started".green(),
                zone.to_string().cyan(),
                minutes
            ))
        }

        Commands::Stop { zone } => {
            controller.handshake(conn_id)?;
            controller.stop_zone(zone)?;
            Ok(format!("{} zone {}", "Stopped".green(), zone.to_string().cyan()))
        }

        Commands::Soak { rounds, garbage } => {
            let mut rng = rand::thread_rng();
            let report = soak(
                controller,
                conn_id,
                rounds,
                garbage.then_some(GARBAGE_SETTLE),
                &mut rng,
            );
            if report.passed() {
                Ok(report.render())
            } else {
                println!("{}", report.render());
                Err(format!("{} soak check(s) failed", report.failures).into())
            }
        }

        Commands::Checksum { .. } | Commands::Frame { .. } => {
            Err("offline command needs no link".into())
        }
    }
}

/// Outcome of a soak run.
#[derive(Debug, Default)]
pub struct SoakReport {
    pub lines: Vec<String>,
    pub failures: u32,
}

impl SoakReport {
    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    fn pass(&mut self, what: String) {
        self.lines.push(format!("{} {}", "PASS".green(), what));
    }

    fn fail(&mut self, what: String) {
        self.failures += 1;
        self.lines.push(format!("{} {}", "FAIL".red(), what));
    }

    pub fn render(&self) -> String {
        let summary = if self.passed() {
            "All checks passed".green().to_string()
        } else {
            "One or more checks failed".red().to_string()
        };
        let mut output = self.lines.join("\n");
        output.push('\n');
        output.push_str(&summary);
        output
    }
}

/// Alternates start and stop commands on random zones, each over a fresh
/// handshake, then checks that an out-of-range zone and duration are
/// rejected. With `garbage` set, random noise precedes every command and the
/// link is given that long to settle.
pub fn soak<T: Read + Write, R: Rng>(
    controller: &mut Controller<T>,
    conn_id: u8,
    rounds: u32,
    garbage: Option<Duration>,
    rng: &mut R,
) -> SoakReport {
    let mut report = SoakReport::default();
    let mut zone = 1;

    for round in 1..=rounds {
        if let Some(settle) = garbage {
            let mut noise = vec![0u8; rng.gen_range(1..=30)];
            rng.fill(noise.as_mut_slice());
            if let Err(e) = controller.send_garbage(&noise) {
                report.fail(format!("round {}: sending noise: {}", round, e));
                break;
            }
            std::thread::sleep(settle);
        }

        let result = if round % 2 == 1 {
            zone = rng.gen_range(1..=8);
            let minutes = rng.gen_range(1..=30);
            controller
                .handshake(conn_id)
                .and_then(|_| controller.start_zone(zone, minutes))
                .map(|_| format!("start zone {} for {} min", zone, minutes))
        } else {
            controller
                .handshake(conn_id)
                .and_then(|_| controller.stop_zone(zone))
                .map(|_| format!("stop zone {}", zone))
        };

        match result {
            Ok(what) => report.pass(format!("round {}: {}", round, what)),
            Err(e) => {
                report.fail(format!("round {}: {}", round, e));
                break;
            }
        }
    }

    check_rejected(controller, conn_id, 9, 5, ErrorReason::BadSprinkler, &mut report);
    check_rejected(controller, conn_id, 5, 61, ErrorReason::BadDuration, &mut report);
    report
}

fn check_rejected<T: Read + Write>(
    controller: &mut Controller<T>,
    conn_id: u8,
    zone: u8,
    minutes: u8,
    expected: ErrorReason,
    report: &mut SoakReport,
) {
    let what = format!("start zone {} for {} min is rejected", zone, minutes);
    let result = controller
        .handshake(conn_id)
        .and_then(|_| controller.start_zone(zone, minutes));
    match result {
        Err(ClientError::Rejected(reason)) if reason == expected => {
            report.pass(format!("{} with {}", what, reason))
        }
        Ok(()) => report.fail(format!("{}: accepted", what)),
        Err(e) => report.fail(format!("{}: {}", what, e)),
    }
}

/// Parses a message type given by name or as a byte (`0x65` or `101`).
pub fn parse_type_byte(s: &str) -> Result<u8, String> {
    match s.to_ascii_lowercase().as_str() {
        "syn" => Ok(SYN),
        "ack" => Ok(ACK),
        "err" => Ok(ERR),
        "start" => Ok(START_SPRINKLER),
        "stop" => Ok(STOP_SPRINKLER),
        other => match other.strip_prefix("0x") {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => other.parse(),
        }
        .map_err(|e| format!("invalid message type '{}': {}", s, e)),
    }
}

/// Formats the Fletcher-16 checksum of hex-encoded bytes.
pub fn checksum_output(input: &str) -> Result<String, Box<dyn std::error::Error>> {
    let cleaned: String = input
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = hex::decode(cleaned)?;
    if bytes.is_empty() {
        return Err("no bytes given".into());
    }
    let sum = fletcher16(&bytes);
    let [hi, lo] = sum.to_be_bytes();
    Ok(format!("{:#06x} (hi={:#04x} lo={:#04x})", sum, hi, lo))
}

/// Formats an encoded request frame and its decoded form.
pub fn frame_output(conn_id: u8, type_byte: u8, data1: u8, data2: u8) -> String {
    let frame = RequestFrame::new(conn_id, type_byte, data1, data2);
    format!("{}\n{}", hex::encode_upper(frame.encode()), frame)
}
