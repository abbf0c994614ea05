//! isprinklr-cli - Command-line controller for an isprinklr zone bridge
//!
//! Drives the bridge over a serial port or a raw TCP bridge, and offers a few
//! offline helpers for building and checking frames.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use isprinklr_client::{ConnectionConfig, Controller, DEFAULT_ATTEMPTS};
use isprinklr_protocol::{ChecksumEcho, DEFAULT_BAUD_RATE};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "isprinklr-cli")]
#[command(about = "Command-line controller for an isprinklr zone bridge")]
#[command(version)]
struct Cli {
    /// Serial device
    #[arg(short, long, env = "ISPRINKLR_SERIAL_PORT", default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Raw TCP bridge address, e.g. localhost:4000 (overrides --port)
    #[arg(long, env = "ISPRINKLR_SERIAL_TCP")]
    tcp: Option<String>,

    /// How the bridge echoes checksums: request_field or whole_frame_le
    #[arg(long, env = "ISPRINKLR_CHECKSUM_ECHO", default_value = "request_field")]
    echo: ChecksumEcho,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Sends per request before giving up
    #[arg(long, default_value_t = DEFAULT_ATTEMPTS)]
    attempts: u32,

    /// Connection id (defaults to unix seconds % 255)
    #[arg(long)]
    conn_id: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a zone
    Start {
        /// Zone number
        #[arg(short, long)]
        zone: u8,

        /// Run time in minutes
        #[arg(short, long)]
        minutes: u8,
    },

    /// Stop a zone
    Stop {
        /// Zone number
        #[arg(short, long)]
        zone: u8,
    },

    /// Alternate random start/stop commands, then check rejections
    Soak {
        /// Number of start/stop commands
        #[arg(short, long, default_value_t = 8)]
        rounds: u32,

        /// Send line noise before every command
        #[arg(short, long)]
        garbage: bool,
    },

    /// Compute the Fletcher-16 checksum of hex bytes
    Checksum {
        /// Bytes as hex, e.g. 01ee0000
        hex: String,
    },

    /// Encode a request frame
    Frame {
        /// Connection id
        conn: u8,

        /// Message type: syn, ack, start, stop, or a byte such as 0x65
        #[arg(value_parser = commands::parse_type_byte)]
        type_byte: u8,

        /// First data byte
        d1: u8,

        /// Second data byte
        d2: u8,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Offline helpers need no link
    match &cli.command {
        Commands::Checksum { hex } => {
            return report(commands::checksum_output(hex));
        }
        Commands::Frame {
            conn,
            type_byte,
            d1,
            d2,
        } => {
            println!("{}", commands::frame_output(*conn, *type_byte, *d1, *d2));
            return Ok(());
        }
        _ => {}
    }

    let config = match cli.tcp {
        Some(ref addr) => ConnectionConfig::tcp(addr),
        None => ConnectionConfig::serial(&cli.port).with_baud_rate(cli.baud),
    }
    .with_timeout(Duration::from_millis(cli.timeout_ms))
    .with_echo(cli.echo)
    .with_attempts(cli.attempts);

    let mut controller = Controller::connect(&config).map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    report(commands::execute(&mut controller, cli.command, cli.conn_id))
}

fn report(
    result: Result<String, Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
