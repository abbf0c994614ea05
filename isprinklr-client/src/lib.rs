//! # isprinklr-client
//!
//! Host-side peer of the isprinklr serial link.
//!
//! This crate provides:
//! - Serial and TCP-bridge connections with a per-read timeout
//! - The SYN / SYN-ACK / ACK handshake
//! - Start and stop zone commands with bounded resends

pub mod connection;
pub mod controller;
pub mod error;

pub use connection::{Connection, ConnectionConfig, Target};
pub use controller::{default_conn_id, Controller, DEFAULT_ATTEMPTS};
pub use error::ClientError;
