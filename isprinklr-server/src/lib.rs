//! # isprinklr-server
//!
//! Device side of isprinklr.
//!
//! This crate provides:
//! - The link session state machine and command dispatcher
//! - A polling link driver over serial or TCP transports
//! - The HTTP control API with Prometheus metrics
//! - Network connectivity monitoring
//! - Layered YAML/environment configuration

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod link;
pub mod metrics;
pub mod network;
pub mod session;
pub mod transport;

pub use config::{
    Config, ConfigError, ControllerConfig, FixedIp, HttpConfig, NetworkConfig, NetworkMode,
    SerialConfig,
};
pub use error::ServerError;
pub use handler::{CommandHandler, ZoneLimits};
pub use http::ApiState;
pub use link::{LinkDriver, LinkStatus, Poll};
pub use metrics::Metrics;
pub use network::{LinkObserver, LoggingObserver, NetworkMonitor, NetworkStatus};
pub use session::{Outcome, Session, SessionState, Silence};
pub use transport::Transport;
