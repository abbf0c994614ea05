//! The zone actuator collaborator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Drives the physical zone valves.
///
/// Implementations are shared between the link driver thread and the HTTP
/// handlers, so they must be `Send + Sync`.
pub trait ZoneActuator: Send + Sync {
    /// Starts `zone` for `minutes`. Zero minutes stops the zone.
    fn start_zone(&self, zone: u8, minutes: u8) -> Result<(), ActuatorError>;

    /// Stops `zone`.
    fn stop_zone(&self, zone: u8) -> Result<(), ActuatorError>;

    /// Returns the zones currently watering.
    fn running_zones(&self) -> Vec<ZoneRun> {
        Vec::new()
    }
}

/// A non-zero actuator status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("actuator status {code}: {}", status_hint(.code))]
pub struct ActuatorError {
    pub code: u8,
}

impl ActuatorError {
    pub const INVALID_ZONE: u8 = 1;
    pub const INVALID_TIME: u8 = 2;
    pub const BUSY: u8 = 3;

    pub fn new(code: u8) -> Self {
        Self { code }
    }

    pub fn invalid_zone() -> Self {
        Self::new(Self::INVALID_ZONE)
    }

    pub fn invalid_time() -> Self {
        Self::new(Self::INVALID_TIME)
    }

    pub fn busy() -> Self {
        Self::new(Self::BUSY)
    }

    /// Human-readable description of the status code.
    pub fn hint(&self) -> &'static str {
        status_hint(&self.code)
    }
}

fn status_hint(code: &u8) -> &'static str {
    match *code {
        ActuatorError::INVALID_ZONE => "invalid zone number",
        ActuatorError::INVALID_TIME => "invalid watering time",
        ActuatorError::BUSY => "controller busy",
        _ => "unknown error",
    }
}

/// A zone that is currently watering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRun {
    pub zone: u8,
    pub minutes: u8,
    pub started_at: DateTime<Utc>,
}

impl ZoneRun {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::minutes(i64::from(self.minutes))
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.ends_at()
    }
}

/// A recorded actuator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Start { zone: u8, minutes: u8 },
    Stop { zone: u8 },
}
