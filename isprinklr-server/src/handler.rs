//! Command dispatch for the serial link.

use crate::metrics::Metrics;
use isprinklr_core::ZoneActuator;
use isprinklr_protocol::message::{START_SPRINKLER, STOP_SPRINKLER};
use isprinklr_protocol::{ErrorReason, Reply};
use std::sync::Arc;

/// Inclusive bounds on zone numbers and run durations.
///
/// Zones always start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneLimits {
    pub max_zone: u8,
    pub min_minutes: u8,
    pub max_minutes: u8,
}

impl ZoneLimits {
    /// Bounds for commands arriving over the serial link.
    pub const SERIAL: ZoneLimits = ZoneLimits {
        max_zone: 8,
        min_minutes: 1,
        max_minutes: 60,
    };

    /// Bounds for the HTTP API, where zero minutes means stop.
    pub const HTTP: ZoneLimits = ZoneLimits {
        max_zone: 20,
        min_minutes: 0,
        max_minutes: 120,
    };

    pub fn zone_ok(&self, zone: i64) -> bool {
        (1..=i64::from(self.max_zone)).contains(&zone)
    }

    pub fn minutes_ok(&self, minutes: i64) -> bool {
        (i64::from(self.min_minutes)..=i64::from(self.max_minutes)).contains(&minutes)
    }
}

impl Default for ZoneLimits {
    fn default() -> Self {
        Self::SERIAL
    }
}

/// Validates zone commands and forwards them to the actuator.
pub struct CommandHandler {
    actuator: Arc<dyn ZoneActuator>,
    limits: ZoneLimits,
    metrics: Option<Arc<Metrics>>,
}

impl CommandHandler {
    pub fn new(actuator: Arc<dyn ZoneActuator>) -> Self {
        Self {
            actuator,
            limits: ZoneLimits::SERIAL,
            metrics: None,
        }
    }

    /// Sets the zone and duration bounds.
    pub fn with_limits(mut self, limits: ZoneLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn limits(&self) -> ZoneLimits {
        self.limits
    }

    pub fn actuator(&self) -> &Arc<dyn ZoneActuator> {
        &self.actuator
    }

    /// Executes a command and returns the reply bytes.
    ///
    /// Parameters are validated before the actuator is touched, zone first.
    pub fn dispatch(&self, type_byte: u8, data1: u8, data2: u8) -> Reply {
        match type_byte {
            START_SPRINKLER => self.start(data1, data2),
            STOP_SPRINKLER => self.stop(data1),
            other => {
                tracing::debug!("Unrecognized command {:#04x}", other);
                Reply::error(ErrorReason::BadCmd)
            }
        }
    }

    fn start(&self, zone: u8, minutes: u8) -> Reply {
        if !self.limits.zone_ok(zone.into()) {
            return Reply::error(ErrorReason::BadSprinkler);
        }
        if !self.limits.minutes_ok(minutes.into()) {
            return Reply::error(ErrorReason::BadDuration);
        }

        let result = self.actuator.start_zone(zone, minutes);
        if let Some(ref metrics) = self.metrics {
            metrics.record_actuator_call("start", result.is_ok());
        }
        match result {
            Ok(()) => Reply::ACK,
            Err(e) => {
                tracing::warn!(
                    "Start zone {} for {} minutes failed ({}): {}",
                    zone,
                    minutes,
                    e.code,
                    e.hint()
                );
                Reply::error(ErrorReason::ActuatorFailure)
            }
        }
    }

    fn stop(&self, zone: u8) -> Reply {
        if !self.limits.zone_ok(zone.into()) {
            return Reply::error(ErrorReason::BadSprinkler);
        }

        let result = self.actuator.stop_zone(zone);
        if let Some(ref metrics) = self.metrics {
            metrics.record_actuator_call("stop", result.is_ok());
        }
        match result {
            Ok(()) => Reply::ACK,
            Err(e) => {
                tracing::warn!("Stop zone {} failed ({}): {}", zone, e.code, e.hint());
                Reply::error(ErrorReason::ActuatorFailure)
            }
        }
    }
}
