//! In-memory controller used when no valve hardware is attached.

use crate::actuator::{ActuatorCall, ActuatorError, ZoneActuator, ZoneRun};
use crate::error::CoreError;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default number of addressable zones.
pub const DEFAULT_MAX_ZONE: u8 = 48;

/// Longest run the controller accepts, in minutes.
pub const MAX_RUN_MINUTES: u8 = 240;

/// Number of recent calls kept by [`SimulatedController::calls`].
pub const CALL_LOG_CAPACITY: usize = 64;

/// A controller that records runs instead of switching valves.
pub struct SimulatedController {
    max_zone: u8,
    runs: DashMap<u8, ZoneRun>,
    calls: Mutex<VecDeque<ActuatorCall>>,
    busy: AtomicBool,
}

impl SimulatedController {
    pub fn new(max_zone: u8) -> Result<Self, CoreError> {
        if max_zone == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "max_zone must be at least 1".to_string(),
            });
        }
        Ok(Self {
            max_zone,
            runs: DashMap::new(),
            calls: Mutex::new(VecDeque::with_capacity(CALL_LOG_CAPACITY)),
            busy: AtomicBool::new(false),
        })
    }

    pub fn max_zone(&self) -> u8 {
        self.max_zone
    }

    /// Makes every subsequent call fail with the busy status.
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Returns the most recent calls, oldest first, including rejected ones.
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().iter().cloned().collect()
    }

    fn record(&self, call: ActuatorCall) {
        let mut calls = self.calls.lock();
        if calls.len() == CALL_LOG_CAPACITY {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    fn check(&self, zone: u8) -> Result<(), ActuatorError> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(ActuatorError::busy());
        }
        if zone == 0 || zone > self.max_zone {
            return Err(ActuatorError::invalid_zone());
        }
        Ok(())
    }
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self {
            max_zone: DEFAULT_MAX_ZONE,
            runs: DashMap::new(),
            calls: Mutex::new(VecDeque::with_capacity(CALL_LOG_CAPACITY)),
            busy: AtomicBool::new(false),
        }
    }
}

impl ZoneActuator for SimulatedController {
    fn start_zone(&self, zone: u8, minutes: u8) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Start { zone, minutes });
        self.check(zone)?;
        if minutes > MAX_RUN_MINUTES {
            return Err(ActuatorError::invalid_time());
        }

        if minutes == 0 {
            self.runs.remove(&zone);
            tracing::debug!("Zero-minute start, zone {} stopped", zone);
            return Ok(());
        }

        self.runs.insert(
            zone,
            ZoneRun {
                zone,
                minutes,
                started_at: Utc::now(),
            },
        );
        tracing::info!("Zone {} started for {} minutes", zone, minutes);
        Ok(())
    }

    fn stop_zone(&self, zone: u8) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Stop { zone });
        self.check(zone)?;
        if self.runs.remove(&zone).is_some() {
            tracing::info!("Zone {} stopped", zone);
        }
        Ok(())
    }

    fn running_zones(&self) -> Vec<ZoneRun> {
        let now = Utc::now();
        self.runs.retain(|_, run| run.is_active_at(now));
        let mut zones: Vec<ZoneRun> = self.runs.iter().map(|entry| entry.value().clone()).collect();
        zones.sort_by_key(|run| run.zone);
        zones
    }
}
