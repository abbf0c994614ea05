//! # isprinklr-core
//!
//! Zone actuation for isprinklr.
//!
//! This crate provides:
//! - The `ZoneActuator` trait that both the serial link and the HTTP API drive
//! - Actuator status codes and their human-readable hints
//! - A simulated controller that tracks running zones in memory

pub mod actuator;
pub mod error;
pub mod simulated;

pub use actuator::{ActuatorCall, ActuatorError, ZoneActuator, ZoneRun};
pub use error::CoreError;
pub use simulated::SimulatedController;
