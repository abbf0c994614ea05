//! Core error types.

use thiserror::Error;

/// Errors from the actuator layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid controller configuration: {reason}")]
    InvalidConfig { reason: String },
}
