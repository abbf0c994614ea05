//! Server error types.

use hyper::StatusCode;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("actuator error: {}", .0.hint())]
    Actuator(#[from] isprinklr_core::ActuatorError),
}

impl ServerError {
    /// Maps the error to the HTTP status returned by the API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Json(_) | ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isprinklr_core::ActuatorError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServerError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let json = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        assert_eq!(ServerError::Json(json).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::Actuator(ActuatorError::busy()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ServerError::InvalidRequest("Missing required parameters".into()).to_string(),
            "Missing required parameters"
        );
        let json = serde_json::from_slice::<serde_json::Value>(b"{zone:").unwrap_err();
        assert!(ServerError::Json(json).to_string().starts_with("Invalid JSON: "));
    }
}
