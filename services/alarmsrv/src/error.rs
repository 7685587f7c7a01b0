//! Error Handling for AlarmSrv
//!
//! This module provides unified error types for the alarm service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gridmon_model::{AlarmOccurrence, AlarmState};
use serde_json::json;
use std::fmt;

/// Result type alias
pub type Result<T> = std::result::Result<T, AlarmError>;

/// Alarm service error types
#[derive(Debug)]
pub enum AlarmError {
    /// Merged rule configuration is missing required fields
    Validation { missing_fields: Vec<String> },
    /// Target point data type is not accepted by the template
    IncompatibleTarget { target_id: u32 },
    /// Illegal occurrence state transition
    InvalidStateTransition { from: AlarmState, to: AlarmState },
    /// Backing store rejected a transition because another actor already
    /// moved the occurrence; carries the authoritative record for re-sync
    ConcurrentConflict { current: Box<AlarmOccurrence> },
    /// Backing store unreachable or erroring
    Transport(String),
    /// Entity not found
    NotFound(String),
    /// System templates cannot be edited or deleted
    SystemTemplate(u32),
    /// Serialization/deserialization error
    Serialization(serde_json::Error),
    /// Configuration error
    Config(String),
    /// Invalid input
    InvalidInput(String),
    /// Internal server error
    Internal(String),
}

impl fmt::Display for AlarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmError::Validation { missing_fields } => {
                write!(f, "Invalid config, missing fields: {}", missing_fields.join(", "))
            },
            AlarmError::IncompatibleTarget { target_id } => {
                write!(f, "Incompatible data type for target {}", target_id)
            },
            AlarmError::InvalidStateTransition { from, to } => {
                write!(f, "Invalid state transition from {:?} to {:?}", from, to)
            },
            AlarmError::ConcurrentConflict { current } => {
                write!(
                    f,
                    "Occurrence {} already moved to {:?} by another operator",
                    current.id, current.state
                )
            },
            AlarmError::Transport(msg) => write!(f, "Backing store error: {}", msg),
            AlarmError::NotFound(what) => write!(f, "Not found: {}", what),
            AlarmError::SystemTemplate(id) => {
                write!(f, "Template {} is a system template and cannot be modified", id)
            },
            AlarmError::Serialization(err) => write!(f, "Serialization error: {}", err),
            AlarmError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AlarmError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AlarmError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AlarmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AlarmError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Conversion from common error types
impl From<serde_json::Error> for AlarmError {
    fn from(err: serde_json::Error) -> Self {
        AlarmError::Serialization(err)
    }
}

impl From<redis::RedisError> for AlarmError {
    fn from(err: redis::RedisError) -> Self {
        AlarmError::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for AlarmError {
    fn from(err: anyhow::Error) -> Self {
        AlarmError::Internal(err.to_string())
    }
}

// HTTP response conversion for Axum
impl IntoResponse for AlarmError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AlarmError::Validation { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AlarmError::IncompatibleTarget { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AlarmError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AlarmError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AlarmError::InvalidStateTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            AlarmError::ConcurrentConflict { .. } => (StatusCode::CONFLICT, self.to_string()),
            AlarmError::SystemTemplate(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AlarmError::Transport(_) => (
                StatusCode::BAD_GATEWAY,
                "Backing store unavailable".to_string(),
            ),
            AlarmError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serialization error".to_string(),
            ),
            AlarmError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),
            AlarmError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Short machine-readable reason code, used in per-item batch failure reports
impl AlarmError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            AlarmError::Validation { .. } => "invalid_config",
            AlarmError::IncompatibleTarget { .. } => "incompatible_data_type",
            AlarmError::InvalidStateTransition { .. } => "invalid_state_transition",
            AlarmError::ConcurrentConflict { .. } => "concurrent_conflict",
            AlarmError::Transport(_) => "transport_failure",
            AlarmError::NotFound(_) => "not_found",
            AlarmError::SystemTemplate(_) => "system_template",
            AlarmError::Serialization(_) => "serialization_error",
            AlarmError::Config(_) => "config_error",
            AlarmError::InvalidInput(_) => "invalid_input",
            AlarmError::Internal(_) => "internal_error",
        }
    }
}
