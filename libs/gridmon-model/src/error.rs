//! Model Layer Error Types

use thiserror::Error;

/// Result type for gridmon-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model layer errors
#[derive(Debug, Error, Clone)]
pub enum ModelError {
    /// Merged rule configuration is missing required fields
    #[error("Invalid condition config, missing fields: {}", missing_fields.join(", "))]
    InvalidConditionConfig { missing_fields: Vec<String> },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
