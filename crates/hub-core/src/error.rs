//! Error types for the ingestion boundary

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while converting untyped input into core types
#[derive(Debug, Error)]
pub enum CoreError {
    /// No sensor variant matches the fields present in the raw event
    #[error("cannot infer sensor event type from fields: {fields}")]
    UnknownSensorEvent { fields: String },

    /// Hub event carries an unsupported `type` tag
    #[error("unsupported hub event type '{0}'")]
    UnknownHubEvent(String),

    /// Required field is absent or empty
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// Field is present but cannot be converted
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Enum tag outside the closed set
    #[error("unknown {kind} '{value}'")]
    UnknownEnum { kind: &'static str, value: String },

    /// Raw input is not a JSON object or failed to parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
