//! Registry errors

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for scenario service operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Failures of the backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Rejected scenario definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("scenario name must not be empty (hub '{hub_id}')")]
    EmptyName { hub_id: String },

    #[error("scenario '{scenario}' references unknown sensor '{sensor_id}'")]
    UnknownSensor { scenario: String, sensor_id: String },

    #[error(
        "scenario '{scenario}' on hub '{hub_id}' references sensor '{sensor_id}' of hub '{sensor_hub_id}'"
    )]
    ForeignSensor {
        scenario: String,
        hub_id: String,
        sensor_id: String,
        sensor_hub_id: String,
    },
}

/// Errors returned by the scenario service
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
