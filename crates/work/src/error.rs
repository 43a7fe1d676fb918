//! Errors returned by the schedule manager.

use tasktide_core::{ConfigError, RecordId, ValidationError};
use tasktide_storage::StorageError;

/// Result type for schedule management.
pub type Result<T> = std::result::Result<T, WorkError>;

/// Errors that can occur while managing the schedule.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    /// The scheduler configuration is invalid
    #[error("invalid scheduler configuration: {0}")]
    Config(#[from] ConfigError),

    /// The task was rejected
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),

    /// Storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No stored task with this ID
    #[error("task {0} not found")]
    NotFound(RecordId),
}
