//! Storage trait abstraction.

use async_trait::async_trait;
use tasktide_core::{RecordId, TaskRecord};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable home for task records between scheduler runs.
///
/// Mutations are staged until [`Storage::commit`]; [`Storage::rollback`]
/// restores the state of the last commit.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save a record (create or update).
    async fn save_record(&mut self, record: &TaskRecord) -> Result<()>;

    /// Load a record by ID.
    async fn load_record(&self, id: RecordId) -> Result<Option<TaskRecord>>;

    /// List all records, ordered by ID.
    async fn list_records(&self) -> Result<Vec<TaskRecord>>;

    /// Delete a record. Returns whether it existed.
    async fn delete_record(&mut self, id: RecordId) -> Result<bool>;

    /// Allocate a fresh record ID. IDs are never handed out twice.
    async fn next_record_id(&mut self) -> Result<RecordId>;

    /// Commit pending changes with a message.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Rollback pending changes.
    async fn rollback(&mut self) -> Result<()>;
}
