//! tasktide core data models.
//!
//! This crate defines the task entity, identifiers, configuration and error
//! types shared by the scheduling engine and the hosts that drive it.

#![warn(missing_docs)]

// Identities
mod id;

// Scheduling
mod task;
mod config;
mod error;

// Persistence
mod record;

pub use id::{RecordId, TaskId};
pub use task::{hours, hours_between, Task, MAX_PRIORITY, MIN_PRIORITY, PRIORITY_LEVELS};
pub use config::{PolicyKind, SchedulerConfig, Weights};
pub use error::{ConfigError, ValidationError, WEIGHT_TOLERANCE};
pub use record::{RecordStatus, TaskRecord};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
