//! Schedule management for hosts.
//!
//! Persists task records, rebuilds the scheduler from them on every change
//! and writes the simulated start/end times back.

#![warn(missing_docs)]

pub mod error;
pub mod manager;

pub use error::{Result, WorkError};
pub use manager::{BasicScheduleManager, DeleteOutcome, ScheduleManager, TaskPatch, TaskSpec};
