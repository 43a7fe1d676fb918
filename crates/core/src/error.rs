//! Error types shared by the scheduler and its hosts.

use crate::Time;

/// Weight sum tolerance accepted at construction.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Scheduler construction failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Weights do not add up to one
    #[error("weights must sum to 1.0 (got {sum})")]
    WeightSum {
        /// Actual sum of the three weights
        sum: f64,
    },

    /// A weight is negative or not a finite number
    #[error("{name} weight must be a non-negative finite number (got {value})")]
    InvalidWeight {
        /// Which weight
        name: &'static str,
        /// Offending value
        value: f64,
    },
}

/// A task was rejected on admission. The scheduler is left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Priority outside `[1, 10]`
    #[error("priority must be between 1 and 10 (got {0})")]
    PriorityOutOfRange(u8),

    /// Zero, negative or non-finite duration
    #[error("duration must be a positive number of hours (got {0})")]
    NonPositiveDuration(f64),

    /// Due date earlier than the scheduler's current virtual time
    #[error("due date {due} is before the current time {now}")]
    DueInPast {
        /// Requested due date
        due: Time,
        /// Scheduler clock at admission
        now: Time,
    },
}
