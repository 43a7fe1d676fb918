//! Task model - the unit of work the scheduler orders.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::id::TaskId;
use crate::Time;

/// Lowest accepted priority level.
pub const MIN_PRIORITY: u8 = 1;

/// Highest accepted priority level.
pub const MAX_PRIORITY: u8 = 10;

/// Number of discrete priority levels (one bucket each).
pub const PRIORITY_LEVELS: usize = (MAX_PRIORITY - MIN_PRIORITY + 1) as usize;

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// A pending or simulated task.
///
/// `due_date` changes meaning over the task's life: it holds the requested
/// deadline while the task is queued and the realized completion time once
/// the task has been executed. `deadline` keeps the requested value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Scheduler-assigned identifier
    pub id: TaskId,

    /// Display label
    pub name: String,

    /// Priority level in `[1, 10]`, 10 is most urgent
    pub priority: u8,

    /// Hours of work required
    pub duration: f64,

    /// Deadline before execution, completion time after
    pub due_date: Time,

    /// Virtual time at admission, then at dispatch
    pub arrival_time: Time,

    /// Requested deadline as admitted
    pub deadline: Time,
}

impl Task {
    /// Create a task admitted at `arrival_time`.
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        priority: u8,
        due_date: Time,
        duration: f64,
        arrival_time: Time,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            duration,
            due_date,
            arrival_time,
            deadline: due_date,
        }
    }

    /// Hours between `now` and `due_date`. Negative when overdue.
    pub fn time_until_due(&self, now: Time) -> f64 {
        hours_between(now, self.due_date)
    }

    /// Whether the remaining time before `due_date` covers the full duration.
    pub fn can_complete_before_due(&self, now: Time) -> bool {
        self.time_until_due(now) >= self.duration
    }

    /// Whether `due_date` has already passed at `now`.
    pub fn is_overdue(&self, now: Time) -> bool {
        self.time_until_due(now) < 0.0
    }

    /// Record the task as dispatched at `now`; returns the completion time.
    ///
    /// Rewrites `arrival_time` to `now` and `due_date` to `now + duration`.
    pub fn dispatch(&mut self, now: Time) -> Time {
        let finished = now + hours(self.duration);
        self.arrival_time = now;
        self.due_date = finished;
        finished
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Priority: {}, Due: {}, Duration: {} hours)",
            self.name, self.priority, self.due_date, self.duration
        )
    }
}

/// Signed number of hours from `from` to `to`.
pub fn hours_between(from: Time, to: Time) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / MICROS_PER_HOUR,
        None => delta.num_seconds() as f64 / 3600.0,
    }
}

/// Convert fractional hours into a [`Duration`], rounded to the microsecond.
pub fn hours(value: f64) -> Duration {
    Duration::microseconds((value * MICROS_PER_HOUR).round() as i64)
}
