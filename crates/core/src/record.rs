//! Persisted task record - what a host stores between scheduler runs.

use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::Time;

/// Outcome of the last scheduling run for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Not scheduled yet
    #[default]
    Pending,
    /// Completed in the simulation; `start`/`end` are set
    Scheduled,
    /// Examined and found unable to meet its deadline
    Missed,
    /// Never examined, or dropped from a batch without a verdict
    Unscheduled,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Pending => write!(f, "pending"),
            RecordStatus::Scheduled => write!(f, "scheduled"),
            RecordStatus::Missed => write!(f, "missed"),
            RecordStatus::Unscheduled => write!(f, "unscheduled"),
        }
    }
}

/// A stored task together with the slot the scheduler last gave it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Storage identifier
    pub id: RecordId,

    /// Task title
    pub title: String,

    /// Priority level in `[1, 10]`
    pub priority: u8,

    /// Hours of work required
    pub duration: f64,

    /// Requested deadline
    pub deadline: Time,

    /// Free-form notes
    #[serde(default)]
    pub details: Option<String>,

    /// Simulated start time
    #[serde(default)]
    pub start: Option<Time>,

    /// Simulated completion time
    #[serde(default)]
    pub end: Option<Time>,

    /// Last scheduling outcome
    #[serde(default)]
    pub status: RecordStatus,

    /// When the record was created
    pub created_at: Time,
}

impl TaskRecord {
    /// Create a pending record.
    pub fn new(
        id: RecordId,
        title: impl Into<String>,
        priority: u8,
        deadline: Time,
        duration: f64,
        created_at: Time,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            priority,
            duration,
            deadline,
            details: None,
            start: None,
            end: None,
            status: RecordStatus::Pending,
            created_at,
        }
    }

    /// Attach notes.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark as placed on the timeline.
    pub fn mark_scheduled(&mut self, start: Time, end: Time) {
        self.start = Some(start);
        self.end = Some(end);
        self.status = RecordStatus::Scheduled;
    }

    /// Mark as unable to meet its deadline.
    pub fn mark_missed(&mut self) {
        self.clear_slot();
        self.status = RecordStatus::Missed;
    }

    /// Mark as not placed by the last run.
    pub fn mark_unscheduled(&mut self) {
        self.clear_slot();
        self.status = RecordStatus::Unscheduled;
    }

    fn clear_slot(&mut self) {
        self.start = None;
        self.end = None;
    }

    /// Calendar event shape consumed by calendar front-ends.
    pub fn to_calendar_event(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "title": self.title,
            "start": self.start.map(|t| t.to_rfc3339()),
            "end": self.end.map(|t| t.to_rfc3339()),
            "extendedProps": {
                "details": self.details,
                "priority": self.priority,
                "duration": self.duration,
                "status": self.status,
            }
        })
    }
}
