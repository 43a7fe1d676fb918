//! Offline simulation of a task list, without storage.

use anyhow::{Context, Result};
use serde::Deserialize;
use tasktide_core::{SchedulerConfig, Time};
use tasktide_execution::{ExecutionOutcome, Scheduler};

use crate::config::parse_time;

/// A task list file.
///
/// ```toml
/// start = "2024-11-10 08:30:00"
///
/// [[tasks]]
/// name = "Assignment - Math 101"
/// priority = 7
/// due = "2024-11-18 10:00:00"
/// duration = 4
/// ```
#[derive(Debug, Deserialize)]
pub struct TaskList {
    /// Virtual start time; defaults to the caller's clock
    pub start: Option<String>,
    /// Tasks in admission order
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

/// One task in a task list file.
#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    /// Display name
    pub name: String,
    /// Priority level
    pub priority: u8,
    /// Due time
    pub due: String,
    /// Hours of work
    pub duration: f64,
}

/// Parse a task list and run it through a fresh scheduler.
pub fn simulate(contents: &str, config: &SchedulerConfig, fallback_start: Option<Time>) -> Result<ExecutionOutcome> {
    let list: TaskList = toml::from_str(contents).context("Invalid task list")?;
    let start = match list.start.as_deref() {
        Some(s) => Some(parse_time(s)?),
        None => fallback_start,
    };

    let mut scheduler = Scheduler::from_config(config, start)?;
    for entry in list.tasks {
        let due = parse_time(&entry.due)?;
        scheduler
            .add_task(entry.name.clone(), entry.priority, due, entry.duration)
            .with_context(|| format!("Task '{}' rejected", entry.name))?;
    }

    Ok(scheduler.execute())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD: &str = r#"
        start = "2024-11-10 08:30:00"

        [[tasks]]
        name = "Assignment - Math 101"
        priority = 7
        due = "2024-11-18 10:00:00"
        duration = 4

        [[tasks]]
        name = "Project - Computer Science"
        priority = 7
        due = "2024-11-19 15:30:00"
        duration = 10

        [[tasks]]
        name = "Essay - Sociology"
        priority = 7
        due = "2024-11-20 09:00:00"
        duration = 6
    "#;

    #[test]
    fn test_standard_list() {
        let outcome = simulate(STANDARD, &SchedulerConfig::default(), None).unwrap();
        assert!(outcome.failed.is_empty());

        // The essay is swept into the project's batch and dropped once the
        // project (earlier due date, same priority) completes.
        let names: Vec<&str> = outcome.completed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Assignment - Math 101", "Project - Computer Science"]);
    }

    #[test]
    fn test_not_enough_time() {
        let list = r#"
            start = "2024-11-10 08:30:00"

            [[tasks]]
            name = "Assignment - Math 101"
            priority = 7
            due = "2024-11-10 10:00:00"
            duration = 12

            [[tasks]]
            name = "Project - Computer Science"
            priority = 7
            due = "2024-11-10 15:30:00"
            duration = 12
        "#;

        let outcome = simulate(list, &SchedulerConfig::default(), None).unwrap();
        // Only the first batch is examined before the run stops.
        assert!(outcome.completed.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].name, "Assignment - Math 101");
    }

    #[test]
    fn test_rejected_entry_is_reported() {
        let list = r#"
            start = "2024-11-10 08:30:00"

            [[tasks]]
            name = "bad"
            priority = 12
            due = "2024-11-10 10:00:00"
            duration = 1
        "#;

        let err = simulate(list, &SchedulerConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }
}
