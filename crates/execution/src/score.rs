//! Task scoring policies.

use tasktide_core::{PolicyKind, SchedulerConfig, Task, Time, Weights, ConfigError};

/// Duration (hours) at which the short-task bonus reaches zero.
const FULL_DAY_HOURS: f64 = 24.0;

/// Maps a task and the current virtual time to an urgency score.
///
/// Higher scores are scheduled first. Implementations must be pure: the same
/// `(task, now)` always yields the same score, and scores are never NaN.
pub trait ScoringPolicy: Send + Sync + std::fmt::Debug {
    /// Policy name for logs.
    fn name(&self) -> &'static str;

    /// Score `task` at virtual time `now`.
    fn score(&self, task: &Task, now: Time) -> f64;
}

/// Weighted priority / urgency / duration score.
///
/// Non-overdue tasks score in `[0, 1]`; overdue tasks score `+inf` so they
/// outrank everything that can still make its deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScore {
    weights: Weights,
}

impl WeightedScore {
    /// Create a policy from validated weights.
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    /// Validate raw weights and create a policy.
    pub fn from_weights(priority: f64, urgency: f64, duration: f64) -> Result<Self, ConfigError> {
        Ok(Self::new(Weights::new(priority, urgency, duration)?))
    }

    /// The weights in use.
    pub fn weights(&self) -> Weights {
        self.weights
    }
}

impl ScoringPolicy for WeightedScore {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, task: &Task, now: Time) -> f64 {
        if task.is_overdue(now) {
            return f64::INFINITY;
        }
        let time_until_due = task.time_until_due(now);

        let priority_score = f64::from(task.priority) / 10.0;
        let urgency_score = (task.duration / time_until_due.max(task.duration)).min(1.0);
        let duration_score = 1.0 - (task.duration / FULL_DAY_HOURS).min(1.0);

        self.weights.priority() * priority_score
            + self.weights.urgency() * urgency_score
            + self.weights.duration() * duration_score
    }
}

/// Earliest deadline first, ignoring urgency and duration.
///
/// Scores are the negated hours until due, so the nearest deadline ranks
/// highest and overdue tasks rank above all others.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestDeadline;

impl ScoringPolicy for NearestDeadline {
    fn name(&self) -> &'static str {
        "nearest_deadline"
    }

    fn score(&self, task: &Task, now: Time) -> f64 {
        -task.time_until_due(now)
    }
}

/// Build the policy a configuration asks for.
pub fn policy_from_config(config: &SchedulerConfig) -> Result<Box<dyn ScoringPolicy>, ConfigError> {
    // Weights are validated for both policies so a bad file fails the same way.
    let weights = config.weights()?;
    Ok(match config.policy {
        PolicyKind::Weighted => Box::new(WeightedScore::new(weights)),
        PolicyKind::NearestDeadline => Box::new(NearestDeadline),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tasktide_core::{hours, TaskId};

    fn t0() -> Time {
        Utc.with_ymd_and_hms(2024, 11, 10, 8, 30, 0).unwrap()
    }

    fn task(priority: u8, due_in: f64, duration: f64) -> Task {
        Task::new(TaskId::new(1), "t", priority, t0() + hours(due_in), duration, t0())
    }

    #[test]
    fn test_weighted_score_matches_formula() {
        let policy = WeightedScore::default();

        // 0.4 * 0.9 + 0.4 * (3 / 6) + 0.2 * (1 - 3 / 24)
        let score = policy.score(&task(9, 6.0, 3.0), t0());
        assert!((score - 0.735).abs() < 1e-9, "score was {score}");

        let score = policy.score(&task(10, 48.0, 8.0), t0());
        assert!((score - 0.6).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_urgency_saturates_when_deadline_is_tight() {
        let policy = WeightedScore::from_weights(0.0, 1.0, 0.0).unwrap();
        // Less time left than work required: urgency is capped at 1.
        assert!((policy.score(&task(1, 1.0, 4.0), t0()) - 1.0).abs() < 1e-12);
        assert!((policy.score(&task(1, 8.0, 4.0), t0()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_long_tasks_get_no_duration_bonus() {
        let policy = WeightedScore::from_weights(0.0, 0.0, 1.0).unwrap();
        assert_eq!(policy.score(&task(5, 100.0, 30.0), t0()), 0.0);
        assert!((policy.score(&task(5, 100.0, 6.0), t0()) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_overdue_scores_infinity() {
        let policy = WeightedScore::default();
        let overdue = task(1, 2.0, 1.0);
        assert_eq!(policy.score(&overdue, t0() + hours(3.0)), f64::INFINITY);
        // Exactly at the deadline is not overdue.
        assert!(policy.score(&overdue, t0() + hours(2.0)).is_finite());
    }

    #[test]
    fn test_nearest_deadline_prefers_earlier_due() {
        let policy = NearestDeadline;
        let soon = task(1, 2.0, 1.0);
        let later = task(10, 20.0, 1.0);
        assert!(policy.score(&soon, t0()) > policy.score(&later, t0()));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = SchedulerConfig::default();
        assert_eq!(policy_from_config(&config).unwrap().name(), "weighted");

        config.policy = PolicyKind::NearestDeadline;
        assert_eq!(policy_from_config(&config).unwrap().name(), "nearest_deadline");

        config.urgency_weight = 0.9;
        assert!(policy_from_config(&config).is_err());
    }
}
