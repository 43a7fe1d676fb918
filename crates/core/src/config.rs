//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, WEIGHT_TOLERANCE};

/// Scoring policy a deployment runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Weighted priority/urgency/duration score
    #[default]
    Weighted,
    /// Earliest deadline first, no urgency scoring
    NearestDeadline,
}

/// Validated scoring weights. Always sum to 1.0 within [`WEIGHT_TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    priority: f64,
    urgency: f64,
    duration: f64,
}

impl Weights {
    /// Validate and build a weight triple.
    pub fn new(priority: f64, urgency: f64, duration: f64) -> Result<Self, ConfigError> {
        for (name, value) in [("priority", priority), ("urgency", urgency), ("duration", duration)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        let sum = priority + urgency + duration;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }

        Ok(Self {
            priority,
            urgency,
            duration,
        })
    }

    /// Weight of the priority sub-score.
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Weight of the urgency sub-score.
    pub fn urgency(&self) -> f64 {
        self.urgency
    }

    /// Weight of the duration sub-score.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            priority: 0.4,
            urgency: 0.4,
            duration: 0.2,
        }
    }
}

/// Scheduler configuration as read from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Weight of the priority sub-score
    pub priority_weight: f64,

    /// Weight of the deadline urgency sub-score
    pub urgency_weight: f64,

    /// Weight of the short-duration sub-score
    pub duration_weight: f64,

    /// Scoring policy
    pub policy: PolicyKind,
}

impl SchedulerConfig {
    /// Validate the configured weights.
    pub fn weights(&self) -> Result<Weights, ConfigError> {
        Weights::new(self.priority_weight, self.urgency_weight, self.duration_weight)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let weights = Weights::default();
        Self {
            priority_weight: weights.priority(),
            urgency_weight: weights.urgency(),
            duration_weight: weights.duration(),
            policy: PolicyKind::default(),
        }
    }
}
