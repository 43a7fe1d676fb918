//! The scheduler - admission, removal and the execution simulation.

use chrono::Utc;
use tasktide_core::{
    ConfigError, SchedulerConfig, Task, TaskId, Time, ValidationError, MAX_PRIORITY, MIN_PRIORITY,
};
use tracing::{debug, info, warn};

use crate::bucket::PriorityBuckets;
use crate::score::{policy_from_config, ScoringPolicy, WeightedScore};
use crate::selector::BatchSelector;

/// Tasks completed and failed by one [`Scheduler::execute`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// Completed tasks in execution order
    pub completed: Vec<Task>,
    /// Tasks found unable to meet their deadline, in discovery order
    pub failed: Vec<Task>,
}

/// Simulation state. `Stopped` is terminal for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// More steps may make progress
    Running,
    /// No further progress is possible
    Stopped,
}

/// Result of a single simulation step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// One task from the batch ran to completion
    Completed {
        /// The completed task, with `due_date` rewritten to its end time
        task: Task,
        /// Batch members examined before it and found unable to finish
        failed: Vec<Task>,
        /// Batch members after it, dropped without a verdict
        dropped: Vec<TaskId>,
    },
    /// Nothing in the batch could finish in time
    Stalled {
        /// Every batch member, in examination order
        failed: Vec<Task>,
    },
    /// No batch could be formed
    Idle,
}

impl StepResult {
    /// State the simulation is in after this step.
    pub fn state(&self) -> SimulationState {
        match self {
            StepResult::Completed { .. } => SimulationState::Running,
            StepResult::Stalled { .. } | StepResult::Idle => SimulationState::Stopped,
        }
    }
}

/// Single-executor deadline scheduler driven by a virtual clock.
///
/// Owns its buckets, clock and id counter exclusively; all mutation goes
/// through `&mut self`.
#[derive(Debug)]
pub struct Scheduler {
    buckets: PriorityBuckets,
    policy: Box<dyn ScoringPolicy>,
    current_time: Time,
    next_id: TaskId,
}

impl Scheduler {
    /// Create a weighted-score scheduler.
    ///
    /// Fails if the weights do not sum to 1.0. The virtual clock starts at
    /// `start_time`, or the wall clock when `None`.
    pub fn new(
        priority_weight: f64,
        urgency_weight: f64,
        duration_weight: f64,
        start_time: Option<Time>,
    ) -> Result<Self, ConfigError> {
        let policy = WeightedScore::from_weights(priority_weight, urgency_weight, duration_weight)?;
        Ok(Self::with_policy(Box::new(policy), start_time))
    }

    /// Create a scheduler ranking tasks with `policy`.
    pub fn with_policy(policy: Box<dyn ScoringPolicy>, start_time: Option<Time>) -> Self {
        let current_time = start_time.unwrap_or_else(Utc::now);
        debug!("Scheduler created with {} policy at {}", policy.name(), current_time);
        Self {
            buckets: PriorityBuckets::new(),
            policy,
            current_time,
            next_id: TaskId::new(1),
        }
    }

    /// Create a scheduler from configuration.
    pub fn from_config(config: &SchedulerConfig, start_time: Option<Time>) -> Result<Self, ConfigError> {
        Ok(Self::with_policy(policy_from_config(config)?, start_time))
    }

    /// Current virtual time.
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    /// Name of the scoring policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Score `task` at the current virtual time.
    pub fn score(&self, task: &Task) -> f64 {
        self.policy.score(task, self.current_time)
    }

    /// Admit a task into the bucket for its priority.
    ///
    /// Rejected tasks leave the scheduler untouched, including the id counter.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        priority: u8,
        due_date: Time,
        duration: f64,
    ) -> Result<Task, ValidationError> {
        let name = name.into();
        if let Err(err) = self.validate(priority, due_date, duration) {
            warn!("Rejected task '{}': {}", name, err);
            return Err(err);
        }

        let id = self.next_id;
        self.next_id = id.next();

        let task = Task::new(id, name, priority, due_date, duration, self.current_time);
        let score = self.score(&task);
        debug!("Queued task {} '{}' in bucket {} (score {:.3})", task.id, task.name, priority, score);
        self.buckets.insert(task.clone(), score);
        Ok(task)
    }

    fn validate(&self, priority: u8, due_date: Time, duration: f64) -> Result<(), ValidationError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(ValidationError::PriorityOutOfRange(priority));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ValidationError::NonPositiveDuration(duration));
        }
        if due_date < self.current_time {
            return Err(ValidationError::DueInPast {
                due: due_date,
                now: self.current_time,
            });
        }
        Ok(())
    }

    /// Cancel a queued task. Returns whether it was found.
    pub fn remove_task(&mut self, task_id: TaskId) -> bool {
        let removed = self.buckets.remove(task_id);
        if removed {
            debug!("Removed task {}", task_id);
        } else {
            debug!("Task {} not queued, nothing removed", task_id);
        }
        removed
    }

    /// Recompute every queued score at `now` and reorder the buckets.
    pub fn rescore_all(&mut self, now: Time) {
        let policy = self.policy.as_ref();
        self.buckets.rescore(|task| policy.score(task, now));
    }

    /// Whether a task with `task_id` is still queued.
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.buckets.contains(task_id)
    }

    /// Number of queued tasks.
    pub fn pending_count(&self) -> usize {
        self.buckets.len()
    }

    /// Queued tasks, bucket 10 down to 1, each in rank order.
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.buckets.snapshot()
    }

    /// Take the next batch without running it.
    pub fn get_next_batch(&mut self) -> Vec<Task> {
        BatchSelector::new(self.policy.as_ref()).next_batch(&mut self.buckets, self.current_time)
    }

    /// Run one simulation step.
    ///
    /// The batch is walked in `(priority desc, due_date asc)` order. The first
    /// task that can still finish before its due date is dispatched and the
    /// clock advances by its duration; the walk stops there and the rest of
    /// the batch is discarded: not re-queued, and absent from the
    /// [`ExecutionOutcome`] of [`Scheduler::execute`].
    pub fn step(&mut self) -> StepResult {
        let mut batch = self.get_next_batch();
        if batch.is_empty() {
            return StepResult::Idle;
        }

        batch.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.due_date.cmp(&b.due_date))
        });

        let now = self.current_time;
        let mut failed = Vec::new();
        let mut remaining = batch.into_iter();

        while let Some(mut task) = remaining.next() {
            if !task.can_complete_before_due(now) {
                info!("Task {} '{}' cannot finish before {}", task.id, task.name, task.due_date);
                failed.push(task);
                continue;
            }

            let finished = task.dispatch(now);
            self.current_time = finished;
            info!(
                "Task {} '{}' runs {} -> {}",
                task.id, task.name, task.arrival_time, finished
            );

            let dropped: Vec<TaskId> = remaining.by_ref().map(|t| t.id).collect();
            for id in &dropped {
                debug!("Task {} dropped from batch after task {} completed", id, task.id);
            }

            self.rescore_all(self.current_time);
            return StepResult::Completed {
                task,
                failed,
                dropped,
            };
        }

        StepResult::Stalled { failed }
    }

    /// Simulate until no batch can be formed or a batch makes no progress.
    pub fn execute(&mut self) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();
        let mut steps = 0usize;

        loop {
            let result = self.step();
            let state = result.state();
            steps += 1;

            match result {
                StepResult::Completed { task, failed, .. } => {
                    outcome.failed.extend(failed);
                    outcome.completed.push(task);
                }
                StepResult::Stalled { failed } => {
                    info!("No task in batch can meet its deadline, stopping");
                    outcome.failed.extend(failed);
                }
                StepResult::Idle => {
                    info!("No tasks left to schedule");
                }
            }

            if state == SimulationState::Stopped {
                break;
            }
        }

        info!(
            "Simulation finished after {} step(s): {} completed, {} failed, {} still queued, clock at {}",
            steps,
            outcome.completed.len(),
            outcome.failed.len(),
            self.buckets.len(),
            self.current_time
        );
        outcome
    }
}
