//! Batch selection by deadline proximity.

use tasktide_core::{Task, TaskId, Time};
use tracing::debug;

use crate::bucket::PriorityBuckets;
use crate::score::ScoringPolicy;

/// The front task that won the cross-bucket comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Winning task
    pub id: TaskId,
    /// Bucket it sits at the front of
    pub level: u8,
    /// Score recomputed at selection time
    pub score: f64,
    /// Its due date, used as the sweep cutoff
    pub deadline_cutoff: Time,
}

/// Pulls batches of work out of the priority buckets.
#[derive(Debug, Clone, Copy)]
pub struct BatchSelector<'a> {
    policy: &'a dyn ScoringPolicy,
}

impl<'a> BatchSelector<'a> {
    /// Create a selector ranking with `policy`.
    pub fn new(policy: &'a dyn ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Find the most urgent front task across all buckets.
    ///
    /// Stored scores may be stale, so each front task is rescored at `now`.
    /// Buckets are scanned from priority 10 down and only a strictly greater
    /// score replaces the current best, so exact ties favour the higher
    /// priority bucket.
    pub fn candidate(&self, buckets: &PriorityBuckets, now: Time) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for level in PriorityBuckets::levels() {
            let Some(front) = buckets.peek(level) else {
                continue;
            };
            let score = self.policy.score(front, now);
            if best.map_or(true, |b| score > b.score) {
                best = Some(Candidate {
                    id: front.id,
                    level,
                    score,
                    deadline_cutoff: front.due_date,
                });
            }
        }

        best
    }

    /// Pop every front task due at or before the candidate's deadline.
    ///
    /// Each pass scans priority 10 down to 1 and takes at most one task per
    /// bucket; passes repeat until a full pass takes nothing. A bucket whose
    /// front is due after the cutoff blocks everything behind it, even tasks
    /// that would qualify.
    pub fn next_batch(&self, buckets: &mut PriorityBuckets, now: Time) -> Vec<Task> {
        let Some(candidate) = self.candidate(buckets, now) else {
            return Vec::new();
        };

        debug!(
            "Selected task {} from bucket {} (score {:.3}, cutoff {})",
            candidate.id, candidate.level, candidate.score, candidate.deadline_cutoff
        );

        let mut batch = Vec::new();
        loop {
            let mut taken = false;
            for level in PriorityBuckets::levels() {
                let due = buckets.peek(level).map(|task| task.due_date);
                if due.is_some_and(|due| due <= candidate.deadline_cutoff) {
                    if let Some(task) = buckets.pop(level) {
                        batch.push(task);
                        taken = true;
                    }
                }
            }
            if !taken {
                break;
            }
        }

        debug!("Batch of {} task(s) swept", batch.len());
        batch
    }
}
