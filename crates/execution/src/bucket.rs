//! Priority buckets - one score-ordered heap per priority level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tasktide_core::{Task, TaskId, MAX_PRIORITY, MIN_PRIORITY, PRIORITY_LEVELS};

/// A queued task with the score it was last ranked by.
#[derive(Debug, Clone)]
struct Entry {
    score: f64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: highest score first, then the earlier-created task.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.task.id.cmp(&self.task.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ten heaps partitioning queued tasks by priority level.
#[derive(Debug, Clone)]
pub struct PriorityBuckets {
    buckets: [BinaryHeap<Entry>; PRIORITY_LEVELS],
}

impl PriorityBuckets {
    /// Create empty buckets.
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| BinaryHeap::new()),
        }
    }

    /// Priority levels from most to least urgent.
    pub fn levels() -> impl Iterator<Item = u8> {
        (MIN_PRIORITY..=MAX_PRIORITY).rev()
    }

    fn slot(level: u8) -> usize {
        debug_assert!((MIN_PRIORITY..=MAX_PRIORITY).contains(&level));
        usize::from(level - MIN_PRIORITY)
    }

    /// Queue `task` in the bucket for its priority.
    pub fn insert(&mut self, task: Task, score: f64) {
        self.buckets[Self::slot(task.priority)].push(Entry { score, task });
    }

    /// Highest-ranked task in bucket `level`, without removing it.
    pub fn peek(&self, level: u8) -> Option<&Task> {
        self.buckets[Self::slot(level)].peek().map(|entry| &entry.task)
    }

    /// Remove and return the highest-ranked task in bucket `level`.
    pub fn pop(&mut self, level: u8) -> Option<Task> {
        self.buckets[Self::slot(level)].pop().map(|entry| entry.task)
    }

    /// Remove the task with `id` from whichever bucket holds it.
    ///
    /// Only the bucket holding the task is rebuilt.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let Some(bucket) = self
            .buckets
            .iter_mut()
            .find(|bucket| bucket.iter().any(|entry| entry.task.id == id))
        else {
            return false;
        };

        let mut entries = std::mem::take(bucket).into_vec();
        entries.retain(|entry| entry.task.id != id);
        *bucket = BinaryHeap::from(entries);
        true
    }

    /// Recompute every score with `score` and reorder every bucket.
    pub fn rescore<F>(&mut self, mut score: F)
    where
        F: FnMut(&Task) -> f64,
    {
        for bucket in &mut self.buckets {
            let entries = std::mem::take(bucket).into_vec();
            *bucket = entries
                .into_iter()
                .map(|entry| Entry {
                    score: score(&entry.task),
                    task: entry.task,
                })
                .collect();
        }
    }

    /// Whether a task with `id` is queued.
    pub fn contains(&self, id: TaskId) -> bool {
        self.buckets
            .iter()
            .any(|bucket| bucket.iter().any(|entry| entry.task.id == id))
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(BinaryHeap::len).sum()
    }

    /// Whether every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(BinaryHeap::is_empty)
    }

    /// Queued tasks, bucket 10 down to 1, each bucket in rank order.
    pub fn snapshot(&self) -> Vec<Task> {
        Self::levels()
            .flat_map(|level| {
                let mut entries: Vec<&Entry> = self.buckets[Self::slot(level)].iter().collect();
                entries.sort_by(|a, b| b.cmp(a));
                entries.into_iter().map(|entry| entry.task.clone())
            })
            .collect()
    }
}

impl Default for PriorityBuckets {
    fn default() -> Self {
        Self::new()
    }
}
