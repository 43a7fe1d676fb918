//! Schedule management service.
//!
//! Hosts do not keep a scheduler alive between requests. Every mutating call
//! rebuilds a fresh [`Scheduler`] from the stored records, runs the
//! simulation and writes each record's outcome back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tasktide_core::{RecordId, SchedulerConfig, TaskId, TaskRecord, Time};
use tasktide_execution::Scheduler;
use tasktide_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WorkError};

/// Schedule management service.
#[async_trait]
pub trait ScheduleManager: Send + Sync {
    /// Store a new task and reschedule everything. Returns all records.
    async fn create_task(&self, spec: TaskSpec) -> Result<Vec<TaskRecord>>;

    /// Edit a stored task and reschedule. Returns the edited record.
    async fn update_task(&self, id: RecordId, patch: TaskPatch) -> Result<TaskRecord>;

    /// Delete a stored task.
    async fn delete_task(&self, id: RecordId) -> Result<DeleteOutcome>;

    /// Rerun the schedule without changing any task.
    async fn reschedule(&self) -> Result<Vec<TaskRecord>>;

    /// All stored records, ordered by ID.
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>>;
}

/// Fields for creating a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Task title
    pub title: String,
    /// Priority level in `[1, 10]`
    pub priority: u8,
    /// Requested deadline
    pub deadline: Time,
    /// Hours of work required
    pub duration: f64,
    /// Free-form notes
    pub details: Option<String>,
}

impl TaskSpec {
    /// Create a task description without details.
    pub fn new(title: impl Into<String>, priority: u8, deadline: Time, duration: f64) -> Self {
        Self {
            title: title.into(),
            priority,
            deadline,
            duration,
            details: None,
        }
    }

    /// Attach notes.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Fields to change on a stored task. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// New title
    pub title: Option<String>,
    /// New priority
    pub priority: Option<u8>,
    /// New notes
    pub details: Option<String>,
    /// New duration in hours
    pub duration: Option<f64>,
    /// New deadline
    pub deadline: Option<Time>,
}

/// Result of deleting a stored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether the task was still waiting in the queue
    pub was_queued: bool,
}

/// Manager that rebuilds the schedule from storage on every call.
pub struct BasicScheduleManager<S: Storage> {
    storage: Arc<Mutex<S>>,
    config: SchedulerConfig,
    clock: Option<Time>,
}

impl<S: Storage> BasicScheduleManager<S> {
    /// Create a new manager with the default configuration.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            config: SchedulerConfig::default(),
            clock: None,
        }
    }

    /// Set the scheduler configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin the time schedules start from instead of the wall clock.
    pub fn with_clock(mut self, now: Time) -> Self {
        self.clock = Some(now);
        self
    }

    /// Shared handle to the storage.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    fn now(&self) -> Time {
        self.clock.unwrap_or_else(Utc::now)
    }

    /// Rebuild a scheduler from `records` and run it from `now`.
    ///
    /// Records whose deadline is already behind `now` are not admitted and
    /// keep their last outcome. Every admitted record is rewritten:
    /// scheduled, missed, or unscheduled when the run never gave it a
    /// verdict.
    fn run_schedule(&self, records: &mut [TaskRecord], now: Time) -> Result<()> {
        let mut scheduler = Scheduler::from_config(&self.config, Some(now))?;
        let mut admitted: HashMap<TaskId, usize> = HashMap::new();

        for (index, record) in records.iter_mut().enumerate() {
            if record.deadline < now {
                debug!("Record {} is past its deadline, leaving it as {}", record.id, record.status);
                continue;
            }
            match scheduler.add_task(record.title.clone(), record.priority, record.deadline, record.duration) {
                Ok(task) => {
                    admitted.insert(task.id, index);
                    record.mark_unscheduled();
                }
                Err(e) => {
                    warn!("Record {} could not be queued: {}", record.id, e);
                    record.mark_unscheduled();
                }
            }
        }

        let outcome = scheduler.execute();

        for task in &outcome.completed {
            if let Some(&index) = admitted.get(&task.id) {
                records[index].mark_scheduled(task.arrival_time, task.due_date);
            }
        }
        for task in &outcome.failed {
            if let Some(&index) = admitted.get(&task.id) {
                records[index].mark_missed();
            }
        }

        info!(
            "Scheduled {} of {} queued task(s), {} missed",
            outcome.completed.len(),
            admitted.len(),
            outcome.failed.len()
        );
        Ok(())
    }

    /// Save every record and commit.
    async fn persist(&self, storage: &mut S, records: &[TaskRecord], message: &str) -> Result<()> {
        let result = async {
            for record in records {
                storage.save_record(record).await?;
            }
            storage.commit(message).await
        }
        .await;
        settle(storage, result).await
    }

    /// Admission check at `now`, before anything is stored.
    fn check_admission(&self, now: Time, priority: u8, deadline: Time, duration: f64) -> Result<()> {
        let mut probe = Scheduler::from_config(&self.config, Some(now))?;
        probe.add_task("", priority, deadline, duration)?;
        Ok(())
    }
}

/// Pass `result` through, rolling back `storage` first if it failed.
async fn settle<S: Storage>(storage: &mut S, result: tasktide_storage::Result<()>) -> Result<()> {
    if let Err(e) = result {
        warn!("Storage write failed, rolling back: {}", e);
        storage.rollback().await?;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl<S: Storage + 'static> ScheduleManager for BasicScheduleManager<S> {
    async fn create_task(&self, spec: TaskSpec) -> Result<Vec<TaskRecord>> {
        let now = self.now();
        self.check_admission(now, spec.priority, spec.deadline, spec.duration)?;

        let mut storage = self.storage.lock().await;
        let id = storage.next_record_id().await?;
        let mut record = TaskRecord::new(id, spec.title, spec.priority, spec.deadline, spec.duration, now);
        record.details = spec.details;

        let mut records = storage.list_records().await?;
        records.push(record);

        self.run_schedule(&mut records, now)?;
        self.persist(&mut *storage, &records, &format!("Add task {}", id)).await?;
        Ok(records)
    }

    async fn update_task(&self, id: RecordId, patch: TaskPatch) -> Result<TaskRecord> {
        let now = self.now();
        let mut storage = self.storage.lock().await;
        let mut records = storage.list_records().await?;
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or(WorkError::NotFound(id))?;

        let mut patched = records[index].clone();
        if let Some(title) = patch.title {
            patched.title = title;
        }
        if let Some(priority) = patch.priority {
            patched.priority = priority;
        }
        if let Some(details) = patch.details {
            patched.details = Some(details);
        }
        if let Some(duration) = patch.duration {
            patched.duration = duration;
        }
        if let Some(deadline) = patch.deadline {
            patched.deadline = deadline;
        }
        self.check_admission(now, patched.priority, patched.deadline, patched.duration)?;
        records[index] = patched;

        self.run_schedule(&mut records, now)?;
        self.persist(&mut *storage, &records, &format!("Update task {}", id)).await?;
        Ok(records.swap_remove(index))
    }

    async fn delete_task(&self, id: RecordId) -> Result<DeleteOutcome> {
        let now = self.now();
        let mut storage = self.storage.lock().await;
        let records = storage.list_records().await?;
        if !records.iter().any(|r| r.id == id) {
            return Err(WorkError::NotFound(id));
        }

        let mut scheduler = Scheduler::from_config(&self.config, Some(now))?;
        let mut target = None;
        for record in records.iter().filter(|r| r.deadline >= now) {
            if let Ok(task) = scheduler.add_task(record.title.clone(), record.priority, record.deadline, record.duration) {
                if record.id == id {
                    target = Some(task.id);
                }
            }
        }
        let was_queued = target.is_some_and(|task_id| scheduler.remove_task(task_id));

        let result = async {
            storage.delete_record(id).await?;
            storage.commit(&format!("Delete task {}", id)).await
        }
        .await;
        settle(&mut *storage, result).await?;

        if was_queued {
            info!("Deleted task {} from both the queue and storage", id);
        } else {
            info!("Deleted task {} from storage, it was not in the queue", id);
        }
        Ok(DeleteOutcome { was_queued })
    }

    async fn reschedule(&self) -> Result<Vec<TaskRecord>> {
        let now = self.now();
        let mut storage = self.storage.lock().await;
        let mut records = storage.list_records().await?;
        self.run_schedule(&mut records, now)?;
        self.persist(&mut *storage, &records, "Reschedule").await?;
        Ok(records)
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>> {
        Ok(self.storage.lock().await.list_records().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tasktide_core::{PolicyKind, RecordStatus, ValidationError};
    use tasktide_storage::{JsonStorage, StorageError};

    fn t0() -> Time {
        Utc.with_ymd_and_hms(2024, 11, 10, 8, 30, 0).unwrap()
    }

    fn at(hours: i64) -> Time {
        t0() + Duration::hours(hours)
    }

    async fn create_test_manager(dir: &tempfile::TempDir) -> BasicScheduleManager<JsonStorage> {
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        BasicScheduleManager::new(storage).with_clock(t0())
    }

    fn by_title<'a>(records: &'a [TaskRecord], title: &str) -> &'a TaskRecord {
        records.iter().find(|r| r.title == title).unwrap()
    }

    #[tokio::test]
    async fn test_create_reschedules_everything() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;

        manager.create_task(TaskSpec::new("A", 10, at(48), 8.0)).await.unwrap();
        manager.create_task(TaskSpec::new("B", 5, at(4), 2.0)).await.unwrap();
        manager.create_task(TaskSpec::new("C", 2, at(2), 1.0)).await.unwrap();
        let records = manager.create_task(TaskSpec::new("D", 9, at(6), 3.0)).await.unwrap();

        let d = by_title(&records, "D");
        assert_eq!(d.status, RecordStatus::Scheduled);
        assert_eq!((d.start, d.end), (Some(at(0)), Some(at(3))));

        let a = by_title(&records, "A");
        assert_eq!(a.status, RecordStatus::Scheduled);
        assert_eq!((a.start, a.end), (Some(at(3)), Some(at(11))));

        // Dropped from D's batch: no verdict.
        assert_eq!(by_title(&records, "B").status, RecordStatus::Unscheduled);
        assert_eq!(by_title(&records, "C").status, RecordStatus::Unscheduled);

        let stored = manager.list_tasks().await.unwrap();
        assert_eq!(stored, records);
    }

    #[tokio::test]
    async fn test_invalid_task_leaves_storage_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;

        let err = manager
            .create_task(TaskSpec::new("late", 5, t0() - Duration::hours(1), 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkError::Validation(ValidationError::DueInPast { .. })));

        let err = manager.create_task(TaskSpec::new("p0", 0, at(5), 1.0)).await.unwrap_err();
        assert!(matches!(err, WorkError::Validation(ValidationError::PriorityOutOfRange(0))));

        assert!(manager.list_tasks().await.unwrap().is_empty());
        assert!(!dir.path().join("meta").join("sequence.json").exists());
    }

    #[tokio::test]
    async fn test_missed_tasks_are_marked() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;

        manager
            .create_task(TaskSpec::new("impossible", 10, at(4), 5.0))
            .await
            .unwrap();
        let records = manager
            .create_task(TaskSpec::new("doable", 3, at(4), 1.0).with_details("quick"))
            .await
            .unwrap();

        let impossible = by_title(&records, "impossible");
        assert_eq!(impossible.status, RecordStatus::Missed);
        assert!(impossible.start.is_none());

        let doable = by_title(&records, "doable");
        assert_eq!(doable.status, RecordStatus::Scheduled);
        assert_eq!(doable.details.as_deref(), Some("quick"));
    }

    #[tokio::test]
    async fn test_update_task_reschedules() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;

        for (title, priority, due, duration) in [("A", 10, 48, 8.0), ("B", 5, 4, 2.0), ("C", 2, 2, 1.0), ("D", 9, 6, 3.0)] {
            manager.create_task(TaskSpec::new(title, priority, at(due), duration)).await.unwrap();
        }
        let b_id = by_title(&manager.list_tasks().await.unwrap(), "B").id;

        let patch = TaskPatch {
            priority: Some(10),
            ..Default::default()
        };
        let b = manager.update_task(b_id, patch).await.unwrap();
        assert_eq!(b.priority, 10);
        assert_eq!((b.start, b.end), (Some(at(0)), Some(at(2))));

        let records = manager.list_tasks().await.unwrap();
        let d = by_title(&records, "D");
        assert_eq!((d.start, d.end), (Some(at(2)), Some(at(5))));
        let a = by_title(&records, "A");
        assert_eq!((a.start, a.end), (Some(at(5)), Some(at(13))));
        assert_eq!(by_title(&records, "C").status, RecordStatus::Unscheduled);
    }

    #[tokio::test]
    async fn test_update_rejects_bad_patch() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;
        let records = manager.create_task(TaskSpec::new("A", 5, at(10), 1.0)).await.unwrap();
        let id = records[0].id;

        let patch = TaskPatch {
            duration: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            manager.update_task(id, patch).await,
            Err(WorkError::Validation(ValidationError::NonPositiveDuration(_)))
        ));
        assert!(matches!(
            manager.update_task(RecordId::new(99), TaskPatch::default()).await,
            Err(WorkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_past_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;
        let records = manager.create_task(TaskSpec::new("A", 5, at(10), 2.0)).await.unwrap();
        let before = records[0].clone();
        assert_eq!((before.start, before.end), (Some(at(0)), Some(at(2))));

        let patch = TaskPatch {
            title: Some("A, renamed".to_string()),
            deadline: Some(t0() - Duration::hours(5)),
            ..Default::default()
        };
        assert!(matches!(
            manager.update_task(before.id, patch).await,
            Err(WorkError::Validation(ValidationError::DueInPast { .. }))
        ));

        // Nothing from the rejected patch was written.
        assert_eq!(manager.list_tasks().await.unwrap(), vec![before]);
    }

    #[tokio::test]
    async fn test_run_schedule_uses_the_given_clock() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;
        let mut records = manager.create_task(TaskSpec::new("A", 5, at(2), 1.0)).await.unwrap();
        let mut fresh = records.clone();

        // Past the deadline at the later clock: left as it was.
        manager.run_schedule(&mut records, at(3)).unwrap();
        assert_eq!(records[0].status, RecordStatus::Scheduled);
        assert_eq!(records[0].start, Some(at(0)));

        // Still ahead at the earlier clock: rescheduled from that clock.
        manager.run_schedule(&mut fresh, at(1)).unwrap();
        assert_eq!((fresh[0].start, fresh[0].end), (Some(at(1)), Some(at(2))));
    }

    /// JSON storage whose deletes fail, counting rollbacks.
    struct FailingDeleteStorage {
        inner: JsonStorage,
        rollbacks: usize,
    }

    #[async_trait]
    impl Storage for FailingDeleteStorage {
        async fn save_record(&mut self, record: &TaskRecord) -> tasktide_storage::Result<()> {
            self.inner.save_record(record).await
        }

        async fn load_record(&self, id: RecordId) -> tasktide_storage::Result<Option<TaskRecord>> {
            self.inner.load_record(id).await
        }

        async fn list_records(&self) -> tasktide_storage::Result<Vec<TaskRecord>> {
            self.inner.list_records().await
        }

        async fn delete_record(&mut self, _id: RecordId) -> tasktide_storage::Result<bool> {
            Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }

        async fn next_record_id(&mut self) -> tasktide_storage::Result<RecordId> {
            self.inner.next_record_id().await
        }

        async fn commit(&mut self, message: &str) -> tasktide_storage::Result<()> {
            self.inner.commit(message).await
        }

        async fn rollback(&mut self) -> tasktide_storage::Result<()> {
            self.rollbacks += 1;
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn test_failed_delete_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FailingDeleteStorage {
            inner: JsonStorage::new(dir.path()).await.unwrap(),
            rollbacks: 0,
        };
        let manager = BasicScheduleManager::new(storage).with_clock(t0());
        let records = manager.create_task(TaskSpec::new("A", 5, at(10), 1.0)).await.unwrap();

        let err = manager.delete_task(records[0].id).await.unwrap_err();
        assert!(matches!(err, WorkError::Storage(StorageError::Io(_))));
        assert_eq!(manager.storage().lock().await.rollbacks, 1);
        assert_eq!(manager.list_tasks().await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_delete_task() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;
        let records = manager.create_task(TaskSpec::new("A", 5, at(10), 1.0)).await.unwrap();
        let id = records[0].id;

        assert_eq!(manager.delete_task(id).await.unwrap(), DeleteOutcome { was_queued: true });
        assert!(manager.list_tasks().await.unwrap().is_empty());
        assert!(matches!(manager.delete_task(id).await, Err(WorkError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_records_are_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let manager = create_test_manager(&dir).await;
        let records = manager.create_task(TaskSpec::new("A", 5, at(2), 1.0)).await.unwrap();
        let id = records[0].id;

        // Same storage, clock moved past the deadline.
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let later = BasicScheduleManager::new(storage).with_clock(at(3));

        let records = later.reschedule().await.unwrap();
        assert_eq!(records[0].status, RecordStatus::Scheduled);
        assert_eq!(later.delete_task(id).await.unwrap(), DeleteOutcome { was_queued: false });
    }

    #[tokio::test]
    async fn test_nearest_deadline_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = SchedulerConfig {
            policy: PolicyKind::NearestDeadline,
            ..Default::default()
        };
        let manager = create_test_manager(&dir).await.with_config(config);

        manager.create_task(TaskSpec::new("late", 10, at(30), 2.0)).await.unwrap();
        let records = manager.create_task(TaskSpec::new("soon", 1, at(3), 2.0)).await.unwrap();

        assert_eq!(by_title(&records, "soon").start, Some(at(0)));
        assert_eq!(by_title(&records, "late").start, Some(at(2)));
    }
}
