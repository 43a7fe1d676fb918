//! JSON file storage implementation.
//!
//! Stores one JSON file per task record under `records/` and keeps small
//! per-record meta markers (version + updated_at). Each commit appends a line
//! to `commits.jsonl` and becomes the state `rollback` returns to.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tasktide_core::{RecordId, TaskRecord};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Result, Storage};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    pending: Arc<Mutex<bool>>,
    committed: BTreeMap<RecordId, TaskRecord>,
}

impl JsonStorage {
    /// Open (or create) storage rooted at `root`.
    ///
    /// Whatever is on disk when opened is treated as committed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("records")).await?;
        fs::create_dir_all(root.join("meta").join("records")).await?;

        let committed = list_dir::<TaskRecord>(&root.join("records"))
            .await?
            .into_iter()
            .map(|record| (record.id, record))
            .collect();

        Ok(Self {
            root,
            pending: Arc::new(Mutex::new(false)),
            committed,
        })
    }

    /// Whether there are uncommitted changes.
    pub async fn has_pending(&self) -> bool {
        *self.pending.lock().await
    }

    fn record_path(&self, id: RecordId) -> PathBuf {
        self.root.join("records").join(format!("{}.json", id))
    }

    fn meta_path(&self, id: RecordId) -> PathBuf {
        self.root.join("meta").join("records").join(format!("{}.meta.json", id))
    }

    fn sequence_path(&self) -> PathBuf {
        self.root.join("meta").join("sequence.json")
    }

    async fn set_pending(&self) {
        *self.pending.lock().await = true;
    }

    /// Read and increment per-record version, return new version.
    async fn bump_version(&self, id: RecordId) -> Result<u64> {
        let path = self.meta_path(id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn write_record(&self, record: &TaskRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(self.record_path(record.id), json.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_record(&mut self, record: &TaskRecord) -> Result<()> {
        self.write_record(record).await?;
        let version = self.bump_version(record.id).await?;
        debug!("Saved record {} (v{})", record.id, version);

        self.set_pending().await;
        Ok(())
    }

    async fn load_record(&self, id: RecordId) -> Result<Option<TaskRecord>> {
        read_json(&self.record_path(id)).await
    }

    async fn list_records(&self) -> Result<Vec<TaskRecord>> {
        let mut records = list_dir(&self.root.join("records")).await?;
        records.sort_by_key(|r: &TaskRecord| r.id);
        Ok(records)
    }

    async fn delete_record(&mut self, id: RecordId) -> Result<bool> {
        let existed = match fs::remove_file(self.record_path(id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if existed {
            self.set_pending().await;
        }
        Ok(existed)
    }

    async fn next_record_id(&mut self) -> Result<RecordId> {
        let stored: Option<u64> = read_json(&self.sequence_path()).await?;
        let highest = self.list_records().await?.last().map_or(0, |r| r.id.get());
        let next = stored.unwrap_or(0).max(highest) + 1;
        fs::write(self.sequence_path(), serde_json::to_string(&next)?.as_bytes()).await?;
        Ok(RecordId::new(next))
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        let records = self.list_records().await?;
        let entry = serde_json::json!({
            "message": message,
            "records": records.len(),
            "at": chrono::Utc::now(),
        });

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut log = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.root.join("commits.jsonl"))
            .await?;
        log.write_all(line.as_bytes()).await?;
        log.flush().await?;

        self.committed = records.into_iter().map(|r| (r.id, r)).collect();
        *self.pending.lock().await = false;
        debug!("Committed: {}", message);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !*self.pending.lock().await {
            return Ok(());
        }

        warn!("Rolling back uncommitted record changes");
        for record in self.list_records().await? {
            if !self.committed.contains_key(&record.id) {
                fs::remove_file(self.record_path(record.id)).await?;
            }
        }
        for record in self.committed.values() {
            self.write_record(record).await?;
        }

        *self.pending.lock().await = false;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&entry.path()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable {}: {}", entry.path().display(), e),
        }
    }
    Ok(items)
}
