//! Durable lock records.
//!
//! Alongside the transient session store, the lock layer keeps a small
//! side-table keyed by session identifier: when a session last touched the
//! lock, and the lock flag it last committed. The table lives in a durable
//! configuration store so lock state survives restarts; the manager
//! reconciles it back into live sessions at startup.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// One durable lock record.
///
/// The lock flag is a string, not a bool: the session layer distinguishes
/// `"true"`, `"false"`, and absent (see [`crate::lock`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// When the owning session last touched its lock state.
    pub last_accessed: SystemTime,

    /// The committed lock flag, `"true"` or `"false"`.
    pub lock: String,
}

impl SessionRecord {
    /// A record stamped with the current time.
    pub fn now(lock: impl Into<String>) -> Self {
        Self {
            last_accessed: SystemTime::now(),
            lock: lock.into(),
        }
    }

    /// Time since the record was last touched.
    pub fn age(&self) -> Duration {
        self.last_accessed.elapsed().unwrap_or(Duration::ZERO)
    }
}

/// Durable store for lock records.
///
/// The store itself decides what "durable" means; [`RecordStore::save`] is
/// the commit point and must persist the whole table. Mutations are cheap
/// in-memory updates until then.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record for `sid`, if one exists.
    async fn get(&self, sid: &str) -> Option<SessionRecord>;

    /// Insert or overwrite the record for `sid`.
    async fn insert(&self, sid: &str, record: SessionRecord);

    /// Remove the record for `sid`. Removing an absent record is fine.
    async fn remove(&self, sid: &str);

    /// Snapshot of all records, for reconciliation sweeps.
    async fn entries(&self) -> Vec<(String, SessionRecord)>;

    /// Durably commit the whole table.
    async fn save(&self) -> Result<()>;
}

/// In-memory record store.
///
/// `save` is a counted no-op, which makes commit behavior observable in
/// tests without touching disk.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, SessionRecord>>,
    saves: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, sid: &str) -> Option<SessionRecord> {
        self.records.read().await.get(sid).cloned()
    }

    async fn insert(&self, sid: &str, record: SessionRecord) {
        self.records.write().await.insert(sid.to_string(), record);
    }

    async fn remove(&self, sid: &str) {
        self.records.write().await.remove(sid);
    }

    async fn entries(&self) -> Vec<(String, SessionRecord)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(sid, record)| (sid.clone(), record.clone()))
            .collect()
    }

    async fn save(&self) -> Result<()> {
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// JSON-file record store.
///
/// Keeps the table in memory and rewrites a single JSON file on `save`.
pub struct JsonFileRecordStore {
    path: PathBuf,
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl JsonFileRecordStore {
    /// Open the store at `path`, loading any previously saved table.
    ///
    /// A missing file starts the store empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn get(&self, sid: &str) -> Option<SessionRecord> {
        self.records.read().await.get(sid).cloned()
    }

    async fn insert(&self, sid: &str, record: SessionRecord) {
        self.records.write().await.insert(sid.to_string(), record);
    }

    async fn remove(&self, sid: &str) {
        self.records.write().await.remove(sid);
    }

    async fn entries(&self) -> Vec<(String, SessionRecord)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(sid, record)| (sid.clone(), record.clone()))
            .collect()
    }

    async fn save(&self) -> Result<()> {
        let records = self.records.read().await;
        let bytes = serde_json::to_vec_pretty(&*records)?;
        tokio::fs::write(&self.path, bytes).await?;
        tracing::debug!(records = records.len(), "Committed lock records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_crud() {
        let store = InMemoryRecordStore::new();

        store.insert("sid-1", SessionRecord::now("false")).await;
        let record = store.get("sid-1").await.unwrap();
        assert_eq!(record.lock, "false");

        store.insert("sid-1", SessionRecord::now("true")).await;
        assert_eq!(store.get("sid-1").await.unwrap().lock, "true");

        store.remove("sid-1").await;
        assert!(store.get("sid-1").await.is_none());
        store.remove("sid-1").await;
    }

    #[tokio::test]
    async fn test_in_memory_save_counter() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.save_count(), 0);

        store.save().await.unwrap();
        store.save().await.unwrap();
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_record_age() {
        let record = SessionRecord::now("false");
        assert!(record.age() < Duration::from_secs(1));

        let old = SessionRecord {
            last_accessed: SystemTime::now() - Duration::from_secs(90_000),
            lock: "false".to_string(),
        };
        assert!(old.age() >= Duration::from_secs(90_000));
    }

    #[tokio::test]
    async fn test_json_file_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        {
            let store = JsonFileRecordStore::open(&path).await.unwrap();
            store.insert("sid-1", SessionRecord::now("false")).await;
            store.insert("sid-2", SessionRecord::now("true")).await;
            store.save().await.unwrap();
        }

        let store = JsonFileRecordStore::open(&path).await.unwrap();
        assert_eq!(store.get("sid-1").await.unwrap().lock, "false");
        assert_eq!(store.get("sid-2").await.unwrap().lock, "true");
        assert_eq!(store.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_json_file_missing_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path().join("missing.json"))
            .await
            .unwrap();
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsaved_mutations_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        {
            let store = JsonFileRecordStore::open(&path).await.unwrap();
            store.insert("sid-1", SessionRecord::now("false")).await;
            store.save().await.unwrap();
            store.insert("sid-2", SessionRecord::now("false")).await;
            // No save for sid-2.
        }

        let store = JsonFileRecordStore::open(&path).await.unwrap();
        assert!(store.get("sid-1").await.is_some());
        assert!(store.get("sid-2").await.is_none());
    }
}
