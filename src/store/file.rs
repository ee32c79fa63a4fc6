//! JSON file backed document store.
//!
//! Keeps the working set in a [`MemoryStore`] and rewrites the file after
//! every write. A write whose file rewrite fails is undone in memory.
//! Meant for a single classroom controller's volume of records, not for
//! large histories.

use super::memory::{Collections, MemoryStore};
use super::{Document, DocumentStore, Query, Record};
use crate::error::{Result, SmartClassError};
use async_trait::async_trait;
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Held across each in-memory write and its file rewrite, so a rollback
    /// never undoes another writer's change and an older export never lands
    /// last.
    save_lock: tokio::sync::Mutex<()>,
}

fn load(path: &Path) -> Collections {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<Collections>(&bytes) {
            Ok(state) => {
                let count: usize = state.collections.values().map(|c| c.len()).sum();
                info!("Loaded {} stored documents from {:?}", count, path);
                state
            }
            Err(e) => {
                warn!("Failed to parse store file {:?}: {}", path, e);
                Collections::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No store file at {:?} (first run)", path);
            Collections::default()
        }
        Err(e) => {
            error!("Failed to read store file {:?}: {}", path, e);
            Collections::default()
        }
    }
}

fn save(path: &Path, state: &Collections) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(state)?;
    // Write to a sibling then rename over the original
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inner = MemoryStore::from_collections(load(&path));
        Self {
            path,
            inner,
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Save the whole store. Callers hold `save_lock`.
    fn persist(&self) -> Result<()> {
        let snapshot = self.inner.export();
        save(&self.path, &snapshot).map_err(|e| {
            SmartClassError::StoreWrite(format!("failed to save {:?}: {}", self.path, e))
        })
    }

    /// Save after a write to `collection/id`, undoing it in memory if the
    /// file could not be written.
    fn persist_or_restore(&self, collection: &str, id: &str, prior: Option<Document>) -> Result<()> {
        if let Err(e) = self.persist() {
            warn!("[Store] Rolling back {}/{}: {}", collection, id, e);
            self.inner.restore(collection, id, prior);
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, record: Record) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let prior = self.inner.peek(collection, id);
        self.inner.set(collection, id, record).await?;
        self.persist_or_restore(collection, id, prior)
    }

    async fn add(&self, collection: &str, record: Record) -> Result<String> {
        let _guard = self.save_lock.lock().await;
        let id = self.inner.add(collection, record).await?;
        self.persist_or_restore(collection, &id, None)?;
        Ok(id)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.inner.query(collection, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{OccupancyTracker, OfficeHours, RolloverMode};
    use crate::store::collections;
    use serde_json::json;
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("smartclass-{}-{}", name, uuid::Uuid::new_v4().simple()))
            .join("store.json")
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let path = temp_path("reopen");
        {
            let store = JsonFileStore::open(&path);
            let record = Record::from_serialize(&json!({
                "date": "2024-01-01",
                "occupiedMinutes": 12,
                "idleMinutes": 3,
            }))
            .unwrap()
            .stamped("updatedAt");
            store
                .set(collections::CLASSROOM_USAGE, "2024-01-01", record)
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(&path);
        let doc = reopened
            .get(collections::CLASSROOM_USAGE, "2024-01-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["occupiedMinutes"], json!(12));
        assert!(doc["updatedAt"].is_string());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    fn usage(occupied: u32) -> Record {
        Record::from_serialize(&json!({
            "date": "2024-01-01",
            "occupiedMinutes": occupied,
            "idleMinutes": 0,
        }))
        .unwrap()
    }

    /// Make the temp-file write fail by putting a directory in its place.
    fn block_save(path: &Path) -> PathBuf {
        let tmp = path.with_extension("json.tmp");
        fs::create_dir_all(&tmp).unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_failed_save_restores_previous_document() {
        let path = temp_path("rollback-set");
        let store = JsonFileStore::open(&path);
        store
            .set(collections::CLASSROOM_USAGE, "2024-01-01", usage(10))
            .await
            .unwrap();

        let tmp = block_save(&path);
        let err = store
            .set(collections::CLASSROOM_USAGE, "2024-01-01", usage(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SmartClassError::StoreWrite(_)));

        let doc = store
            .get(collections::CLASSROOM_USAGE, "2024-01-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["occupiedMinutes"], json!(10));

        fs::remove_dir_all(&tmp).unwrap();
        let reopened = JsonFileStore::open(&path);
        let doc = reopened
            .get(collections::CLASSROOM_USAGE, "2024-01-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["occupiedMinutes"], json!(10));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_failed_save_drops_added_document() {
        let path = temp_path("rollback-add");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let store = JsonFileStore::open(&path);

        let tmp = block_save(&path);
        let record = Record::from_serialize(&json!({"matricid": "S1"}))
            .unwrap()
            .stamped("createdAt");
        assert!(store.add(collections::ATTENDANCE, record).await.is_err());
        fs::remove_dir_all(&tmp).unwrap();

        let docs = store
            .query(collections::ATTENDANCE, &Query::new())
            .await
            .unwrap();
        assert!(docs.is_empty());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_failed_save_does_not_double_count_usage() {
        let path = temp_path("rollback-usage");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let store = Arc::new(JsonFileStore::open(&path));
        let tracker = OccupancyTracker::new(
            store.clone(),
            OfficeHours::default(),
            RolloverMode::TimeRegression,
        );

        tracker.observe("2024-01-01", 480, true).await.unwrap();

        let tmp = block_save(&path);
        assert!(tracker.observe("2024-01-01", 490, true).await.is_err());
        fs::remove_dir_all(&tmp).unwrap();

        tracker.observe("2024-01-01", 495, true).await.unwrap();
        let doc = store
            .get(collections::CLASSROOM_USAGE, "2024-01-01")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["occupiedMinutes"], json!(15));
        assert_eq!(doc["idleMinutes"], json!(0));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let path = temp_path("missing");
        let store = JsonFileStore::open(&path);
        let docs = store
            .query(collections::ATTENDANCE, &Query::new())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }
}
