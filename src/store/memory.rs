//! In-process document store.
//!
//! Also the test double for the pipeline: reads and writes can be made to
//! fail on demand, and query results can be held back for a while to widen
//! check-then-act race windows.

use super::{Direction, Document, DocumentStore, Query, Record};
use crate::error::{Result, SmartClassError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// All collections, keyed by collection name then document id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collections {
    pub collections: BTreeMap<String, BTreeMap<String, Document>>,
    #[serde(default)]
    pub last_stamp: Option<DateTime<Utc>>,
}

impl Collections {
    /// Next server timestamp, strictly after the previous one.
    fn next_stamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp
            && now <= last
        {
            now = last + ChronoDuration::microseconds(1);
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn materialize(&mut self, record: Record) -> Document {
        let mut fields = record.fields;
        if let Some(field) = record.server_timestamp {
            let stamp = self.next_stamp();
            fields.insert(field, Value::String(stamp));
        }
        fields
    }
}

/// Orders missing < null < bool < number < string < everything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Process-local [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Collections>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously exported collections.
    pub fn from_collections(collections: Collections) -> Self {
        Self {
            state: Mutex::new(collections),
            ..Self::default()
        }
    }

    /// Copy of the whole store, for persistence.
    pub fn export(&self) -> Collections {
        self.state.lock().clone()
    }

    /// Current document at `id`, bypassing fault injection.
    pub(crate) fn peek(&self, collection: &str, id: &str) -> Option<Document> {
        self.state
            .lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Put `id` back to `prior`, removing it when there was nothing before.
    pub(crate) fn restore(&self, collection: &str, id: &str, prior: Option<Document>) {
        let mut state = self.state.lock();
        match prior {
            Some(doc) => {
                state
                    .collections
                    .entry(collection.to_string())
                    .or_default()
                    .insert(id.to_string(), doc);
            }
            None => {
                if let Some(docs) = state.collections.get_mut(collection) {
                    docs.remove(id);
                }
            }
        }
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.state
            .lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.state
            .lock()
            .collections
            .values()
            .all(BTreeMap::is_empty)
    }

    /// Make every subsequent read fail with `StoreRead`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with `StoreWrite`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold query and get results back for `delay` after they were taken.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock() = delay;
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SmartClassError::StoreRead("injected read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SmartClassError::StoreWrite("injected write failure".into()));
        }
        Ok(())
    }

    async fn read_pause(&self) {
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn run_query(&self, collection: &str, query: &Query) -> Vec<Document> {
        let state = self.state.lock();
        let Some(docs) = state.collections.get(collection) else {
            return Vec::new();
        };

        let mut hits: Vec<Document> = docs
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect();

        if let Some((field, direction)) = &query.order_by {
            hits.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        hits
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check_read()?;
        let doc = self
            .state
            .lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned();
        self.read_pause().await;
        Ok(doc)
    }

    async fn set(&self, collection: &str, id: &str, record: Record) -> Result<()> {
        self.check_write()?;
        let mut state = self.state.lock();
        let doc = state.materialize(record);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn add(&self, collection: &str, record: Record) -> Result<String> {
        self.check_write()?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut state = self.state.lock();
        let doc = state.materialize(record);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc);
        Ok(id)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.check_read()?;
        let hits = self.run_query(collection, query);
        self.read_pause().await;
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_serialize(&value).unwrap()
    }

    #[tokio::test]
    async fn test_set_overwrites_and_get_returns_latest() {
        let store = MemoryStore::new();
        store
            .set("access_logs", "S1_2024-01-01_08:00", record(json!({"result": "Allowed"})))
            .await
            .unwrap();
        store
            .set("access_logs", "S1_2024-01-01_08:00", record(json!({"result": "Not Allowed"})))
            .await
            .unwrap();

        assert_eq!(store.len("access_logs"), 1);
        let doc = store
            .get("access_logs", "S1_2024-01-01_08:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["result"], json!("Not Allowed"));
    }

    #[tokio::test]
    async fn test_server_timestamps_order_newest_first() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store
                .add("attendance", record(json!({"n": n})).stamped("createdAt"))
                .await
                .unwrap();
        }

        let query = Query::new()
            .order_by("createdAt", Direction::Descending)
            .limit(3);
        let docs = store.query("attendance", &query).await.unwrap();
        let order: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = store.add("attendance", record(json!({}))).await.unwrap_err();
        assert!(matches!(err, SmartClassError::StoreWrite(_)));

        store.set_fail_reads(true);
        let err = store.query("attendance", &Query::new()).await.unwrap_err();
        assert!(matches!(err, SmartClassError::StoreRead(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_compare_values_ranks_types() {
        assert_eq!(
            compare_values(None, Some(&json!("a"))),
            CmpOrdering::Less
        );
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(10))),
            CmpOrdering::Less
        );
        assert_eq!(
            compare_values(Some(&json!("b")), Some(&json!("a"))),
            CmpOrdering::Greater
        );
    }
}
