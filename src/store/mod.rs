//! Document store abstraction.
//!
//! The pipeline only needs get/set/append, equality queries, and ordered
//! limited queries against named collections. `MemoryStore` keeps
//! everything in-process, `JsonFileStore` persists the same structure to a
//! JSON file.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::{Result, SmartClassError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A stored document: a flat JSON object.
pub type Document = Map<String, Value>;

/// Collection names used by the pipeline.
pub mod collections {
    pub const STUDENTS: &str = "students";
    pub const ATTENDANCE: &str = "attendance";
    pub const ACCESS_LOGS: &str = "access_logs";
    pub const CLASSROOM_USAGE: &str = "classroom_usage";
}

/// Document to write, optionally asking the store to stamp a field with
/// its own clock.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub fields: Document,
    pub server_timestamp: Option<String>,
}

impl Record {
    /// Serialize `value` into a record. `value` must serialize to an object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self {
                fields,
                server_timestamp: None,
            }),
            other => Err(SmartClassError::StoreWrite(format!(
                "record must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Have the store assign `field` at write time.
    pub fn stamped(mut self, field: impl Into<String>) -> Self {
        self.server_timestamp = Some(field.into());
        self
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filters, optional ordering and limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True if `doc` satisfies every equality filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Storage backend consumed by the pipeline.
///
/// Read failures surface as [`SmartClassError::StoreRead`], write failures
/// as [`SmartClassError::StoreWrite`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Upsert a document at `id`, replacing any previous content.
    async fn set(&self, collection: &str, id: &str, record: Record) -> Result<()>;

    /// Append a document under a generated id, returning the id.
    async fn add(&self, collection: &str, record: Record) -> Result<String>;

    /// Run a filtered, optionally ordered and limited query.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;
}

/// Decode a stored document into a typed record.
pub fn decode<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| SmartClassError::StoreRead(format!("undecodable document: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches_all_filters() {
        let query = Query::new()
            .where_eq("matricid", "S1")
            .where_eq("classID", "CS101");

        let Value::Object(hit) = json!({"matricid": "S1", "classID": "CS101", "date": "2024-01-01"})
        else {
            unreachable!()
        };
        let Value::Object(miss) = json!({"matricid": "S1", "classID": "CS102"}) else {
            unreachable!()
        };

        assert!(query.matches(&hit));
        assert!(!query.matches(&miss));
    }

    #[test]
    fn test_record_rejects_non_objects() {
        assert!(Record::from_serialize(&42).is_err());
        let record = Record::from_serialize(&json!({"a": 1}))
            .unwrap()
            .stamped("createdAt");
        assert_eq!(record.server_timestamp.as_deref(), Some("createdAt"));
    }
}
