//! One attendance mark per student, class and day.
//!
//! The store has no uniqueness constraint, so the duplicate check and the
//! insert run under one lock. Two scans of the same card arriving together
//! would otherwise both see zero existing records and both insert.

use crate::error::Result;
use crate::model::AttendanceRecord;
use crate::pipeline::snapshot::SnapshotCache;
use crate::store::{DocumentStore, Query, Record, collections};
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceOutcome {
    /// New record stored under this document id.
    Written(String),
    /// A record for the same key already exists; nothing was written.
    Duplicate,
}

pub struct AttendanceDeduper {
    store: Arc<dyn DocumentStore>,
    cache: Arc<SnapshotCache>,
    lock: Mutex<()>,
}

impl AttendanceDeduper {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            store,
            cache,
            lock: Mutex::new(()),
        }
    }

    /// Record attendance unless `(matricid, class_id, date)` already has one.
    ///
    /// A failed duplicate check is returned as an error without writing.
    pub async fn record(
        &self,
        matricid: &str,
        student_name: &str,
        class_id: &str,
        date: &str,
        time: &str,
    ) -> Result<AttendanceOutcome> {
        let _guard = self.lock.lock().await;

        let query = Query::new()
            .where_eq("matricid", matricid)
            .where_eq("classID", class_id)
            .where_eq("date", date);
        let existing = self.store.query(collections::ATTENDANCE, &query).await?;

        info!(
            "[Attendance] Duplicate check: {} existing record(s) for {} in {} on {}",
            existing.len(),
            matricid,
            class_id,
            date
        );
        if !existing.is_empty() {
            info!(
                "[Attendance] Duplicate ignored: {} already marked for {} on {}",
                student_name, class_id, date
            );
            return Ok(AttendanceOutcome::Duplicate);
        }

        let record = AttendanceRecord {
            matricid: matricid.to_string(),
            student_name: student_name.to_string(),
            class_id: class_id.to_string(),
            timestamp: time.to_string(),
            date: date.to_string(),
            created_at: None,
        };
        let id = self
            .store
            .add(
                collections::ATTENDANCE,
                Record::from_serialize(&record)?.stamped("createdAt"),
            )
            .await?;

        info!(
            "[Attendance] Logged: {} - {} at {}",
            student_name, class_id, time
        );
        self.cache.request_refresh();
        Ok(AttendanceOutcome::Written(id))
    }
}
