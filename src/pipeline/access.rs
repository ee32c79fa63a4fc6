//! Access attempts classified against office hours.
//!
//! Records are upserted at `matricid_date_time`, so re-delivery of the same
//! scan overwrites the earlier write.

use crate::error::Result;
use crate::model::records::NO_CLASS;
use crate::model::{AccessRecord, AccessResult};
use crate::pipeline::office_hours::OfficeHours;
use crate::pipeline::snapshot::SnapshotCache;
use crate::store::{DocumentStore, Record, collections};
use log::info;
use std::sync::Arc;

pub struct AccessClassifier {
    store: Arc<dyn DocumentStore>,
    cache: Arc<SnapshotCache>,
    office_hours: OfficeHours,
}

impl AccessClassifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<SnapshotCache>,
        office_hours: OfficeHours,
    ) -> Self {
        Self {
            store,
            cache,
            office_hours,
        }
    }

    /// Allowed inside office hours, otherwise not. Fails on a malformed time.
    pub fn classify(&self, time: &str) -> Result<AccessResult> {
        Ok(if self.office_hours.contains_time(time)? {
            AccessResult::Allowed
        } else {
            AccessResult::NotAllowed
        })
    }

    /// Classify and store one access attempt.
    pub async fn record(
        &self,
        matricid: &str,
        student_name: &str,
        class_id: Option<&str>,
        date: &str,
        time: &str,
    ) -> Result<AccessRecord> {
        let result = self.classify(time)?;
        let record = AccessRecord {
            matricid: matricid.to_string(),
            student_name: student_name.to_string(),
            class_id: class_id
                .filter(|c| !c.is_empty())
                .unwrap_or(NO_CLASS)
                .to_string(),
            result,
            timestamp: time.to_string(),
            date: date.to_string(),
            created_at: None,
        };

        self.store
            .set(
                collections::ACCESS_LOGS,
                &record.document_id(),
                Record::from_serialize(&record)?.stamped("createdAt"),
            )
            .await?;

        info!("[Access] {}: {} at {}", result, student_name, time);
        self.cache.request_refresh();
        Ok(record)
    }
}
