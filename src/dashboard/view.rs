//! Dashboard read model.

use crate::model::{AccessRecord, AttendanceRecord, DailyUsageRecord};
use crate::pipeline::SnapshotCache;
use crate::store::{DocumentStore, collections, decode};
use log::warn;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub occupied_minutes: u32,
    pub idle_minutes: u32,
}

impl From<DailyUsageRecord> for UsageSummary {
    fn from(record: DailyUsageRecord) -> Self {
        Self {
            occupied_minutes: record.occupied_minutes,
            idle_minutes: record.idle_minutes,
        }
    }
}

/// Body of `GET /data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    /// Latest telemetry payload, `{}` before the first message.
    pub system: Value,
    pub attendance: Vec<AttendanceRecord>,
    /// classID -> attendance count for the day.
    pub attendance_summary: BTreeMap<String, usize>,
    pub access: Vec<AccessRecord>,
    pub current_class: String,
    pub usage: UsageSummary,
}

/// Date reported by the most recent telemetry, if any.
pub fn status_date(status: &Value) -> Option<&str> {
    status.get("time")?.get("date")?.as_str()
}

/// Assemble the dashboard view for the date of the latest telemetry.
///
/// Records come from the cached snapshot; only the day's usage totals are
/// read from the store, and a failed read shows zeros.
pub async fn build_view(cache: &SnapshotCache, store: &dyn DocumentStore) -> DashboardView {
    let status = cache.read_latest_status().unwrap_or_else(|| json!({}));
    let snapshot = cache.read_snapshot();
    let today = status_date(&status).map(str::to_string);

    let attendance: Vec<AttendanceRecord> = snapshot
        .attendance
        .iter()
        .filter(|a| Some(a.date.as_str()) == today.as_deref())
        .cloned()
        .collect();
    let access: Vec<AccessRecord> = snapshot
        .access
        .iter()
        .filter(|a| Some(a.date.as_str()) == today.as_deref())
        .cloned()
        .collect();

    let mut attendance_summary = BTreeMap::new();
    for record in &attendance {
        *attendance_summary
            .entry(record.class_id.clone())
            .or_insert(0) += 1;
    }

    let usage = match &today {
        Some(date) => read_usage(store, date).await,
        None => UsageSummary::default(),
    };

    let current_class = status
        .get("classID")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    DashboardView {
        system: status,
        attendance,
        attendance_summary,
        access,
        current_class,
        usage,
    }
}

async fn read_usage(store: &dyn DocumentStore, date: &str) -> UsageSummary {
    let doc = match store.get(collections::CLASSROOM_USAGE, date).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!("[Dashboard] Usage for {} unavailable: {}", date, e);
            return UsageSummary::default();
        }
    };

    match doc.map(decode::<DailyUsageRecord>) {
        Some(Ok(record)) => record.into(),
        Some(Err(e)) => {
            warn!("[Dashboard] Usage for {} unreadable: {}", date, e);
            UsageSummary::default()
        }
        None => UsageSummary::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessResult;
    use crate::pipeline::{AccessClassifier, AttendanceDeduper, OfficeHours};
    use crate::store::{MemoryStore, Record};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_view_before_any_telemetry() {
        let store = Arc::new(MemoryStore::new());
        let cache = SnapshotCache::new(store.clone(), 50);

        let view = build_view(&cache, store.as_ref()).await;
        assert_eq!(view.system, json!({}));
        assert!(view.attendance.is_empty());
        assert!(view.attendance_summary.is_empty());
        assert_eq!(view.current_class, "");
        assert_eq!(view.usage, UsageSummary::default());
    }

    #[tokio::test]
    async fn test_view_filters_to_status_date() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(SnapshotCache::new(store.clone(), 50));
        let deduper = AttendanceDeduper::new(store.clone(), cache.clone());
        let access = AccessClassifier::new(store.clone(), cache.clone(), OfficeHours::default());

        deduper
            .record("S1", "Ada", "CS101", "2024-01-01", "09:00")
            .await
            .unwrap();
        deduper
            .record("S2", "Bob", "CS101", "2024-01-02", "09:00")
            .await
            .unwrap();
        deduper
            .record("S3", "Cy", "CS102", "2024-01-02", "10:00")
            .await
            .unwrap();
        access
            .record("S4", "Di", None, "2024-01-02", "20:00")
            .await
            .unwrap();

        let usage = Record::from_serialize(&json!({
            "date": "2024-01-02",
            "occupiedMinutes": 40,
            "idleMinutes": 5,
        }))
        .unwrap();
        store
            .set(collections::CLASSROOM_USAGE, "2024-01-02", usage)
            .await
            .unwrap();

        cache.refresh().await.unwrap();
        cache.write_latest_status(json!({
            "time": {"time": "10:05", "date": "2024-01-02"},
            "classID": "CS102",
        }));

        let view = build_view(&cache, store.as_ref()).await;
        assert_eq!(view.attendance.len(), 2);
        assert_eq!(view.attendance_summary.get("CS101"), Some(&1));
        assert_eq!(view.attendance_summary.get("CS102"), Some(&1));
        assert_eq!(view.access.len(), 1);
        assert_eq!(view.access[0].result, AccessResult::NotAllowed);
        assert_eq!(view.current_class, "CS102");
        assert_eq!(
            view.usage,
            UsageSummary {
                occupied_minutes: 40,
                idle_minutes: 5
            }
        );

        let body = serde_json::to_value(&view).unwrap();
        assert_eq!(body["usage"]["occupiedMinutes"], json!(40));
        assert_eq!(body["attendanceSummary"]["CS101"], json!(1));
        assert_eq!(body["currentClass"], json!("CS102"));
    }

    #[tokio::test]
    async fn test_usage_read_failure_shows_zeros() {
        let store = Arc::new(MemoryStore::new());
        let cache = SnapshotCache::new(store.clone(), 50);
        cache.write_latest_status(json!({"time": {"date": "2024-01-02"}}));
        store.set_fail_reads(true);

        let view = build_view(&cache, store.as_ref()).await;
        assert_eq!(view.usage, UsageSummary::default());
    }
}
