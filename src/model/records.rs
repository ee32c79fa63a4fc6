//! Persisted record types.
//!
//! Field names on the wire match the dashboard's JSON contract
//! (`studentName`, `classID`, `createdAt`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Entry of the `students` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub matricid: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One attendance mark. At most one per (matricid, classID, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub matricid: String,
    pub student_name: String,
    #[serde(rename = "classID")]
    pub class_id: String,
    /// Device time of the scan, `HH:MM[:SS]`.
    pub timestamp: String,
    pub date: String,
    /// Assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum AccessResult {
    #[serde(rename = "Allowed")]
    #[strum(serialize = "Allowed")]
    Allowed,
    #[serde(rename = "Not Allowed")]
    #[strum(serialize = "Not Allowed")]
    NotAllowed,
}

/// Class id written when an access scan carries none.
pub const NO_CLASS: &str = "-";

/// One access attempt, keyed by [`AccessRecord::document_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub matricid: String,
    pub student_name: String,
    #[serde(rename = "classID")]
    pub class_id: String,
    pub result: AccessResult,
    pub timestamp: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AccessRecord {
    /// Deterministic key: re-delivery of the same scan overwrites.
    pub fn document_id(&self) -> String {
        format!("{}_{}_{}", self.matricid, self.date, self.timestamp)
    }
}

/// Occupied/idle minute totals for one day, keyed by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsageRecord {
    pub date: String,
    #[serde(default)]
    pub occupied_minutes: u32,
    #[serde(default)]
    pub idle_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyUsageRecord {
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Self::default()
        }
    }

    pub fn total_minutes(&self) -> u32 {
        self.occupied_minutes + self.idle_minutes
    }
}
