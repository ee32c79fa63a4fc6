//! Device-reported timestamp with wall-clock fallback.

use crate::model::DeviceClock;
use chrono::{DateTime, Local, TimeZone};

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `(time, date)` pair as used in records: `HH:MM[:SS]`, `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub time: String,
    pub date: String,
}

/// Best-effort timestamp for a message. Each missing sub-field falls back
/// to the local wall clock independently. Never fails.
pub fn extract(clock: Option<&DeviceClock>) -> Timestamp {
    extract_at(clock, &Local::now())
}

/// [`extract`] against a fixed "now".
pub fn extract_at<Tz: TimeZone>(clock: Option<&DeviceClock>, now: &DateTime<Tz>) -> Timestamp
where
    Tz::Offset: std::fmt::Display,
{
    let time = clock.and_then(|c| c.time.clone());
    let date = clock.and_then(|c| c.date.clone());

    Timestamp {
        time: time.unwrap_or_else(|| now.format(TIME_FORMAT).to_string()),
        date: date.unwrap_or_else(|| now.format(DATE_FORMAT).to_string()),
    }
}
