//! Typed inbound messages and persisted records.

pub mod records;
pub mod telemetry;

pub use records::{AccessRecord, AccessResult, AttendanceRecord, DailyUsageRecord, Student};
pub use telemetry::{DeviceClock, RfidScan, TelemetryEvent};
