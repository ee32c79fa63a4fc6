//! SmartClass ingest library.
//!
//! Turns the classroom controller's MQTT telemetry and RFID events into
//! attendance records, access records and daily usage totals, and serves
//! the latest derived state to the dashboard.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod input;
pub mod instance_lock;
pub mod model;
pub mod pipeline;
pub mod store;
