//! MQTT input source for the classroom controller.
//!
//! The controller publishes RFID events and periodic telemetry; this module
//! receives them and feeds the ingest pipeline.

mod client;
mod integration;

pub use client::{MqttClient, MqttMessage};
pub use integration::{MqttIngest, consume};
