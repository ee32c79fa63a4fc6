//! Validated parse step for controller messages.
//!
//! The controller publishes loosely shaped JSON. Every optional or
//! mistyped field is resolved to its documented default here, so handlers
//! downstream only deal with concrete values:
//!
//! | field                | default                          |
//! |----------------------|----------------------------------|
//! | `time`               | `None` (wall clock is used)      |
//! | `system.systemActive`| `false`                          |
//! | `classID`            | `""`                             |
//! | `rfid`               | `None`                           |
//! | `rfid.uid`           | `""`                             |
//! | `rfid.scanned`       | `false`                          |
//! | `rfid.attendance`    | `false`                          |
//!
//! Booleans follow the controller firmware's loose encoding: `true`/`false`,
//! or any non-zero number, or a non-empty string.

use crate::error::{Result, SmartClassError};
use serde_json::Value;

/// Device-reported clock, present when `time` is a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceClock {
    /// `HH:MM[:SS]`
    pub time: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
}

/// RFID section of an event message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RfidScan {
    /// Card identity as sent, surrounding whitespace trimmed.
    pub uid: String,
    pub scanned: bool,
    pub attendance: bool,
}

impl RfidScan {
    /// Identity used for lookups and records: no whitespace, uppercase.
    pub fn normalized_uid(&self) -> String {
        normalize_uid(&self.uid)
    }
}

/// Strip all whitespace from a card identity and uppercase it.
pub fn normalize_uid(uid: &str) -> String {
    uid.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// One inbound controller message.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub clock: Option<DeviceClock>,
    pub system_active: bool,
    /// Trimmed; empty when absent.
    pub class_id: String,
    pub rfid: Option<RfidScan>,
    /// The payload as received, kept for the dashboard's "latest status".
    pub raw: Value,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

impl TelemetryEvent {
    /// Parse a raw payload. Fails only when it isn't a JSON object.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| SmartClassError::Parse(format!("invalid JSON payload: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(SmartClassError::Parse(format!(
                "payload must be a JSON object, got {}",
                raw
            )));
        }

        let clock = raw
            .get("time")
            .filter(|t| t.is_object())
            .map(|t| DeviceClock {
                time: string_field(t, "time"),
                date: string_field(t, "date"),
            });

        let system_active = raw
            .get("system")
            .and_then(|s| s.get("systemActive"))
            .is_some_and(truthy);

        let class_id = raw
            .get("classID")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let rfid = raw.get("rfid").filter(|r| r.is_object()).map(|r| RfidScan {
            uid: r
                .get("uid")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            scanned: r.get("scanned").is_some_and(truthy),
            attendance: r.get("attendance").is_some_and(truthy),
        });

        Ok(Self {
            clock,
            system_active,
            class_id,
            rfid,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_event_message() {
        let payload = br#"{
            "time": {"time": "08:15:30", "date": "2024-01-01"},
            "system": {"systemActive": true},
            "classID": " CS101 ",
            "rfid": {"uid": " ab 12 cd ", "scanned": true, "attendance": true}
        }"#;

        let event = TelemetryEvent::parse(payload).unwrap();
        assert_eq!(
            event.clock,
            Some(DeviceClock {
                time: Some("08:15:30".into()),
                date: Some("2024-01-01".into()),
            })
        );
        assert!(event.system_active);
        assert_eq!(event.class_id, "CS101");

        let rfid = event.rfid.unwrap();
        assert_eq!(rfid.uid, "ab 12 cd");
        assert_eq!(rfid.normalized_uid(), "AB12CD");
        assert!(rfid.scanned);
        assert!(rfid.attendance);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let event = TelemetryEvent::parse(b"{}").unwrap();
        assert_eq!(event.clock, None);
        assert!(!event.system_active);
        assert_eq!(event.class_id, "");
        assert_eq!(event.rfid, None);
    }

    #[test]
    fn test_loose_booleans() {
        let event = TelemetryEvent::from_value(json!({
            "system": {"systemActive": 1},
            "rfid": {"uid": 42, "scanned": 0, "attendance": "yes"}
        }))
        .unwrap();
        assert!(event.system_active);

        let rfid = event.rfid.unwrap();
        assert_eq!(rfid.uid, "");
        assert!(!rfid.scanned);
        assert!(rfid.attendance);
    }

    #[test]
    fn test_non_object_time_is_ignored() {
        let event = TelemetryEvent::from_value(json!({"time": "08:00"})).unwrap();
        assert_eq!(event.clock, None);
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(TelemetryEvent::parse(b"not json").unwrap_err().is_parse());
        assert!(TelemetryEvent::parse(b"[1, 2]").unwrap_err().is_parse());
    }
}
