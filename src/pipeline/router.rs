//! Top-level handler for controller messages.
//!
//! Every message updates occupancy and the latest status. Messages on the
//! event topic that carry a scanned card are then routed to attendance or
//! access logging. A failing message is logged and reported through
//! [`Dispatch`]; it never affects the next one.

use crate::error::SmartClassError;
use crate::model::{AccessRecord, RfidScan, TelemetryEvent};
use crate::pipeline::access::AccessClassifier;
use crate::pipeline::attendance::{AttendanceDeduper, AttendanceOutcome};
use crate::pipeline::clock::{self, Timestamp};
use crate::pipeline::identity::IdentityResolver;
use crate::pipeline::occupancy::{OccupancyTracker, RolloverMode};
use crate::pipeline::office_hours::{OfficeHours, to_minutes};
use crate::pipeline::snapshot::SnapshotCache;
use crate::store::DocumentStore;
use log::{debug, error, info, warn};
use std::sync::Arc;

/// What the router did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Payload was not a JSON object; nothing changed.
    Dropped,
    /// Non-event topic: occupancy and status only.
    Telemetry,
    /// Event topic without a scanned card (controller heartbeat).
    Unscanned,
    Attendance(AttendanceOutcome),
    Access(AccessRecord),
    /// Attendance scan with an empty classID. Intentionally neither
    /// attendance nor access is logged.
    AttendanceWithoutClass,
    /// The scan could not be recorded.
    Failed(String),
}

pub struct EventRouter {
    event_topic: String,
    tracker: OccupancyTracker,
    cache: Arc<SnapshotCache>,
    identities: IdentityResolver,
    attendance: AttendanceDeduper,
    access: AccessClassifier,
}

impl EventRouter {
    pub fn new(
        event_topic: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<SnapshotCache>,
        office_hours: OfficeHours,
        rollover_mode: RolloverMode,
    ) -> Self {
        Self {
            event_topic: event_topic.into(),
            tracker: OccupancyTracker::new(store.clone(), office_hours, rollover_mode),
            identities: IdentityResolver::new(store.clone()),
            attendance: AttendanceDeduper::new(store.clone(), cache.clone()),
            access: AccessClassifier::new(store, cache.clone(), office_hours),
            cache,
        }
    }

    pub fn tracker(&self) -> &OccupancyTracker {
        &self.tracker
    }

    /// Process one message received on `topic`.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Dispatch {
        let event = match TelemetryEvent::parse(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("[Router] Dropping message on {}: {}", topic, e);
                return Dispatch::Dropped;
            }
        };

        let ts = clock::extract(event.clock.as_ref());
        self.observe_occupancy(&ts, event.system_active).await;
        self.cache.write_latest_status(event.raw.clone());

        if topic != self.event_topic {
            return Dispatch::Telemetry;
        }

        match &event.rfid {
            Some(rfid) => self.handle_scan(rfid, &event.class_id, &ts).await,
            None => {
                debug!("[Router] Event without rfid section on {}", topic);
                Dispatch::Unscanned
            }
        }
    }

    async fn observe_occupancy(&self, ts: &Timestamp, system_active: bool) {
        let minutes = match to_minutes(&ts.time) {
            Ok(m) => m,
            Err(e) => {
                warn!("[Occupancy] Skipping observation: {}", e);
                return;
            }
        };

        if let Err(e) = self.tracker.observe(&ts.date, minutes, system_active).await {
            error!("[Occupancy] Usage update for {} failed: {}", ts.date, e);
        }
    }

    async fn handle_scan(&self, rfid: &RfidScan, class_id: &str, ts: &Timestamp) -> Dispatch {
        info!(
            "[Router] Event: matricid='{}', scanned={}, attendance={}, class='{}'",
            rfid.uid, rfid.scanned, rfid.attendance, class_id
        );

        if !rfid.scanned || rfid.uid.is_empty() {
            return Dispatch::Unscanned;
        }

        let matricid = rfid.normalized_uid();
        let student_name = self.identities.display_name(&matricid).await;

        if rfid.attendance {
            if class_id.is_empty() {
                debug!(
                    "[Router] Attendance scan for {} without classID ignored",
                    matricid
                );
                return Dispatch::AttendanceWithoutClass;
            }

            return match self
                .attendance
                .record(&matricid, &student_name, class_id, &ts.date, &ts.time)
                .await
            {
                Ok(outcome) => Dispatch::Attendance(outcome),
                Err(e) => Self::failed("[Attendance]", e),
            };
        }

        match self
            .access
            .record(&matricid, &student_name, Some(class_id), &ts.date, &ts.time)
            .await
        {
            Ok(record) => Dispatch::Access(record),
            Err(e) => Self::failed("[Access]", e),
        }
    }

    fn failed(component: &str, e: SmartClassError) -> Dispatch {
        error!("{} Error: {}", component, e);
        Dispatch::Failed(e.to_string())
    }
}
