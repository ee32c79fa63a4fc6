//! Day-scoped occupied/idle minute accounting.
//!
//! Each observation `(date, minutes, systemActive)` attributes the time
//! elapsed since the previous observation to the previous state, but only
//! while inside office hours. The baseline always advances, so a gap
//! spanning the office-hours boundary is never attributed retroactively.
//!
//! A new day is detected by [`RolloverMode`]. The default,
//! `TimeRegression`, clears the baseline whenever the clock goes backwards
//! and never looks at the date, which tolerates missing or garbled dates.

use crate::error::Result;
use crate::model::DailyUsageRecord;
use crate::pipeline::office_hours::OfficeHours;
use crate::store::{DocumentStore, Record, collections, decode};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tokio::sync::Mutex;

/// How the tracker decides that a new day started.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RolloverMode {
    /// Minutes lower than the previous observation's.
    #[default]
    TimeRegression,
    /// Time regression, or a date different from the previous observation's.
    DateChange,
}

impl RolloverMode {
    fn is_new_day(self, state: &OccupancyState, date: &str, minutes: u32) -> bool {
        let regressed = state.last_minutes.is_some_and(|last| minutes < last);
        match self {
            RolloverMode::TimeRegression => regressed,
            RolloverMode::DateChange => {
                regressed || state.last_date.as_deref().is_some_and(|last| last != date)
            }
        }
    }
}

/// Baseline of the previous observation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyState {
    pub last_state: Option<bool>,
    pub last_minutes: Option<u32>,
    pub last_date: Option<String>,
}

impl OccupancyState {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Minutes added to a day's totals by one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accrual {
    pub duration: u32,
    /// True if the minutes went to `occupiedMinutes`.
    pub occupied: bool,
    /// The record as written.
    pub record: DailyUsageRecord,
}

/// What one observation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub rollover: bool,
    pub accrual: Option<Accrual>,
}

pub struct OccupancyTracker {
    store: Arc<dyn DocumentStore>,
    office_hours: OfficeHours,
    mode: RolloverMode,
    // Held across the usage read-modify-write
    state: Mutex<OccupancyState>,
}

impl OccupancyTracker {
    pub fn new(store: Arc<dyn DocumentStore>, office_hours: OfficeHours, mode: RolloverMode) -> Self {
        Self {
            store,
            office_hours,
            mode,
            state: Mutex::new(OccupancyState::default()),
        }
    }

    /// Feed one observation.
    ///
    /// If the usage record cannot be read or written the error is returned
    /// and the baseline is left where it was, so the next observation's
    /// delta covers the lost interval.
    pub async fn observe(&self, date: &str, minutes: u32, system_active: bool) -> Result<Observation> {
        let mut state = self.state.lock().await;

        let rollover = self.mode.is_new_day(&state, date, minutes);
        if rollover {
            info!(
                "[Occupancy] New day detected at {} ({} min), clearing baseline",
                date, minutes
            );
            state.clear();
        }

        let mut accrual = None;
        if self.office_hours.contains(minutes)
            && let (Some(last_state), Some(last_minutes)) = (state.last_state, state.last_minutes)
        {
            let duration = minutes.saturating_sub(last_minutes);
            let record = self.accrue(date, duration, last_state).await?;
            accrual = Some(Accrual {
                duration,
                occupied: last_state,
                record,
            });
        }

        state.last_state = Some(system_active);
        state.last_minutes = Some(minutes);
        state.last_date = Some(date.to_string());

        Ok(Observation { rollover, accrual })
    }

    async fn accrue(&self, date: &str, duration: u32, occupied: bool) -> Result<DailyUsageRecord> {
        let mut record = match self.store.get(collections::CLASSROOM_USAGE, date).await? {
            Some(doc) => decode::<DailyUsageRecord>(doc)?,
            None => DailyUsageRecord::empty(date),
        };
        record.date = date.to_string();
        record.updated_at = None;

        if occupied {
            record.occupied_minutes = record.occupied_minutes.saturating_add(duration);
        } else {
            record.idle_minutes = record.idle_minutes.saturating_add(duration);
        }

        self.store
            .set(
                collections::CLASSROOM_USAGE,
                date,
                Record::from_serialize(&record)?.stamped("updatedAt"),
            )
            .await?;

        debug!(
            "[Occupancy] {} +{} min {} (occupied={}, idle={})",
            date,
            duration,
            if occupied { "occupied" } else { "idle" },
            record.occupied_minutes,
            record.idle_minutes
        );
        Ok(record)
    }

    /// Copy of the current baseline.
    pub async fn state(&self) -> OccupancyState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const DAY: &str = "2024-01-01";

    fn tracker(mode: RolloverMode) -> (Arc<MemoryStore>, OccupancyTracker) {
        let store = Arc::new(MemoryStore::new());
        let tracker = OccupancyTracker::new(store.clone(), OfficeHours::default(), mode);
        (store, tracker)
    }

    async fn usage(store: &MemoryStore, date: &str) -> Option<DailyUsageRecord> {
        store
            .get(collections::CLASSROOM_USAGE, date)
            .await
            .unwrap()
            .map(|doc| decode(doc).unwrap())
    }

    #[tokio::test]
    async fn test_first_observation_only_sets_baseline() {
        let (store, tracker) = tracker(RolloverMode::TimeRegression);
        let obs = tracker.observe(DAY, 480, true).await.unwrap();

        assert_eq!(obs, Observation::default());
        assert!(usage(&store, DAY).await.is_none());
        let state = tracker.state().await;
        assert_eq!(state.last_state, Some(true));
        assert_eq!(state.last_minutes, Some(480));
    }

    #[tokio::test]
    async fn test_deltas_go_to_previous_state() {
        let (store, tracker) = tracker(RolloverMode::TimeRegression);
        tracker.observe(DAY, 480, true).await.unwrap();
        tracker.observe(DAY, 500, false).await.unwrap(); // 20 occupied
        tracker.observe(DAY, 505, false).await.unwrap(); // 5 idle
        tracker.observe(DAY, 530, true).await.unwrap(); // 25 idle
        tracker.observe(DAY, 540, true).await.unwrap(); // 10 occupied

        let record = usage(&store, DAY).await.unwrap();
        assert_eq!(record.occupied_minutes, 30);
        assert_eq!(record.idle_minutes, 30);
        assert!(record.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_totals_never_decrease_and_sum_deltas() {
        let (store, tracker) = tracker(RolloverMode::TimeRegression);
        let minutes = [480u32, 481, 490, 490, 530, 600, 601, 720, 1079];
        let mut expected = 0;
        let mut previous_total = 0;

        for (i, m) in minutes.iter().enumerate() {
            let obs = tracker.observe(DAY, *m, i % 3 == 0).await.unwrap();
            if let Some(accrual) = obs.accrual {
                expected += accrual.duration;
            }
            if let Some(record) = usage(&store, DAY).await {
                assert!(record.total_minutes() >= previous_total);
                previous_total = record.total_minutes();
            }
        }

        assert_eq!(expected, 1079 - 480);
        assert_eq!(previous_total, expected);
    }

    #[tokio::test]
    async fn test_time_regression_clears_baseline() {
        let (store, tracker) = tracker(RolloverMode::TimeRegression);
        tracker.observe(DAY, 480, true).await.unwrap();
        tracker.observe(DAY, 500, true).await.unwrap();

        let obs = tracker.observe("2024-01-02", 30, false).await.unwrap();
        assert!(obs.rollover);
        assert!(obs.accrual.is_none());

        let state = tracker.state().await;
        assert_eq!(state.last_minutes, Some(30));
        assert_eq!(state.last_state, Some(false));

        assert_eq!(usage(&store, DAY).await.unwrap().occupied_minutes, 20);
        assert!(usage(&store, "2024-01-02").await.is_none());
    }

    #[tokio::test]
    async fn test_outside_hours_advances_baseline_without_accrual() {
        let (store, tracker) = tracker(RolloverMode::TimeRegression);
        tracker.observe(DAY, 470, true).await.unwrap();
        let obs = tracker.observe(DAY, 475, true).await.unwrap();
        assert!(obs.accrual.is_none());

        // First in-window observation accrues the whole gap since 475
        let obs = tracker.observe(DAY, 490, true).await.unwrap();
        assert_eq!(obs.accrual.unwrap().duration, 15);

        tracker.observe(DAY, 1080, false).await.unwrap();
        let record = usage(&store, DAY).await.unwrap();
        assert_eq!(record.occupied_minutes, 15);
        assert_eq!(tracker.state().await.last_minutes, Some(1080));
    }

    #[tokio::test]
    async fn test_date_change_mode_clears_on_new_date() {
        let (_store, tracker) = tracker(RolloverMode::DateChange);
        tracker.observe(DAY, 480, true).await.unwrap();
        let obs = tracker.observe("2024-01-02", 600, true).await.unwrap();
        assert!(obs.rollover);
        assert!(obs.accrual.is_none());

        let (_store, tracker) = self::tracker(RolloverMode::TimeRegression);
        tracker.observe(DAY, 480, true).await.unwrap();
        let obs = tracker.observe("2024-01-02", 600, true).await.unwrap();
        assert!(!obs.rollover);
        assert_eq!(obs.accrual.unwrap().duration, 120);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_baseline() {
        let (store, tracker) = tracker(RolloverMode::TimeRegression);
        tracker.observe(DAY, 480, true).await.unwrap();

        store.set_fail_writes(true);
        assert!(tracker.observe(DAY, 490, false).await.is_err());
        assert_eq!(tracker.state().await.last_minutes, Some(480));

        store.set_fail_writes(false);
        let obs = tracker.observe(DAY, 495, false).await.unwrap();
        assert_eq!(obs.accrual.unwrap().duration, 15);
        assert_eq!(usage(&store, DAY).await.unwrap().occupied_minutes, 15);
    }

    #[test]
    fn test_rollover_mode_parses() {
        assert_eq!(
            "date-change".parse::<RolloverMode>().unwrap(),
            RolloverMode::DateChange
        );
        assert_eq!(RolloverMode::TimeRegression.to_string(), "time-regression");
        assert!("sometimes".parse::<RolloverMode>().is_err());
    }
}
