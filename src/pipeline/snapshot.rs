//! Read cache behind the dashboard.
//!
//! Holds the newest attendance and access records and the most recent
//! telemetry payload so dashboard reads never hit the store for them.
//! A refresh builds a complete new snapshot and swaps it in; readers see
//! either the old or the new one, never a mix.

use crate::error::Result;
use crate::model::{AccessRecord, AttendanceRecord};
use crate::store::{Direction, DocumentStore, Query, collections, decode};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// Newest-first records, at most `limit` of each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub attendance: Vec<AttendanceRecord>,
    pub access: Vec<AccessRecord>,
}

pub struct SnapshotCache {
    store: Arc<dyn DocumentStore>,
    limit: usize,
    snapshot: RwLock<Arc<CacheSnapshot>>,
    latest_status: RwLock<Option<Value>>,
    /// One refresh at a time.
    refresh_lock: Mutex<()>,
    refresh_signal: Notify,
    refresh_requests: AtomicU64,
    refreshes: AtomicU64,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn DocumentStore>, limit: usize) -> Self {
        Self {
            store,
            limit,
            snapshot: RwLock::new(Arc::new(CacheSnapshot::default())),
            latest_status: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_signal: Notify::new(),
            refresh_requests: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Reload both record lists from the store.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let attendance = self.load::<AttendanceRecord>(collections::ATTENDANCE).await?;
        let access = self.load::<AccessRecord>(collections::ACCESS_LOGS).await?;

        info!(
            "[Cache] Updated: {} attendance, {} access",
            attendance.len(),
            access.len()
        );
        *self.snapshot.write() = Arc::new(CacheSnapshot { attendance, access });
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let query = Query::new()
            .order_by("createdAt", Direction::Descending)
            .limit(self.limit);
        let docs = self.store.query(collection, &query).await?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode::<T>(doc) {
                Ok(record) => records.push(record),
                Err(e) => warn!("[Cache] Skipping {} document: {}", collection, e),
            }
        }
        Ok(records)
    }

    /// Current snapshot. Never touches the store.
    pub fn read_snapshot(&self) -> Arc<CacheSnapshot> {
        self.snapshot.read().clone()
    }

    /// Last full telemetry payload, if any arrived yet.
    pub fn read_latest_status(&self) -> Option<Value> {
        self.latest_status.read().clone()
    }

    pub fn write_latest_status(&self, payload: Value) {
        *self.latest_status.write() = Some(payload);
    }

    /// Ask the background refresher for a refresh. Requests made while one
    /// is pending collapse into a single refresh.
    pub fn request_refresh(&self) {
        self.refresh_requests.fetch_add(1, Ordering::SeqCst);
        self.refresh_signal.notify_one();
    }

    /// Number of [`request_refresh`](Self::request_refresh) calls so far.
    pub fn refresh_requests(&self) -> u64 {
        self.refresh_requests.load(Ordering::SeqCst)
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Run refreshes in the background: once immediately, then every
    /// `interval` and whenever a refresh is requested. Failures are logged
    /// and retried on the next trigger.
    pub fn spawn_refresher(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => debug!("[Cache] Periodic refresh"),
                    _ = self.refresh_signal.notified() => debug!("[Cache] Requested refresh"),
                }
                if let Err(e) = self.refresh().await {
                    warn!("[Cache] Refresh failed, keeping previous snapshot: {}", e);
                }
            }
        })
    }
}
