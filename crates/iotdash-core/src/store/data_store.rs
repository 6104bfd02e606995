// ── Central sync store ──
//
// One `SyncedCollection` per backend collection, plus the bookkeeping the
// push channel needs to drop out-of-order events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use iotdash_api::models::{Device, HealthReport, MotionAlert, MotionSensor, Relay, SystemStats};

use super::CollectionKind;
use super::collection::{CollectionPhase, SyncedCollection};
use crate::error::CoreError;

/// Type-erased view of one collection's state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CollectionStatus {
    pub kind: CollectionKind,
    pub phase: CollectionPhase,
    pub has_data: bool,
    pub updated_at: Option<DateTime<Utc>>,
    /// User-facing reason when the latest request failed.
    pub error: Option<String>,
    pub seq: u64,
}

/// Ordering marker from the most recent accepted push event per collection.
#[derive(Debug, Clone, Copy, Default)]
struct PushMark {
    seq: Option<u64>,
    timestamp: Option<DateTime<Utc>>,
}

/// Client-side mirror of every dashboard collection.
///
/// Readers never block writers: each collection publishes through its own
/// `watch` channel and snapshots are shared `Arc`s.
pub struct SyncStore {
    pub(crate) devices: SyncedCollection<Vec<Device>>,
    pub(crate) relays: SyncedCollection<Vec<Relay>>,
    pub(crate) motion_sensors: SyncedCollection<Vec<MotionSensor>>,
    pub(crate) motion_alerts: SyncedCollection<Vec<MotionAlert>>,
    pub(crate) system_stats: SyncedCollection<SystemStats>,
    pub(crate) health: SyncedCollection<HealthReport>,
    push_marks: DashMap<CollectionKind, PushMark>,
    pub(crate) last_push_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStore {
    pub fn new() -> Self {
        let (last_push_event, _) = watch::channel(None);

        Self {
            devices: SyncedCollection::new(CollectionKind::Devices),
            relays: SyncedCollection::new(CollectionKind::Relays),
            motion_sensors: SyncedCollection::new(CollectionKind::MotionSensors),
            motion_alerts: SyncedCollection::new(CollectionKind::MotionAlerts),
            system_stats: SyncedCollection::new(CollectionKind::SystemStats),
            health: SyncedCollection::new(CollectionKind::Health),
            push_marks: DashMap::new(),
            last_push_event,
        }
    }

    // ── Collection accessors ─────────────────────────────────────────

    pub fn devices(&self) -> &SyncedCollection<Vec<Device>> {
        &self.devices
    }

    pub fn relays(&self) -> &SyncedCollection<Vec<Relay>> {
        &self.relays
    }

    pub fn motion_sensors(&self) -> &SyncedCollection<Vec<MotionSensor>> {
        &self.motion_sensors
    }

    pub fn motion_alerts(&self) -> &SyncedCollection<Vec<MotionAlert>> {
        &self.motion_alerts
    }

    pub fn system_stats(&self) -> &SyncedCollection<SystemStats> {
        &self.system_stats
    }

    pub fn health(&self) -> &SyncedCollection<HealthReport> {
        &self.health
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Option<Arc<Vec<Device>>> {
        self.devices.snapshot()
    }

    pub fn relays_snapshot(&self) -> Option<Arc<Vec<Relay>>> {
        self.relays.snapshot()
    }

    pub fn motion_sensors_snapshot(&self) -> Option<Arc<Vec<MotionSensor>>> {
        self.motion_sensors.snapshot()
    }

    pub fn motion_alerts_snapshot(&self) -> Option<Arc<Vec<MotionAlert>>> {
        self.motion_alerts.snapshot()
    }

    pub fn system_stats_snapshot(&self) -> Option<Arc<SystemStats>> {
        self.system_stats.snapshot()
    }

    pub fn health_snapshot(&self) -> Option<Arc<HealthReport>> {
        self.health.snapshot()
    }

    /// Number of alerts currently mirrored (0 before the first fetch).
    pub fn alert_count(&self) -> usize {
        self.motion_alerts.snapshot().map_or(0, |a| a.len())
    }

    // ── Type-erased queries ──────────────────────────────────────────

    pub fn status(&self, kind: CollectionKind) -> CollectionStatus {
        match kind {
            CollectionKind::Devices => status_of(&self.devices),
            CollectionKind::Relays => status_of(&self.relays),
            CollectionKind::MotionSensors => status_of(&self.motion_sensors),
            CollectionKind::MotionAlerts => status_of(&self.motion_alerts),
            CollectionKind::SystemStats => status_of(&self.system_stats),
            CollectionKind::Health => status_of(&self.health),
        }
    }

    pub fn is_in_flight(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Devices => self.devices.is_in_flight(),
            CollectionKind::Relays => self.relays.is_in_flight(),
            CollectionKind::MotionSensors => self.motion_sensors.is_in_flight(),
            CollectionKind::MotionAlerts => self.motion_alerts.is_in_flight(),
            CollectionKind::SystemStats => self.system_stats.is_in_flight(),
            CollectionKind::Health => self.health.is_in_flight(),
        }
    }

    /// When the most recent push event was accepted.
    pub fn last_push_event(&self) -> Option<DateTime<Utc>> {
        *self.last_push_event.borrow()
    }

    pub fn subscribe_last_push_event(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_push_event.subscribe()
    }

    // ── Push ordering ────────────────────────────────────────────────

    /// Record a push event's ordering marker. Returns `false` when the
    /// event is not newer than the last accepted one for `kind`.
    ///
    /// Server sequence numbers win over timestamps. Equal timestamps are
    /// accepted since the server stamps with second resolution.
    pub(crate) fn accept_push(
        &self,
        kind: CollectionKind,
        seq: Option<u64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        let mut mark = self.push_marks.entry(kind).or_default();

        let newer = match (seq, mark.seq, timestamp, mark.timestamp) {
            (Some(seq), Some(last), _, _) => seq > last,
            (None, _, Some(ts), Some(last)) => ts >= last,
            _ => true,
        };
        if !newer {
            return false;
        }

        if seq.is_some() {
            mark.seq = seq;
        }
        if timestamp.is_some() {
            mark.timestamp = timestamp;
        }
        drop(mark);

        self.last_push_event.send_replace(Some(Utc::now()));
        true
    }

    /// Forget push ordering markers. A fresh connection may come from a
    /// restarted server whose counters started over.
    pub(crate) fn reset_push_marks(&self) {
        self.push_marks.clear();
    }
}

fn status_of<T: Send + Sync + 'static>(collection: &SyncedCollection<T>) -> CollectionStatus {
    let state = collection.state();
    CollectionStatus {
        kind: collection.kind(),
        phase: state.phase(),
        has_data: state.value().is_some(),
        updated_at: state.last_good().map(|s| s.fetched_at),
        error: state.error().map(CoreError::user_message),
        seq: collection.applied_seq(),
    }
}
