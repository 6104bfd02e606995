// ── View-model projection ──
//
// Pure functions from store snapshots to display-ready records, plus a
// `Projector` that memoizes each view on the identity of its input
// snapshots. Nothing here touches the network.

pub mod format;

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;

use iotdash_api::models::{
    Device, MotionSensor, Relay, ResourceId, ScheduleWindow, Sensitivity, SystemStats, TriggerMode,
};

use crate::controller::ConnectionState;
use crate::error::CoreError;
use crate::store::{CollectionPhase, CollectionState};

use self::format::{fmt_bytes, fmt_frequency, fmt_percent};

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCard {
    pub id: ResourceId,
    pub name: String,
    pub ip_address: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub status_label: &'static str,
    pub last_seen: Option<DateTime<Utc>>,
    pub relay_count: usize,
    pub sensor_count: usize,
}

/// Call to action shown instead of an empty grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyState {
    pub title: &'static str,
    pub action: &'static str,
}

pub const NO_DEVICES: EmptyState = EmptyState {
    title: "No devices registered",
    action: "Add First Device",
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceListView {
    pub cards: Vec<DeviceCard>,
    pub empty: Option<EmptyState>,
}

/// Build device cards. Counts come from the device record when the
/// backend supplies them, otherwise from the relay and sensor snapshots.
pub fn device_list(
    devices: &[Device],
    relays: Option<&[Relay]>,
    sensors: Option<&[MotionSensor]>,
) -> DeviceListView {
    let cards: Vec<DeviceCard> = devices
        .iter()
        .map(|d| {
            let owned_by = |owner: Option<&ResourceId>| owner == Some(&d.id);
            let relay_count = d.relay_count.map_or_else(
                || relays.map_or(0, |r| r.iter().filter(|x| owned_by(x.device_id.as_ref())).count()),
                |n| usize::try_from(n).unwrap_or(usize::MAX),
            );
            let sensor_count = d.sensor_count.map_or_else(
                || sensors.map_or(0, |s| s.iter().filter(|x| owned_by(x.device_id.as_ref())).count()),
                |n| usize::try_from(n).unwrap_or(usize::MAX),
            );
            DeviceCard {
                id: d.id.clone(),
                name: d.name.clone(),
                ip_address: d.ip_address.clone().filter(|ip| !ip.is_empty()),
                description: d.description.clone().filter(|s| !s.is_empty()),
                active: d.is_active,
                status_label: if d.is_active { "Active" } else { "Inactive" },
                last_seen: d.last_seen,
                relay_count,
                sensor_count,
            }
        })
        .collect();

    let empty = cards.is_empty().then_some(NO_DEVICES);
    DeviceListView { cards, empty }
}

// ── Relays ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayCard {
    pub id: ResourceId,
    pub name: String,
    pub device_id: Option<ResourceId>,
    pub gpio_pin: Option<u32>,
    pub on: bool,
    pub state_label: &'static str,
    /// Label for the button that flips the relay.
    pub toggle_label: &'static str,
}

/// Relay cards sorted by id.
pub fn relay_cards(relays: &[Relay]) -> Vec<RelayCard> {
    let mut cards: Vec<RelayCard> = relays
        .iter()
        .map(|r| RelayCard {
            id: r.id.clone(),
            name: r.name.clone(),
            device_id: r.device_id.clone(),
            gpio_pin: r.gpio_pin,
            on: r.status,
            state_label: if r.status { "ON" } else { "OFF" },
            toggle_label: if r.status { "Turn Off" } else { "Turn On" },
        })
        .collect();
    cards.sort_by(|a, b| a.id.cmp(&b.id));
    cards
}

/// Cards for an agent that only reports `{relay_id: on}`. The id doubles
/// as the name.
pub fn relay_cards_from_states(states: &BTreeMap<ResourceId, bool>) -> Vec<RelayCard> {
    let relays: Vec<Relay> = states
        .iter()
        .map(|(id, on)| Relay {
            id: id.clone(),
            device_id: None,
            name: id.to_string(),
            gpio_pin: None,
            status: *on,
            last_update: None,
        })
        .collect();
    relay_cards(&relays)
}

/// The relay collection as an id → on/off map.
pub fn relay_states(relays: &[Relay]) -> BTreeMap<ResourceId, bool> {
    relays.iter().map(|r| (r.id.clone(), r.status)).collect()
}

// ── Motion sensors ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionSensorCard {
    pub id: ResourceId,
    pub name: String,
    pub device_id: Option<ResourceId>,
    pub gpio_pin: Option<u32>,
    pub active: bool,
    pub status_label: &'static str,
    #[serde(skip)]
    pub schedule: ScheduleWindow,
    pub schedule_label: String,
    pub sensitivity: Sensitivity,
    pub trigger_mode: TriggerMode,
    pub delay_label: String,
    pub motion_count: u64,
    pub last_motion: Option<DateTime<Utc>>,
}

impl MotionSensorCard {
    /// Active and inside its monitoring window at `now`.
    pub fn armed_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.schedule.covers_at(now)
    }
}

pub fn motion_sensor_cards(sensors: &[MotionSensor]) -> Vec<MotionSensorCard> {
    sensors
        .iter()
        .map(|s| {
            let schedule = s.schedule();
            MotionSensorCard {
                id: s.id.clone(),
                name: s.name.clone(),
                device_id: s.device_id.clone(),
                gpio_pin: s.gpio_pin,
                active: s.is_active,
                status_label: if s.is_active { "Active" } else { "Inactive" },
                schedule_label: schedule.summary(),
                schedule,
                sensitivity: s.sensitivity,
                trigger_mode: s.trigger_mode,
                delay_label: format!("{}s", s.delay_time),
                motion_count: s.motion_count,
                last_motion: s.last_motion_detected,
            }
        })
        .collect()
}

// ── Alerts ───────────────────────────────────────────────────────────

/// Badge text for the alert counter. `None` hides the badge.
pub fn alert_badge(count: usize) -> Option<String> {
    match count {
        0 => None,
        1..=99 => Some(count.to_string()),
        _ => Some("99+".into()),
    }
}

// ── System stats ─────────────────────────────────────────────────────

/// Load band used to colour a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoadLevel {
    Low,
    Moderate,
    High,
}

impl LoadLevel {
    pub fn for_percent(percent: f64) -> Self {
        if percent < 50.0 {
            Self::Low
        } else if percent < 80.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    /// Clamped to 0..=100.
    pub percent: f64,
    pub label: String,
    pub detail: String,
    pub level: LoadLevel,
}

impl Gauge {
    fn new(percent: f64, detail: String) -> Self {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        Self {
            percent,
            label: fmt_percent(percent),
            detail,
            level: LoadLevel::for_percent(percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureView {
    pub value: String,
    pub sensor: String,
    pub level: LoadLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsView {
    pub cpu: Gauge,
    pub memory: Gauge,
    pub disk: Gauge,
    pub network_sent: String,
    pub network_recv: String,
    pub temperature: Option<TemperatureView>,
    pub updated_at: DateTime<Utc>,
}

pub fn stats_view(stats: &SystemStats) -> StatsView {
    let cpu_detail = match stats.cpu.frequency {
        Some(mhz) if mhz > 0.0 => format!("Cores: {} @ {}", stats.cpu.count, fmt_frequency(mhz)),
        _ => format!("Cores: {}", stats.cpu.count),
    };

    let temperature = stats.temperature.as_ref().map(|t| {
        let level = match (t.critical, t.high) {
            (Some(critical), _) if t.current >= critical => LoadLevel::High,
            (_, Some(high)) if t.current >= high => LoadLevel::Moderate,
            _ => LoadLevel::Low,
        };
        let sensor = if t.label.is_empty() {
            t.sensor.clone()
        } else {
            format!("{} {}", t.sensor, t.label).trim().to_owned()
        };
        TemperatureView {
            value: format!("{:.1}°C", t.current),
            sensor,
            level,
        }
    });

    StatsView {
        cpu: Gauge::new(stats.cpu.percent, cpu_detail),
        memory: Gauge::new(
            stats.memory.percent,
            format!(
                "Used: {} of {}",
                fmt_bytes(stats.memory.used),
                fmt_bytes(stats.memory.total)
            ),
        ),
        disk: Gauge::new(
            stats.disk.percent,
            format!(
                "Used: {} of {}",
                fmt_bytes(stats.disk.used),
                fmt_bytes(stats.disk.total)
            ),
        ),
        network_sent: fmt_bytes(stats.network.bytes_sent),
        network_recv: fmt_bytes(stats.network.bytes_recv),
        temperature,
        updated_at: stats.timestamp,
    }
}

// ── Connection indicator ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IndicatorTone {
    Good,
    Degraded,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionIndicator {
    pub label: &'static str,
    pub tone: IndicatorTone,
    /// Pushed collections arrive in real time.
    pub live: bool,
}

/// Summarize both channels for the header badge.
///
/// `push` is `None` when no push channel is configured.
pub fn connection_indicator(
    poll: ConnectionState,
    push: Option<ConnectionState>,
) -> ConnectionIndicator {
    match (push, poll) {
        (Some(ConnectionState::Connected), _) => ConnectionIndicator {
            label: "Live",
            tone: IndicatorTone::Good,
            live: true,
        },
        (_, ConnectionState::Disconnected) => ConnectionIndicator {
            label: "Offline",
            tone: IndicatorTone::Down,
            live: false,
        },
        (_, ConnectionState::Connecting) => ConnectionIndicator {
            label: "Connecting",
            tone: IndicatorTone::Degraded,
            live: false,
        },
        (Some(_), ConnectionState::Connected) => ConnectionIndicator {
            label: "Polling",
            tone: IndicatorTone::Degraded,
            live: false,
        },
        (None, ConnectionState::Connected) => ConnectionIndicator {
            label: "Connected",
            tone: IndicatorTone::Good,
            live: false,
        },
    }
}

// ── Collection status ────────────────────────────────────────────────

/// Whether a view should show a spinner, an error banner or data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadStatus {
    pub phase: CollectionPhase,
    /// Showing last good data under an error.
    pub stale: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn load_status<T>(state: &CollectionState<T>) -> LoadStatus {
    LoadStatus {
        phase: state.phase(),
        stale: state.is_stale(),
        error: state.error().map(CoreError::user_message),
        updated_at: state.last_good().map(|s| s.fetched_at),
    }
}

// ── Projector ────────────────────────────────────────────────────────

/// Inputs compared by snapshot identity.
trait SameInputs {
    fn same_as(&self, other: &Self) -> bool;
}

impl<T> SameInputs for Arc<T> {
    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T> SameInputs for Option<Arc<T>> {
    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<A: SameInputs, B: SameInputs, C: SameInputs> SameInputs for (A, B, C) {
    fn same_as(&self, other: &Self) -> bool {
        self.0.same_as(&other.0) && self.1.same_as(&other.1) && self.2.same_as(&other.2)
    }
}

struct Memo<I, O> {
    inputs: I,
    output: Arc<O>,
}

type DeviceInputs = (
    Arc<Vec<Device>>,
    Option<Arc<Vec<Relay>>>,
    Option<Arc<Vec<MotionSensor>>>,
);

fn memoized<I: SameInputs, O>(
    slot: &ArcSwapOption<Memo<I, O>>,
    inputs: I,
    compute: impl FnOnce(&I) -> O,
) -> Arc<O> {
    let current = slot.load();
    if let Some(memo) = current.as_ref().filter(|m| m.inputs.same_as(&inputs)) {
        return Arc::clone(&memo.output);
    }
    let output = Arc::new(compute(&inputs));
    slot.store(Some(Arc::new(Memo {
        inputs,
        output: Arc::clone(&output),
    })));
    output
}

/// Memoizing front end for the projection functions.
///
/// Each view is recomputed only when one of its input snapshots is a
/// different `Arc` from last time, so an unchanged collection costs a
/// pointer comparison per render.
#[derive(Default)]
pub struct Projector {
    devices: ArcSwapOption<Memo<DeviceInputs, DeviceListView>>,
    relays: ArcSwapOption<Memo<Arc<Vec<Relay>>, Vec<RelayCard>>>,
    sensors: ArcSwapOption<Memo<Arc<Vec<MotionSensor>>, Vec<MotionSensorCard>>>,
    stats: ArcSwapOption<Memo<Arc<SystemStats>, StatsView>>,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(
        &self,
        devices: &Arc<Vec<Device>>,
        relays: Option<&Arc<Vec<Relay>>>,
        sensors: Option<&Arc<Vec<MotionSensor>>>,
    ) -> Arc<DeviceListView> {
        let inputs = (Arc::clone(devices), relays.cloned(), sensors.cloned());
        memoized(&self.devices, inputs, |(d, r, s)| {
            device_list(d, r.as_deref().map(Vec::as_slice), s.as_deref().map(Vec::as_slice))
        })
    }

    pub fn relays(&self, relays: &Arc<Vec<Relay>>) -> Arc<Vec<RelayCard>> {
        memoized(&self.relays, Arc::clone(relays), |r| relay_cards(r))
    }

    pub fn motion_sensors(&self, sensors: &Arc<Vec<MotionSensor>>) -> Arc<Vec<MotionSensorCard>> {
        memoized(&self.sensors, Arc::clone(sensors), |s| motion_sensor_cards(s))
    }

    pub fn stats(&self, stats: &Arc<SystemStats>) -> Arc<StatsView> {
        memoized(&self.stats, Arc::clone(stats), |s| stats_view(s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn relays() -> Vec<Relay> {
        serde_json::from_value(json!([
            {"id": 3, "device_id": 1, "name": "Pump", "gpio_pin": 22, "status": false},
            {"id": 1, "device_id": 1, "name": "Fan", "gpio_pin": 17, "status": true},
            {"id": 2, "device_id": 2, "name": "Light", "status": "off"}
        ]))
        .unwrap()
    }

    fn devices() -> Vec<Device> {
        serde_json::from_value(json!([
            {"id": 1, "name": "Line-A", "ip_address": "10.0.0.4", "is_active": true},
            {"id": 2, "name": "Press", "ip_address": "", "is_active": false, "relay_count": 5}
        ]))
        .unwrap()
    }

    fn stats() -> SystemStats {
        serde_json::from_value(json!({
            "cpu": {"percent": 12.5, "count": 4, "frequency": 1500.0},
            "memory": {"total": 1024, "available": 512, "percent": 50.0, "used": 512},
            "disk": {"total": 100, "used": 95, "free": 5, "percent": 95.0},
            "network": {"bytes_sent": 10, "bytes_recv": 20},
            "temperature": {"sensor": "cpu_thermal", "current": 71.3, "high": 70.0, "critical": 85.0},
            "timestamp": "2026-03-01T08:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn empty_device_list_offers_first_device() {
        let view = device_list(&[], None, None);
        assert!(view.cards.is_empty());
        assert_eq!(view.empty.unwrap().action, "Add First Device");
    }

    #[test]
    fn device_counts_fall_back_to_snapshots() {
        let relays = relays();
        let view = device_list(&devices(), Some(&relays), None);
        assert_eq!(view.empty, None);

        let line_a = &view.cards[0];
        assert_eq!(line_a.relay_count, 2);
        assert_eq!(line_a.sensor_count, 0);
        assert_eq!(line_a.status_label, "Active");

        let press = &view.cards[1];
        assert_eq!(press.relay_count, 5);
        assert_eq!(press.ip_address, None);
        assert_eq!(press.status_label, "Inactive");
    }

    #[test]
    fn relay_cards_sorted_with_labels() {
        let cards = relay_cards(&relays());
        let ids: Vec<String> = cards.iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(cards[0].state_label, "ON");
        assert_eq!(cards[0].toggle_label, "Turn Off");
        assert_eq!(cards[1].toggle_label, "Turn On");

        let states = relay_states(&relays());
        assert_eq!(states.get(&ResourceId::from(1)), Some(&true));
    }

    #[test]
    fn agent_state_map_becomes_cards() {
        let states = BTreeMap::from([
            (ResourceId::from("relay2"), false),
            (ResourceId::from("relay1"), true),
        ]);
        let cards = relay_cards_from_states(&states);
        assert_eq!(cards[0].name, "relay1");
        assert_eq!(cards[0].state_label, "ON");
        assert_eq!(cards[1].toggle_label, "Turn On");
        assert_eq!(cards[1].device_id, None);
    }

    #[test]
    fn badge_caps_at_99() {
        assert_eq!(alert_badge(0), None);
        assert_eq!(alert_badge(7).as_deref(), Some("7"));
        assert_eq!(alert_badge(99).as_deref(), Some("99"));
        assert_eq!(alert_badge(100).as_deref(), Some("99+"));
    }

    #[test]
    fn stats_gauges_and_temperature() {
        let view = stats_view(&stats());
        assert_eq!(view.cpu.label, "12.5%");
        assert_eq!(view.cpu.detail, "Cores: 4 @ 1.50 GHz");
        assert_eq!(view.cpu.level, LoadLevel::Low);
        assert_eq!(view.memory.level, LoadLevel::Moderate);
        assert_eq!(view.disk.level, LoadLevel::High);
        assert_eq!(view.network_sent, "10 B");

        let temp = view.temperature.unwrap();
        assert_eq!(temp.value, "71.3°C");
        assert_eq!(temp.level, LoadLevel::Moderate);
    }

    #[test]
    fn sensor_cards_describe_schedule() {
        let sensors: Vec<MotionSensor> = serde_json::from_value(json!([{
            "id": 4, "device_id": 1, "name": "Dock door", "gpio_pin": 5,
            "enable_scheduling": true, "start_time": "22:00", "end_time": "06:00",
            "weekday_monitoring": true, "weekend_monitoring": false
        }]))
        .unwrap();
        let cards = motion_sensor_cards(&sensors);
        let card = &cards[0];
        assert_eq!(card.schedule_label, "22:00 - 06:00 (Weekdays)");
        assert_eq!(card.delay_label, "3s");

        // Tuesday 23:30 is inside the overnight window, Saturday is not
        let tuesday = "2026-03-03T23:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let saturday = "2026-03-07T23:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(card.armed_at(tuesday));
        assert!(!card.armed_at(saturday));
    }

    #[test]
    fn armed_follows_sensor_local_time() {
        let sensors: Vec<MotionSensor> = serde_json::from_value(json!([{
            "id": 8, "device_id": 1, "name": "Front desk",
            "enable_scheduling": true, "start_time": "08:00", "end_time": "17:00",
            "timezone": "America/New_York",
            "weekday_monitoring": true, "weekend_monitoring": false
        }]))
        .unwrap();
        let card = &motion_sensor_cards(&sensors)[0];

        // 20:00 UTC on a Monday is mid-afternoon in New York
        let monday = "2026-03-02T20:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(card.armed_at(monday));
        let after_close = "2026-03-02T23:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!card.armed_at(after_close));
    }

    #[test]
    fn indicator_prefers_push() {
        let live = connection_indicator(ConnectionState::Disconnected, Some(ConnectionState::Connected));
        assert_eq!(live.label, "Live");
        assert!(live.live);

        let fallback = connection_indicator(ConnectionState::Connected, Some(ConnectionState::Connecting));
        assert_eq!(fallback.label, "Polling");

        let offline = connection_indicator(ConnectionState::Disconnected, None);
        assert_eq!(offline.tone, IndicatorTone::Down);

        let plain = connection_indicator(ConnectionState::Connected, None);
        assert_eq!(plain.label, "Connected");
    }

    #[test]
    fn projector_reuses_output_for_same_snapshot() {
        let projector = Projector::new();
        let relays = Arc::new(relays());

        let first = projector.relays(&relays);
        let second = projector.relays(&relays);
        assert!(Arc::ptr_eq(&first, &second));

        let replaced = Arc::new(relays.as_ref().clone());
        let third = projector.relays(&replaced);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }

    #[test]
    fn device_view_recomputes_when_any_input_changes() {
        let projector = Projector::new();
        let devices = Arc::new(devices());
        let relays_a = Arc::new(relays());

        let first = projector.devices(&devices, Some(&relays_a), None);
        assert!(Arc::ptr_eq(
            &first,
            &projector.devices(&devices, Some(&relays_a), None)
        ));

        let relays_b = Arc::new(Vec::new());
        let second = projector.devices(&devices, Some(&relays_b), None);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.cards[0].relay_count, 0);
    }

    #[test]
    fn load_status_flags_stale_data() {
        let state: CollectionState<Vec<u8>> = CollectionState::Uninitialized;
        let status = load_status(&state);
        assert_eq!(status.phase, CollectionPhase::Uninitialized);
        assert!(!status.stale);
    }
}
