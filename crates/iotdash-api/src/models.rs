// Backend resource types
//
// Models for the dashboard backend's JSON API. The backend has grown across
// a central server and single-board agents, so fields use
// `#[serde(default)]` liberally and timestamps are parsed leniently.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ── ResourceId ───────────────────────────────────────────────────────

/// Identifier for any backend record.
///
/// The central server hands out integer primary keys while single-board
/// agents name their relays (`"relay1"`). Serialized untagged so either
/// form round-trips as the backend sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Numeric(u64),
    Named(String),
}

impl ResourceId {
    pub fn as_numeric(&self) -> Option<u64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Named(_) => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Named(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for ResourceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<u64> for ResourceId {
    fn from(n: u64) -> Self {
        Self::Numeric(n)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        match s.parse::<u64>() {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Named(s),
        }
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// A networked controller board registered with the central server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Server-side aggregate; never sent on writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_count: Option<u32>,
}

/// Body for `POST /api/devices` and `PUT /api/devices/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Device auth token from `GET /api/devices/{id}/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceToken {
    pub token: SecretString,
}

// ── Relay ────────────────────────────────────────────────────────────

/// A switchable output. `status` is owned by the hardware: a toggle is
/// only known to have happened once a re-fetch reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    pub id: ResourceId,
    #[serde(default)]
    pub device_id: Option<ResourceId>,
    pub name: String,
    #[serde(default)]
    pub gpio_pin: Option<u32>,
    #[serde(deserialize_with = "switch_state::deserialize")]
    pub status: bool,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Body for relay create and full update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_pin: Option<u32>,
    #[serde(default)]
    pub status: bool,
}

/// State-only update: `PUT /api/relays/{id}` with `{"status": bool}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatePayload {
    pub status: bool,
}

/// Action understood by the agent's `POST /api/relays/{id}`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RelayAction {
    On,
    Off,
}

impl From<bool> for RelayAction {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RelayInvoke {
    pub action: RelayAction,
}

// ── Motion sensors ───────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TriggerMode {
    #[default]
    Single,
    Repeat,
}

/// PIR sensor attached to a device, with optional monitoring schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSensor {
    pub id: ResourceId,
    #[serde(default)]
    pub device_id: Option<ResourceId>,
    pub name: String,
    #[serde(default)]
    pub gpio_pin: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub enable_scheduling: bool,
    #[serde(default, with = "clock_time")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time")]
    pub end_time: Option<NaiveTime>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub weekday_monitoring: bool,
    #[serde(default = "default_true")]
    pub weekend_monitoring: bool,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default = "default_delay_time")]
    pub delay_time: u32,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    #[serde(default)]
    pub motion_count: u64,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_motion_detected: Option<DateTime<Utc>>,
}

impl MotionSensor {
    pub fn schedule(&self) -> ScheduleWindow {
        ScheduleWindow {
            enabled: self.enable_scheduling,
            start: self.start_time,
            end: self.end_time,
            weekdays: self.weekday_monitoring,
            weekends: self.weekend_monitoring,
            // Unknown zone names fall back to the backend default
            tz: self.timezone.parse().unwrap_or(Tz::UTC),
        }
    }
}

/// Body for motion sensor create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSensorPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_pin: Option<u32>,
    pub is_active: bool,
    pub enable_scheduling: bool,
    #[serde(default, with = "clock_time")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time")]
    pub end_time: Option<NaiveTime>,
    pub timezone: String,
    pub weekday_monitoring: bool,
    pub weekend_monitoring: bool,
    pub sensitivity: Sensitivity,
    pub delay_time: u32,
    pub trigger_mode: TriggerMode,
}

impl Default for MotionSensorPayload {
    fn default() -> Self {
        Self {
            name: String::new(),
            gpio_pin: None,
            is_active: true,
            enable_scheduling: false,
            start_time: None,
            end_time: None,
            timezone: default_timezone(),
            weekday_monitoring: true,
            weekend_monitoring: true,
            sensitivity: Sensitivity::default(),
            delay_time: default_delay_time(),
            trigger_mode: TriggerMode::default(),
        }
    }
}

/// Monitoring window derived from a sensor's scheduling fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub enabled: bool,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub weekdays: bool,
    pub weekends: bool,
    /// Zone the start and end times are written in.
    pub tz: Tz,
}

impl ScheduleWindow {
    fn bounds(&self) -> (NaiveTime, NaiveTime) {
        let start = self.start.unwrap_or_default();
        let end = self
            .end
            .or_else(|| NaiveTime::from_hms_opt(23, 59, 59))
            .unwrap_or_default();
        (start, end)
    }

    /// Whether the sensor is armed at `time` on `day`.
    ///
    /// A window whose end precedes its start spans midnight.
    pub fn covers(&self, day: Weekday, time: NaiveTime) -> bool {
        if !self.enabled {
            return true;
        }
        let weekend = matches!(day, Weekday::Sat | Weekday::Sun);
        if (weekend && !self.weekends) || (!weekend && !self.weekdays) {
            return false;
        }
        let (start, end) = self.bounds();
        let time = time.with_nanosecond(0).unwrap_or(time);
        if start <= end {
            time >= start && time <= end
        } else {
            time >= start || time <= end
        }
    }

    /// Whether the sensor is armed at the given instant, read on the
    /// sensor's own wall clock.
    pub fn covers_at(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.tz);
        self.covers(local.weekday(), local.time())
    }

    /// `"Always Active"` or `"08:00 - 17:00 (Weekdays, Weekends)"`.
    pub fn summary(&self) -> String {
        if !self.enabled {
            return "Always Active".into();
        }
        let (start, end) = self.bounds();
        let mut days = Vec::with_capacity(2);
        if self.weekdays {
            days.push("Weekdays");
        }
        if self.weekends {
            days.push("Weekends");
        }
        let days = if days.is_empty() {
            "Never".to_owned()
        } else {
            days.join(", ")
        };
        format!("{} - {} ({days})", start.format("%H:%M"), end.format("%H:%M"))
    }
}

// ── Motion alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionAlert {
    pub id: ResourceId,
    pub message: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub motion_sensor_id: Option<ResourceId>,
    #[serde(default)]
    pub device_id: Option<ResourceId>,
}

// ── System stats ─────────────────────────────────────────────────────

/// Host statistics from `/api/system/stats`. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub network: NetworkStats,
    #[serde(default)]
    pub temperature: Option<Temperature>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub percent: f64,
    #[serde(default)]
    pub count: u32,
    /// Current clock in MHz, when the host reports it.
    #[serde(default)]
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
    pub used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    #[serde(default)]
    pub sensor: String,
    #[serde(default)]
    pub label: String,
    pub current: f64,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

// ── Backend metadata ─────────────────────────────────────────────────

/// Liveness report from `/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HealthReport {
    /// Backend up and, if it reports one, its database reachable.
    pub fn is_ok(&self) -> bool {
        let status_ok = matches!(self.status.as_str(), "ok" | "healthy" | "running");
        let db_ok = self.db.as_deref().is_none_or(|db| db == "ok");
        status_ok && db_ok
    }
}

/// Schema check from `/api/model_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub all_ok: bool,
    #[serde(default)]
    pub tables: BTreeMap<String, bool>,
}

/// Address the backend advertises to agents, from `/api/server_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub ip: String,
    pub port: u16,
}

// ── Serde helpers ────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_delay_time() -> u32 {
    3
}

/// Timestamps arrive as RFC 3339 or as naive ISO-8601 (Python's
/// `isoformat()`); naive values are taken as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}

/// `HH:MM` wall-clock times; `HH:MM:SS` is tolerated on input.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {s}"))),
        }
    }
}

/// Relay state as a bool, a `0`/`1` integer, or `"on"`/`"off"`.
mod switch_state {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn from_value(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_u64().map(|n| n != 0),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Some(true),
                "off" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid relay status: {value}")))
    }
}

pub(crate) use switch_state::from_value as switch_state_from_value;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resource_id_forms() {
        assert_eq!(ResourceId::from("42"), ResourceId::Numeric(42));
        assert_eq!(ResourceId::from("relay1"), ResourceId::Named("relay1".into()));
        let id: ResourceId = serde_json::from_str("7").unwrap();
        assert_eq!(id.to_string(), "7");
        let id: ResourceId = serde_json::from_str("\"relay2\"").unwrap();
        assert_eq!(id.as_numeric(), None);
    }

    #[test]
    fn device_defaults_and_naive_timestamp() {
        let device: Device = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Line-A",
            "last_seen": "2026-03-01T08:15:00.123456"
        }))
        .unwrap();
        assert!(device.is_active);
        assert_eq!(device.ip_address, None);
        assert_eq!(
            device.last_seen.unwrap().to_rfc3339(),
            "2026-03-01T08:15:00.123456+00:00"
        );
    }

    #[test]
    fn relay_status_accepts_strings() {
        let relay: Relay = serde_json::from_value(serde_json::json!({
            "id": 3, "device_id": 1, "name": "Conveyor", "gpio_pin": 17, "status": "on"
        }))
        .unwrap();
        assert!(relay.status);
        assert_eq!(relay.gpio_pin, Some(17));
    }

    #[test]
    fn motion_sensor_defaults() {
        let sensor: MotionSensor = serde_json::from_value(serde_json::json!({
            "id": 5, "device_id": 1, "name": "Dock door", "gpio_pin": 4
        }))
        .unwrap();
        assert_eq!(sensor.timezone, "UTC");
        assert_eq!(sensor.sensitivity, Sensitivity::Medium);
        assert_eq!(sensor.trigger_mode, TriggerMode::Single);
        assert_eq!(sensor.delay_time, 3);
        assert_eq!(sensor.schedule().summary(), "Always Active");
    }

    #[test]
    fn schedule_summary_and_overnight_window() {
        let window = ScheduleWindow {
            enabled: true,
            start: clock_time::parse("22:00"),
            end: clock_time::parse("06:00:00"),
            weekdays: true,
            weekends: false,
            tz: Tz::UTC,
        };
        assert_eq!(window.summary(), "22:00 - 06:00 (Weekdays)");
        let late = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert!(window.covers(Weekday::Tue, late));
        assert!(!window.covers(Weekday::Tue, noon));
        assert!(!window.covers(Weekday::Sat, late));
    }

    #[test]
    fn schedule_defaults_open_bounds() {
        let window = ScheduleWindow {
            enabled: true,
            start: None,
            end: None,
            weekdays: true,
            weekends: true,
            tz: Tz::UTC,
        };
        assert_eq!(window.summary(), "00:00 - 23:59 (Weekdays, Weekends)");
        let last_second = NaiveTime::from_hms_milli_opt(23, 59, 59, 400).unwrap();
        assert!(window.covers(Weekday::Sun, last_second));
    }

    #[test]
    fn schedule_is_read_in_sensor_timezone() {
        let sensor: MotionSensor = serde_json::from_value(serde_json::json!({
            "id": 6, "device_id": 1, "name": "Lobby", "gpio_pin": 4,
            "enable_scheduling": true, "start_time": "08:00", "end_time": "17:00",
            "timezone": "America/New_York",
            "weekday_monitoring": true, "weekend_monitoring": false
        }))
        .unwrap();
        let window = sensor.schedule();
        assert_eq!(window.tz, Tz::America__New_York);

        // Monday 15:00 in New York
        let afternoon = "2026-03-02T20:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(window.covers_at(afternoon));
        // Monday 07:30 in New York, already 12:30 in UTC
        let early = "2026-03-02T12:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!window.covers_at(early));
        // Saturday 01:00 UTC is still Friday evening in New York, after hours
        let friday_night = "2026-03-07T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!window.covers_at(friday_night));
    }

    #[test]
    fn unknown_timezone_reads_as_utc() {
        let sensor: MotionSensor = serde_json::from_value(serde_json::json!({
            "id": 7, "device_id": 1, "name": "Shed", "timezone": "Mars/Olympus"
        }))
        .unwrap();
        assert_eq!(sensor.schedule().tz, Tz::UTC);
    }

    #[test]
    fn clock_time_serializes_minutes() {
        let payload = MotionSensorPayload {
            name: "Bay".into(),
            start_time: clock_time::parse("08:00"),
            ..MotionSensorPayload::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["start_time"], "08:00");
        assert_eq!(json["end_time"], serde_json::Value::Null);
        assert_eq!(json["sensitivity"], "medium");
    }

    #[test]
    fn system_stats_without_temperature() {
        let stats: SystemStats = serde_json::from_value(serde_json::json!({
            "cpu": {"percent": 12.5, "count": 4, "frequency": null},
            "memory": {"total": 4_000_000_000_u64, "available": 1_000_000_000_u64, "percent": 75.0, "used": 3_000_000_000_u64},
            "disk": {"total": 100, "used": 40, "free": 60, "percent": 40.0},
            "network": {"bytes_sent": 10, "bytes_recv": 20},
            "temperature": null,
            "timestamp": "2026-03-01T08:15:00"
        }))
        .unwrap();
        assert!(stats.temperature.is_none());
        assert_eq!(stats.cpu.count, 4);
    }

    #[test]
    fn health_report_status() {
        let ok: HealthReport =
            serde_json::from_value(serde_json::json!({"status": "ok", "db": "ok"})).unwrap();
        assert!(ok.is_ok());
        let degraded: HealthReport =
            serde_json::from_value(serde_json::json!({"status": "ok", "db": "error"})).unwrap();
        assert!(!degraded.is_ok());
        let agent: HealthReport = serde_json::from_value(
            serde_json::json!({"status": "healthy", "timestamp": "2026-03-01T08:15:00"}),
        )
        .unwrap();
        assert!(agent.is_ok());
    }

    #[test]
    fn relay_action_parses_case_insensitively() {
        assert_eq!("ON".parse::<RelayAction>().unwrap(), RelayAction::On);
        assert_eq!(RelayAction::from(false).to_string(), "off");
    }
}
