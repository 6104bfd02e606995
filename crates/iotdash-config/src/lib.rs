//! Shared configuration for iotdash tools.
//!
//! TOML profiles under the platform config directory, loaded through
//! figment (defaults, then file, then `IOTDASH_` environment), and
//! translated into `iotdash_core::SyncConfig`. The CLI layers its flag
//! overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use iotdash_core::{PollIntervals, PushSettings, SyncConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request deadline, e.g. `"20s"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> String {
    "20s".into()
}

/// A named backend.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Profile {
    /// REST base URL, e.g. `"http://gateway.local:5000"`.
    pub url: String,

    /// Push channel: `true` derives `ws(s)://<host>/ws` from `url`, a
    /// string is used as the websocket URL verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PushOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Grace period before polling replaces a dropped push channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_fallback: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_handshake_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "PollProfile::is_empty")]
    pub poll: PollProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PushOption {
    Enabled(bool),
    Url(String),
}

/// Poll interval overrides; `"0s"` turns polling off for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PollProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relays: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_sensors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_alerts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

impl PollProfile {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Config {
    /// Resolve a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "iotdash", "iotdash").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("iotdash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore:
/// `IOTDASH_PROFILES__LAB__URL=http://10.0.0.2:5000`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("IOTDASH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to SyncConfig ───────────────────────────────────────

/// Parse a humantime duration such as `"5s"` or `"1m 30s"`.
pub fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{raw}': {e}"),
    })
}

fn override_duration(target: &mut Duration, field: &str, raw: Option<&String>) -> Result<(), ConfigError> {
    if let Some(raw) = raw {
        *target = parse_duration(field, raw)?;
    }
    Ok(())
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Build a `SyncConfig` from a profile, with no CLI overrides.
pub fn profile_to_sync_config(profile: &Profile, defaults: &Defaults) -> Result<SyncConfig, ConfigError> {
    let base_url = parse_url("url", &profile.url)?;
    let mut config = SyncConfig::new(base_url);

    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    config.timeout = parse_duration(
        "timeout",
        profile.timeout.as_deref().unwrap_or(&defaults.timeout),
    )?;

    config.poll = poll_intervals(&profile.poll)?;

    let push = match &profile.push {
        None | Some(PushOption::Enabled(false)) => None,
        Some(PushOption::Enabled(true)) => Some(
            PushSettings::from_base_url(&config.base_url, "/ws").map_err(|e| {
                ConfigError::Validation {
                    field: "push".into(),
                    reason: e.to_string(),
                }
            })?,
        ),
        Some(PushOption::Url(raw)) => Some(PushSettings::new(parse_url("push", raw)?)),
    };

    if let Some(mut push) = push {
        override_duration(
            &mut push.fallback_after,
            "push_fallback",
            profile.push_fallback.as_ref(),
        )?;
        override_duration(
            &mut push.handshake_timeout,
            "push_handshake_timeout",
            profile.push_handshake_timeout.as_ref(),
        )?;
        config.push = Some(push);
    }

    Ok(config)
}

fn poll_intervals(poll: &PollProfile) -> Result<PollIntervals, ConfigError> {
    let mut intervals = PollIntervals::default();
    override_duration(&mut intervals.devices, "poll.devices", poll.devices.as_ref())?;
    override_duration(&mut intervals.relays, "poll.relays", poll.relays.as_ref())?;
    override_duration(
        &mut intervals.motion_sensors,
        "poll.motion_sensors",
        poll.motion_sensors.as_ref(),
    )?;
    override_duration(
        &mut intervals.motion_alerts,
        "poll.motion_alerts",
        poll.motion_alerts.as_ref(),
    )?;
    override_duration(
        &mut intervals.system_stats,
        "poll.system_stats",
        poll.system_stats.as_ref(),
    )?;
    override_duration(&mut intervals.health, "poll.health", poll.health.as_ref())?;
    Ok(intervals)
}
