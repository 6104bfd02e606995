// ── Runtime sync configuration ──
//
// These types describe *where* the backend lives and *how often* each
// collection is refreshed. They never touch disk; the CLI builds a
// `SyncConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use iotdash_api::push::ReconnectConfig;

use crate::store::CollectionKind;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled web PKI roots.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed gateways).
    DangerAcceptInvalid,
}

// ── Poll intervals ───────────────────────────────────────────────────

/// Refresh cadence per collection. A zero duration disables polling for
/// that collection; it can still be refreshed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollIntervals {
    pub devices: Duration,
    pub relays: Duration,
    pub motion_sensors: Duration,
    pub motion_alerts: Duration,
    pub system_stats: Duration,
    pub health: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            devices: Duration::from_secs(10),
            relays: Duration::from_secs(5),
            motion_sensors: Duration::from_secs(10),
            motion_alerts: Duration::from_secs(2),
            system_stats: Duration::from_secs(5),
            health: Duration::from_secs(30),
        }
    }
}

impl PollIntervals {
    /// Every collection on demand only.
    pub fn disabled() -> Self {
        Self {
            devices: Duration::ZERO,
            relays: Duration::ZERO,
            motion_sensors: Duration::ZERO,
            motion_alerts: Duration::ZERO,
            system_stats: Duration::ZERO,
            health: Duration::ZERO,
        }
    }

    /// The configured period for `kind`, or `None` when polling is off.
    pub fn period(&self, kind: CollectionKind) -> Option<Duration> {
        let period = match kind {
            CollectionKind::Devices => self.devices,
            CollectionKind::Relays => self.relays,
            CollectionKind::MotionSensors => self.motion_sensors,
            CollectionKind::MotionAlerts => self.motion_alerts,
            CollectionKind::SystemStats => self.system_stats,
            CollectionKind::Health => self.health,
        };
        (!period.is_zero()).then_some(period)
    }
}

// ── Push channel ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PushSettings {
    /// Websocket endpoint, e.g. `ws://gateway:5000/ws`.
    pub url: Url,
    pub handshake_timeout: Duration,
    /// How long the channel may stay down before polling takes over
    /// the pushed collections again. Default: 5s.
    pub fallback_after: Duration,
    pub reconnect: ReconnectConfig,
}

impl PushSettings {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            handshake_timeout: Duration::from_secs(20),
            fallback_after: Duration::from_secs(5),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Derive the websocket URL from an HTTP base (`http` → `ws`,
    /// `https` → `wss`) with the given path.
    pub fn from_base_url(base: &Url, path: &str) -> Result<Self, url::ParseError> {
        let mut url = base.join(path)?;
        let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
        // set_scheme only fails between special and non-special schemes
        if url.set_scheme(scheme).is_err() {
            url = Url::parse(&format!(
                "{scheme}://{}",
                &url[url::Position::BeforeHost..]
            ))?;
        }
        Ok(Self::new(url))
    }
}

// ── SyncConfig ───────────────────────────────────────────────────────

/// Configuration for a [`SyncController`](crate::SyncController).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: Url,
    pub tls: TlsVerification,
    /// Per-request deadline.
    pub timeout: Duration,
    pub poll: PollIntervals,
    /// `None` disables the push channel; polling carries everything.
    pub push: Option<PushSettings>,
    /// Fetch every collection once when the controller starts.
    pub prefetch: bool,
}

impl SyncConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            tls: TlsVerification::default(),
            timeout: iotdash_api::transport::DEFAULT_TIMEOUT,
            poll: PollIntervals::default(),
            push: None,
            prefetch: true,
        }
    }

    pub fn with_push(mut self, push: PushSettings) -> Self {
        self.push = Some(push);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_periods_match_dashboard_cadence() {
        let poll = PollIntervals::default();
        assert_eq!(
            poll.period(CollectionKind::MotionAlerts),
            Some(Duration::from_secs(2))
        );
        assert_eq!(poll.period(CollectionKind::Health), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_period_disables_polling() {
        let poll = PollIntervals {
            relays: Duration::ZERO,
            ..PollIntervals::default()
        };
        assert_eq!(poll.period(CollectionKind::Relays), None);
        assert!(
            CollectionKind::ALL
                .iter()
                .all(|k| PollIntervals::disabled().period(*k).is_none())
        );
    }

    #[test]
    fn push_url_follows_base_scheme() {
        let base = Url::parse("https://gateway:5000/").unwrap();
        let push = PushSettings::from_base_url(&base, "ws").unwrap();
        assert_eq!(push.url.as_str(), "wss://gateway:5000/ws");
        assert_eq!(push.fallback_after, Duration::from_secs(5));

        let base = Url::parse("http://10.0.0.4:5000/").unwrap();
        let push = PushSettings::from_base_url(&base, "ws").unwrap();
        assert_eq!(push.url.as_str(), "ws://10.0.0.4:5000/ws");
    }
}
