//! Push channel with auto-reconnect.
//!
//! Connects to the backend's websocket endpoint, asks for the collections
//! it wants after every handshake, and streams parsed updates through a
//! [`tokio::sync::broadcast`] channel. Connection state is published on a
//! [`tokio::sync::watch`] channel so consumers can fall back to polling.
//!
//! Frames are JSON text:
//!
//! ```json
//! {"event": "relays_update", "data": [...], "seq": 42, "timestamp": "..."}
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use iotdash_api::push::{PushConfig, PushHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = url::Url::parse("ws://gateway:5000/ws")?;
//! let handle = PushHandle::connect(url, PushConfig::default(), CancellationToken::new());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: seq {:?}", event.topic, event.seq);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::timestamp;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Topics and requests ──────────────────────────────────────────────

/// Collections the backend pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum PushTopic {
    #[strum(serialize = "devices_update")]
    Devices,
    #[strum(serialize = "relays_update")]
    Relays,
    #[strum(serialize = "system_stats_update")]
    SystemStats,
}

impl PushTopic {
    pub const ALL: [Self; 3] = [Self::Devices, Self::Relays, Self::SystemStats];

    /// The request that makes the server send this topic.
    pub fn request(self) -> PushRequest {
        match self {
            Self::Devices => PushRequest::Devices,
            Self::Relays => PushRequest::Relays,
            Self::SystemStats => PushRequest::SystemStats,
        }
    }
}

/// Client-to-server messages asking for a fresh copy of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum PushRequest {
    #[serde(rename = "request_devices")]
    #[strum(serialize = "request_devices")]
    Devices,
    #[serde(rename = "request_relays")]
    #[strum(serialize = "request_relays")]
    Relays,
    #[serde(rename = "request_system_stats")]
    #[strum(serialize = "request_system_stats")]
    SystemStats,
}

#[derive(Serialize)]
struct RequestFrame {
    event: PushRequest,
}

// ── PushEvent ────────────────────────────────────────────────────────

/// One update received over the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub topic: PushTopic,
    /// Collection body, in the same shapes the REST list endpoints use.
    pub data: Option<serde_json::Value>,
    /// Server-side sequence number, when the server provides one.
    pub seq: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Server-reported failure to produce the collection.
    pub error: Option<String>,
}

// ── Connection state ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PushState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

// ── Configuration ────────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Deadline for the websocket handshake. Default: 20s.
    pub handshake_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// Requests sent after every successful handshake.
    pub subscriptions: Vec<PushRequest>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(20),
            reconnect: ReconnectConfig::default(),
            subscriptions: PushTopic::ALL.iter().map(|t| t.request()).collect(),
        }
    }
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push channel.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct PushHandle {
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    state_rx: watch::Receiver<PushState>,
    request_tx: mpsc::UnboundedSender<PushRequest>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Spawn the connect/reconnect loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; watch
    /// [`state`](Self::state) to see when it succeeds.
    pub fn connect(url: Url, config: PushConfig, cancel: CancellationToken) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(PushState::Disconnected);
        let (request_tx, request_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        let task_events = event_tx.clone();
        let task = tokio::spawn(async move {
            push_loop(url, task_events, state_tx, request_rx, config, task_cancel).await;
        });

        Self {
            event_tx,
            state_rx,
            request_tx,
            cancel,
            task,
        }
    }

    /// Get a new receiver for pushed updates.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.event_tx.subscribe()
    }

    /// Connection state, updated as the loop connects and drops.
    pub fn state(&self) -> watch::Receiver<PushState> {
        self.state_rx.clone()
    }

    /// Ask the server for a collection on the live connection.
    ///
    /// Requests issued while disconnected are sent after the next
    /// handshake. Returns `false` once the channel has shut down.
    pub fn request(&self, request: PushRequest) -> bool {
        self.request_tx.send(request).is_ok()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shut down and wait for the background task to finish.
    pub async fn join(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on drop, backoff → reconnect.
async fn push_loop(
    url: Url,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    state_tx: watch::Sender<PushState>,
    mut request_rx: mpsc::UnboundedReceiver<PushRequest>,
    config: PushConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    while !cancel.is_cancelled() {
        let result =
            connect_and_read(&url, &event_tx, &state_tx, &mut request_rx, &config, &cancel).await;
        state_tx.send_replace(PushState::Disconnected);

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => {
                tracing::info!("push channel closed, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "push channel error");

                if let Some(max) = config.reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "push channel reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
                attempt = attempt.saturating_add(1);
            }
        }

        let delay = calculate_backoff(attempt.saturating_sub(1), &config.reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    state_tx.send_replace(PushState::Disconnected);
    tracing::debug!("push loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one websocket connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    state_tx: &watch::Sender<PushState>,
    request_rx: &mut mpsc::UnboundedReceiver<PushRequest>,
    config: &PushConfig,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting push channel");
    state_tx.send_replace(PushState::Connecting);

    let handshake = tokio_tungstenite::connect_async(url.as_str());
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = tokio::time::timeout(config.handshake_timeout, handshake) => match result {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(Error::PushConnect(e.to_string())),
            Err(_) => {
                return Err(Error::PushHandshakeTimeout {
                    timeout_secs: config.handshake_timeout.as_secs(),
                });
            }
        },
    };

    tracing::info!("push channel connected");
    state_tx.send_replace(PushState::Connected);

    let (mut write, mut read) = ws_stream.split();

    for request in &config.subscriptions {
        write
            .send(request_message(*request)?)
            .await
            .map_err(|e| Error::PushConnect(e.to_string()))?;
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            Some(request) = request_rx.recv() => {
                tracing::debug!(%request, "sending push request");
                write
                    .send(request_message(request)?)
                    .await
                    .map_err(|e| Error::PushConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        parse_and_broadcast(text.as_str(), event_tx);
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong; it goes out on the next write
                        tracing::trace!("push channel ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if cf.code != CloseCode::Normal => Err(Error::PushClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.as_str().to_owned(),
                            }),
                            _ => {
                                tracing::info!("push channel close frame received");
                                Ok(())
                            }
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::PushConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("push channel stream ended");
                        return Ok(());
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, raw Frame
                    }
                }
            }
        }
    }
}

fn request_message(request: PushRequest) -> Result<Message, Error> {
    let text = serde_json::to_string(&RequestFrame { event: request }).map_err(|e| {
        Error::PushConnect(format!("failed to encode {request}: {e}"))
    })?;
    Ok(Message::text(text))
}

// ── Frame parsing ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    seq: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Parse a text frame into a [`PushEvent`]. Unknown events are `None`.
fn parse_frame(text: &str) -> Option<PushEvent> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse push frame");
            return None;
        }
    };

    let Ok(topic) = frame.event.parse::<PushTopic>() else {
        tracing::debug!(event = %frame.event, "ignoring unknown push event");
        return None;
    };

    Some(PushEvent {
        topic,
        data: frame.data,
        seq: frame.seq,
        timestamp: frame.timestamp.as_deref().and_then(timestamp::parse),
        error: frame.error,
    })
}

fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<PushEvent>>) {
    if let Some(event) = parse_frame(text) {
        // No subscribers right now is fine
        let _ = event_tx.send(Arc::new(event));
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_push_config() {
        let config = PushConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(20));
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert!(config.reconnect.max_retries.is_none());
        assert_eq!(config.subscriptions.len(), 3);
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d = calculate_backoff(u32::MAX, &config);
        assert!(
            d <= Duration::from_millis(12_500),
            "delay ({d:?}) should stay within jitter of max_delay"
        );
    }

    #[test]
    fn request_frames_use_event_names() {
        let Message::Text(text) = request_message(PushRequest::SystemStats).unwrap() else {
            panic!("expected a text frame");
        };
        assert_eq!(text.as_str(), r#"{"event":"request_system_stats"}"#);
    }

    #[test]
    fn parse_relay_update() {
        let raw = serde_json::json!({
            "event": "relays_update",
            "data": [{"id": 1, "name": "Fan", "status": true}],
            "seq": 7,
            "timestamp": "2026-03-01T08:00:00"
        });

        let event = parse_frame(&raw.to_string()).unwrap();
        assert_eq!(event.topic, PushTopic::Relays);
        assert_eq!(event.seq, Some(7));
        assert!(event.timestamp.is_some());
        assert!(event.error.is_none());
    }

    #[test]
    fn parse_error_event() {
        let raw = r#"{"event": "system_stats_update", "error": "sensor bus offline"}"#;
        let event = parse_frame(raw).unwrap();
        assert_eq!(event.topic, PushTopic::SystemStats);
        assert_eq!(event.error.as_deref(), Some("sensor bus offline"));
        assert!(event.data.is_none());
    }

    #[test]
    fn unknown_event_is_skipped() {
        let (tx, mut rx) = broadcast::channel::<Arc<PushEvent>>(4);
        parse_and_broadcast(r#"{"event": "connected", "data": {}}"#, &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let (tx, mut rx) = broadcast::channel::<Arc<PushEvent>>(4);
        parse_and_broadcast("not json at all", &tx);
        assert!(rx.try_recv().is_err());
    }
}
