// ── Sync controller ──
//
// Full lifecycle for one dashboard backend: initial fetch, periodic
// polling, the optional push channel, and mutation routing with
// reconciliation through the SyncStore.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::{BoxFuture, join_all};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use iotdash_api::models::{Device, HealthReport, MotionAlert, MotionSensor, Relay, SystemStats};
use iotdash_api::push::{PushConfig, PushHandle, PushState};
use iotdash_api::transport::{TlsMode, TransportConfig};
use iotdash_api::ApiClient;

use crate::command::{Mutation, MutationEnvelope, MutationResult};
use crate::config::{SyncConfig, TlsVerification};
use crate::error::CoreError;
use crate::push::push_bridge_task;
use crate::scheduler::{PollScheduler, RefreshTarget};
use crate::store::{ApplyOutcome, CollectionKind, SyncStore, SyncedCollection};
use crate::stream::CollectionStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Health of one channel (polling or push) as consumers see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl From<PushState> for ConnectionState {
    fn from(state: PushState) -> Self {
        match state {
            PushState::Disconnected => Self::Disconnected,
            PushState::Connecting => Self::Connecting,
            PushState::Connected => Self::Connected,
        }
    }
}

// ── Refresher ────────────────────────────────────────────────────

/// Fetches collections and installs them in the store.
///
/// Shared by the poll scheduler, the command processor and on-demand
/// refreshes.
#[derive(Clone)]
pub(crate) struct Refresher {
    client: ApiClient,
    store: Arc<SyncStore>,
    poll_state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
}

impl Refresher {
    pub(crate) async fn fetch(&self, kind: CollectionKind) -> Result<ApplyOutcome, CoreError> {
        let store = &self.store;
        let client = &self.client;
        match kind {
            CollectionKind::Devices => self.fetch_into(&store.devices, client.list_devices()).await,
            CollectionKind::Relays => self.fetch_into(&store.relays, client.list_relays()).await,
            CollectionKind::MotionSensors => {
                self.fetch_into(&store.motion_sensors, client.list_motion_sensors())
                    .await
            }
            CollectionKind::MotionAlerts => {
                self.fetch_into(&store.motion_alerts, client.list_motion_alerts())
                    .await
            }
            CollectionKind::SystemStats => {
                self.fetch_into(&store.system_stats, client.system_stats())
                    .await
            }
            CollectionKind::Health => self.fetch_into(&store.health, client.health()).await,
        }
    }

    /// Fetch several collections concurrently. Returns the failures.
    pub(crate) async fn fetch_many(
        &self,
        kinds: &[CollectionKind],
    ) -> Vec<(CollectionKind, CoreError)> {
        let results = join_all(kinds.iter().map(|kind| self.fetch(*kind))).await;
        kinds
            .iter()
            .zip(results)
            .filter_map(|(kind, result)| result.err().map(|e| (*kind, e)))
            .collect()
    }

    async fn fetch_into<T, F>(
        &self,
        collection: &SyncedCollection<T>,
        fetch: F,
    ) -> Result<ApplyOutcome, CoreError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, iotdash_api::Error>>,
    {
        if self.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        let ticket = collection.begin();

        // A cancelled fetch drops its ticket, so nothing is installed
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(CoreError::ShutDown),
            result = fetch => result,
        };

        match result {
            Ok(value) => {
                self.mark_reachable(true);
                Ok(collection.complete(ticket, Ok(value)))
            }
            Err(e) => {
                let err = CoreError::from(e);
                warn!(collection = %collection.kind(), error = %err, "refresh failed");
                self.mark_reachable(!err.is_connectivity());
                collection.complete(ticket, Err(err.clone()));
                Err(err)
            }
        }
    }

    fn mark_reachable(&self, reachable: bool) {
        let next = if reachable {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        self.poll_state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }
}

impl RefreshTarget for Refresher {
    fn refresh(&self, kind: CollectionKind) -> BoxFuture<'static, ()> {
        let this = self.clone();
        Box::pin(async move {
            // Failures are already recorded in the store
            let _ = this.fetch(kind).await;
        })
    }

    fn is_in_flight(&self, kind: CollectionKind) -> bool {
        self.store.is_in_flight(kind)
    }
}

// ── SyncController ───────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Created stopped; call
/// [`start`](Self::start) to fetch and begin background sync, and
/// [`shutdown`](Self::shutdown) when done. Shutdown is final.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: SyncConfig,
    client: ApiClient,
    store: Arc<SyncStore>,
    refresher: Refresher,
    scheduler: Arc<PollScheduler>,
    poll_state: Arc<watch::Sender<ConnectionState>>,
    push_state: Arc<watch::Sender<ConnectionState>>,
    command_tx: mpsc::Sender<MutationEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<MutationEnvelope>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncController {
    /// Create a controller from configuration. Does NOT contact the
    /// backend; call [`start()`](Self::start).
    pub fn new(config: SyncConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let client = ApiClient::new(config.base_url.as_str(), &transport)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a controller around an existing API client.
    pub fn with_client(config: SyncConfig, client: ApiClient) -> Self {
        let store = Arc::new(SyncStore::new());
        let (poll_state, _) = watch::channel(ConnectionState::Disconnected);
        let poll_state = Arc::new(poll_state);
        let (push_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let refresher = Refresher {
            client: client.clone(),
            store: Arc::clone(&store),
            poll_state: Arc::clone(&poll_state),
            cancel: cancel.clone(),
        };
        let scheduler = Arc::new(PollScheduler::new(
            &config.poll,
            Arc::new(refresher.clone()),
        ));

        Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                store,
                refresher,
                scheduler,
                poll_state,
                push_state: Arc::new(push_state),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                started: AtomicBool::new(false),
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<SyncStore> {
        &self.inner.store
    }

    /// The underlying REST client, for calls the store does not mirror.
    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start syncing.
    ///
    /// Spawns the command processor, fetches every collection once (when
    /// `prefetch` is set), starts the poll scheduler and connects the push
    /// channel if one is configured. Fetch failures are recorded in the
    /// store rather than returned. Calling `start` twice is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            return Ok(());
        };

        info!(url = %self.inner.config.base_url, "starting sync");
        self.inner.poll_state.send_replace(ConnectionState::Connecting);

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(command_processor_task(
            self.inner.refresher.clone(),
            command_rx,
            self.inner.cancel.clone(),
        )));
        self.inner.started.store(true, Ordering::Release);

        if self.inner.config.prefetch {
            let failures = self.inner.refresher.fetch_many(&CollectionKind::ALL).await;
            if !failures.is_empty() {
                warn!(failed = failures.len(), "initial fetch incomplete");
            }
        }

        self.inner.scheduler.start(&self.inner.cancel).await;

        if let Some(push) = &self.inner.config.push {
            let config = PushConfig {
                handshake_timeout: push.handshake_timeout,
                reconnect: push.reconnect.clone(),
                ..PushConfig::default()
            };
            let cancel = self.inner.cancel.child_token();
            let handle = PushHandle::connect(push.url.clone(), config, cancel.clone());
            handles.push(tokio::spawn(push_bridge_task(
                handle,
                Arc::clone(&self.inner.store),
                Arc::clone(&self.inner.scheduler),
                Arc::clone(&self.inner.push_state),
                push.fallback_after,
                cancel,
            )));
            debug!(url = %push.url, "push channel spawned");
        }

        Ok(())
    }

    /// Stop every background task. In-flight fetches are abandoned and
    /// their results discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.scheduler.stop().await;

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner
            .poll_state
            .send_replace(ConnectionState::Disconnected);
        self.inner
            .push_state
            .send_replace(ConnectionState::Disconnected);
        debug!("sync stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::Acquire) && !self.inner.cancel.is_cancelled()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Fetch one collection now. The result is installed in the store
    /// (subject to sequencing) and a failure is also returned.
    pub async fn refresh(&self, kind: CollectionKind) -> Result<ApplyOutcome, CoreError> {
        self.inner.refresher.fetch(kind).await
    }

    /// Fetch every collection concurrently. Returns the failures.
    pub async fn refresh_all(&self) -> Vec<(CollectionKind, CoreError)> {
        self.inner.refresher.fetch_many(&CollectionKind::ALL).await
    }

    /// Ask the scheduler to refresh `kind` in the background.
    pub fn request_refresh(&self, kind: CollectionKind) {
        self.inner.scheduler.refresh_now(kind);
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Execute a mutation against the backend.
    ///
    /// Resolves after the affected collections have been refetched, so a
    /// caller reading the store afterwards sees the server's view.
    pub async fn execute(&self, mutation: Mutation) -> Result<MutationResult, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        if !self.inner.started.load(Ordering::Acquire) {
            return Err(CoreError::NotStarted);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();

        self.inner
            .command_tx
            .send(MutationEnvelope {
                mutation,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ShutDown)?;

        rx.await.map_err(|_| CoreError::ShutDown)?
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: start, run closure, shut down.
    ///
    /// For CLI use: no push channel, no polling and no prefetch. The
    /// closure refreshes what it needs.
    pub async fn oneshot<F, Fut, T>(config: SyncConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(SyncController) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.push = None;
        cfg.poll = crate::config::PollIntervals::disabled();
        cfg.prefetch = false;

        let controller = SyncController::new(cfg)?;
        controller.start().await?;
        let result = f(controller.clone()).await;
        controller.shutdown().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// Reachability of the REST backend, from the latest fetch.
    pub fn poll_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.poll_state.subscribe()
    }

    /// Push channel state. Stays `Disconnected` without a push config.
    pub fn push_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.push_state.subscribe()
    }

    pub fn is_polling_suspended(&self, kind: CollectionKind) -> bool {
        self.inner.scheduler.is_suspended(kind)
    }

    // ── Snapshot accessors ───────────────────────────────────────

    pub fn devices_snapshot(&self) -> Option<Arc<Vec<Device>>> {
        self.inner.store.devices_snapshot()
    }

    pub fn relays_snapshot(&self) -> Option<Arc<Vec<Relay>>> {
        self.inner.store.relays_snapshot()
    }

    pub fn motion_sensors_snapshot(&self) -> Option<Arc<Vec<MotionSensor>>> {
        self.inner.store.motion_sensors_snapshot()
    }

    pub fn motion_alerts_snapshot(&self) -> Option<Arc<Vec<MotionAlert>>> {
        self.inner.store.motion_alerts_snapshot()
    }

    pub fn system_stats_snapshot(&self) -> Option<Arc<SystemStats>> {
        self.inner.store.system_stats_snapshot()
    }

    pub fn health_snapshot(&self) -> Option<Arc<HealthReport>> {
        self.inner.store.health_snapshot()
    }

    // ── Stream accessors ─────────────────────────────────────────

    pub fn devices(&self) -> CollectionStream<Vec<Device>> {
        self.inner.store.devices.subscribe()
    }

    pub fn relays(&self) -> CollectionStream<Vec<Relay>> {
        self.inner.store.relays.subscribe()
    }

    pub fn motion_sensors(&self) -> CollectionStream<Vec<MotionSensor>> {
        self.inner.store.motion_sensors.subscribe()
    }

    pub fn motion_alerts(&self) -> CollectionStream<Vec<MotionAlert>> {
        self.inner.store.motion_alerts.subscribe()
    }

    pub fn system_stats(&self) -> CollectionStream<SystemStats> {
        self.inner.store.system_stats.subscribe()
    }

    pub fn health(&self) -> CollectionStream<HealthReport> {
        self.inner.store.health.subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Process mutations one at a time, in submission order.
async fn command_processor_task(
    refresher: Refresher,
    mut rx: mpsc::Receiver<MutationEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                tokio::select! {
                    biased;
                    // Dropping the envelope answers the caller with ShutDown
                    () = cancel.cancelled() => break,
                    result = apply_mutation(&refresher, envelope.mutation) => {
                        let _ = envelope.response_tx.send(result);
                    }
                }
            }
        }
    }
}

/// Run a mutation, then refetch what it touched before answering.
async fn apply_mutation(
    refresher: &Refresher,
    mutation: Mutation,
) -> Result<MutationResult, CoreError> {
    let label = mutation.describe();
    let affected = mutation.affected();
    let is_delete = mutation.is_delete();

    let result = match route_mutation(&refresher.client, mutation).await {
        Err(e) if is_delete && e.is_not_found() => {
            info!(mutation = %label, "target already gone");
            Ok(MutationResult::AlreadyGone)
        }
        other => other,
    };

    match &result {
        Ok(_) => debug!(mutation = %label, "mutation applied"),
        Err(e) if e.is_not_found() => {
            info!(mutation = %label, "target vanished, reconciling");
        }
        Err(e) => {
            warn!(mutation = %label, error = %e, "mutation failed");
            return result;
        }
    }

    for (kind, e) in refresher.fetch_many(affected).await {
        warn!(collection = %kind, error = %e, "refetch after mutation failed");
    }
    result
}

// ── Mutation routing ─────────────────────────────────────────────

async fn route_mutation(
    client: &ApiClient,
    mutation: Mutation,
) -> Result<MutationResult, CoreError> {
    let result = match mutation {
        // ── Devices ──────────────────────────────────────────────
        Mutation::CreateDevice(payload) => {
            MutationResult::Device(client.create_device(&payload).await?)
        }
        Mutation::UpdateDevice { id, payload } => {
            MutationResult::Device(client.update_device(&id, &payload).await?)
        }
        Mutation::DeleteDevice { id } => {
            client.delete_device(&id).await?;
            MutationResult::Ok
        }

        // ── Relays ───────────────────────────────────────────────
        Mutation::CreateRelay { device_id, payload } => {
            MutationResult::Relay(client.create_relay(&device_id, &payload).await?)
        }
        Mutation::UpdateRelay { id, payload } => {
            MutationResult::Relay(client.update_relay(&id, &payload).await?)
        }
        Mutation::SetRelayState { id, on } => {
            client.set_relay_state(&id, on).await?;
            MutationResult::Ok
        }
        Mutation::InvokeRelay { id, action } => {
            client.invoke_relay(&id, action).await?;
            MutationResult::Ok
        }
        Mutation::DeleteRelay { id } => {
            client.delete_relay(&id).await?;
            MutationResult::Ok
        }

        // ── Motion sensors ───────────────────────────────────────
        Mutation::CreateMotionSensor { device_id, payload } => MutationResult::MotionSensor(
            client.create_motion_sensor(&device_id, &payload).await?,
        ),
        Mutation::UpdateMotionSensor { id, payload } => {
            MutationResult::MotionSensor(client.update_motion_sensor(&id, &payload).await?)
        }
        Mutation::DeleteMotionSensor { id } => {
            client.delete_motion_sensor(&id).await?;
            MutationResult::Ok
        }
        Mutation::TestMotionSensor { id } => {
            client.test_motion_sensor(&id).await?;
            MutationResult::Ok
        }
        Mutation::ClearMotionAlerts => {
            client.clear_motion_alerts().await?;
            MutationResult::Ok
        }
    };
    Ok(result)
}

// ── Helpers ──────────────────────────────────────────────────────

/// Build a [`TransportConfig`] from the sync configuration.
fn build_transport(config: &SyncConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_states_map_one_to_one() {
        assert_eq!(
            ConnectionState::from(PushState::Connected),
            ConnectionState::Connected
        );
        assert_eq!(ConnectionState::from(PushState::Connecting).to_string(), "connecting");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn transport_follows_tls_choice() {
        let mut config = SyncConfig::new(url::Url::parse("https://gw:5000/").expect("url"));
        config.tls = TlsVerification::DangerAcceptInvalid;
        let transport = build_transport(&config);
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, config.timeout);
    }

    #[tokio::test]
    async fn execute_before_start_is_rejected() {
        let config = SyncConfig::new(url::Url::parse("http://127.0.0.1:9/").expect("url"));
        let controller = SyncController::new(config).expect("controller");
        let err = controller
            .execute(Mutation::ClearMotionAlerts)
            .await
            .expect_err("not started");
        assert!(matches!(err, CoreError::NotStarted));
    }

    #[tokio::test]
    async fn start_after_shutdown_fails() {
        let mut config = SyncConfig::new(url::Url::parse("http://127.0.0.1:9/").expect("url"));
        config.prefetch = false;
        config.poll = crate::config::PollIntervals::disabled();
        let controller = SyncController::new(config).expect("controller");
        controller.shutdown().await;
        assert!(matches!(controller.start().await, Err(CoreError::ShutDown)));
        assert!(!controller.is_running());
    }
}
