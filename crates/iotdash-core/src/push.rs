// ── Push bridge ──
//
// Feeds push events into the store and decides which channel is
// authoritative for the pushed collections. While the socket is connected
// their poll lanes are suspended; if it stays down past `fallback_after`
// polling takes over again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use iotdash_api::listing::{listing_from_value, relays_from_value};
use iotdash_api::models::{Device, SystemStats};
use iotdash_api::push::{PushEvent, PushHandle, PushState, PushTopic};

use crate::controller::ConnectionState;
use crate::error::CoreError;
use crate::scheduler::PollScheduler;
use crate::store::{CollectionKind, SyncStore, SyncedCollection};

/// Run until cancelled, then shut the push channel down.
pub(crate) async fn push_bridge_task(
    handle: PushHandle,
    store: Arc<SyncStore>,
    scheduler: Arc<PollScheduler>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    fallback_after: Duration,
    cancel: CancellationToken,
) {
    let mut events = handle.subscribe();
    let mut push_state = handle.state();

    let fallback = tokio::time::sleep(fallback_after);
    tokio::pin!(fallback);
    let mut fallback_armed = false;
    let mut polling_suspended = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = push_state.changed() => {
                if changed.is_err() {
                    debug!("push channel task ended");
                    break;
                }
                let state = *push_state.borrow_and_update();
                state_tx.send_replace(ConnectionState::from(state));

                if state == PushState::Connected {
                    fallback_armed = false;
                    store.reset_push_marks();
                    if !polling_suspended {
                        set_pushed_polling(&scheduler, false);
                        polling_suspended = true;
                        info!("push channel live, pushed collections no longer polled");
                    }
                } else if polling_suspended && !fallback_armed {
                    fallback.as_mut().reset(Instant::now() + fallback_after);
                    fallback_armed = true;
                }
            }
            () = &mut fallback, if fallback_armed => {
                fallback_armed = false;
                polling_suspended = false;
                warn!(
                    after_secs = fallback_after.as_secs(),
                    "push channel still down, falling back to polling"
                );
                set_pushed_polling(&scheduler, true);
            }
            received = events.recv() => match received {
                Ok(event) => {
                    apply_event(&store, &event);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "push events dropped, requesting fresh copies");
                    for topic in PushTopic::ALL {
                        handle.request(topic.request());
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    handle.join().await;
    if polling_suspended {
        set_pushed_polling(&scheduler, true);
    }
    state_tx.send_replace(ConnectionState::Disconnected);
}

fn set_pushed_polling(scheduler: &PollScheduler, enabled: bool) {
    for topic in PushTopic::ALL {
        let kind = CollectionKind::from(topic);
        if enabled {
            scheduler.resume(kind);
        } else {
            scheduler.suspend(kind);
        }
    }
}

// ── Event application ────────────────────────────────────────────────

/// Install one push event. Returns whether the store changed.
pub(crate) fn apply_event(store: &SyncStore, event: &PushEvent) -> bool {
    let kind = CollectionKind::from(event.topic);

    if !store.accept_push(kind, event.seq, event.timestamp) {
        debug!(collection = %kind, seq = ?event.seq, "dropping out-of-order push event");
        return false;
    }

    if let Some(message) = &event.error {
        let failure = CoreError::PushRejected {
            message: message.clone(),
        };
        match event.topic {
            PushTopic::Devices => store.devices.apply_push(Err(failure)),
            PushTopic::Relays => store.relays.apply_push(Err(failure)),
            PushTopic::SystemStats => store.system_stats.apply_push(Err(failure)),
        };
        return true;
    }

    let Some(data) = event.data.clone() else {
        debug!(collection = %kind, "push event without data");
        return false;
    };

    match event.topic {
        PushTopic::Devices => install(&store.devices, listing_from_value::<Device>(data, "devices")),
        PushTopic::Relays => install(&store.relays, relays_from_value(data)),
        PushTopic::SystemStats => install(&store.system_stats, decode_stats(data)),
    }
}

fn install<T: Send + Sync + 'static>(
    collection: &SyncedCollection<T>,
    decoded: Result<T, iotdash_api::Error>,
) -> bool {
    match decoded {
        Ok(value) => {
            let seq = collection.apply_push(Ok(value));
            debug!(collection = %collection.kind(), seq, "applied push update");
            true
        }
        Err(e) => {
            warn!(collection = %collection.kind(), error = %e, "ignoring undecodable push payload");
            false
        }
    }
}

/// Stats arrive bare or under a `stats` key.
fn decode_stats(mut data: serde_json::Value) -> Result<SystemStats, iotdash_api::Error> {
    if let Some(inner) = data.get_mut("stats").map(serde_json::Value::take) {
        data = inner;
    }
    serde_json::from_value(data).map_err(|e| iotdash_api::Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{CollectionPhase, SnapshotSource};

    fn event(topic: PushTopic, data: serde_json::Value, seq: Option<u64>) -> PushEvent {
        PushEvent {
            topic,
            data: Some(data),
            seq,
            timestamp: None,
            error: None,
        }
    }

    #[test]
    fn relay_update_installs_pushed_snapshot() {
        let store = SyncStore::new();
        let applied = apply_event(
            &store,
            &event(
                PushTopic::Relays,
                json!([{"id": 1, "name": "Fan", "status": true}]),
                Some(1),
            ),
        );
        assert!(applied);

        let state = store.relays().state();
        let snapshot = state.last_good().unwrap();
        assert_eq!(snapshot.source, SnapshotSource::Push);
        assert!(snapshot.value[0].status);
    }

    #[test]
    fn regressed_server_seq_is_dropped() {
        let store = SyncStore::new();
        let first = event(
            PushTopic::Devices,
            json!({"devices": [{"id": 1, "name": "A"}]}),
            Some(9),
        );
        assert!(apply_event(&store, &first));
        let older = event(PushTopic::Devices, json!([]), Some(8));
        assert!(!apply_event(&store, &older));
        assert_eq!(store.devices_snapshot().unwrap().len(), 1);
    }

    #[test]
    fn server_error_keeps_last_good() {
        let store = SyncStore::new();
        let update = event(PushTopic::Relays, json!({"relays": {"relay1": true}}), None);
        assert!(apply_event(&store, &update));

        let failure = PushEvent {
            topic: PushTopic::Relays,
            data: None,
            seq: None,
            timestamp: None,
            error: Some("GPIO bus unavailable".into()),
        };
        assert!(apply_event(&store, &failure));

        let status = store.status(CollectionKind::Relays);
        assert_eq!(status.phase, CollectionPhase::Error);
        assert!(status.has_data);
        assert_eq!(status.error.as_deref(), Some("GPIO bus unavailable"));
    }

    #[test]
    fn undecodable_payload_is_ignored() {
        let store = SyncStore::new();
        let junk = event(PushTopic::SystemStats, json!({"cpu": "busy"}), None);
        assert!(!apply_event(&store, &junk));
        assert_eq!(
            store.status(CollectionKind::SystemStats).phase,
            CollectionPhase::Uninitialized
        );
    }

    #[test]
    fn wrapped_stats_decode() {
        let stats = decode_stats(json!({"stats": {
            "cpu": {"percent": 12.5, "count": 4},
            "memory": {"total": 100, "available": 50, "percent": 50.0, "used": 50},
            "disk": {"total": 100, "used": 10, "free": 90, "percent": 10.0},
            "network": {"bytes_sent": 1, "bytes_recv": 2},
            "timestamp": "2026-03-01T08:00:00"
        }}))
        .unwrap();
        assert_eq!(stats.cpu.count, 4);
    }
}
