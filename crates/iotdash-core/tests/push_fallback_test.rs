#![allow(clippy::unwrap_used)]
// Push channel and polling taking turns for the pushed collections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use iotdash_api::push::ReconnectConfig;
use iotdash_core::{
    CollectionKind, ConnectionState, PollIntervals, PushSettings, SnapshotSource, SyncConfig,
    SyncController,
};

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn relay_source(controller: &SyncController) -> Option<SnapshotSource> {
    controller
        .store()
        .relays()
        .state()
        .last_good()
        .map(|s| s.source)
}

#[tokio::test]
async fn test_push_suspends_polling_then_falls_back() {
    let http = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/relays"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Fan (polled)", "status": false}
        ])))
        .mount(&http)
        .await;

    // One websocket session that pushes a relay update and then hangs up.
    // The listener goes away with it, so reconnects keep failing.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let ws_server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(listener);
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(
            r#"{"event": "relays_update", "data": [{"id": 1, "name": "Fan (pushed)", "status": true}], "seq": 1}"#,
        ))
        .await
        .unwrap();
        let _ = release_rx.await;
        let _ = ws.close(None).await;
    });

    let mut config = SyncConfig::new(Url::parse(&http.uri()).unwrap());
    config.prefetch = false;
    config.poll = PollIntervals {
        relays: Duration::from_millis(100),
        ..PollIntervals::disabled()
    };
    let mut push = PushSettings::new(Url::parse(&format!("ws://{addr}/ws")).unwrap());
    push.fallback_after = Duration::from_millis(300);
    push.handshake_timeout = Duration::from_secs(1);
    push.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(100),
        max_retries: None,
    };
    config.push = Some(push);

    let controller = SyncController::new(config).unwrap();
    controller.start().await.unwrap();

    // Live: relays arrive over the socket and the lane stops polling
    wait_until("pushed relays", || {
        controller.is_polling_suspended(CollectionKind::Relays)
            && relay_source(&controller) == Some(SnapshotSource::Push)
    })
    .await;
    assert_eq!(*controller.push_state().borrow(), ConnectionState::Connected);
    assert_eq!(
        controller.relays_snapshot().unwrap()[0].name,
        "Fan (pushed)"
    );
    // Only pushed collections are handed over
    assert!(!controller.is_polling_suspended(CollectionKind::MotionAlerts));

    // Socket drops: after the grace period polling owns relays again
    release_tx.send(()).unwrap();
    ws_server.await.unwrap();

    wait_until("polling fallback", || {
        !controller.is_polling_suspended(CollectionKind::Relays)
            && relay_source(&controller) == Some(SnapshotSource::Fetch)
    })
    .await;
    assert_ne!(*controller.push_state().borrow(), ConnectionState::Connected);
    assert_eq!(
        controller.relays_snapshot().unwrap()[0].name,
        "Fan (polled)"
    );

    controller.shutdown().await;
    assert_eq!(
        *controller.push_state().borrow(),
        ConnectionState::Disconnected
    );
}
