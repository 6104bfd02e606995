#![allow(clippy::unwrap_used)]
// Integration tests for the push channel against an in-process websocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use iotdash_api::push::{PushConfig, PushHandle, PushRequest, PushState, PushTopic, ReconnectConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_config() -> PushConfig {
    PushConfig {
        handshake_timeout: Duration::from_secs(2),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_retries: None,
        },
        ..PushConfig::default()
    }
}

async fn wait_for_state(handle: &PushHandle, want: PushState) {
    let mut rx = handle.state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
        .await
        .unwrap()
        .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscribes_then_streams_updates() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut requests = Vec::new();
        for _ in 0..3 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("expected a request frame");
            };
            requests.push(text.as_str().to_owned());
        }

        ws.send(Message::text(
            r#"{"event": "relays_update", "data": [{"id": 1, "name": "Fan", "status": true}], "seq": 1}"#,
        ))
        .await
        .unwrap();
        ws.send(Message::text(r#"{"event": "mystery", "data": 1}"#))
            .await
            .unwrap();
        ws.send(Message::text(
            r#"{"event": "devices_update", "data": {"devices": []}, "seq": 2}"#,
        ))
        .await
        .unwrap();

        // Wait for the client to go away
        while let Some(Ok(_)) = ws.next().await {}
        requests
    });

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let handle = PushHandle::connect(url, fast_config(), CancellationToken::new());
    let mut events = handle.subscribe();

    wait_for_state(&handle, PushState::Connected).await;

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.topic, PushTopic::Relays);
    assert_eq!(first.seq, Some(1));

    let second = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.topic, PushTopic::Devices);

    handle.join().await;

    let requests = server.await.unwrap();
    assert_eq!(
        requests,
        vec![
            r#"{"event":"request_devices"}"#,
            r#"{"event":"request_relays"}"#,
            r#"{"event":"request_system_stats"}"#,
        ]
    );
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // First connection: accept and immediately drop.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);

        // Second connection: answer an on-demand request.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if text.as_str().contains("request_relays") {
                    ws.send(Message::text(r#"{"event": "relays_update", "data": []}"#))
                        .await
                        .unwrap();
                }
            }
        }
    });

    let url = Url::parse(&format!("ws://{addr}/")).unwrap();
    let config = PushConfig {
        subscriptions: vec![PushRequest::Relays],
        ..fast_config()
    };
    let handle = PushHandle::connect(url, config, CancellationToken::new());
    let mut events = handle.subscribe();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.topic, PushTopic::Relays);
    assert_eq!(*handle.state().borrow(), PushState::Connected);

    handle.join().await;
    assert!(tokio::time::timeout(Duration::from_secs(5), server).await.is_ok());
}

#[tokio::test]
async fn test_unreachable_server_stays_disconnected() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let url = Url::parse(&format!("ws://{addr}/")).unwrap();
    let config = PushConfig {
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            max_retries: Some(2),
        },
        ..fast_config()
    };
    let handle = PushHandle::connect(url, config, CancellationToken::new());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*handle.state().borrow(), PushState::Disconnected);
    handle.join().await;
}
