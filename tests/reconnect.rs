//! Reconnection policy tests: backoff scheduling against a refusing
//! endpoint, close-code handling, and manual-close stickiness.

mod common;

use axum::extract::ws::{CloseFrame, Message, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;
use snipspace::client::{ConnectionState, SessionErrorKind, SpaceConnection};
use snipspace::shared::SyncConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Serve a websocket app on an ephemeral port, counting upgrades.
async fn serve_ws_app<F, Fut>(on_socket: F) -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<()>)
where
    F: Fn(axum::extract::ws::WebSocket) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let upgrades = Arc::new(AtomicUsize::new(0));
    let counter = upgrades.clone();
    let app = Router::new().route(
        "/ws/space/{space_id}",
        get(move |ws: WebSocketUpgrade| {
            let on_socket = on_socket.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ws.on_upgrade(move |socket| on_socket(socket))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), upgrades, handle)
}

fn fast_config(url: &str) -> SyncConfig {
    SyncConfig::builder()
        .server_url(url)
        .base_delay(Duration::from_millis(50))
        .max_reconnect_attempts(3)
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_refused_connection_exhausts_backoff_budget() {
    // Bind then drop: connections to this port are refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = fast_config(&format!("http://{}", addr));
    let (conn, _events) = SpaceConnection::spawn(config, Uuid::new_v4(), Uuid::new_v4());

    let started = Instant::now();
    conn.connect();

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        conn.wait_for(|s| matches!(s, ConnectionState::Error(SessionErrorKind::MaxReconnectReached))),
    )
    .await
    .expect("terminal state within deadline");
    assert_eq!(
        state,
        ConnectionState::Error(SessionErrorKind::MaxReconnectReached)
    );

    // Three scheduled retries at 50/100/200ms must actually have waited.
    assert!(started.elapsed() >= Duration::from_millis(280));
    assert!(conn
        .last_error()
        .unwrap()
        .contains("maximum reconnect attempts"));
}

#[tokio::test]
async fn test_abnormal_close_schedules_reconnect_and_manual_close_stops_it() {
    // Accept the upgrade, then vanish without a close handshake.
    let (url, upgrades, _server) = serve_ws_app(|socket| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(socket);
    })
    .await;

    let config = fast_config(&url);
    let (conn, _events) = SpaceConnection::spawn(config, Uuid::new_v4(), Uuid::new_v4());
    conn.connect();

    // Every successful open resets the budget, so the client keeps cycling
    // through reconnects for as long as we let it.
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if upgrades.load(Ordering::SeqCst) >= 3 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("multiple reconnect attempts");

    // A manual disconnect is sticky: it cancels the pending backoff timer
    // and nothing reconnects afterwards.
    conn.disconnect();
    let state = tokio::time::timeout(
        Duration::from_secs(2),
        conn.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .expect("disconnected");
    assert_eq!(state, ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = upgrades.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(upgrades.load(Ordering::SeqCst), settled);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_policy_violation_close_never_reconnects() {
    // Close immediately with 1008 Policy Violation.
    let (url, upgrades, _server) = serve_ws_app(|mut socket| async move {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 1008,
                reason: "policy".into(),
            })))
            .await;
    })
    .await;

    let config = fast_config(&url);
    let (conn, _events) = SpaceConnection::spawn(config, Uuid::new_v4(), Uuid::new_v4());
    conn.connect();

    let state = tokio::time::timeout(
        Duration::from_secs(2),
        conn.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .expect("settled");
    assert_eq!(state, ConnectionState::Disconnected);

    // No reconnect is ever scheduled for a policy-violation close.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(upgrades.load(Ordering::SeqCst), 1);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_manual_reconnect_resets_terminal_state() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = SyncConfig::builder()
        .server_url(&format!("http://{}", addr))
        .base_delay(Duration::from_millis(20))
        .max_reconnect_attempts(1)
        .connect_timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let (conn, _events) = SpaceConnection::spawn(config, Uuid::new_v4(), Uuid::new_v4());
    conn.connect();

    tokio::time::timeout(
        Duration::from_secs(3),
        conn.wait_for(|s| matches!(s, ConnectionState::Error(SessionErrorKind::MaxReconnectReached))),
    )
    .await
    .expect("terminal state");

    // The terminal state holds until an explicit external trigger.
    conn.reconnect();
    let state = tokio::time::timeout(
        Duration::from_secs(3),
        conn.wait_for(|s| !matches!(s, ConnectionState::Error(SessionErrorKind::MaxReconnectReached))),
    )
    .await
    .expect("left terminal state");
    // Still refused, but the budget was reset and retried.
    assert_ne!(
        state,
        ConnectionState::Error(SessionErrorKind::MaxReconnectReached)
    );
}
