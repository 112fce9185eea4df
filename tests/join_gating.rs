//! The state machine must never transmit `join` before the server signals
//! readiness with `connection-established`, even when the credential was
//! presented before the transport opened.

mod common;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;
use snipspace::client::SpaceConnection;
use snipspace::shared::SyncConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

type Received = Arc<Mutex<Vec<String>>>;

/// A server that stays silent for a readiness window, recording every
/// inbound frame, then sends `connection-established` and keeps recording.
async fn serve_withholding_app(window: Duration) -> (String, Received, tokio::task::JoinHandle<()>) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    let app = Router::new().route(
        "/ws/space/{space_id}",
        get(move |ws: WebSocketUpgrade| {
            let log = log.clone();
            async move { ws.on_upgrade(move |socket| record_session(socket, log, window)) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), received, handle)
}

async fn record_session(mut socket: WebSocket, log: Received, window: Duration) {
    let silence = tokio::time::sleep(window);
    tokio::pin!(silence);

    // Readiness withheld: anything received now is a protocol violation
    // the test will catch.
    loop {
        tokio::select! {
            _ = &mut silence => break,
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => log.lock().unwrap().push(text.to_string()),
                Some(Ok(_)) => {}
                _ => return,
            },
        }
    }

    let hello = serde_json::json!({
        "type": "connection-established",
        "payload": { "connection_id": Uuid::new_v4() },
    });
    if socket.send(Message::Text(hello.to_string().into())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            log.lock().unwrap().push(text.to_string());
        }
    }
}

#[tokio::test]
async fn test_join_waits_for_connection_established() {
    let (url, received, _server) = serve_withholding_app(Duration::from_millis(250)).await;

    let config = SyncConfig::builder().server_url(&url).build().unwrap();
    let (conn, _events) = SpaceConnection::spawn(config, Uuid::new_v4(), Uuid::new_v4());

    // Credential presented before the transport even opens.
    conn.join_space("token-held-in-advance");
    conn.connect();

    // Inside the readiness window nothing may have been transmitted.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        received.lock().unwrap().is_empty(),
        "join transmitted before connection-established: {:?}",
        received.lock().unwrap()
    );

    // Once readiness arrives, the held credential goes out as a join.
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if !received.lock().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("join after readiness");

    let frames = received.lock().unwrap();
    let first: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(first["type"], "join");
    assert_eq!(first["payload"]["token"], "token-held-in-advance");
}
