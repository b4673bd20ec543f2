// Copyright (c) 2025 The EdgeConsole Authors
//
// This file is part of EdgeConsole.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact the EdgeConsole maintainers.

//! Transport and state store against an in-process WebSocket edge

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use edgeconsole_client::{
    ConnectionState, EdgeError, EdgeStateStore, RpcChannel, RpcTransport, TransportConfig,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug)]
struct EdgeState {
    received: Mutex<Vec<String>>,
    components: Mutex<Value>,
    total_connections: AtomicUsize,
    active_connections: AtomicUsize,
    notify: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
}

impl EdgeState {
    fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

/// Answer one request. `None` means no response is sent.
fn respond(state: &EdgeState, request: &Value) -> Option<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default();
    let params = &request["params"];

    match method {
        "authenticateWithPassword" => {
            state.received.lock().push(method.to_owned());
            if params["password"] == "admin" {
                Some(json!({"jsonrpc": "2.0", "id": id, "result": {"user": {"id": "admin"}}}))
            } else {
                Some(json!({"jsonrpc": "2.0", "id": id, "error": {"code": 1003, "message": "Authentication failed"}}))
            }
        }
        "edgeRpc" => {
            let inner = &params["payload"];
            let inner_method = inner["method"].as_str().unwrap_or_default();
            state.received.lock().push(format!("edgeRpc:{inner_method}"));
            let inner_result = match inner_method {
                "getEdgeConfig" => json!({"components": state.components.lock().clone()}),
                _ => json!({}),
            };
            Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"payload": {"jsonrpc": "2.0", "id": inner["id"], "result": inner_result}}
            }))
        }
        "echo" => Some(json!({"jsonrpc": "2.0", "id": id, "result": params["value"]})),
        "boom" => Some(json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32000, "message": "boom"}})),
        _ => None,
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<EdgeState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<EdgeState>) {
    state.total_connections.fetch_add(1, Ordering::SeqCst);
    state.active_connections.fetch_add(1, Ordering::SeqCst);

    let mut notify = state.notify.subscribe();
    let mut kick = state.kick.subscribe();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    loop {
        tokio::select! {
            Some(frame) = out_rx.recv() => {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            Ok(frame) = notify.recv() => {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            _ = kick.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    let delay = request["params"]["delayMs"].as_u64().unwrap_or(0);
                    if let Some(response) = respond(&state, &request) {
                        let out_tx = out_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            let _ = out_tx.send(response.to_string());
                        });
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.active_connections.fetch_sub(1, Ordering::SeqCst);
}

async fn spawn_edge() -> (Arc<EdgeState>, String) {
    let state = Arc::new(EdgeState {
        received: Mutex::new(Vec::new()),
        components: Mutex::new(json!({
            "pvInverter0": {"factoryId": "PV-Inverter.Fronius", "properties": {"maxActivePower": 5000}}
        })),
        total_connections: AtomicUsize::new(0),
        active_connections: AtomicUsize::new(0),
        notify: broadcast::channel(16).0,
        kick: broadcast::channel(4).0,
    });

    let app = Router::new()
        .route("/jsonrpc", get(ws_handler))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, format!("ws://{addr}/jsonrpc"))
}

fn config(url: String) -> TransportConfig {
    TransportConfig {
        url,
        request_timeout: Duration::from_millis(500),
        reconnect_delay: Duration::from_millis(100),
        ..TransportConfig::default()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..150 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

async fn connected(url: String) -> RpcTransport {
    let transport = RpcTransport::new(config(url));
    transport.connect();
    transport
        .wait_connected(Duration::from_secs(3))
        .await
        .unwrap();
    transport
}

#[tokio::test]
async fn test_handshake_authenticates_then_loads_config() {
    let (edge, url) = spawn_edge().await;
    let transport = RpcTransport::new(config(url));
    let store = EdgeStateStore::spawn(Arc::new(transport.clone()));

    transport.connect();
    let snapshot = store.wait_for_snapshot(Duration::from_secs(3)).await.unwrap();

    assert!(snapshot.contains_key("pvInverter0"));
    assert_eq!(
        edge.received(),
        vec!["authenticateWithPassword", "edgeRpc:getEdgeConfig"]
    );
    transport.close().await;
}

#[tokio::test]
async fn test_interleaved_responses_resolve_by_id() {
    let (_edge, url) = spawn_edge().await;
    let transport = connected(url).await;

    let (slow, fast) = tokio::join!(
        transport.call("echo", json!({"value": "slow", "delayMs": 200})),
        transport.call("echo", json!({"value": "fast"})),
    );

    assert_eq!(slow.unwrap(), json!("slow"));
    assert_eq!(fast.unwrap(), json!("fast"));
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn test_error_response_rejects_call() {
    let (_edge, url) = spawn_edge().await;
    let transport = connected(url).await;

    let error = transport.call("boom", json!({})).await.unwrap_err();

    assert!(matches!(error, EdgeError::Rpc { code: -32000, .. }));
    assert_eq!(error.to_string(), "RPC Error: boom");
}

#[tokio::test]
async fn test_timeout_clears_pending_entry() {
    let (_edge, url) = spawn_edge().await;
    let transport = connected(url).await;

    let result = transport.call("silent", json!({})).await;

    assert!(matches!(result, Err(EdgeError::Timeout { ref method }) if method == "silent"));
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn test_dropped_call_clears_pending_entry() {
    let (_edge, url) = spawn_edge().await;
    let transport = connected(url).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        transport.call("silent", json!({})),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn test_call_after_close_is_not_connected() {
    let (_edge, url) = spawn_edge().await;
    let transport = connected(url).await;

    transport.close().await;

    assert_eq!(transport.state(), ConnectionState::Disconnected);
    let result = transport.call("echo", json!({"value": 1})).await;
    assert!(matches!(result, Err(EdgeError::NotConnected)));
}

#[tokio::test]
async fn test_reconnects_after_edge_drops_connection() {
    let (edge, url) = spawn_edge().await;
    let transport = connected(url).await;
    wait_until(|| edge.received().len() == 2).await;

    let in_flight = {
        let transport = transport.clone();
        tokio::spawn(async move { transport.call("silent", json!({})).await })
    };
    wait_until(|| transport.pending_count() == 1).await;

    edge.kick.send(()).unwrap();
    assert!(matches!(
        in_flight.await.unwrap(),
        Err(EdgeError::ConnectionClosed)
    ));

    wait_until(|| edge.total_connections.load(Ordering::SeqCst) == 2).await;
    transport
        .wait_connected(Duration::from_secs(3))
        .await
        .unwrap();
    wait_until(|| edge.active_connections.load(Ordering::SeqCst) == 1).await;

    let value = transport.call("echo", json!({"value": 7})).await.unwrap();
    assert_eq!(value, json!(7));
    wait_until(|| edge.received().len() == 4).await;
    assert_eq!(
        edge.received(),
        vec![
            "authenticateWithPassword",
            "edgeRpc:getEdgeConfig",
            "authenticateWithPassword",
            "edgeRpc:getEdgeConfig",
        ]
    );
}

#[tokio::test]
async fn test_notification_replaces_snapshot() {
    let (edge, url) = spawn_edge().await;
    let transport = RpcTransport::new(config(url));
    let store = EdgeStateStore::spawn(Arc::new(transport.clone()));
    transport.connect();
    store.wait_for_snapshot(Duration::from_secs(3)).await.unwrap();

    let mut updates = store.subscribe();
    updates.borrow_and_update();
    let notification = json!({
        "jsonrpc": "2.0",
        "method": "edgeRpc",
        "params": {"payload": {"jsonrpc": "2.0", "method": "edgeConfig", "params": {"components": {
            "meter0": {"factoryId": "Meter.Socomec.Threephase", "properties": {"type": "GRID"}}
        }}}}
    });
    edge.notify.send(notification.to_string()).unwrap();

    tokio::time::timeout(Duration::from_secs(3), updates.changed())
        .await
        .unwrap()
        .unwrap();
    let snapshot = store.current().unwrap();
    assert!(snapshot.contains_key("meter0"));
    assert!(!snapshot.contains_key("pvInverter0"));
}
