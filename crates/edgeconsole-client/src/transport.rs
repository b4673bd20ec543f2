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

//! JSON-RPC over a single WebSocket to the edge
//!
//! One supervisor task owns the socket. Callers hand frames to it through an
//! unbounded channel and wait on a oneshot registered under the request id;
//! the supervisor resolves that oneshot when the matching response arrives.
//! Every inbound frame is also re-published on a broadcast channel.

use crate::errors::{EdgeError, EdgeResult};
use crate::traits::RpcChannel;
use async_trait::async_trait;
use edgeconsole_types::rpc::METHOD_AUTHENTICATE_WITH_PASSWORD;
use edgeconsole_types::{JsonRpcRequest, JsonRpcResponse};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

const INBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket endpoint, e.g. `ws://192.168.1.10:8085/jsonrpc`
    pub url: String,
    pub edge_id: String,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
    /// Constant pause between a dropped connection and the next attempt
    pub reconnect_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8085/jsonrpc".to_owned(),
            edge_id: "0".to_owned(),
            username: "admin".to_owned(),
            password: "admin".to_owned(),
            request_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type PendingTable = HashMap<String, oneshot::Sender<EdgeResult<Value>>>;

#[derive(Debug)]
struct Shared {
    pending: Mutex<PendingTable>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound: broadcast::Sender<JsonRpcResponse>,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn attach(&self, outbound: mpsc::UnboundedSender<String>) {
        *self.outbound.lock() = Some(outbound);
        self.state.send_replace(ConnectionState::Connected);
    }

    /// Forget the socket and fail everything still waiting on it
    fn detach(&self) {
        self.outbound.lock().take();
        let orphaned: Vec<_> = self.pending.lock().drain().collect();
        if !orphaned.is_empty() {
            warn!(
                "⚠️ [RPC] Failing {} pending call(s): connection closed",
                orphaned.len()
            );
        }
        for (_, waiter) in orphaned {
            let _ = waiter.send(Err(EdgeError::ConnectionClosed));
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn dispatch(&self, text: &str) {
        let message: JsonRpcResponse = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("⚠️ [RPC] Ignoring malformed frame: {}", e);
                return;
            }
        };

        if let Some(id) = message.id.as_deref() {
            let waiter = self.pending.lock().remove(id);
            match waiter {
                Some(waiter) => {
                    debug!("📥 [RPC] Response for {}", id);
                    let outcome = message.clone().into_result().map_err(EdgeError::from);
                    // The caller may have given up in the meantime
                    let _ = waiter.send(outcome);
                }
                None => debug!("📥 [RPC] Response for unknown or expired id {}", id),
            }
        }

        // No subscribers is fine
        let _ = self.inbound.send(message);
    }
}

/// Removes the pending entry however the call ends: response, timeout or drop
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending.lock().remove(self.id);
    }
}

/// Handle used by the supervisor and its handshake. Holds no shutdown
/// control so it never keeps the transport alive.
#[derive(Debug, Clone)]
struct Link {
    shared: Arc<Shared>,
    config: Arc<TransportConfig>,
}

#[async_trait]
impl RpcChannel for Link {
    async fn call(&self, method: &str, params: Value) -> EdgeResult<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = serde_json::to_string(&JsonRpcRequest::new(id.clone(), method, params))?;

        let sender = self
            .shared
            .outbound
            .lock()
            .clone()
            .ok_or(EdgeError::NotConnected)?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id.clone(), tx);
        let _guard = PendingGuard {
            shared: &self.shared,
            id: &id,
        };

        debug!("📤 [RPC] {} ({})", method, id);
        sender
            .send(frame)
            .map_err(|_| EdgeError::ConnectionClosed)?;

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(EdgeError::ConnectionClosed),
            Err(_) => {
                warn!(
                    "⏱️ [RPC] {} ({}) timed out after {:?}",
                    method, id, self.config.request_timeout
                );
                Err(EdgeError::Timeout {
                    method: method.to_owned(),
                })
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<JsonRpcResponse> {
        self.shared.inbound.subscribe()
    }

    fn edge_id(&self) -> &str {
        &self.config.edge_id
    }
}

#[derive(Debug)]
struct Control {
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Control {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

/// WebSocket JSON-RPC client for one edge
///
/// Cheap to clone; the connection is torn down when the last clone is dropped
/// or [`RpcTransport::close`] is called.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    link: Link,
    control: Arc<Control>,
}

impl RpcTransport {
    pub fn new(config: TransportConfig) -> Self {
        let shared = Shared {
            pending: Mutex::new(HashMap::new()),
            outbound: Mutex::new(None),
            inbound: broadcast::channel(INBOUND_CAPACITY).0,
            state: watch::channel(ConnectionState::Disconnected).0,
        };

        Self {
            link: Link {
                shared: Arc::new(shared),
                config: Arc::new(config),
            },
            control: Arc::new(Control {
                shutdown: watch::channel(false).0,
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Start the connection supervisor. Calling it again while the
    /// supervisor runs has no effect.
    pub fn connect(&self) {
        let mut supervisor = self.control.supervisor.lock();
        if supervisor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("[RPC] Supervisor already running");
            return;
        }

        self.control.shutdown.send_replace(false);
        let shutdown = self.control.shutdown.subscribe();
        *supervisor = Some(tokio::spawn(supervise(self.link.clone(), shutdown)));
    }

    /// Stop reconnecting, close the socket and wait for the supervisor to exit
    pub async fn close(&self) {
        self.control.shutdown.send_replace(true);
        let handle = self.control.supervisor.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
            && !e.is_cancelled()
        {
            error!("❌ [RPC] Supervisor task failed: {}", e);
        }
        info!("🔌 [RPC] Transport closed");
    }

    pub fn state(&self) -> ConnectionState {
        *self.link.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.link.shared.state.subscribe()
    }

    /// Wait until the socket is open, bounded by `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> EdgeResult<()> {
        let mut state = self.watch_state();
        tokio::time::timeout(
            timeout,
            state.wait_for(|s| *s == ConnectionState::Connected),
        )
        .await
        .map_err(|_| EdgeError::Timeout {
            method: "connect".to_owned(),
        })?
        .map_err(|_| EdgeError::ConnectionClosed)?;
        Ok(())
    }

    /// Calls currently waiting for a response
    pub fn pending_count(&self) -> usize {
        self.link.shared.pending.lock().len()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.link.config
    }
}

#[async_trait]
impl RpcChannel for RpcTransport {
    async fn call(&self, method: &str, params: Value) -> EdgeResult<Value> {
        self.link.call(method, params).await
    }

    fn subscribe(&self) -> broadcast::Receiver<JsonRpcResponse> {
        self.link.subscribe()
    }

    fn edge_id(&self) -> &str {
        self.link.edge_id()
    }
}

async fn supervise(link: Link, mut shutdown: watch::Receiver<bool>) {
    let url = link.config.url.clone();

    while !*shutdown.borrow() {
        link.shared.state.send_replace(ConnectionState::Connecting);
        info!("🔌 [RPC] Connecting to {}", url);

        let attempt = tokio::select! {
            attempt = connect_async(url.as_str()) => Some(attempt),
            _ = shutdown.changed() => None,
        };

        match attempt {
            Some(Ok((stream, _))) => {
                info!("✅ [RPC] Connected to {}", url);
                run_session(&link, stream, &mut shutdown).await;
            }
            Some(Err(e)) => warn!("⚠️ [RPC] Connection to {} failed: {}", url, e),
            None => {}
        }

        link.shared.detach();
        if *shutdown.borrow() {
            break;
        }

        info!(
            "🔄 [RPC] Reconnecting in {:?}",
            link.config.reconnect_delay
        );
        tokio::select! {
            () = tokio::time::sleep(link.config.reconnect_delay) => {}
            _ = shutdown.changed() => {}
        }
    }

    link.shared.detach();
    debug!("[RPC] Supervisor stopped");
}

async fn run_session(
    link: &Link,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (mut sink, mut source) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    link.shared.attach(tx);

    let handshake = tokio::spawn(handshake(link.clone()));

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                if let Err(e) = sink.send(Message::text(frame)).await {
                    warn!("⚠️ [RPC] Send failed: {}", e);
                    break;
                }
            }
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => link.shared.dispatch(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    info!("🔌 [RPC] Edge closed the connection: {:?}", frame);
                    break;
                }
                Some(Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!("⚠️ [RPC] Receive failed: {}", e);
                    break;
                }
                None => {
                    info!("🔌 [RPC] Connection ended");
                    break;
                }
            },
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    handshake.abort();
}

/// Authenticate once per connection, then request the first snapshot
async fn handshake(link: Link) {
    let params = json!({
        "username": link.config.username,
        "password": link.config.password,
    });

    match link.call(METHOD_AUTHENTICATE_WITH_PASSWORD, params).await {
        Ok(_) => {
            info!("🔑 [RPC] Authenticated as {}", link.config.username);
            if let Err(e) = link.get_edge_config().await {
                warn!("⚠️ [RPC] Initial getEdgeConfig failed: {}", e);
            }
        }
        Err(e) => error!("❌ [RPC] Authentication failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> RpcTransport {
        RpcTransport::new(TransportConfig {
            url: "ws://127.0.0.1:9/jsonrpc".to_owned(),
            request_timeout: Duration::from_millis(200),
            ..TransportConfig::default()
        })
    }

    #[tokio::test]
    async fn test_call_while_disconnected_fails_fast() {
        let transport = transport();
        let result = transport.call("echo", json!({})).await;
        assert!(matches!(result, Err(EdgeError::NotConnected)));
        assert_eq!(transport.pending_count(), 0);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_dispatch_resolves_matching_id_only() {
        let transport = transport();
        let shared = &transport.link.shared;
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        shared.pending.lock().insert("a".to_owned(), tx_a);
        shared.pending.lock().insert("b".to_owned(), tx_b);

        shared.dispatch(r#"{"jsonrpc":"2.0","id":"a","result":{"value":1}}"#);

        assert_eq!(rx_a.await.unwrap().unwrap(), json!({"value": 1}));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(transport.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_error_never_resolves_result() {
        let transport = transport();
        let shared = &transport.link.shared;
        let (tx, rx) = oneshot::channel();
        shared.pending.lock().insert("x".to_owned(), tx);

        shared.dispatch(
            r#"{"jsonrpc":"2.0","id":"x","result":{"ok":true},"error":{"code":-1,"message":"bad"}}"#,
        );

        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, Err(EdgeError::Rpc { ref message, .. }) if message == "bad"));
    }

    #[tokio::test]
    async fn test_dispatch_broadcasts_every_frame() {
        let transport = transport();
        let mut inbound = transport.subscribe();

        transport
            .link
            .shared
            .dispatch(r#"{"jsonrpc":"2.0","method":"edgeRpc","params":{}}"#);
        transport.link.shared.dispatch("not json");

        let message = inbound.recv().await.unwrap();
        assert_eq!(message.method.as_deref(), Some("edgeRpc"));
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_detach_fails_pending_calls() {
        let transport = transport();
        let shared = &transport.link.shared;
        let (tx, rx) = oneshot::channel();
        shared.pending.lock().insert("x".to_owned(), tx);

        shared.detach();

        assert!(matches!(rx.await.unwrap(), Err(EdgeError::ConnectionClosed)));
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_and_close_stops() {
        let transport = transport();
        transport.connect();
        transport.connect();
        transport.close().await;
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(transport.control.supervisor.lock().is_none());
    }
}
