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

use crate::errors::{EdgeError, EdgeResult};
use crate::traits::RpcChannel;
use edgeconsole_types::{ComponentMap, JsonRpcResponse};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type Snapshot = Option<Arc<ComponentMap>>;

/// Locate the component map in a `getEdgeConfig` response or an
/// `edgeConfig` notification
fn components_value(message: &JsonRpcResponse) -> Option<&Value> {
    let from_result = message
        .result
        .as_ref()
        .and_then(|result| result.pointer("/payload/result/components"))
        .filter(|value| !value.is_null());

    from_result.or_else(|| {
        message
            .params
            .as_ref()
            .and_then(|params| params.pointer("/payload/params/components"))
            .filter(|value| !value.is_null())
    })
}

/// Component map carried by `message`, if any
pub fn extract_components(message: &JsonRpcResponse) -> Option<ComponentMap> {
    let raw = components_value(message)?;
    match serde_json::from_value(raw.clone()) {
        Ok(components) => Some(components),
        Err(e) => {
            warn!("⚠️ [STATE] Ignoring unparsable component map: {}", e);
            None
        }
    }
}

/// Replace the snapshot when `message` carries one. Returns whether it did.
fn ingest(snapshot: &watch::Sender<Snapshot>, message: &JsonRpcResponse) -> bool {
    let Some(components) = extract_components(message) else {
        return false;
    };
    info!("📦 [STATE] Snapshot updated: {} components", components.len());
    snapshot.send_replace(Some(Arc::new(components)));
    true
}

async fn listen(
    mut inbound: broadcast::Receiver<JsonRpcResponse>,
    snapshot: Arc<watch::Sender<Snapshot>>,
) {
    loop {
        match inbound.recv().await {
            Ok(message) => {
                if !ingest(&snapshot, &message) {
                    debug!("[STATE] Frame without components ignored");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("⚠️ [STATE] Listener lagged, skipped {} frames", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("[STATE] Inbound stream closed");
                break;
            }
        }
    }
}

/// Latest device configuration as seen over the RPC channel
///
/// Holds `None` until the first message carrying components arrives, then
/// the last map received. Each new map replaces the previous one wholesale.
#[derive(Debug)]
pub struct EdgeStateStore {
    snapshot: Arc<watch::Sender<Snapshot>>,
    channel: Arc<dyn RpcChannel>,
    listener: JoinHandle<()>,
}

impl EdgeStateStore {
    /// Subscribe to `channel` and start the listener task. Create the store
    /// before connecting so the first snapshot is not missed.
    pub fn spawn(channel: Arc<dyn RpcChannel>) -> Self {
        let snapshot = Arc::new(watch::channel(None).0);
        let listener = tokio::spawn(listen(channel.subscribe(), Arc::clone(&snapshot)));
        Self {
            snapshot,
            channel,
            listener,
        }
    }

    pub fn current(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Publish a message as if it had arrived on the channel
    pub fn ingest(&self, message: &JsonRpcResponse) -> bool {
        ingest(&self.snapshot, message)
    }

    /// First available snapshot, waiting up to `timeout`
    pub async fn wait_for_snapshot(&self, timeout: Duration) -> EdgeResult<Arc<ComponentMap>> {
        let mut receiver = self.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            receiver
                .wait_for(Option::is_some)
                .await
                .map(|snapshot| snapshot.clone())
        })
        .await;

        match waited {
            Ok(Ok(Some(components))) => Ok(components),
            Ok(Ok(None) | Err(_)) => Err(EdgeError::ConnectionClosed),
            Err(_) => Err(EdgeError::Timeout {
                method: "getEdgeConfig".to_owned(),
            }),
        }
    }

    /// Ask the edge for a fresh snapshot. The answer is published through
    /// the regular inbound path.
    pub async fn refresh(&self) -> EdgeResult<()> {
        debug!("🔄 [STATE] Requesting fresh snapshot");
        self.channel.get_edge_config().await?;
        Ok(())
    }

    /// Refresh and wait until a new snapshot is published or `timeout`
    /// elapses. Returns whether a new snapshot arrived.
    pub async fn refresh_and_wait(&self, timeout: Duration) -> EdgeResult<bool> {
        let mut receiver = self.subscribe();
        receiver.borrow_and_update();

        self.refresh().await?;

        match tokio::time::timeout(timeout, receiver.changed()).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(_)) => Err(EdgeError::ConnectionClosed),
            Err(_) => {
                debug!("[STATE] No new snapshot within {:?}", timeout);
                Ok(false)
            }
        }
    }
}

impl Drop for EdgeStateStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
