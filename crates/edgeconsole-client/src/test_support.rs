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

//! In-memory edge used by unit tests

use crate::errors::{EdgeError, EdgeResult};
use crate::traits::RpcChannel;
use async_trait::async_trait;
use edgeconsole_types::JsonRpcResponse;
use edgeconsole_types::rpc::{METHOD_AUTHENTICATE_WITH_PASSWORD, METHOD_EDGE_RPC, METHOD_GET_EDGE_CONFIG};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::broadcast;

/// Answers `authenticateWithPassword` against a fixed password and
/// `getEdgeConfig` with the configured component map, broadcasting the
/// response like the real transport does.
#[derive(Debug)]
pub struct FakeChannel {
    inbound: broadcast::Sender<JsonRpcResponse>,
    password: Mutex<String>,
    components: Mutex<Value>,
    silent: Mutex<bool>,
    failing: Mutex<bool>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self {
            inbound: broadcast::channel(64).0,
            password: Mutex::new("admin".to_owned()),
            components: Mutex::new(json!({})),
            silent: Mutex::new(false),
            failing: Mutex::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_password(&self, password: &str) {
        *self.password.lock() = password.to_owned();
    }

    pub fn set_components(&self, components: Value) {
        *self.components.lock() = components;
    }

    /// Answer calls without broadcasting anything
    pub fn set_silent(&self, silent: bool) {
        *self.silent.lock() = silent;
    }

    /// Fail every `edgeRpc` call as if the edge never answered
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Hold every `edgeRpc` call for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn push(&self, message: JsonRpcResponse) {
        let _ = self.inbound.send(message);
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Methods wrapped in `edgeRpc`
    pub fn edge_methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == METHOD_EDGE_RPC)
            .filter_map(|(_, params)| params.pointer("/payload/method")?.as_str().map(str::to_owned))
            .collect()
    }
}

#[async_trait]
impl RpcChannel for FakeChannel {
    async fn call(&self, method: &str, params: Value) -> EdgeResult<Value> {
        self.calls.lock().push((method.to_owned(), params.clone()));

        match method {
            METHOD_AUTHENTICATE_WITH_PASSWORD => {
                if params["password"].as_str() == Some(self.password.lock().as_str()) {
                    Ok(json!({"user": {"id": params["username"]}}))
                } else {
                    Err(EdgeError::Rpc {
                        code: 1003,
                        message: "Authentication failed".to_owned(),
                    })
                }
            }
            METHOD_EDGE_RPC => {
                let delay = *self.delay.lock();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if *self.failing.lock() {
                    return Err(EdgeError::Timeout {
                        method: METHOD_EDGE_RPC.to_owned(),
                    });
                }

                let inner_id = params.pointer("/payload/id").cloned().unwrap_or(Value::Null);
                let inner_result = match params.pointer("/payload/method").and_then(Value::as_str) {
                    Some(METHOD_GET_EDGE_CONFIG) => json!({"components": self.components.lock().clone()}),
                    _ => json!({}),
                };
                let result = json!({
                    "payload": {"jsonrpc": "2.0", "id": inner_id, "result": inner_result}
                });

                if !*self.silent.lock() {
                    let response = JsonRpcResponse {
                        jsonrpc: "2.0".to_owned(),
                        id: Some("fake".to_owned()),
                        result: Some(result.clone()),
                        ..JsonRpcResponse::default()
                    };
                    let _ = self.inbound.send(response);
                }
                Ok(result)
            }
            _ => Ok(Value::Null),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<JsonRpcResponse> {
        self.inbound.subscribe()
    }

    fn edge_id(&self) -> &str {
        "0"
    }
}
