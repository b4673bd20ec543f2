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
use async_trait::async_trait;
use edgeconsole_types::rpc::{
    METHOD_EDGE_RPC, METHOD_GET_EDGE_CONFIG, METHOD_UPDATE_COMPONENT_CONFIG,
};
use edgeconsole_types::{
    EdgeRpcParams, EdgeRpcResult, JsonRpcRequest, JsonRpcResponse, PropertyUpdate,
    UpdateComponentConfigParams,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;

/// Request/response channel to the edge
///
/// Implemented by the WebSocket transport. The store, account service and
/// session only depend on this trait so they can be driven by a fake in tests.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send one JSON-RPC request and wait for the response carrying its id
    async fn call(&self, method: &str, params: Value) -> EdgeResult<Value>;

    /// Every inbound frame, responses and notifications alike
    fn subscribe(&self) -> broadcast::Receiver<JsonRpcResponse>;

    /// Edge addressed by `edgeRpc`
    fn edge_id(&self) -> &str;

    /// Wrap a request for the edge and unwrap its nested response
    async fn edge_rpc(&self, method: &str, params: Value) -> EdgeResult<Value> {
        let inner = JsonRpcRequest::new(uuid::Uuid::new_v4().to_string(), method, params);
        let params = serde_json::to_value(EdgeRpcParams {
            edge_id: self.edge_id().to_owned(),
            payload: inner,
        })?;
        let outer = self.call(METHOD_EDGE_RPC, params).await?;
        unwrap_edge_payload(outer)
    }

    /// Ask the edge for its full component configuration
    async fn get_edge_config(&self) -> EdgeResult<Value> {
        self.edge_rpc(METHOD_GET_EDGE_CONFIG, json!({})).await
    }

    async fn update_component_config(
        &self,
        component_id: &str,
        properties: Vec<PropertyUpdate>,
    ) -> EdgeResult<Value> {
        let params = serde_json::to_value(UpdateComponentConfigParams {
            component_id: component_id.to_owned(),
            properties,
        })?;
        self.edge_rpc(METHOD_UPDATE_COMPONENT_CONFIG, params).await
    }
}

impl std::fmt::Debug for dyn RpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChannel")
            .field("edge_id", &self.edge_id())
            .finish_non_exhaustive()
    }
}

/// Pull `payload.result` out of an `edgeRpc` result, or fail with `payload.error`
pub fn unwrap_edge_payload(outer: Value) -> EdgeResult<Value> {
    let result: EdgeRpcResult = serde_json::from_value(outer).map_err(|e| {
        EdgeError::InvalidResponse(format!("edgeRpc result without payload: {e}"))
    })?;
    result.payload.into_result().map_err(EdgeError::from)
}
