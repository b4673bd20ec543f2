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

use crate::errors::EdgeResult;
use crate::http::{RetryPolicy, build_client, ensure_success};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Addressing of one network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_dhcp: bool,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub subnet_mask: String,
    #[serde(default)]
    pub gateway: String,
}

/// Partial interface update; unset fields are left alone by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// REST client for the interface configuration backend
#[derive(Debug, Clone)]
pub struct NetworkApiClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl NetworkApiClient {
    pub fn new(base_url: impl Into<String>) -> EdgeResult<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client()?,
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            retry_delay,
        };
        self
    }

    pub async fn list(&self) -> EdgeResult<Vec<NetworkConfig>> {
        let url = format!("{}/api/network-config", self.base_url);
        debug!("🔍 [NETWORK] Fetching interfaces from {}", url);

        let response = self
            .retry
            .run(|| async { self.client.get(&url).send().await })
            .await?;
        let interfaces: Vec<NetworkConfig> = ensure_success(response, "NETWORK").await?.json().await?;
        debug!("✅ [NETWORK] {} interfaces", interfaces.len());
        Ok(interfaces)
    }

    pub async fn update(&self, iface: &str, update: &NetworkConfigUpdate) -> EdgeResult<NetworkConfig> {
        let url = format!("{}/api/network-config/{}", self.base_url, iface);
        info!("✏️ [NETWORK] Updating {}", iface);

        let response = self.client.post(&url).json(update).send().await?;
        Ok(ensure_success(response, "NETWORK").await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EdgeError;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_interfaces() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/network-config")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{
                    "id": "enp2s0",
                    "displayName": "LAN",
                    "isDhcp": false,
                    "ipAddress": "192.168.1.10",
                    "subnetMask": "255.255.255.0",
                    "gateway": "192.168.1.1"
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = NetworkApiClient::new(server.url()).unwrap();
        let interfaces = client.list().await.unwrap();

        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].display_name, "LAN");
        assert!(!interfaces[0].is_dhcp);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_sends_only_set_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/network-config/enp2s0")
            .match_body(Matcher::Json(json!({"isDhcp": true})))
            .with_status(200)
            .with_body(json!({"id": "enp2s0", "isDhcp": true}).to_string())
            .create_async()
            .await;

        let client = NetworkApiClient::new(server.url()).unwrap();
        let updated = client
            .update(
                "enp2s0",
                &NetworkConfigUpdate {
                    is_dhcp: Some(true),
                    ..NetworkConfigUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.is_dhcp);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/network-config/eth9")
            .with_status(404)
            .with_body("no such interface")
            .create_async()
            .await;

        let client = NetworkApiClient::new(server.url()).unwrap();
        let result = client.update("eth9", &NetworkConfigUpdate::default()).await;
        assert!(
            matches!(result, Err(EdgeError::Api { status: 404, ref message }) if message == "no such interface")
        );
    }
}
