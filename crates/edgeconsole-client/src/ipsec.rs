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
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// One IPSec tunnel definition. Fields the console does not model are kept
/// in `extra` and sent back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpsecConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub identities: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Certificate {
    /// Certificates with a private key can serve as the local identity
    pub fn has_private_key(&self) -> bool {
        self.kind.as_deref() == Some("key")
    }
}

/// REST client for the IPSec backend
#[derive(Debug, Clone)]
pub struct IpsecApiClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl IpsecApiClient {
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

    pub async fn list_connections(&self) -> EdgeResult<Vec<IpsecConnection>> {
        let url = format!("{}/api/connections", self.base_url);
        debug!("🔍 [IPSEC] Fetching connections");
        let response = self
            .retry
            .run(|| async { self.client.get(&url).send().await })
            .await?;
        Ok(ensure_success(response, "IPSEC").await?.json().await?)
    }

    pub async fn create_connection(&self, connection: &IpsecConnection) -> EdgeResult<Value> {
        let url = format!("{}/api/connections", self.base_url);
        info!("➕ [IPSEC] Creating connection {}", connection.name);
        let response = self.client.post(&url).json(connection).send().await?;
        Ok(ensure_success(response, "IPSEC").await?.json().await?)
    }

    pub async fn update_connection(&self, id: &str, connection: &IpsecConnection) -> EdgeResult<Value> {
        let url = format!("{}/api/connections/{}", self.base_url, id);
        info!("✏️ [IPSEC] Updating connection {}", id);
        let response = self.client.put(&url).json(connection).send().await?;
        Ok(ensure_success(response, "IPSEC").await?.json().await?)
    }

    pub async fn delete_connection(&self, id: &str) -> EdgeResult<()> {
        let url = format!("{}/api/connections/{}", self.base_url, id);
        info!("🗑️ [IPSEC] Deleting connection {}", id);
        let response = self.client.delete(&url).send().await?;
        ensure_success(response, "IPSEC").await?;
        Ok(())
    }

    pub async fn list_certificates(&self) -> EdgeResult<Vec<Certificate>> {
        let url = format!("{}/api/certificates", self.base_url);
        debug!("🔍 [IPSEC] Fetching certificates");
        let response = self
            .retry
            .run(|| async { self.client.get(&url).send().await })
            .await?;
        Ok(ensure_success(response, "IPSEC").await?.json().await?)
    }

    /// Upload certificate bytes as multipart field `file`
    pub async fn upload_certificate(&self, file_name: &str, contents: Vec<u8>) -> EdgeResult<Value> {
        let url = format!("{}/api/certificates/upload", self.base_url);
        info!("📤 [IPSEC] Uploading certificate {}", file_name);

        let form = Form::new().part("file", Part::bytes(contents).file_name(file_name.to_owned()));
        let response = self.client.post(&url).multipart(form).send().await?;
        Ok(ensure_success(response, "IPSEC").await?.json().await?)
    }

    pub async fn upload_certificate_file(&self, path: &Path) -> EdgeResult<Value> {
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "certificate".to_owned(), |n| n.to_string_lossy().into_owned());
        self.upload_certificate(&file_name, contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_list_connections_keeps_extra_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/connections")
            .with_status(200)
            .with_body(
                json!([{
                    "id": "c1",
                    "name": "hq",
                    "conn_type": "site-to-site",
                    "auth_method": "ikev2-psk",
                    "ike_version": "2",
                    "pre_shared_key": "secret"
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = IpsecApiClient::new(server.url()).unwrap();
        let connections = client.list_connections().await.unwrap();

        assert_eq!(connections[0].name, "hq");
        assert_eq!(connections[0].conn_type.as_deref(), Some("site-to-site"));
        assert_eq!(connections[0].extra["ike_version"], "2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_and_delete_paths() {
        let mut server = Server::new_async().await;
        let put = server
            .mock("PUT", "/api/connections/c1")
            .match_body(Matcher::PartialJson(json!({"name": "hq", "comments": "moved"})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/connections/c1")
            .with_status(204)
            .create_async()
            .await;

        let client = IpsecApiClient::new(server.url()).unwrap();
        let mut connection = IpsecConnection {
            name: "hq".to_owned(),
            ..IpsecConnection::default()
        };
        connection.extra.insert("comments".to_owned(), json!("moved"));

        client.update_connection("c1", &connection).await.unwrap();
        client.delete_connection("c1").await.unwrap();
        put.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_certificates_and_upload() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("GET", "/api/certificates")
            .with_status(200)
            .with_body(
                json!([{"name": "edge.pem", "type": "key", "identities": ["CN=edge"]}]).to_string(),
            )
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/api/certificates/upload")
            .match_header("content-type", Matcher::Regex("multipart/form-data".to_owned()))
            .match_body(Matcher::Regex("name=\"file\"".to_owned()))
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let client = IpsecApiClient::new(server.url()).unwrap();
        let certificates = client.list_certificates().await.unwrap();
        assert!(certificates[0].has_private_key());
        assert_eq!(certificates[0].identities, vec!["CN=edge".to_owned()]);

        let response = client
            .upload_certificate("ca.pem", b"-----BEGIN CERTIFICATE-----".to_vec())
            .await
            .unwrap();
        assert_eq!(response["status"], "ok");
        list.assert_async().await;
        upload.assert_async().await;
    }
}
