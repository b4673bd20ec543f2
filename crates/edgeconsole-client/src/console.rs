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

//! Client for the Felix configuration manager of the edge
//!
//! Components are created, updated and deleted with form-encoded POSTs.
//! The list of configurations with their long PIDs is only available as a
//! JSON literal embedded in the admin HTML page, so it is scraped.

use crate::errors::{EdgeError, EdgeResult};
use crate::http::{RetryPolicy, build_client, ensure_success};
use edgeconsole_types::{ComponentConfig, FormBody, PidEntry, form_value};
use regex::Regex;
use reqwest::{Client, RequestBuilder, header};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CONFIG_MANAGER_PATH: &str = "/system/console/configMgr";

/// Form keys that steer the console rather than describe a property
const CONTROL_KEYS: [&str; 5] = ["apply", "propertylist", "factoryPid", "delete", "location"];

static CONFIG_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var configData = (\{.*?\});").expect("configData pattern is valid")
});

/// Long PIDs embedded in the configuration manager page
///
/// Anything that cannot be located or parsed yields an empty list.
pub fn parse_config_data(html: &str) -> Vec<PidEntry> {
    let Some(captures) = CONFIG_DATA.captures(html) else {
        warn!("⚠️ [CONSOLE] No configData found in configuration manager page");
        return Vec::new();
    };

    let config_data: Value = match serde_json::from_str(&captures[1]) {
        Ok(value) => value,
        Err(e) => {
            warn!("⚠️ [CONSOLE] configData is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let Some(pids) = config_data.get("pids").and_then(Value::as_array) else {
        return Vec::new();
    };

    pids.iter()
        .filter_map(|raw| match serde_json::from_value::<PidEntry>(raw.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("[CONSOLE] Skipping PID entry: {}", e);
                None
            }
        })
        .collect()
}

/// Add `apply=true` and a `propertylist` naming every property key, unless
/// the caller already supplied them
fn complete_form(mut body: FormBody) -> FormBody {
    if !body.contains("apply") {
        body.set("apply", "true");
    }
    if !body.contains("propertylist") {
        let listed: Vec<&str> = body
            .keys()
            .into_iter()
            .filter(|key| !CONTROL_KEYS.contains(key))
            .collect();
        let listed = listed.join(",");
        body.set("propertylist", listed);
    }
    body
}

#[derive(Debug, Clone)]
pub struct ConsoleClient {
    base_url: String,
    client: Client,
    credentials: Option<(String, String)>,
    retry: RetryPolicy,
}

impl ConsoleClient {
    pub fn new(base_url: impl Into<String>) -> EdgeResult<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client()?,
            credentials: None,
            retry: RetryPolicy::default(),
        })
    }

    /// HTTP basic authentication for every request
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            retry_delay,
        };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, identifier: &str) -> String {
        format!("{}{}/{}", self.base_url, CONFIG_MANAGER_PATH, identifier)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    /// Scrape the configuration list with its long PIDs
    pub async fn list_pids(&self) -> EdgeResult<Vec<PidEntry>> {
        let url = format!("{}{}", self.base_url, CONFIG_MANAGER_PATH);
        debug!("🔍 [CONSOLE] Fetching configuration list");
        debug!("   URL: {}", url);

        let response = self
            .retry
            .run(|| async { self.authorize(self.client.get(&url)).send().await })
            .await?;
        let html = ensure_success(response, "CONSOLE").await?.text().await?;

        let pids = parse_config_data(&html);
        debug!("✅ [CONSOLE] {} configurations listed", pids.len());
        Ok(pids)
    }

    /// Raw property description of one configuration
    pub async fn get_component_details(&self, pid: &str) -> EdgeResult<Value> {
        let url = format!("{}.json", self.url(pid));
        debug!("🔍 [CONSOLE] Fetching details for {}", pid);

        let response = self
            .retry
            .run(|| async { self.authorize(self.client.get(&url)).send().await })
            .await?;
        Ok(ensure_success(response, "CONSOLE").await?.json().await?)
    }

    /// POST a form to `configMgr/{identifier}`. Sent once, never retried.
    pub async fn post_form(&self, identifier: &str, body: &FormBody) -> EdgeResult<String> {
        let url = self.url(identifier);
        let encoded = body.encode();
        debug!("📤 [CONSOLE] POST {}", url);
        debug!("   Body: {}", encoded);

        let response = self
            .authorize(self.client.post(&url))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encoded)
            .send()
            .await?;
        Ok(ensure_success(response, "CONSOLE").await?.text().await?)
    }

    pub async fn create_component(
        &self,
        factory_pid: &str,
        properties: &Map<String, Value>,
    ) -> EdgeResult<()> {
        info!("➕ [CONSOLE] Creating {} component", factory_pid);
        let body = complete_form(FormBody::from_properties(properties));
        self.post_form(factory_pid, &body).await?;
        Ok(())
    }

    pub async fn update_component(&self, pid: &str, properties: &Map<String, Value>) -> EdgeResult<()> {
        info!("✏️ [CONSOLE] Updating {}", pid);
        let body = complete_form(FormBody::from_properties(properties));
        self.post_form(pid, &body).await?;
        Ok(())
    }

    /// Update a controller. A checked `enabled` is posted as the checkbox
    /// pair `enabled=true&enabled=false`.
    pub async fn update_controller(
        &self,
        pid: &str,
        properties: &Map<String, Value>,
    ) -> EdgeResult<()> {
        info!("✏️ [CONSOLE] Updating controller {}", pid);
        let mut body = FormBody::new();
        for (key, value) in properties {
            if key == "enabled" && value.as_bool() == Some(true) {
                body.set_checkbox(key, true);
            } else {
                body.set(key, form_value(value));
            }
        }
        self.post_form(pid, &complete_form(body)).await?;
        Ok(())
    }

    /// Update through the `{key}.value` field convention
    pub async fn update_config_values(
        &self,
        pid: &str,
        properties: &Map<String, Value>,
    ) -> EdgeResult<()> {
        info!("✏️ [CONSOLE] Updating values of {}", pid);
        let mut body = FormBody::new();
        body.set("apply", "true");
        for (key, value) in properties {
            body.set(format!("{key}.value"), form_value(value));
        }
        let listed: Vec<&str> = properties.keys().map(String::as_str).collect();
        body.set("propertylist", listed.join(","));

        self.post_form(pid, &body).await?;
        Ok(())
    }

    pub async fn delete_component(&self, pid: &str) -> EdgeResult<()> {
        info!("🗑️ [CONSOLE] Deleting {}", pid);
        let body = FormBody::new().with("apply", "true").with("delete", "true");
        self.post_form(pid, &body).await?;
        Ok(())
    }

    /// Validate and create a typed component
    pub async fn create(&self, config: &ComponentConfig) -> EdgeResult<()> {
        let body = config.to_create_form()?;
        info!(
            "➕ [CONSOLE] Creating {} ({})",
            config.id(),
            config.factory_id()
        );
        self.post_form(config.factory_id(), &body).await?;
        Ok(())
    }

    /// Validate and update a typed component stored under `pid`
    pub async fn update(&self, pid: &str, config: &ComponentConfig) -> EdgeResult<()> {
        if pid.is_empty() {
            return Err(EdgeError::PidNotFound(config.id().to_owned()));
        }
        let body = config.to_update_form()?;
        info!("✏️ [CONSOLE] Updating {} ({})", config.id(), pid);
        self.post_form(pid, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeconsole_types::{InverterConfig, SerialPortConfig};
    use mockito::{Matcher, Server};
    use serde_json::json;

    const PAGE: &str = r#"<html><script>
var configData = {"status":true,"pids":[{"id":"felix.pid.47","fpid":"PV-Inverter.Fronius","nameHint":"Fronius [pvInverter0]"},{"id":"felix.pid.48","fpid":"Bridge.Modbus.Serial","nameHint":"Serial [modbus0]"}]};
var other = {};
</script></html>"#;

    fn client(server: &Server) -> ConsoleClient {
        ConsoleClient::new(server.url())
            .unwrap()
            .with_retry_config(1, Duration::from_millis(10))
    }

    #[test]
    fn test_parse_config_data() {
        let pids = parse_config_data(PAGE);
        assert_eq!(pids.len(), 2);
        assert_eq!(pids[0].id, "felix.pid.47");
        assert_eq!(pids[1].alias(), Some("modbus0"));
    }

    #[test]
    fn test_parse_config_data_failures_yield_empty() {
        assert!(parse_config_data("<html>nothing here</html>").is_empty());
        assert!(parse_config_data("var configData = {not json};").is_empty());
        assert!(parse_config_data(r#"var configData = {"status":true};"#).is_empty());
    }

    #[test]
    fn test_complete_form_adds_apply_and_propertylist() {
        let body = complete_form(FormBody::new().with("factoryPid", "X").with("alias", "a"));
        assert_eq!(body.get("apply"), Some("true"));
        assert_eq!(body.get("propertylist"), Some("alias"));

        let given = complete_form(FormBody::new().with("propertylist", "id"));
        assert_eq!(given.get("propertylist"), Some("id"));
    }

    #[tokio::test]
    async fn test_list_pids_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/system/console/configMgr")
            .match_header("authorization", "Basic YWRtaW46YWRtaW4=")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(PAGE)
            .create_async()
            .await;

        let client = client(&server).with_credentials("admin", "admin");
        let pids = client.list_pids().await.unwrap();

        assert_eq!(pids.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_pids_http_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/system/console/configMgr")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = client(&server).list_pids().await;
        assert!(matches!(result, Err(EdgeError::Api { status: 500, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_pids_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/system/console/configMgr")
            .with_status(401)
            .create_async()
            .await;

        let result = client(&server).list_pids().await;
        assert!(matches!(result, Err(EdgeError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_delete_posts_exact_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/system/console/configMgr/felix.pid.47")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body("apply=true&delete=true")
            .with_status(200)
            .create_async()
            .await;

        client(&server).delete_component("felix.pid.47").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_component_joins_arrays() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/system/console/configMgr/Meter.Socomec")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("modbusUnitId".into(), "1,2".into()),
                Matcher::UrlEncoded("location".into(), String::new()),
                Matcher::UrlEncoded("apply".into(), "true".into()),
                Matcher::UrlEncoded("propertylist".into(), "alias,modbusUnitId".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let properties = json!({"alias": "meter0", "modbusUnitId": [1, 2], "location": null});
        client(&server)
            .create_component("Meter.Socomec", properties.as_object().unwrap())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_controller_doubles_checked_enabled() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/system/console/configMgr/felix.pid.9")
            .match_body(Matcher::Regex("enabled=true&enabled=false".into()))
            .with_status(200)
            .create_async()
            .await;

        let properties = json!({"enabled": true, "powerLimit": 5000});
        client(&server)
            .update_controller("felix.pid.9", properties.as_object().unwrap())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_controller_unchecked_sent_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/system/console/configMgr/felix.pid.9")
            .match_body("enabled=false&apply=true&propertylist=enabled")
            .with_status(200)
            .create_async()
            .await;

        let properties = json!({"enabled": false});
        client(&server)
            .update_controller("felix.pid.9", properties.as_object().unwrap())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_config_values_uses_value_suffix() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/system/console/configMgr/felix.pid.3")
            .match_body("apply=true&alias.value=Grid&propertylist=alias")
            .with_status(200)
            .create_async()
            .await;

        let properties = json!({"alias": "Grid"});
        client(&server)
            .update_config_values("felix.pid.3", properties.as_object().unwrap())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_component_details() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/system/console/configMgr/felix.pid.47.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"pid":"felix.pid.47","properties":{}}"#)
            .create_async()
            .await;

        let details = client(&server)
            .get_component_details("felix.pid.47")
            .await
            .unwrap();
        assert_eq!(details["pid"], "felix.pid.47");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_typed_create_posts_to_factory() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/system/console/configMgr/Bridge.Modbus.Serial")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "modbus0".into()),
                Matcher::UrlEncoded("portName".into(), "/dev/ttyS1".into()),
                Matcher::UrlEncoded("logVerbosity".into(), "1".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let config = ComponentConfig::SerialPort(SerialPortConfig::new("modbus0", "/dev/ttyS1"));
        client(&server).create(&config).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_typed_create_rejects_invalid_without_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let config = ComponentConfig::Inverter(InverterConfig {
            factory_id: "PV-Inverter.Fronius".to_owned(),
            id: "pvInverter0".to_owned(),
            max_active_power_w: 5000,
            modbus_id: "modbus0".to_owned(),
            modbus_unit_id: 300,
        });
        let result = client(&server).create(&config).await;
        assert!(matches!(result, Err(EdgeError::Validation(ref e)) if e.field == "modbusUnitId"));
        mock.assert_async().await;
    }
}
