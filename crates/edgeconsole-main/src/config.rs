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

use anyhow::{Context, Result};
use edgeconsole_client::{
    ConsoleClient, IpsecApiClient, NetworkApiClient, SessionSettings, TransportConfig,
};
use edgeconsole_types::Catalog;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog JSON replacing the bundled one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// JSON-RPC WebSocket of the edge
    pub edge: EdgeConfig,

    /// Felix configuration manager
    pub console: ConsoleConfig,

    /// Network interface backend
    #[serde(default = "default_network_api")]
    pub network_api: ApiConfig,

    /// IPSec backend
    #[serde(default = "default_ipsec_api")]
    pub ipsec_api: ApiConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub ws_url: String,
    #[serde(default = "default_edge_id")]
    pub edge_id: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub base_url: String,
    /// Basic auth for the console (optional)
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Wait for the snapshot following a change (seconds)
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_secs: u64,
    /// Wait for the first snapshot after connecting (seconds)
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_secs: u64,
}

fn default_edge_id() -> String {
    "0".to_owned()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_network_api() -> ApiConfig {
    ApiConfig {
        base_url: "http://localhost:5000".to_owned(),
    }
}

fn default_ipsec_api() -> ApiConfig {
    ApiConfig {
        base_url: "http://localhost:5001".to_owned(),
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_settle_timeout() -> u64 {
    3
}

fn default_snapshot_timeout() -> u64 {
    10
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            settle_timeout_secs: default_settle_timeout(),
            snapshot_timeout_secs: default_snapshot_timeout(),
        }
    }
}

impl Default for AppConfig {
    /// Edge on localhost with factory credentials
    fn default() -> Self {
        Self {
            catalog_path: None,
            edge: EdgeConfig {
                ws_url: "ws://localhost:8085/jsonrpc".to_owned(),
                edge_id: default_edge_id(),
                username: "admin".to_owned(),
                password: "admin".to_owned(),
                request_timeout_secs: default_request_timeout(),
                reconnect_delay_secs: default_reconnect_delay(),
            },
            console: ConsoleConfig {
                base_url: "http://localhost:8080".to_owned(),
                username: None,
                password: None,
                max_retries: default_max_retries(),
                retry_delay_ms: default_retry_delay_ms(),
            },
            network_api: default_network_api(),
            ipsec_api: default_ipsec_api(),
            system: SystemConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `explicit`, else `config.toml` or `config.json` in the
    /// working directory, else defaults with environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(explicit, Path::new("."))
    }

    pub fn load_from(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Self::from_file(path)?;
            info!("✅ Loaded configuration from {}", path.display());
            config.validate()?;
            return Ok(config);
        }

        for name in ["config.toml", "config.json"] {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::from_file(&path)?;
                info!("✅ Loaded configuration from {}", name);
                config.validate()?;
                return Ok(config);
            }
        }

        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Override fields from `lookup(VARIABLE)`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("EDGE_WS_URL") {
            self.edge.ws_url = url;
        }
        if let Some(edge_id) = lookup("EDGE_ID") {
            self.edge.edge_id = edge_id;
        }
        if let Some(username) = lookup("EDGE_USERNAME") {
            self.edge.username = username;
        }
        if let Some(password) = lookup("EDGE_PASSWORD") {
            self.edge.password = password;
        }
        if let Some(url) = lookup("EDGE_CONSOLE_URL") {
            self.console.base_url = url;
        }
        if let Some(username) = lookup("CONSOLE_USERNAME") {
            self.console.username = Some(username);
        }
        if let Some(password) = lookup("CONSOLE_PASSWORD") {
            self.console.password = Some(password);
        }
        if let Some(url) = lookup("NETWORK_API_URL") {
            self.network_api.base_url = url;
        }
        if let Some(url) = lookup("IPSEC_API_URL") {
            self.ipsec_api.base_url = url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.system.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.edge.ws_url.starts_with("wss://") {
            anyhow::bail!("edge.ws_url: wss:// is not supported, use ws://");
        }
        if !self.edge.ws_url.starts_with("ws://") {
            anyhow::bail!("edge.ws_url must start with ws:// (got '{}')", self.edge.ws_url);
        }
        if self.edge.edge_id.trim().is_empty() {
            anyhow::bail!("edge.edge_id must not be empty");
        }

        for (name, url) in [
            ("console.base_url", &self.console.base_url),
            ("network_api.base_url", &self.network_api.base_url),
            ("ipsec_api.base_url", &self.ipsec_api.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{} must start with http:// or https:// (got '{}')", name, url);
            }
        }

        if self.console.username.is_some() != self.console.password.is_some() {
            anyhow::bail!("console.username and console.password must be set together");
        }

        for (name, value) in [
            ("edge.request_timeout_secs", self.edge.request_timeout_secs),
            ("edge.reconnect_delay_secs", self.edge.reconnect_delay_secs),
            ("system.settle_timeout_secs", self.system.settle_timeout_secs),
            ("system.snapshot_timeout_secs", self.system.snapshot_timeout_secs),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }

        if !LOG_LEVELS.contains(&self.system.log_level.as_str()) {
            anyhow::bail!(
                "system.log_level '{}' is not one of {:?}",
                self.system.log_level,
                LOG_LEVELS
            );
        }

        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            url: self.edge.ws_url.clone(),
            edge_id: self.edge.edge_id.clone(),
            username: self.edge.username.clone(),
            password: self.edge.password.clone(),
            request_timeout: Duration::from_secs(self.edge.request_timeout_secs),
            reconnect_delay: Duration::from_secs(self.edge.reconnect_delay_secs),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            snapshot_timeout: Duration::from_secs(self.system.snapshot_timeout_secs),
            settle_timeout: Duration::from_secs(self.system.settle_timeout_secs),
        }
    }

    pub fn console_client(&self) -> Result<ConsoleClient> {
        let client = ConsoleClient::new(&self.console.base_url)?.with_retry_config(
            self.console.max_retries,
            Duration::from_millis(self.console.retry_delay_ms),
        );
        Ok(match (&self.console.username, &self.console.password) {
            (Some(username), Some(password)) => client.with_credentials(username, password),
            _ => client,
        })
    }

    pub fn network_client(&self) -> Result<NetworkApiClient> {
        Ok(NetworkApiClient::new(&self.network_api.base_url)?)
    }

    pub fn ipsec_client(&self) -> Result<IpsecApiClient> {
        Ok(IpsecApiClient::new(&self.ipsec_api.base_url)?)
    }

    /// The configured catalog, or the bundled one
    pub fn catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display())),
            None => Catalog::bundled().context("Bundled catalog is invalid"),
        }
    }
}
