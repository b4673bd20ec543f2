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

//! Login state and password changes for the edge account

use crate::console::ConsoleClient;
use crate::errors::{EdgeError, EdgeResult};
use crate::traits::RpcChannel;
use edgeconsole_types::factory::ACCOUNT_ID;
use edgeconsole_types::rpc::METHOD_AUTHENTICATE_WITH_PASSWORD;
use edgeconsole_types::{AccountConfig, ComponentConfig, ValidationError};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Lowercase hex SHA-256 of a password, the form the account component stores
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct AccountService {
    channel: Arc<dyn RpcChannel>,
    console: ConsoleClient,
    logged_in: watch::Sender<bool>,
}

impl AccountService {
    pub fn new(channel: Arc<dyn RpcChannel>, console: ConsoleClient) -> Self {
        Self {
            channel,
            console,
            logged_in: watch::channel(false).0,
        }
    }

    /// Check credentials against the edge. The logged-in flag follows the
    /// outcome.
    pub async fn login(&self, username: &str, password: &str) -> EdgeResult<()> {
        info!("🔑 [ACCOUNT] Logging in as {}", username);
        match self.authenticate(username, password).await {
            Ok(()) => {
                self.logged_in.send_replace(true);
                info!("✅ [ACCOUNT] Logged in");
                Ok(())
            }
            Err(e) => {
                self.logged_in.send_replace(false);
                Err(e)
            }
        }
    }

    pub fn logout(&self) {
        if self.logged_in.send_replace(false) {
            info!("[ACCOUNT] Logged out");
        }
    }

    pub fn is_logged_in(&self) -> bool {
        *self.logged_in.borrow()
    }

    pub fn watch_login(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }

    /// Replace the account password
    ///
    /// The current password is verified by the edge first. On success the new
    /// hash is written to the account component and the session is logged out.
    ///
    /// The edge's own `authenticateWithPassword` check does not read the
    /// account component, so [`AccountService::login`] keeps accepting the
    /// edge user's password. The stored hash is only consulted by consoles
    /// that compare against the account component.
    pub async fn change_password(&self, current: &str, new_password: &str) -> EdgeResult<()> {
        if new_password.is_empty() {
            return Err(ValidationError::new("password", "must not be empty").into());
        }

        if let Err(e) = self.authenticate(ACCOUNT_ID, current).await {
            warn!("⚠️ [ACCOUNT] Current password rejected");
            return Err(e);
        }

        let config = ComponentConfig::Account(AccountConfig {
            password_hash: hash_password(new_password),
        });
        self.console.create(&config).await?;

        info!("✅ [ACCOUNT] Password changed, logging out");
        self.logout();
        Ok(())
    }

    async fn authenticate(&self, username: &str, password: &str) -> EdgeResult<()> {
        let params = json!({"username": username, "password": password});
        match self.channel.call(METHOD_AUTHENTICATE_WITH_PASSWORD, params).await {
            Ok(_) => Ok(()),
            Err(EdgeError::Rpc { code, message }) => {
                error!("❌ [ACCOUNT] Authentication rejected ({}): {}", code, message);
                Err(EdgeError::AuthenticationFailed)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeChannel;
    use mockito::{Matcher, Server};

    const ADMIN_HASH: &str = "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918";

    fn service(server: &Server, channel: Arc<FakeChannel>) -> AccountService {
        AccountService::new(channel, ConsoleClient::new(server.url()).unwrap())
    }

    #[test]
    fn test_hash_password() {
        assert_eq!(hash_password("admin"), ADMIN_HASH);
        assert_eq!(hash_password("admin").len(), 64);
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let server = Server::new_async().await;
        let channel = Arc::new(FakeChannel::new());
        let account = service(&server, Arc::clone(&channel));
        let mut watcher = account.watch_login();

        account.login("admin", "admin").await.unwrap();
        assert!(account.is_logged_in());
        assert!(*watcher.borrow_and_update());

        account.logout();
        assert!(!account.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let server = Server::new_async().await;
        let channel = Arc::new(FakeChannel::new());
        let account = service(&server, channel);

        let result = account.login("admin", "nope").await;
        assert!(matches!(result, Err(EdgeError::AuthenticationFailed)));
        assert!(!account.is_logged_in());
    }

    #[tokio::test]
    async fn test_change_password_writes_account_component() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/system/console/configMgr/Controller.io.openems.edge.account.config",
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("apply".into(), "true".into()),
                Matcher::UrlEncoded(
                    "factoryPid".into(),
                    "Controller.io.openems.edge.account.config".into(),
                ),
                Matcher::UrlEncoded("id".into(), "admin".into()),
                Matcher::UrlEncoded("alias".into(), hash_password("s3cret")),
                Matcher::UrlEncoded("propertylist".into(), "id,alias".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let channel = Arc::new(FakeChannel::new());
        let account = service(&server, Arc::clone(&channel));
        account.login("admin", "admin").await.unwrap();

        account.change_password("admin", "s3cret").await.unwrap();

        assert!(!account.is_logged_in());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_after_change_uses_edge_password() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/system/console/configMgr/Controller.io.openems.edge.account.config",
            )
            .with_status(200)
            .create_async()
            .await;

        let channel = Arc::new(FakeChannel::new());
        let account = service(&server, Arc::clone(&channel));
        account.change_password("admin", "s3cret").await.unwrap();
        mock.assert_async().await;

        // The account component is not what authenticateWithPassword checks
        let result = account.login("admin", "s3cret").await;
        assert!(matches!(result, Err(EdgeError::AuthenticationFailed)));
        account.login("admin", "admin").await.unwrap();
        assert!(account.is_logged_in());
        assert_eq!(
            channel
                .methods()
                .iter()
                .filter(|m| *m == "authenticateWithPassword")
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_change_password_rejects_wrong_current() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let channel = Arc::new(FakeChannel::new());
        let account = service(&server, channel);

        let result = account.change_password("wrong", "s3cret").await;
        assert!(matches!(result, Err(EdgeError::AuthenticationFailed)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_change_password_rejects_empty() {
        let server = Server::new_async().await;
        let account = service(&server, Arc::new(FakeChannel::new()));

        let result = account.change_password("admin", "").await;
        assert!(matches!(result, Err(EdgeError::Validation(_))));
    }
}
