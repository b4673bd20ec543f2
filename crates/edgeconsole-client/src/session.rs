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

//! One console session against one edge
//!
//! Ties the live snapshot, the configuration manager and the catalog
//! together. Device mutations live in [`crate::devices`].

use crate::account::AccountService;
use crate::console::ConsoleClient;
use crate::errors::EdgeResult;
use crate::inventory::{ManagedComponent, join_by_alias};
use crate::store::EdgeStateStore;
use crate::traits::RpcChannel;
use crate::transport::{RpcTransport, TransportConfig};
use edgeconsole_types::{Catalog, ComponentMap, DeviceCategory, SystemStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long to wait for the first snapshot
    pub snapshot_timeout: Duration,
    /// How long to wait for the snapshot that follows a mutation
    pub settle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            snapshot_timeout: Duration::from_secs(10),
            settle_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug)]
pub struct EdgeSession {
    channel: Arc<dyn RpcChannel>,
    transport: Option<RpcTransport>,
    store: EdgeStateStore,
    pub(crate) console: ConsoleClient,
    pub(crate) catalog: Catalog,
    account: AccountService,
    settings: SessionSettings,
}

impl EdgeSession {
    /// Session over an already established channel
    pub fn new(
        channel: Arc<dyn RpcChannel>,
        console: ConsoleClient,
        catalog: Catalog,
        settings: SessionSettings,
    ) -> Self {
        let store = EdgeStateStore::spawn(Arc::clone(&channel));
        let account = AccountService::new(Arc::clone(&channel), console.clone());
        Self {
            channel,
            transport: None,
            store,
            console,
            catalog,
            account,
            settings,
        }
    }

    /// Open a WebSocket transport and start it. The store subscribes before
    /// the socket is opened so the handshake snapshot is observed.
    pub fn connect(
        config: TransportConfig,
        console: ConsoleClient,
        catalog: Catalog,
        settings: SessionSettings,
    ) -> Self {
        let transport = RpcTransport::new(config);
        let channel: Arc<dyn RpcChannel> = Arc::new(transport.clone());

        let mut session = Self::new(channel, console, catalog, settings);
        transport.connect();
        session.transport = Some(transport);
        session
    }

    pub fn channel(&self) -> &Arc<dyn RpcChannel> {
        &self.channel
    }

    pub fn transport(&self) -> Option<&RpcTransport> {
        self.transport.as_ref()
    }

    pub fn store(&self) -> &EdgeStateStore {
        &self.store
    }

    pub fn console(&self) -> &ConsoleClient {
        &self.console
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn account(&self) -> &AccountService {
        &self.account
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Current snapshot, or the first one to arrive
    pub async fn snapshot(&self) -> EdgeResult<Arc<ComponentMap>> {
        match self.store.current() {
            Some(components) => Ok(components),
            None => {
                debug!("[SESSION] Waiting for first snapshot");
                self.store.wait_for_snapshot(self.settings.snapshot_timeout).await
            }
        }
    }

    /// Components of `category` the console can mutate
    pub async fn inventory(&self, category: DeviceCategory) -> EdgeResult<Vec<ManagedComponent>> {
        let (pids, components) = tokio::try_join!(self.console.list_pids(), self.snapshot())?;
        let items = join_by_alias(&components, &pids, &self.catalog, category);
        debug!(
            "[SESSION] {} {} components managed",
            items.len(),
            category.label()
        );
        Ok(items)
    }

    pub async fn status(&self) -> EdgeResult<SystemStatus> {
        let components = self.snapshot().await?;
        Ok(SystemStatus::from_snapshot(&components, &self.catalog))
    }

    /// Wait for the edge to publish the effect of a mutation
    ///
    /// The mutation has already been applied when this runs, so a failed or
    /// slow refresh is logged and never reported as an error. The whole wait,
    /// refresh request included, is bounded by the settle timeout.
    pub async fn settle(&self) -> EdgeResult<()> {
        let timeout = self.settings.settle_timeout;
        match tokio::time::timeout(timeout, self.store.refresh_and_wait(timeout)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) | Err(_) => {
                warn!("⚠️ [SESSION] No snapshot within {:?} after change", timeout);
            }
            Ok(Err(e)) => warn!("⚠️ [SESSION] Snapshot refresh after change failed: {}", e),
        }
        Ok(())
    }

    /// Log out and close the transport if this session opened one
    pub async fn close(self) {
        self.account.logout();
        if let Some(transport) = &self.transport {
            transport.close().await;
        }
        info!("🔌 [SESSION] Closed");
    }
}
