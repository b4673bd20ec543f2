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

pub mod account;
pub mod console;
pub mod devices;
pub mod errors;
mod http;
pub mod inventory;
pub mod ipsec;
pub mod network;
pub mod session;
pub mod store;
pub mod traits;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use account::{AccountService, hash_password};
pub use console::{ConsoleClient, parse_config_data};
pub use devices::{
    InverterSettings, MeterSettings, PowerLimitState, SerialSettings, StorageSettings,
};
pub use errors::{EdgeError, EdgeResult};
pub use http::RetryPolicy;
pub use inventory::ManagedComponent;
pub use ipsec::{Certificate, IpsecApiClient, IpsecConnection};
pub use network::{NetworkApiClient, NetworkConfig, NetworkConfigUpdate};
pub use session::{EdgeSession, SessionSettings};
pub use store::{EdgeStateStore, Snapshot};
pub use traits::RpcChannel;
pub use transport::{ConnectionState, RpcTransport, TransportConfig};
