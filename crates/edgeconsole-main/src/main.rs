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

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Configure an energy edge device: its serial bridges, inverters, meters,
/// storage, power limit, network and IPSec tunnels
#[derive(Debug, Parser)]
#[command(name = "edgeconsole", version, about)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::AppConfig::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.system.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 EdgeConsole {}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration Summary:");
    info!("   Edge: {} (edge {})", config.edge.ws_url, config.edge.edge_id);
    info!("   Console: {}", config.console.base_url);
    info!("   Network API: {}", config.network_api.base_url);
    info!("   IPSec API: {}", config.ipsec_api.base_url);

    commands::run(cli.command, &config, cli.json).await
}
