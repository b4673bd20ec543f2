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

use crate::config::AppConfig;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use edgeconsole_client::inventory::{available_meter_types, available_templates};
use edgeconsole_client::{
    EdgeSession, InverterSettings, ManagedComponent, MeterSettings, NetworkConfigUpdate,
    SerialSettings, StorageSettings,
};
use edgeconsole_types::{DeviceCategory, Parity, PowerLimitSetpoint, StopBits, SystemStatus};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Edge(EdgeCommand),

    /// Network interfaces
    #[command(subcommand)]
    Network(NetworkCommand),

    /// IPSec connections and certificates
    #[command(subcommand)]
    Ipsec(IpsecCommand),
}

/// Commands that need the live edge session
#[derive(Debug, Subcommand)]
pub enum EdgeCommand {
    /// Overview of what is configured on the edge
    Status,

    /// Dump the live component map
    Components,

    /// List configurations known to the console with their PIDs
    Pids,

    /// Print a line for every snapshot the edge publishes
    Watch {
        /// Stop after this many updates
        #[arg(long)]
        count: Option<usize>,
    },

    /// RS485 serial bridges
    #[command(subcommand)]
    Serial(SerialCommand),

    /// PV inverters
    #[command(subcommand)]
    Inverters(InverterCommand),

    /// Energy meters
    #[command(subcommand)]
    Meters(MeterCommand),

    /// Battery storage
    #[command(subcommand)]
    Storage(StorageCommand),

    /// Fixed active power limit over all PV inverters
    #[command(subcommand)]
    PowerLimit(PowerLimitCommand),

    /// Check credentials against the edge
    Login {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },

    /// Store a new account password hash on the edge
    ///
    /// The hash goes to the account component. The edge user checked by
    /// `login` keeps its own password.
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long = "new")]
        new_password: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SerialArgs {
    #[arg(long, default_value_t = 9600)]
    pub baud_rate: u32,
    #[arg(long, default_value_t = 8)]
    pub databits: u8,
    #[arg(long, default_value = "ONE")]
    pub stopbits: StopBits,
    #[arg(long, default_value = "NONE")]
    pub parity: Parity,
}

impl From<SerialArgs> for SerialSettings {
    fn from(args: SerialArgs) -> Self {
        Self {
            baud_rate: args.baud_rate,
            databits: args.databits,
            stopbits: args.stopbits,
            parity: args.parity,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SerialCommand {
    List,
    /// Port templates still free
    Templates,
    Add {
        template: String,
        #[command(flatten)]
        settings: SerialArgs,
    },
    Update {
        id: String,
        #[command(flatten)]
        settings: SerialArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct InverterArgs {
    /// Maximum active power in watts
    #[arg(long)]
    pub power_w: u32,
    /// Serial bridge the inverter is attached to
    #[arg(long, default_value = "modbus0")]
    pub modbus_id: String,
    #[arg(long, default_value_t = 1)]
    pub unit_id: u16,
}

impl From<InverterArgs> for InverterSettings {
    fn from(args: InverterArgs) -> Self {
        Self {
            max_active_power_w: args.power_w,
            modbus_id: args.modbus_id,
            modbus_unit_id: args.unit_id,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum InverterCommand {
    List,
    Add {
        /// Brand name or factory id
        brand: String,
        #[command(flatten)]
        settings: InverterArgs,
    },
    Update {
        alias: String,
        #[command(flatten)]
        settings: InverterArgs,
    },
    Delete {
        alias: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct MeterArgs {
    #[arg(long)]
    pub alias: String,
    /// GRID, PRODUCTION, CONSUMPTION_METERED, ...
    #[arg(long = "type")]
    pub meter_type: String,
    #[arg(long, default_value = "modbus0")]
    pub modbus_id: String,
    #[arg(long, default_value_t = 1)]
    pub unit_id: u16,
    #[arg(long)]
    pub invert: bool,
}

impl From<MeterArgs> for MeterSettings {
    fn from(args: MeterArgs) -> Self {
        Self {
            alias: args.alias,
            meter_type: args.meter_type,
            modbus_id: args.modbus_id,
            modbus_unit_id: args.unit_id,
            invert: args.invert,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum MeterCommand {
    List,
    /// Meter types still free
    Types,
    Add {
        brand: String,
        #[command(flatten)]
        settings: MeterArgs,
    },
    Update {
        id: String,
        #[command(flatten)]
        settings: MeterArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    #[arg(long)]
    pub alias: String,
    #[arg(long, default_value = "modbus0")]
    pub modbus_id: String,
    #[arg(long, default_value_t = 1)]
    pub unit_id: u16,
}

impl From<StorageArgs> for StorageSettings {
    fn from(args: StorageArgs) -> Self {
        Self {
            alias: args.alias,
            modbus_id: args.modbus_id,
            modbus_unit_id: args.unit_id,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum StorageCommand {
    List,
    Add {
        brand: String,
        #[command(flatten)]
        settings: StorageArgs,
    },
    Update {
        id: String,
        #[command(flatten)]
        settings: StorageArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PowerLimitCommand {
    Show,
    Set {
        #[arg(long, conflicts_with = "percent", required_unless_present = "percent")]
        watt: Option<u64>,
        /// Percent of the installed PV power
        #[arg(long)]
        percent: Option<f64>,
        /// Store the limit with the controller switched off
        #[arg(long)]
        disable: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    List,
    Set {
        iface: String,
        #[arg(long)]
        dhcp: Option<bool>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        mask: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum IpsecCommand {
    List,
    Certificates,
    Upload { path: PathBuf },
    Delete { id: String },
}

pub async fn run(command: Command, config: &AppConfig, json: bool) -> Result<()> {
    match command {
        Command::Edge(command) => {
            let session = EdgeSession::connect(
                config.transport_config(),
                config.console_client()?,
                config.catalog()?,
                config.session_settings(),
            );
            let outcome = run_edge(command, &session, json).await;
            session.close().await;
            outcome
        }
        Command::Network(command) => run_network(command, config, json).await,
        Command::Ipsec(command) => run_ipsec(command, config, json).await,
    }
}

async fn run_edge(command: EdgeCommand, session: &EdgeSession, json: bool) -> Result<()> {
    match command {
        EdgeCommand::Status => {
            let status = session.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", format_status(&status));
            }
        }
        EdgeCommand::Components => {
            let components = session.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&*components)?);
        }
        EdgeCommand::Pids => {
            for entry in session.console().list_pids().await? {
                println!(
                    "{}\t{}\t{}",
                    entry.id,
                    entry.fpid.as_deref().unwrap_or("-"),
                    entry.alias().unwrap_or("-")
                );
            }
        }
        EdgeCommand::Watch { count } => watch(session, count).await?,
        EdgeCommand::Serial(command) => serial(command, session).await?,
        EdgeCommand::Inverters(command) => inverters(command, session).await?,
        EdgeCommand::Meters(command) => meters(command, session).await?,
        EdgeCommand::Storage(command) => storage(command, session).await?,
        EdgeCommand::PowerLimit(command) => power_limit(command, session).await?,
        EdgeCommand::Login { username, password } => {
            let transport = session.transport().context("No edge transport")?;
            let username = username.unwrap_or_else(|| transport.config().username.clone());
            let password = password.unwrap_or_else(|| transport.config().password.clone());
            session.account().login(&username, &password).await?;
            println!("Logged in as {username}");
        }
        EdgeCommand::Passwd {
            current,
            new_password,
        } => {
            session
                .account()
                .change_password(&current, &new_password)
                .await?;
            println!("Password changed");
        }
    }
    Ok(())
}

pub fn format_status(status: &SystemStatus) -> String {
    let serial_ports = if status.serial_ports.is_empty() {
        "none".to_owned()
    } else {
        status.serial_ports.join(", ")
    };
    format!(
        "Serial number: {}\n\
         Tier:          {} inverters / {} kW\n\
         Serial ports:  {}\n\
         Inverters:     {} ({:.1} kW)\n\
         Meters:        {} (POI: {})\n\
         Storage:       {}\n",
        status.serial_number,
        status.tier.max_inverters,
        status.tier.max_total_power_kw,
        serial_ports,
        status.inverter_count,
        status.total_inverter_power_kw,
        status.meter_count,
        status.poi_meter.as_deref().unwrap_or("Not Set"),
        status.storage_count,
    )
}

/// One line per managed component: id, brand, PID, then `properties`
pub fn format_items(
    session: &EdgeSession,
    category: DeviceCategory,
    items: &[ManagedComponent],
    properties: &[&str],
) -> String {
    let mut out = String::new();
    for item in items {
        let brand = session
            .catalog()
            .brand_name(category, &item.component.factory_id);
        let values: Vec<String> = properties
            .iter()
            .map(|key| {
                let value = item.component.property_str(key).unwrap_or_default();
                format!("{key}={value}")
            })
            .collect();
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            item.alias,
            brand,
            item.pid,
            values.join(" ")
        ));
    }
    if items.is_empty() {
        out.push_str(&format!("No {} configured\n", category.label()));
    }
    out
}

async fn watch(session: &EdgeSession, count: Option<usize>) -> Result<()> {
    let mut updates = session.store().subscribe();
    let mut seen = 0;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                changed.context("Snapshot channel closed")?;
                let components = updates.borrow_and_update().clone();
                let size = components.as_ref().map_or(0, |c| c.len());
                println!(
                    "{} snapshot: {} components",
                    chrono::Local::now().format("%H:%M:%S"),
                    size
                );
                seen += 1;
                if count.is_some_and(|count| seen >= count) {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

async fn serial(command: SerialCommand, session: &EdgeSession) -> Result<()> {
    let category = DeviceCategory::SerialPort;
    match command {
        SerialCommand::List => {
            let items = session.inventory(category).await?;
            print!(
                "{}",
                format_items(
                    session,
                    category,
                    &items,
                    &["portName", "baudRate", "databits", "stopbits", "parity"]
                )
            );
        }
        SerialCommand::Templates => {
            let items = session.inventory(category).await?;
            for template in available_templates(session.catalog(), &items) {
                println!(
                    "{}\t{}\t{}",
                    template.key, template.display_name, template.port_name
                );
            }
        }
        SerialCommand::Add { template, settings } => {
            let id = session.add_serial_port(&template, &settings.into()).await?;
            println!("Created {id}");
        }
        SerialCommand::Update { id, settings } => {
            session.update_serial_port(&id, &settings.into()).await?;
            println!("Updated {id}");
        }
        SerialCommand::Delete { id } => {
            session.delete_device(category, &id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

async fn inverters(command: InverterCommand, session: &EdgeSession) -> Result<()> {
    let category = DeviceCategory::Inverter;
    match command {
        InverterCommand::List => {
            let items = session.inventory(category).await?;
            print!(
                "{}",
                format_items(
                    session,
                    category,
                    &items,
                    &["maxActivePower", "modbus.id", "modbusUnitId"]
                )
            );
            let usage = edgeconsole_client::inventory::inverter_usage(
                session.catalog().active_tier(),
                &items,
            );
            println!(
                "{}/{} inverters, {:.1}/{} kW",
                usage.count, usage.tier.max_inverters, usage.total_kw, usage.tier.max_total_power_kw
            );
        }
        InverterCommand::Add { brand, settings } => {
            let alias = session.add_inverter(&brand, &settings.into()).await?;
            println!("Created {alias}");
        }
        InverterCommand::Update { alias, settings } => {
            session.update_inverter(&alias, &settings.into()).await?;
            println!("Updated {alias}");
        }
        InverterCommand::Delete { alias } => {
            session.delete_device(category, &alias).await?;
            println!("Deleted {alias}");
        }
    }
    Ok(())
}

async fn meters(command: MeterCommand, session: &EdgeSession) -> Result<()> {
    let category = DeviceCategory::Meter;
    match command {
        MeterCommand::List => {
            let items = session.inventory(category).await?;
            print!(
                "{}",
                format_items(
                    session,
                    category,
                    &items,
                    &["alias", "type", "modbus.id", "modbusUnitId", "invert"]
                )
            );
        }
        MeterCommand::Types => {
            let items = session.inventory(category).await?;
            for meter_type in available_meter_types(session.catalog(), &items, None) {
                println!("{}\t{}", meter_type.value, meter_type.display);
            }
        }
        MeterCommand::Add { brand, settings } => {
            let id = session.add_meter(&brand, &settings.into()).await?;
            println!("Created {id}");
        }
        MeterCommand::Update { id, settings } => {
            session.update_meter(&id, &settings.into()).await?;
            println!("Updated {id}");
        }
        MeterCommand::Delete { id } => {
            session.delete_device(category, &id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

async fn storage(command: StorageCommand, session: &EdgeSession) -> Result<()> {
    let category = DeviceCategory::Storage;
    match command {
        StorageCommand::List => {
            let items = session.inventory(category).await?;
            print!(
                "{}",
                format_items(
                    session,
                    category,
                    &items,
                    &["alias", "modbus.id", "modbusUnitId"]
                )
            );
        }
        StorageCommand::Add { brand, settings } => {
            let id = session.add_storage(&brand, &settings.into()).await?;
            println!("Created {id}");
        }
        StorageCommand::Update { id, settings } => {
            session.update_storage(&id, &settings.into()).await?;
            println!("Updated {id}");
        }
        StorageCommand::Delete { id } => {
            session.delete_device(category, &id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

async fn power_limit(command: PowerLimitCommand, session: &EdgeSession) -> Result<()> {
    match command {
        PowerLimitCommand::Show => {
            let state = session.power_limit().await?;
            println!(
                "{} W ({:.1}% of {} W), {}{}",
                state.power_limit_w,
                state.percent,
                state.total_inverter_power_w,
                if state.enabled { "enabled" } else { "disabled" },
                if state.id.is_none() { ", not configured" } else { "" }
            );
        }
        PowerLimitCommand::Set {
            watt,
            percent,
            disable,
        } => {
            let setpoint = match (watt, percent) {
                (Some(watt), _) => PowerLimitSetpoint::Watt(watt),
                (None, Some(percent)) => PowerLimitSetpoint::Percent(percent),
                (None, None) => anyhow::bail!("Either --watt or --percent is required"),
            };
            let watt = session.set_power_limit(!disable, setpoint).await?;
            println!("Power limit set to {watt} W");
        }
    }
    Ok(())
}

async fn run_network(command: NetworkCommand, config: &AppConfig, json: bool) -> Result<()> {
    let client = config.network_client()?;
    match command {
        NetworkCommand::List => {
            let interfaces = client.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&interfaces)?);
            } else {
                for iface in interfaces {
                    let addressing = if iface.is_dhcp {
                        "dhcp".to_owned()
                    } else {
                        format!("{}/{} via {}", iface.ip_address, iface.subnet_mask, iface.gateway)
                    };
                    println!("{}\t{}\t{}", iface.id, iface.display_name, addressing);
                }
            }
        }
        NetworkCommand::Set {
            iface,
            dhcp,
            ip,
            mask,
            gateway,
        } => {
            let update = NetworkConfigUpdate {
                is_dhcp: dhcp,
                ip_address: ip,
                subnet_mask: mask,
                gateway,
            };
            let updated = client.update(&iface, &update).await?;
            println!("Updated {}", updated.id);
        }
    }
    Ok(())
}

async fn run_ipsec(command: IpsecCommand, config: &AppConfig, json: bool) -> Result<()> {
    let client = config.ipsec_client()?;
    match command {
        IpsecCommand::List => {
            let connections = client.list_connections().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&connections)?);
                return Ok(());
            }
            for (title, kind) in [("Site-to-site", "site-to-site"), ("Remote access", "remote-access")] {
                println!("{title}:");
                for connection in connections
                    .iter()
                    .filter(|c| c.conn_type.as_deref() == Some(kind))
                {
                    println!(
                        "  {}\t{}\t{}\t{}",
                        connection.id.as_deref().unwrap_or("-"),
                        connection.name,
                        connection.remote_address.as_deref().unwrap_or("-"),
                        connection.state.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        IpsecCommand::Certificates => {
            for certificate in client.list_certificates().await? {
                println!(
                    "{}\t{}\t{}",
                    certificate.name,
                    certificate.kind.as_deref().unwrap_or("-"),
                    certificate.identities.join(", ")
                );
            }
        }
        IpsecCommand::Upload { path } => {
            client.upload_certificate_file(&path).await?;
            println!("Uploaded {}", path.display());
        }
        IpsecCommand::Delete { id } => {
            client.delete_connection(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}
