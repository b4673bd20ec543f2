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

//! Device management: serial bridges, PV inverters, meters, storage and the
//! fixed PV power limit
//!
//! Every mutation is validated and checked against the tier before anything
//! is posted, then waits for the edge to publish the resulting snapshot.

use crate::errors::{EdgeError, EdgeResult};
use crate::inventory::{
    ManagedComponent, available_meter_types, available_templates, find, inverter_usage,
    pv_inverter_ids, total_inverter_power_w,
};
use crate::session::EdgeSession;
use edgeconsole_types::factory::{
    FIX_POWER_LIMIT_ALIAS, FIX_POWER_LIMIT_FACTORY, INVERTER_ALIAS_PREFIX, METER_ID_PREFIX,
    STORAGE_ID_PREFIX,
};
use edgeconsole_types::limits::percent_from_watt;
use edgeconsole_types::{
    ComponentConfig, DeviceCategory, FixPowerLimitConfig, InverterConfig, MeterConfig, Parity,
    PidEntry, PidIndex, PowerLimitSetpoint, SerialPortConfig, StopBits, StorageConfig, ValidationError,
    next_component_id, next_inverter_alias,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub databits: u8,
    pub stopbits: StopBits,
    pub parity: Parity,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            databits: 8,
            stopbits: StopBits::One,
            parity: Parity::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverterSettings {
    pub max_active_power_w: u32,
    pub modbus_id: String,
    pub modbus_unit_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterSettings {
    pub alias: String,
    pub meter_type: String,
    pub modbus_id: String,
    pub modbus_unit_id: u16,
    pub invert: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub alias: String,
    pub modbus_id: String,
    pub modbus_unit_id: u16,
}

/// Fixed PV power limit as currently configured
#[derive(Debug, Clone, PartialEq)]
pub struct PowerLimitState {
    /// Controller id on the edge, `None` until one is configured
    pub id: Option<String>,
    pub alias: Option<String>,
    pub pid: Option<String>,
    pub enabled: bool,
    pub power_limit_w: f64,
    pub percent: f64,
    pub total_inverter_power_w: f64,
    pub inverter_ids: Vec<String>,
}

/// Long PID of the power limit controller whose name hint carries `[alias]`
pub fn power_limit_pid(pids: &[PidEntry], alias: &str) -> Option<String> {
    PidIndex::for_factory(pids, FIX_POWER_LIMIT_FACTORY)
        .pid_for(alias)
        .map(str::to_owned)
}

fn require<'a>(items: &'a [ManagedComponent], alias: &str) -> EdgeResult<&'a ManagedComponent> {
    find(items, alias).ok_or_else(|| EdgeError::PidNotFound(alias.to_owned()))
}

impl EdgeSession {
    fn brand_factory(&self, category: DeviceCategory, brand: &str) -> EdgeResult<String> {
        self.catalog
            .find_brand(category, brand)
            .map(|b| b.factory_id.clone())
            .ok_or_else(|| {
                ValidationError::new(
                    "factoryPid",
                    format!("unknown {} brand '{}'", category.label(), brand),
                )
                .into()
            })
    }

    /// Remove any managed component by its id
    pub async fn delete_device(&self, category: DeviceCategory, alias: &str) -> EdgeResult<()> {
        let items = self.inventory(category).await?;
        let item = require(&items, alias)?;

        self.console.delete_component(&item.pid).await?;
        info!("🗑️ [DEVICES] {} '{}' deleted", category.label(), alias);
        self.settle().await
    }

    /// Create the serial bridge described by a port template
    pub async fn add_serial_port(&self, template_key: &str, settings: &SerialSettings) -> EdgeResult<String> {
        let ports = self.inventory(DeviceCategory::SerialPort).await?;
        let template = available_templates(&self.catalog, &ports)
            .into_iter()
            .find(|t| t.key == template_key)
            .ok_or_else(|| {
                ValidationError::new(
                    "template",
                    format!("port template '{template_key}' is unknown or already configured"),
                )
            })?;

        let config = ComponentConfig::SerialPort(SerialPortConfig {
            id: template.key.clone(),
            port_name: template.port_name.clone(),
            baud_rate: settings.baud_rate,
            databits: settings.databits,
            stopbits: settings.stopbits,
            parity: settings.parity,
        });
        self.console.create(&config).await?;
        self.settle().await?;
        Ok(template.key.clone())
    }

    pub async fn update_serial_port(&self, id: &str, settings: &SerialSettings) -> EdgeResult<()> {
        let ports = self.inventory(DeviceCategory::SerialPort).await?;
        let port = require(&ports, id)?;

        let port_name = port
            .component
            .property_str("portName")
            .or_else(|| self.catalog.port_template(id).map(|t| t.port_name.clone()))
            .unwrap_or_default();

        let config = ComponentConfig::SerialPort(SerialPortConfig {
            id: id.to_owned(),
            port_name,
            baud_rate: settings.baud_rate,
            databits: settings.databits,
            stopbits: settings.stopbits,
            parity: settings.parity,
        });
        self.console.update(&port.pid, &config).await?;
        self.settle().await
    }

    /// Add a PV inverter within the tier limits. Returns its id.
    pub async fn add_inverter(&self, brand: &str, settings: &InverterSettings) -> EdgeResult<String> {
        let inverters = self.inventory(DeviceCategory::Inverter).await?;
        inverter_usage(self.catalog.active_tier(), &inverters)
            .check_add(f64::from(settings.max_active_power_w))?;
        let factory_id = self.brand_factory(DeviceCategory::Inverter, brand)?;

        let components = self.snapshot().await?;
        let mut id = next_inverter_alias(inverters.len());
        if components.contains_key(&id) {
            id = next_component_id(INVERTER_ALIAS_PREFIX, components.keys().map(String::as_str));
            debug!("[DEVICES] Alias taken, using {}", id);
        }

        let config = ComponentConfig::Inverter(InverterConfig {
            factory_id,
            id: id.clone(),
            max_active_power_w: settings.max_active_power_w,
            modbus_id: settings.modbus_id.clone(),
            modbus_unit_id: settings.modbus_unit_id,
        });
        self.console.create(&config).await?;
        self.settle().await?;
        Ok(id)
    }

    pub async fn update_inverter(&self, alias: &str, settings: &InverterSettings) -> EdgeResult<()> {
        let inverters = self.inventory(DeviceCategory::Inverter).await?;
        let inverter = require(&inverters, alias)?;
        inverter_usage(self.catalog.active_tier(), &inverters).check_update(
            inverter.max_active_power_w(),
            f64::from(settings.max_active_power_w),
        )?;

        let config = ComponentConfig::Inverter(InverterConfig {
            factory_id: inverter.component.factory_id.clone(),
            id: alias.to_owned(),
            max_active_power_w: settings.max_active_power_w,
            modbus_id: settings.modbus_id.clone(),
            modbus_unit_id: settings.modbus_unit_id,
        });
        self.console.update(&inverter.pid, &config).await?;
        self.settle().await
    }

    /// Add a meter under the lowest free `meterN` id. Returns the id.
    pub async fn add_meter(&self, brand: &str, settings: &MeterSettings) -> EdgeResult<String> {
        let meters = self.inventory(DeviceCategory::Meter).await?;
        self.require_meter_type(&meters, &settings.meter_type, None)?;
        let factory_id = self.brand_factory(DeviceCategory::Meter, brand)?;

        let components = self.snapshot().await?;
        let id = next_component_id(METER_ID_PREFIX, components.keys().map(String::as_str));

        let config = ComponentConfig::Meter(MeterConfig {
            factory_id,
            id: id.clone(),
            alias: settings.alias.clone(),
            meter_type: settings.meter_type.clone(),
            modbus_id: settings.modbus_id.clone(),
            modbus_unit_id: settings.modbus_unit_id,
            invert: settings.invert,
        });
        self.console.create(&config).await?;
        self.settle().await?;
        Ok(id)
    }

    pub async fn update_meter(&self, id: &str, settings: &MeterSettings) -> EdgeResult<()> {
        let meters = self.inventory(DeviceCategory::Meter).await?;
        let meter = require(&meters, id)?;
        let current_type = meter.component.property_str("type");
        self.require_meter_type(&meters, &settings.meter_type, current_type.as_deref())?;

        let config = ComponentConfig::Meter(MeterConfig {
            factory_id: meter.component.factory_id.clone(),
            id: id.to_owned(),
            alias: settings.alias.clone(),
            meter_type: settings.meter_type.clone(),
            modbus_id: settings.modbus_id.clone(),
            modbus_unit_id: settings.modbus_unit_id,
            invert: settings.invert,
        });
        self.console.update(&meter.pid, &config).await?;
        self.settle().await
    }

    fn require_meter_type(
        &self,
        meters: &[ManagedComponent],
        meter_type: &str,
        editing: Option<&str>,
    ) -> EdgeResult<()> {
        let free = available_meter_types(&self.catalog, meters, editing)
            .iter()
            .any(|t| t.value == meter_type);
        if free {
            Ok(())
        } else {
            Err(ValidationError::new(
                "type",
                format!("meter type '{meter_type}' is unknown or already used"),
            )
            .into())
        }
    }

    /// Add a storage system under the lowest free `batteryN` id
    pub async fn add_storage(&self, brand: &str, settings: &StorageSettings) -> EdgeResult<String> {
        let factory_id = self.brand_factory(DeviceCategory::Storage, brand)?;
        let components = self.snapshot().await?;
        let id = next_component_id(STORAGE_ID_PREFIX, components.keys().map(String::as_str));

        let config = ComponentConfig::Storage(StorageConfig {
            factory_id,
            id: id.clone(),
            alias: settings.alias.clone(),
            modbus_id: settings.modbus_id.clone(),
            modbus_unit_id: settings.modbus_unit_id,
        });
        self.console.create(&config).await?;
        self.settle().await?;
        Ok(id)
    }

    pub async fn update_storage(&self, id: &str, settings: &StorageSettings) -> EdgeResult<()> {
        let storages = self.inventory(DeviceCategory::Storage).await?;
        let storage = require(&storages, id)?;

        let config = ComponentConfig::Storage(StorageConfig {
            factory_id: storage.component.factory_id.clone(),
            id: id.to_owned(),
            alias: settings.alias.clone(),
            modbus_id: settings.modbus_id.clone(),
            modbus_unit_id: settings.modbus_unit_id,
        });
        self.console.update(&storage.pid, &config).await?;
        self.settle().await
    }

    /// The power limit controller is located by factory, whatever its id
    pub async fn power_limit(&self) -> EdgeResult<PowerLimitState> {
        let (pids, components) = tokio::try_join!(self.console.list_pids(), self.snapshot())?;
        let total = total_inverter_power_w(&components);
        let controller = components
            .iter()
            .find(|(_, c)| c.factory_id == FIX_POWER_LIMIT_FACTORY);

        let Some((id, controller)) = controller else {
            return Ok(PowerLimitState {
                id: None,
                alias: None,
                pid: None,
                enabled: false,
                power_limit_w: 0.0,
                percent: 0.0,
                total_inverter_power_w: total,
                inverter_ids: pv_inverter_ids(&components),
            });
        };

        let alias = controller.display_alias(id);
        let pid = power_limit_pid(&pids, alias).or_else(|| power_limit_pid(&pids, id));
        let power_limit_w = controller.property_f64("powerLimit").unwrap_or(0.0);
        Ok(PowerLimitState {
            id: Some(id.clone()),
            alias: Some(alias.to_owned()),
            pid,
            enabled: controller.property_bool("enabled").unwrap_or(false),
            power_limit_w,
            percent: percent_from_watt(power_limit_w, total),
            total_inverter_power_w: total,
            inverter_ids: pv_inverter_ids(&components),
        })
    }

    /// Apply the fixed power limit to every PV inverter. The controller is
    /// created on first use. Returns the limit in watts.
    pub async fn set_power_limit(&self, enabled: bool, setpoint: PowerLimitSetpoint) -> EdgeResult<u64> {
        let state = self.power_limit().await?;
        let power_limit_w = setpoint.resolve(state.total_inverter_power_w)?;

        let configured = state.id.is_some();
        let id = state.id.unwrap_or_else(|| FIX_POWER_LIMIT_ALIAS.to_owned());
        let config = ComponentConfig::FixPowerLimit(FixPowerLimitConfig {
            alias: state.alias.unwrap_or_else(|| id.clone()),
            id: id.clone(),
            enabled,
            power_limit_w,
            inverter_ids: state.inverter_ids,
        });
        match (state.pid.as_deref(), configured) {
            (Some(pid), _) => self.console.update(pid, &config).await?,
            (None, true) => return Err(EdgeError::PidNotFound(id)),
            (None, false) => {
                info!("➕ [DEVICES] Power limit controller not configured yet, creating it");
                self.console.create(&config).await?;
            }
        }

        info!(
            "✅ [DEVICES] Power limit {} W ({})",
            power_limit_w,
            if enabled { "enabled" } else { "disabled" }
        );
        self.settle().await?;
        Ok(power_limit_w)
    }
}
