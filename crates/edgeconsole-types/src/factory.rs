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

//! Typed factory configurations
//!
//! Each variant knows its factory PID, its field schema and how it is posted
//! to the configuration manager. Validation runs before any form is built so
//! an invalid value never reaches the device.

use crate::error::ValidationError;
use crate::form::FormBody;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SERIAL_PORT_FACTORY: &str = "Bridge.Modbus.Serial";
pub const FIX_POWER_LIMIT_FACTORY: &str = "Controller.PvInverter.FixPowerLimit";
pub const FIX_POWER_LIMIT_ALIAS: &str = "ctrlPvInverterFixPowerLimit0";
pub const ACCOUNT_FACTORY: &str = "Controller.io.openems.edge.account.config";
pub const ACCOUNT_ID: &str = "admin";

pub const INVERTER_ALIAS_PREFIX: &str = "pvInverter";
pub const METER_ID_PREFIX: &str = "meter";
pub const STORAGE_ID_PREFIX: &str = "battery";

pub const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];
pub const MAX_MODBUS_UNIT_ID: u16 = 247;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "ONE",
            Self::OnePointFive => "ONE_POINT_FIVE",
            Self::Two => "TWO",
        }
    }
}

impl FromStr for StopBits {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ONE" | "1" => Ok(Self::One),
            "ONE_POINT_FIVE" | "1.5" => Ok(Self::OnePointFive),
            "TWO" | "2" => Ok(Self::Two),
            _ => Err(ValidationError::new(
                "stopbits",
                format!("unsupported value '{s}', expected ONE, ONE_POINT_FIVE or TWO"),
            )),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl Parity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Even => "EVEN",
            Self::Odd => "ODD",
            Self::Mark => "MARK",
            Self::Space => "SPACE",
        }
    }
}

impl FromStr for Parity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "EVEN" => Ok(Self::Even),
            "ODD" => Ok(Self::Odd),
            "MARK" => Ok(Self::Mark),
            "SPACE" => Ok(Self::Space),
            _ => Err(ValidationError::new(
                "parity",
                format!("unsupported value '{s}', expected NONE, EVEN, ODD, MARK or SPACE"),
            )),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Bridge.Modbus.Serial`; `id` and alias are the port template key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialPortConfig {
    pub id: String,
    pub port_name: String,
    pub baud_rate: u32,
    pub databits: u8,
    pub stopbits: StopBits,
    pub parity: Parity,
}

impl SerialPortConfig {
    pub fn new(id: impl Into<String>, port_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            port_name: port_name.into(),
            baud_rate: 9600,
            databits: 8,
            stopbits: StopBits::One,
            parity: Parity::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterConfig {
    pub factory_id: String,
    pub id: String,
    pub max_active_power_w: u32,
    pub modbus_id: String,
    pub modbus_unit_id: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterConfig {
    pub factory_id: String,
    pub id: String,
    pub alias: String,
    pub meter_type: String,
    pub modbus_id: String,
    pub modbus_unit_id: u16,
    pub invert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub factory_id: String,
    pub id: String,
    pub alias: String,
    pub modbus_id: String,
    pub modbus_unit_id: u16,
}

/// `Controller.PvInverter.FixPowerLimit` applied to every PV inverter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixPowerLimitConfig {
    /// Component id, `ctrlPvInverterFixPowerLimit0` for a new controller
    pub id: String,
    pub alias: String,
    pub enabled: bool,
    pub power_limit_w: u64,
    pub inverter_ids: Vec<String>,
}

/// Stored admin credential; the alias carries the SHA-256 hex digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ComponentConfig {
    SerialPort(SerialPortConfig),
    Inverter(InverterConfig),
    Meter(MeterConfig),
    Storage(StorageConfig),
    FixPowerLimit(FixPowerLimitConfig),
    Account(AccountConfig),
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}

fn require_unit_id(value: u16, max: Option<u16>) -> Result<(), ValidationError> {
    if value < 1 {
        return Err(ValidationError::new("modbusUnitId", "must be at least 1"));
    }
    match max {
        Some(max) if value > max => Err(ValidationError::new(
            "modbusUnitId",
            format!("must be at most {max}"),
        )),
        _ => Ok(()),
    }
}

impl ComponentConfig {
    /// Factory PID the create form is posted to
    pub fn factory_id(&self) -> &str {
        match self {
            Self::SerialPort(_) => SERIAL_PORT_FACTORY,
            Self::Inverter(c) => &c.factory_id,
            Self::Meter(c) => &c.factory_id,
            Self::Storage(c) => &c.factory_id,
            Self::FixPowerLimit(_) => FIX_POWER_LIMIT_FACTORY,
            Self::Account(_) => ACCOUNT_FACTORY,
        }
    }

    /// Component id on the edge
    pub fn id(&self) -> &str {
        match self {
            Self::SerialPort(c) => &c.id,
            Self::Inverter(c) => &c.id,
            Self::Meter(c) => &c.id,
            Self::Storage(c) => &c.id,
            Self::FixPowerLimit(c) => &c.id,
            Self::Account(_) => ACCOUNT_ID,
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            Self::SerialPort(c) => &c.id,
            Self::Inverter(c) => &c.id,
            Self::Meter(c) => &c.alias,
            Self::Storage(c) => &c.alias,
            Self::FixPowerLimit(c) => &c.alias,
            Self::Account(c) => &c.password_hash,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::SerialPort(c) => {
                require_non_empty("id", &c.id)?;
                require_non_empty("portName", &c.port_name)?;
                if !BAUD_RATES.contains(&c.baud_rate) {
                    return Err(ValidationError::new(
                        "baudRate",
                        format!("{} is not one of {:?}", c.baud_rate, BAUD_RATES),
                    ));
                }
                if !(5..=8).contains(&c.databits) {
                    return Err(ValidationError::new("databits", "must be between 5 and 8"));
                }
                Ok(())
            }
            Self::Inverter(c) => {
                require_non_empty("factoryPid", &c.factory_id)?;
                require_non_empty("id", &c.id)?;
                if c.max_active_power_w < 1 {
                    return Err(ValidationError::new("maxActivePower", "must be at least 1 W"));
                }
                require_non_empty("modbus.id", &c.modbus_id)?;
                require_unit_id(c.modbus_unit_id, Some(MAX_MODBUS_UNIT_ID))
            }
            Self::Meter(c) => {
                require_non_empty("factoryPid", &c.factory_id)?;
                require_non_empty("id", &c.id)?;
                require_non_empty("alias", &c.alias)?;
                require_non_empty("type", &c.meter_type)?;
                require_non_empty("modbus.id", &c.modbus_id)?;
                require_unit_id(c.modbus_unit_id, None)
            }
            Self::Storage(c) => {
                require_non_empty("factoryPid", &c.factory_id)?;
                require_non_empty("id", &c.id)?;
                require_non_empty("alias", &c.alias)?;
                require_non_empty("modbus.id", &c.modbus_id)?;
                require_unit_id(c.modbus_unit_id, None)
            }
            Self::FixPowerLimit(c) => {
                require_non_empty("id", &c.id)?;
                require_non_empty("alias", &c.alias)?;
                if c.enabled && c.inverter_ids.is_empty() {
                    return Err(ValidationError::new(
                        "pvInverter.id",
                        "at least one PV inverter is required",
                    ));
                }
                Ok(())
            }
            Self::Account(c) => {
                let is_sha256_hex =
                    c.password_hash.len() == 64 && c.password_hash.chars().all(|ch| ch.is_ascii_hexdigit());
                if is_sha256_hex {
                    Ok(())
                } else {
                    Err(ValidationError::new("alias", "expected a SHA-256 hex digest"))
                }
            }
        }
    }

    /// Device-specific fields in the order the console lists them
    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::SerialPort(c) => vec![
                ("portName", c.port_name.clone()),
                ("baudRate", c.baud_rate.to_string()),
                ("databits", c.databits.to_string()),
                ("stopbits", c.stopbits.as_str().to_owned()),
                ("parity", c.parity.as_str().to_owned()),
            ],
            Self::Inverter(c) => vec![
                ("maxActivePower", c.max_active_power_w.to_string()),
                ("modbus.id", c.modbus_id.clone()),
                ("modbusUnitId", c.modbus_unit_id.to_string()),
            ],
            Self::Meter(c) => vec![
                ("type", c.meter_type.clone()),
                ("modbus.id", c.modbus_id.clone()),
                ("modbusUnitId", c.modbus_unit_id.to_string()),
                ("invert", c.invert.to_string()),
            ],
            Self::Storage(c) => vec![
                ("modbus.id", c.modbus_id.clone()),
                ("modbusUnitId", c.modbus_unit_id.to_string()),
            ],
            Self::FixPowerLimit(c) => vec![
                ("powerLimit", c.power_limit_w.to_string()),
                ("pvInverter.id", c.inverter_ids.join(",")),
            ],
            Self::Account(_) => Vec::new(),
        }
    }

    /// Fields only sent when the component is first created
    fn create_extras(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Self::SerialPort(_) => vec![
                ("enableTermination", "false"),
                ("delayBeforeTx", "0"),
                ("delayAfterTx", "0"),
                ("logVerbosity", "1"),
                ("invalidateElementsAfterReadErrors", "1"),
            ],
            Self::Inverter(_)
            | Self::Meter(_)
            | Self::Storage(_)
            | Self::FixPowerLimit(_)
            | Self::Account(_) => Vec::new(),
        }
    }

    fn has_enabled_flag(&self) -> bool {
        !matches!(self, Self::Account(_))
    }

    fn enabled(&self) -> bool {
        match self {
            Self::FixPowerLimit(c) => c.enabled,
            Self::SerialPort(_)
            | Self::Inverter(_)
            | Self::Meter(_)
            | Self::Storage(_)
            | Self::Account(_) => true,
        }
    }

    /// Form posted to `configMgr/{factoryPid}` to create the component
    pub fn to_create_form(&self) -> Result<FormBody, ValidationError> {
        self.validate()?;

        let mut body = FormBody::new();
        body.set("apply", "true").set("factoryPid", self.factory_id());
        if matches!(self, Self::SerialPort(_)) {
            body.set("location", "");
        }

        let mut listed = vec!["id", "alias"];
        body.set("id", self.id()).set("alias", self.alias());
        if self.has_enabled_flag() {
            body.set("enabled", self.enabled().to_string());
            listed.push("enabled");
        }
        for (key, value) in self.fields() {
            body.set(key, value);
            listed.push(key);
        }
        for (key, value) in self.create_extras() {
            body.set(key, value);
            listed.push(key);
        }

        body.set("propertylist", listed.join(","));
        Ok(body)
    }

    /// Form posted to `configMgr/{pid}` to update an existing component
    ///
    /// Meters and storage repeat their id; controllers encode `enabled` as a
    /// checkbox pair.
    pub fn to_update_form(&self) -> Result<FormBody, ValidationError> {
        self.validate()?;

        let mut body = FormBody::new();
        body.set("apply", "true");

        let mut listed = Vec::new();
        if matches!(self, Self::Meter(_) | Self::Storage(_) | Self::Account(_)) {
            body.set("id", self.id());
            listed.push("id");
        }
        body.set("alias", self.alias());
        listed.push("alias");

        if self.has_enabled_flag() {
            if matches!(self, Self::FixPowerLimit(_)) {
                body.set_checkbox("enabled", self.enabled());
            } else {
                body.set("enabled", self.enabled().to_string());
            }
            listed.push("enabled");
        }
        for (key, value) in self.fields() {
            body.set(key, value);
            listed.push(key);
        }

        body.set("propertylist", listed.join(","));
        Ok(body)
    }
}
