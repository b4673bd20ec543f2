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

//! Bundled device catalog (`app-config.json`)
//!
//! Brands, meter types, serial port templates and the licensing tiers used
//! for client-side pre-validation. Missing sections default to empty.

use crate::error::CatalogError;
use crate::factory::SERIAL_PORT_FACTORY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const BUNDLED_CATALOG: &str = include_str!("../assets/app-config.json");

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierConfig {
    #[serde(default)]
    pub max_inverters: usize,
    #[serde(default, rename = "maxTotalPowerKW")]
    pub max_total_power_kw: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub name: String,
    pub factory_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterSetup {
    #[serde(default)]
    pub current_tier: String,
    #[serde(default)]
    pub tiers: BTreeMap<String, TierConfig>,
    #[serde(default)]
    pub inverter_brands: Vec<Brand>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSetup {
    #[serde(default)]
    pub storage_brands: Vec<Brand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterType {
    pub value: String,
    pub display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSetup {
    #[serde(default)]
    pub meter_brands: Vec<Brand>,
    #[serde(default)]
    pub meter_types: Vec<MeterType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortTemplate {
    pub key: String,
    pub display_name: String,
    pub port_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    #[serde(default)]
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub system_info: SystemInfo,
    #[serde(default)]
    pub inverter_setup: Option<InverterSetup>,
    #[serde(default)]
    pub storage_setup: StorageSetup,
    #[serde(default)]
    pub meter_setup: MeterSetup,
    #[serde(default)]
    pub serial_port_templates: Vec<PortTemplate>,
}

/// Device families the console manages, each matched by factory id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    SerialPort,
    Inverter,
    Meter,
    Storage,
}

impl DeviceCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::SerialPort => "serial port",
            Self::Inverter => "inverter",
            Self::Meter => "meter",
            Self::Storage => "storage",
        }
    }
}

impl Catalog {
    /// Catalog compiled into the binary
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Limits of the configured tier. A missing setup or unknown tier name
    /// yields a zero tier, which blocks every addition.
    pub fn active_tier(&self) -> TierConfig {
        self.inverter_setup
            .as_ref()
            .and_then(|setup| setup.tiers.get(&setup.current_tier))
            .copied()
            .unwrap_or_default()
    }

    pub fn inverter_brands(&self) -> &[Brand] {
        self.inverter_setup
            .as_ref()
            .map(|setup| setup.inverter_brands.as_slice())
            .unwrap_or(&[])
    }

    pub fn brands(&self, category: DeviceCategory) -> &[Brand] {
        match category {
            DeviceCategory::SerialPort => &[],
            DeviceCategory::Inverter => self.inverter_brands(),
            DeviceCategory::Meter => &self.meter_setup.meter_brands,
            DeviceCategory::Storage => &self.storage_setup.storage_brands,
        }
    }

    /// Whether a component of `factory_id` belongs to `category`
    pub fn matches(&self, category: DeviceCategory, factory_id: &str) -> bool {
        match category {
            DeviceCategory::SerialPort => factory_id == SERIAL_PORT_FACTORY,
            DeviceCategory::Inverter | DeviceCategory::Meter | DeviceCategory::Storage => self
                .brands(category)
                .iter()
                .any(|brand| brand.factory_id == factory_id),
        }
    }

    /// Look a brand up by factory id or, case-insensitively, by name
    pub fn find_brand(&self, category: DeviceCategory, needle: &str) -> Option<&Brand> {
        self.brands(category).iter().find(|brand| {
            brand.factory_id == needle || brand.name.eq_ignore_ascii_case(needle)
        })
    }

    pub fn brand_name<'a>(&'a self, category: DeviceCategory, factory_id: &'a str) -> &'a str {
        self.brands(category)
            .iter()
            .find(|brand| brand.factory_id == factory_id)
            .map_or(factory_id, |brand| brand.name.as_str())
    }

    pub fn port_template(&self, key: &str) -> Option<&PortTemplate> {
        self.serial_port_templates.iter().find(|t| t.key == key)
    }
}
