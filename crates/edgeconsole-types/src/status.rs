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

use crate::catalog::{Catalog, DeviceCategory, TierConfig};
use crate::component::{Component, ComponentMap};
use serde::Serialize;

pub const GRID_METER_TYPE: &str = "GRID";

/// One-screen overview of what is configured on the edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub serial_number: String,
    pub tier: TierConfig,
    pub serial_ports: Vec<String>,
    pub inverter_count: usize,
    pub total_inverter_power_kw: f64,
    pub meter_count: usize,
    pub poi_meter: Option<String>,
    pub storage_count: usize,
}

/// `RS485-1: 9600-8N1` style line for a serial bridge
pub fn serial_port_summary(display_name: &str, component: &Component) -> String {
    let baud_rate = component.property_str("baudRate").unwrap_or_default();
    let databits = component.property_str("databits").unwrap_or_default();
    let parity = component
        .property_str("parity")
        .and_then(|p| p.chars().next())
        .unwrap_or('N');
    let stopbits = match component.property_str("stopbits").as_deref() {
        Some("ONE") | None => "1",
        Some("TWO") => "2",
        Some(_) => "1.5",
    };
    format!("{display_name}: {baud_rate}-{databits}{parity}{stopbits}")
}

impl SystemStatus {
    pub fn from_snapshot(components: &ComponentMap, catalog: &Catalog) -> Self {
        let in_category = |category: DeviceCategory| {
            components
                .iter()
                .filter(move |(_, c)| catalog.matches(category, &c.factory_id))
        };

        let serial_ports = in_category(DeviceCategory::SerialPort)
            .map(|(id, component)| {
                let display_name = catalog
                    .port_template(id)
                    .map_or(id.as_str(), |t| t.display_name.as_str());
                serial_port_summary(display_name, component)
            })
            .collect();

        let (inverter_count, total_w) = in_category(DeviceCategory::Inverter)
            .fold((0, 0.0), |(count, total), (_, c)| {
                (count + 1, total + c.max_active_power_w())
            });

        let meters: Vec<_> = in_category(DeviceCategory::Meter).collect();
        let poi_meter = meters
            .iter()
            .find(|(_, c)| c.property_str("type").as_deref() == Some(GRID_METER_TYPE))
            .map(|(id, c)| c.display_alias(id).to_owned());

        Self {
            serial_number: catalog
                .system_info
                .serial_number
                .clone()
                .unwrap_or_else(|| "N/A".to_owned()),
            tier: catalog.active_tier(),
            serial_ports,
            inverter_count,
            total_inverter_power_kw: total_w / 1000.0,
            meter_count: meters.len(),
            poi_meter,
            storage_count: in_category(DeviceCategory::Storage).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::SERIAL_PORT_FACTORY;

    #[test]
    fn test_status_from_snapshot() {
        let catalog = Catalog::bundled().unwrap();
        let mut components = ComponentMap::new();
        components.insert(
            "modbus0".to_owned(),
            Component::new(SERIAL_PORT_FACTORY)
                .with_property("baudRate", 9600)
                .with_property("databits", 8)
                .with_property("parity", "EVEN")
                .with_property("stopbits", "TWO"),
        );
        components.insert(
            "pvInverter0".to_owned(),
            Component::new("PV-Inverter.Fronius").with_property("maxActivePower", 5000),
        );
        components.insert(
            "pvInverter1".to_owned(),
            Component::new("PV-Inverter.Fronius").with_property("maxActivePower", 2500),
        );
        components.insert(
            "meter0".to_owned(),
            Component::new("Meter.Socomec.Threephase")
                .with_property("type", "GRID")
                .with_property("alias", "Grid connection"),
        );
        components.insert(
            "_sum".to_owned(),
            Component::new("Core.Sum"),
        );

        let status = SystemStatus::from_snapshot(&components, &catalog);
        assert_eq!(status.serial_ports, vec!["RS485-1: 9600-8E2".to_owned()]);
        assert_eq!(status.inverter_count, 2);
        assert!((status.total_inverter_power_kw - 7.5).abs() < 1e-9);
        assert_eq!(status.meter_count, 1);
        assert_eq!(status.poi_meter.as_deref(), Some("Grid connection"));
        assert_eq!(status.storage_count, 0);
    }

    #[test]
    fn test_serial_summary_defaults() {
        let component = Component::new(SERIAL_PORT_FACTORY)
            .with_property("baudRate", 19200)
            .with_property("databits", 7)
            .with_property("stopbits", "ONE_POINT_FIVE");
        assert_eq!(serial_port_summary("P", &component), "P: 19200-7N1.5");
    }
}
