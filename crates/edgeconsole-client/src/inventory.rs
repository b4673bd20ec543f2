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

//! Join of the live snapshot with the configuration manager's PID list

use edgeconsole_types::factory::INVERTER_ALIAS_PREFIX;
use edgeconsole_types::{
    Catalog, Component, ComponentMap, DeviceCategory, MeterType, PidEntry, PidIndex,
    PortTemplate, TierConfig, TierUsage,
};
use tracing::warn;

/// A component that can be mutated: it is live on the edge and the console
/// knows its long PID
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedComponent {
    /// Component id, the key in the snapshot
    pub alias: String,
    pub pid: String,
    pub component: Component,
}

impl ManagedComponent {
    pub fn max_active_power_w(&self) -> f64 {
        self.component.max_active_power_w()
    }
}

/// Components of one category that have a long PID. Live components the
/// console does not list are skipped.
pub fn join_by_alias(
    components: &ComponentMap,
    pids: &[PidEntry],
    catalog: &Catalog,
    category: DeviceCategory,
) -> Vec<ManagedComponent> {
    let index = PidIndex::build(pids, |fpid| {
        fpid.is_some_and(|factory_id| catalog.matches(category, factory_id))
    });

    components
        .iter()
        .filter(|(_, component)| catalog.matches(category, &component.factory_id))
        .filter_map(|(alias, component)| match index.pid_for(alias) {
            Some(pid) => Some(ManagedComponent {
                alias: alias.clone(),
                pid: pid.to_owned(),
                component: component.clone(),
            }),
            None => {
                warn!(
                    "⚠️ [INVENTORY] {} '{}' has no configuration PID, skipping",
                    category.label(),
                    alias
                );
                None
            }
        })
        .collect()
}

pub fn find<'a>(items: &'a [ManagedComponent], alias: &str) -> Option<&'a ManagedComponent> {
    items.iter().find(|item| item.alias == alias)
}

pub fn inverter_usage(tier: TierConfig, inverters: &[ManagedComponent]) -> TierUsage {
    TierUsage::from_powers_w(tier, inverters.iter().map(ManagedComponent::max_active_power_w))
}

/// Ids of every PV inverter in the snapshot, in id order
pub fn pv_inverter_ids(components: &ComponentMap) -> Vec<String> {
    components
        .keys()
        .filter(|id| id.starts_with(INVERTER_ALIAS_PREFIX))
        .cloned()
        .collect()
}

/// Installed PV power, the reference for percentage power limits
pub fn total_inverter_power_w(components: &ComponentMap) -> f64 {
    components
        .iter()
        .filter(|(id, _)| id.starts_with(INVERTER_ALIAS_PREFIX))
        .map(|(_, component)| component.max_active_power_w())
        .sum()
}

/// Port templates not yet configured on the edge
pub fn available_templates<'a>(
    catalog: &'a Catalog,
    ports: &[ManagedComponent],
) -> Vec<&'a PortTemplate> {
    catalog
        .serial_port_templates
        .iter()
        .filter(|template| {
            !ports.iter().any(|port| {
                port.alias == template.key
                    || port.component.property_str("alias").as_deref() == Some(template.key.as_str())
            })
        })
        .collect()
}

/// Meter types still free. A type can be used by one meter only; the type of
/// the meter being edited stays available to it.
pub fn available_meter_types<'a>(
    catalog: &'a Catalog,
    meters: &[ManagedComponent],
    editing: Option<&str>,
) -> Vec<&'a MeterType> {
    let used: Vec<String> = meters
        .iter()
        .filter_map(|meter| meter.component.property_str("type"))
        .collect();

    catalog
        .meter_setup
        .meter_types
        .iter()
        .filter(|t| !used.contains(&t.value) || editing == Some(t.value.as_str()))
        .collect()
}
