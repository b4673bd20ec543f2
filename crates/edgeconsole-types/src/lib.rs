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

//! Shared data model for the edge configuration console
//!
//! Everything here is plain data plus the arithmetic that the console applies
//! before a mutation is sent to the device: component snapshots, JSON-RPC
//! envelopes, configuration-manager PID entries, typed factory configs and
//! the bundled catalog with its tier limits.

pub mod catalog;
pub mod component;
pub mod error;
pub mod factory;
pub mod form;
pub mod limits;
pub mod pid;
pub mod rpc;
pub mod status;

pub use catalog::{
    Brand, Catalog, DeviceCategory, InverterSetup, MeterSetup, MeterType, PortTemplate,
    StorageSetup, TierConfig,
};
pub use component::{Component, ComponentMap};
pub use error::{CatalogError, ValidationError};
pub use factory::{
    AccountConfig, ComponentConfig, FixPowerLimitConfig, InverterConfig, MeterConfig, Parity,
    SerialPortConfig, StopBits, StorageConfig,
};
pub use form::{FormBody, form_value};
pub use limits::{
    PowerLimitSetpoint, TierUsage, TierViolation, next_component_id, next_inverter_alias,
};
pub use pid::{PidEntry, PidIndex, alias_from_name_hint};
pub use rpc::{
    EdgeRpcParams, EdgeRpcResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PropertyUpdate,
    UpdateComponentConfigParams,
};
pub use status::SystemStatus;
