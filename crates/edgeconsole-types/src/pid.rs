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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row of the configuration manager's `configData.pids` list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PidEntry {
    /// Long persistent identifier, e.g. `felix.pid.47`
    pub id: String,

    /// Factory PID the configuration was created from; absent for singletons
    #[serde(default)]
    pub fpid: Option<String>,

    #[serde(default)]
    pub name_hint: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PidEntry {
    pub fn alias(&self) -> Option<&str> {
        self.name_hint.as_deref().and_then(alias_from_name_hint)
    }

    pub fn has_factory(&self, factory_id: &str) -> bool {
        self.fpid.as_deref() == Some(factory_id)
    }
}

/// Text inside the first `[...]` of a name hint
pub fn alias_from_name_hint(name_hint: &str) -> Option<&str> {
    let (_, rest) = name_hint.split_once('[')?;
    let (alias, _) = rest.split_once(']')?;
    if alias.is_empty() { None } else { Some(alias) }
}

/// Alias to long PID mapping, rebuilt from scratch on every poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidIndex {
    by_alias: BTreeMap<String, String>,
}

impl PidIndex {
    /// Index `entries` whose factory passes `accept`. A later entry for the
    /// same alias replaces an earlier one.
    pub fn build<F>(entries: &[PidEntry], accept: F) -> Self
    where
        F: Fn(Option<&str>) -> bool,
    {
        let by_alias = entries
            .iter()
            .filter(|entry| accept(entry.fpid.as_deref()))
            .filter_map(|entry| entry.alias().map(|alias| (alias.to_owned(), entry.id.clone())))
            .collect();
        Self { by_alias }
    }

    pub fn for_factory(entries: &[PidEntry], factory_id: &str) -> Self {
        Self::build(entries, |fpid| fpid == Some(factory_id))
    }

    pub fn all(entries: &[PidEntry]) -> Self {
        Self::build(entries, |_| true)
    }

    pub fn pid_for(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_alias.iter().map(|(a, p)| (a.as_str(), p.as_str()))
    }
}
