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

//! `application/x-www-form-urlencoded` bodies for the configuration manager
//!
//! The console reads repeated keys in order and keeps the first value of a
//! checkbox pair, so the body is an ordered list rather than a map.

use serde_json::{Map, Value};

/// Render one property value the way the console expects it
///
/// `null` becomes an empty string, arrays are joined with `,`, nested objects
/// are sent as JSON text.
pub fn form_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(form_value).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an arbitrary property map, keys in map order
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        let mut body = Self::new();
        for (key, value) in properties {
            body.set(key, form_value(value));
        }
        body
    }

    /// Replace every existing value of `key` with a single one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(position) = self.fields.iter().position(|(k, _)| *k == key) {
            self.fields[position].1 = value;
            let mut index = 0;
            self.fields.retain(|(k, _)| {
                let keep = *k != key || index == position;
                index += 1;
                keep
            });
        } else {
            self.fields.push((key, value));
        }
        self
    }

    /// Add another value for `key`, keeping existing ones
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Encode a checkbox. A checked box is posted as `true` followed by the
    /// hidden `false` fallback; an unchecked one only as `false`.
    pub fn set_checkbox(&mut self, key: &str, checked: bool) -> &mut Self {
        self.remove(key);
        if checked {
            self.append(key, "true");
        }
        self.append(key, "false")
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.fields.retain(|(k, _)| k != key);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in first-seen order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.fields {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn encode(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
