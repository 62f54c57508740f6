// Copyright (c) 2026 Playout Authors
// SPDX-License-Identifier: BUSL-1.1

//! Per-tick monitor state snapshots.
//!
//! A [`MonitorState`] is a flat, ordered map of `/`-separated paths to JSON
//! values. Every pipeline component publishes one; the channel nests them
//! under `stage`, `mixer` and `output` prefixes and hands the merged map to
//! the tick callback by value. The callback must not retain references into
//! the channel; the clone it receives is its own.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MonitorState {
    values: BTreeMap<String, Value>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(path.into(), value.into());
    }

    /// Nest another component's state under `prefix`, replacing whatever was
    /// previously published there.
    pub fn insert_state(&mut self, prefix: &str, state: MonitorState) {
        self.values.retain(|k, _| {
            k.as_str() != prefix
                && !(k.starts_with(prefix) && k.as_bytes().get(prefix.len()) == Some(&b'/'))
        });
        for (path, value) in state.values {
            if path.is_empty() {
                self.values.insert(prefix.to_string(), value);
            } else {
                self.values.insert(format!("{prefix}/{path}"), value);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}
