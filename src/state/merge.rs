// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Merge strategies for variable-state updates.
//!
//! Exactly three strategies exist and the set is closed: an enum dispatch
//! over pure functions, not a plugin system. An unknown strategy cannot
//! reach the store at all; it fails at the serde boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JsonObject;

/// How an update combines with the previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Next state is exactly the update
    Replace,
    /// Top-level keys of the update override; other previous keys survive
    Shallow,
    /// Object keys merge recursively; arrays and scalars replace
    Deep,
}

impl MergeStrategy {
    /// Apply this strategy. Both inputs are borrowed; the result is a
    /// fresh object that aliases neither.
    #[must_use]
    pub fn apply(self, previous: &JsonObject, data: &JsonObject) -> JsonObject {
        match self {
            MergeStrategy::Replace => data.clone(),
            MergeStrategy::Shallow => shallow_merge(previous, data),
            MergeStrategy::Deep => deep_merge(previous, data),
        }
    }
}

fn shallow_merge(previous: &JsonObject, data: &JsonObject) -> JsonObject {
    let mut next = previous.clone();
    for (key, value) in data {
        next.insert(key.clone(), value.clone());
    }
    next
}

fn deep_merge(previous: &JsonObject, data: &JsonObject) -> JsonObject {
    let mut next = previous.clone();
    for (key, value) in data {
        let merged = match (next.get(key), value) {
            (Some(Value::Object(prev)), Value::Object(update)) => {
                Value::Object(deep_merge(prev, update))
            }
            // Arrays and scalars replace wholesale, never concatenate
            _ => value.clone(),
        };
        next.insert(key.clone(), merged);
    }
    next
}
