// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Sync-policy derivation from a mod's variable-definition schema.
//!
//! A mod declares its variables in a JSON-schema-like structure; each
//! property may carry an `x-sync-policy` annotation. Only `"session"` is
//! a supported synchronization target; any other non-`"none"` value is a
//! corrupt mod definition.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};

/// Whether one variable's value round-trips through session storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Local to the execution context
    None,
    /// Shared across frames/tabs via session storage
    Session,
}

/// Per-variable sync decisions for one mod, derived once at registration
/// and consulted on every get/set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPolicyMap {
    policies: BTreeMap<String, SyncPolicy>,
}

impl SyncPolicyMap {
    /// Derive the map from a variable-definition schema.
    ///
    /// Looks at `properties.<name>."x-sync-policy"`; absent or `"none"`
    /// means local. A schema with no `properties` yields an empty map
    /// (everything local).
    pub fn from_schema(schema: &Value) -> Result<Self> {
        let mut policies = BTreeMap::new();
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(SyncPolicyMap::default());
        };
        for (name, definition) in properties {
            let policy = match definition.get("x-sync-policy") {
                None | Some(Value::Null) => SyncPolicy::None,
                Some(Value::String(tag)) if tag == "none" => SyncPolicy::None,
                Some(Value::String(tag)) if tag == "session" => SyncPolicy::Session,
                Some(other) => {
                    return Err(Error::configuration(format!(
                        "unsupported x-sync-policy {other} for variable {name:?} \
                         (expected \"none\" or \"session\")"
                    )));
                }
            };
            policies.insert(name.clone(), policy);
        }
        Ok(SyncPolicyMap { policies })
    }

    /// Whether the named variable is synchronized.
    #[must_use]
    pub fn is_synced(&self, name: &str) -> bool {
        self.policies.get(name) == Some(&SyncPolicy::Session)
    }

    /// Whether any variable is synchronized. When false, get/set skip
    /// session storage entirely.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        self.policies.values().any(|p| *p == SyncPolicy::Session)
    }

    /// Names of all synchronized variables.
    pub fn synced_names(&self) -> impl Iterator<Item = &str> {
        self.policies
            .iter()
            .filter(|(_, p)| **p == SyncPolicy::Session)
            .map(|(name, _)| name.as_str())
    }
}
