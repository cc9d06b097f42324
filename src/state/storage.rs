// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The session-storage boundary.
//!
//! The variable store's synchronized subset is the only state shared
//! across execution contexts. This trait is that boundary: single
//! `get`/`set` calls over a session-scoped key space, no cross-context
//! locking, plus a key-change subscription so a context can react to
//! writes made elsewhere. Hosts implement it over whatever storage the
//! platform offers; [`InMemorySessionStorage`] backs tests and
//! single-context use.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;

/// Fixed prefix for the variable store's keys, one key per mod id.
const MOD_VARIABLE_KEY_PREFIX: &str = "mod-variables";

/// The session-storage key holding a mod's synchronized variables.
#[must_use]
pub fn mod_variable_key(mod_id: &str) -> String {
    format!("{MOD_VARIABLE_KEY_PREFIX}::{mod_id}")
}

/// The mod id a variable-store key belongs to, if it is one.
#[must_use]
pub fn mod_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(MOD_VARIABLE_KEY_PREFIX)?.strip_prefix("::")
}

/// Session-scoped key-value storage.
///
/// Individual calls are atomic; nothing larger is. Concurrent writers
/// across contexts rely on merge-strategy semantics, not mutual
/// exclusion.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// The value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Subscribe to key-change events.
    ///
    /// Fires the changed key for writes from any execution context,
    /// including this one; consumers are expected to suppress echoes of
    /// their own writes. Lagging receivers lose old events, which is
    /// acceptable for a re-fetch trigger.
    fn changes(&self) -> broadcast::Receiver<String>;
}

/// Process-local storage for tests and single-context hosts.
pub struct InMemorySessionStorage {
    entries: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<String>,
}

impl InMemorySessionStorage {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(64);
        InMemorySessionStorage {
            entries: Mutex::new(HashMap::new()),
            changes,
        }
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        // No receivers is fine
        let _ = self.changes.send(key.to_string());
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}
