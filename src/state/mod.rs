// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Namespaced mod variable state.
//!
//! Three namespaces: `public` (one object per page, mod-agnostic), `mod`
//! (one object per mod id), `private` (one object per mod-component
//! instance). Updates apply one of three merge strategies; a mod's
//! synchronized variables additionally round-trip through session storage
//! so frames and tabs converge. Change notification is a signal to
//! re-fetch, never a data channel, since state values may be sensitive.

mod merge;
mod storage;
mod sync_policy;

pub use merge::MergeStrategy;
pub use storage::{mod_id_from_key, mod_variable_key, InMemorySessionStorage, SessionStorage};
pub use sync_policy::{SyncPolicy, SyncPolicyMap};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::JsonObject;

/// Which partition of variable state an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateNamespace {
    /// Page-level state, shared by every mod
    Public,
    /// Per-mod state, keyed by mod id
    Mod,
    /// Per-component state, keyed by mod-component instance id
    Private,
}

/// Identifies the mod (and optionally the component instance) on whose
/// behalf a state operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModComponentRef {
    /// Registry id of the mod
    pub mod_id: String,
    /// Instance id of the component, required for the private namespace
    pub mod_component_id: Option<Uuid>,
}

impl ModComponentRef {
    /// Reference a mod with no component identity.
    #[must_use]
    pub fn new(mod_id: impl Into<String>) -> Self {
        ModComponentRef {
            mod_id: mod_id.into(),
            mod_component_id: None,
        }
    }

    /// Attach a component instance id.
    #[must_use]
    pub fn with_component(mut self, id: Uuid) -> Self {
        self.mod_component_id = Some(id);
        self
    }
}

/// A state-change signal. Carries only identity, never the payload;
/// subscribers re-fetch through [`ModVariableStore::get_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// Which partition changed
    pub namespace: StateNamespace,
    /// The owning mod, when the namespace has one
    pub mod_id: Option<String>,
    /// The owning component, for the private namespace
    pub mod_component_id: Option<Uuid>,
}

/// The mod variable store.
///
/// An explicit object constructed per execution context and shared by
/// `Arc`; there is no global instance. State objects are created lazily
/// on first read or write. Concurrent writers to the same namespace are
/// well-defined through merge-strategy semantics (last merge wins), not
/// prevented.
pub struct ModVariableStore {
    storage: Arc<dyn SessionStorage>,
    public: Mutex<JsonObject>,
    /// Non-synchronized keys per mod id; synchronized keys live in storage
    per_mod: Mutex<HashMap<String, JsonObject>>,
    private: Mutex<HashMap<Uuid, JsonObject>>,
    policies: Mutex<HashMap<String, SyncPolicyMap>>,
    /// Last synchronized subset this context wrote or observed, per mod
    /// id; storage events matching it are echoes and stay silent
    synced_snapshot: Mutex<HashMap<String, JsonObject>>,
    changes: broadcast::Sender<StateChange>,
}

impl ModVariableStore {
    /// A store backed by the given session storage.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (changes, _) = broadcast::channel(64);
        ModVariableStore {
            storage,
            public: Mutex::new(JsonObject::new()),
            per_mod: Mutex::new(HashMap::new()),
            private: Mutex::new(HashMap::new()),
            policies: Mutex::new(HashMap::new()),
            synced_snapshot: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Subscribe to change signals. Lagging receivers lose old signals,
    /// which is acceptable for a re-fetch trigger.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Derive and register the sync policy for a mod from its
    /// variable-definition schema, replacing any prior registration.
    pub fn register_sync_policy(&self, mod_id: &str, schema: &Value) -> Result<()> {
        let map = SyncPolicyMap::from_schema(schema)?;
        self.policies.lock().insert(mod_id.to_string(), map);
        Ok(())
    }

    /// React to one storage key-change event.
    ///
    /// Non-variable-store keys are ignored. For a mod's key, the stored
    /// synchronized subset is compared with the last subset this context
    /// wrote or observed: an echo of our own write stays silent, a write
    /// from another context updates the snapshot and fires an
    /// identity-only change signal.
    pub async fn handle_storage_change(&self, key: &str) -> Result<()> {
        let Some(mod_id) = mod_id_from_key(key) else {
            return Ok(());
        };
        let synced = self.fetch_synced(key).await?;
        {
            let mut snapshot = self.synced_snapshot.lock();
            if snapshot.get(mod_id) == Some(&synced) {
                return Ok(());
            }
            snapshot.insert(mod_id.to_string(), synced);
        }
        self.notify(StateNamespace::Mod, Some(mod_id.to_string()), None);
        Ok(())
    }

    /// Spawn a task forwarding the storage's key-change events through
    /// [`handle_storage_change`](Self::handle_storage_change), so writes
    /// from other execution contexts reach this store's subscribers.
    /// Ends when the storage's event channel closes.
    pub fn listen_to_storage(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let mut events = store.storage.changes();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(key) => {
                        if let Err(error) = store.handle_storage_change(&key).await {
                            tracing::warn!(key = %key, error = %error, "storage change handling failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply an update and return the resulting state.
    ///
    /// For the mod namespace, the synchronized subset is written to
    /// session storage only when it actually changed, so storage echoes
    /// do not cascade. A change signal fires whenever the full state
    /// differs from before. The private namespace requires a component
    /// id and fails before any storage I/O without one.
    pub async fn set_state(
        &self,
        namespace: StateNamespace,
        component: &ModComponentRef,
        data: &JsonObject,
        strategy: MergeStrategy,
    ) -> Result<JsonObject> {
        match namespace {
            StateNamespace::Public => {
                let (previous, next) = {
                    let mut public = self.public.lock();
                    let previous = public.clone();
                    let next = strategy.apply(&previous, data);
                    *public = next.clone();
                    (previous, next)
                };
                if next != previous {
                    self.notify(StateNamespace::Public, None, None);
                }
                Ok(next)
            }
            StateNamespace::Private => {
                let id = require_component_id(component)?;
                let (previous, next) = {
                    let mut private = self.private.lock();
                    let previous = private.get(&id).cloned().unwrap_or_default();
                    let next = strategy.apply(&previous, data);
                    private.insert(id, next.clone());
                    (previous, next)
                };
                if next != previous {
                    self.notify(
                        StateNamespace::Private,
                        Some(component.mod_id.clone()),
                        Some(id),
                    );
                }
                Ok(next)
            }
            StateNamespace::Mod => {
                let policy = self.policy_for(&component.mod_id);
                let key = mod_variable_key(&component.mod_id);

                let synced_prev = if policy.has_synced() {
                    self.fetch_synced(&key).await?
                } else {
                    JsonObject::new()
                };
                let local_prev = self
                    .per_mod
                    .lock()
                    .get(&component.mod_id)
                    .cloned()
                    .unwrap_or_default();

                let mut previous = local_prev;
                for (k, v) in &synced_prev {
                    previous.insert(k.clone(), v.clone());
                }

                let next = strategy.apply(&previous, data);
                let mut synced_next = JsonObject::new();
                let mut local_next = JsonObject::new();
                for (k, v) in &next {
                    if policy.is_synced(k) {
                        synced_next.insert(k.clone(), v.clone());
                    } else {
                        local_next.insert(k.clone(), v.clone());
                    }
                }

                self.per_mod
                    .lock()
                    .insert(component.mod_id.clone(), local_next);

                if policy.has_synced() {
                    // Remember what this context last saw so the storage
                    // echo of our own write stays silent
                    self.synced_snapshot
                        .lock()
                        .insert(component.mod_id.clone(), synced_next.clone());
                    if synced_next != synced_prev {
                        self.storage.set(&key, Value::Object(synced_next)).await?;
                    }
                }
                if next != previous {
                    self.notify(StateNamespace::Mod, Some(component.mod_id.clone()), None);
                }
                Ok(next)
            }
        }
    }

    /// The current merged view of a namespace.
    ///
    /// For the mod namespace this combines the locally held
    /// non-synchronized keys with the synchronized keys' latest stored
    /// value; mods with no synchronized variable never touch storage.
    pub async fn get_state(
        &self,
        namespace: StateNamespace,
        component: &ModComponentRef,
    ) -> Result<JsonObject> {
        match namespace {
            StateNamespace::Public => Ok(self.public.lock().clone()),
            StateNamespace::Private => {
                let id = require_component_id(component)?;
                Ok(self.private.lock().get(&id).cloned().unwrap_or_default())
            }
            StateNamespace::Mod => {
                let policy = self.policy_for(&component.mod_id);
                let mut state = self
                    .per_mod
                    .lock()
                    .get(&component.mod_id)
                    .cloned()
                    .unwrap_or_default();
                if policy.has_synced() {
                    let key = mod_variable_key(&component.mod_id);
                    for (k, v) in self.fetch_synced(&key).await? {
                        state.insert(k, v);
                    }
                }
                Ok(state)
            }
        }
    }

    fn policy_for(&self, mod_id: &str) -> SyncPolicyMap {
        self.policies.lock().get(mod_id).cloned().unwrap_or_default()
    }

    async fn fetch_synced(&self, key: &str) -> Result<JsonObject> {
        match self.storage.get(key).await? {
            Some(Value::Object(map)) => Ok(map),
            _ => Ok(JsonObject::new()),
        }
    }

    fn notify(
        &self,
        namespace: StateNamespace,
        mod_id: Option<String>,
        mod_component_id: Option<Uuid>,
    ) {
        // No receivers is fine; the signal is advisory
        let _ = self.changes.send(StateChange {
            namespace,
            mod_id,
            mod_component_id,
        });
    }
}

fn require_component_id(component: &ModComponentRef) -> Result<Uuid> {
    component.mod_component_id.ok_or_else(|| {
        Error::invalid_input("private state requires a mod component id")
    })
}
