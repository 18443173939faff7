//! Resource state records
//!
//! The state record is the engine's memory of what it has provisioned:
//! one [`StateEntry`] per logical resource id, grouped per scope. The
//! planner diffs declarations against these entries; the executor writes
//! an entry back immediately after every successful node.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgeflow_core::{Fingerprint, ResourceId, ResourceKind, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Current state record format version
pub const STATE_VERSION: u32 = 1;

/// Recorded state of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Resource kind
    pub kind: ResourceKind,

    /// Provider-side identifier used for updates and deletes
    pub provider_ref: String,

    /// Fingerprint of the configuration that was applied
    pub fingerprint: Fingerprint,

    /// Exported attributes from the last apply
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,

    /// Whether the resource was adopted rather than created
    #[serde(default)]
    pub adopted: bool,

    /// Whether deletion is permitted once the resource goes stale
    #[serde(default)]
    pub delete: bool,

    /// Dependency ids recorded at apply time, for teardown ordering
    #[serde(default)]
    pub dependencies: Vec<ResourceId>,

    /// When the resource was first provisioned or adopted
    pub created_at: DateTime<Utc>,

    /// Last apply timestamp
    pub updated_at: DateTime<Utc>,
}

impl StateEntry {
    pub fn new(
        kind: ResourceKind,
        provider_ref: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        let now = Utc::now();
        Self {
            kind,
            provider_ref: provider_ref.into(),
            fingerprint,
            outputs: BTreeMap::new(),
            adopted: false,
            delete: false,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, serde_json::Value>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_adopted(mut self, adopted: bool) -> Self {
        self.adopted = adopted;
        self
    }

    pub fn with_delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ResourceId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// An entry that could not be parsed from the underlying store
///
/// The raw value is kept so that a later commit does not silently drop
/// the record; the engine never provisions over an unreadable entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptEntry {
    /// Parse error description
    pub error: String,

    /// Raw value as found in the store
    pub raw: serde_json::Value,
}

/// All recorded state for one scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeState {
    /// Record format version
    pub version: u32,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,

    /// Entries keyed by logical resource id
    #[serde(default)]
    pub entries: BTreeMap<ResourceId, StateEntry>,

    /// Unreadable entries quarantined at load time, keyed by raw id
    #[serde(skip)]
    pub corrupt: BTreeMap<String, CorruptEntry>,
}

impl Default for ScopeState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            entries: BTreeMap::new(),
            corrupt: BTreeMap::new(),
        }
    }
}

impl ScopeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&StateEntry> {
        self.entries.get(id)
    }

    /// Add or replace an entry
    pub fn set(&mut self, id: ResourceId, entry: StateEntry) {
        self.entries.insert(id, entry);
        self.updated_at = Utc::now();
    }

    /// Remove an entry
    pub fn remove(&mut self, id: &ResourceId) -> Option<StateEntry> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.corrupt.is_empty()
    }
}

/// RAII guard for a held state lock
///
/// Dropping the guard removes the lock file on a best-effort basis;
/// callers should prefer the explicit [`StateLock::release`].
#[derive(Debug)]
pub struct StateLock {
    lock_path: Option<PathBuf>,
    released: bool,
}

impl StateLock {
    pub(crate) fn held(lock_path: PathBuf) -> Self {
        Self {
            lock_path: Some(lock_path),
            released: false,
        }
    }

    /// Lock guard for backends that need no locking
    pub fn noop() -> Self {
        Self {
            lock_path: None,
            released: true,
        }
    }

    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if let Some(path) = &self.lock_path
                && path.exists()
            {
                tokio::fs::remove_file(path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released
            && let Some(path) = &self.lock_path
            && path.exists()
        {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Storage abstraction for scope state
///
/// `upsert` and `delete` are write-through: each call must be durable on
/// return so that a crashed run leaves an accurate record of what was
/// provisioned. `commit` marks the end of a run and produces the
/// snapshot (plus backup, where the backend supports one).
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn load(&self, scope: &Scope) -> Result<ScopeState>;

    async fn upsert(&self, scope: &Scope, id: &ResourceId, entry: StateEntry) -> Result<()>;

    async fn delete(&self, scope: &Scope, id: &ResourceId) -> Result<()>;

    async fn commit(&self, scope: &Scope) -> Result<()>;

    /// Take an exclusive lock for the duration of a run
    async fn acquire_lock(&self, _scope: &Scope) -> Result<StateLock> {
        Ok(StateLock::noop())
    }
}

/// In-memory state backend
///
/// Used by tests and by callers that persist state through other means.
/// `commit` snapshots the working state; the snapshot is inspectable via
/// [`MemoryStateBackend::committed`].
#[derive(Default)]
pub struct MemoryStateBackend {
    working: Mutex<HashMap<String, ScopeState>>,
    committed: Mutex<HashMap<String, ScopeState>>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last committed snapshot for a scope, if any
    pub async fn committed(&self, scope: &Scope) -> Option<ScopeState> {
        self.committed.lock().await.get(&scope.qualified()).cloned()
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn load(&self, scope: &Scope) -> Result<ScopeState> {
        Ok(self
            .working
            .lock()
            .await
            .get(&scope.qualified())
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert(&self, scope: &Scope, id: &ResourceId, entry: StateEntry) -> Result<()> {
        let mut working = self.working.lock().await;
        working
            .entry(scope.qualified())
            .or_default()
            .set(id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, scope: &Scope, id: &ResourceId) -> Result<()> {
        let mut working = self.working.lock().await;
        if let Some(state) = working.get_mut(&scope.qualified()) {
            state.remove(id);
        }
        Ok(())
    }

    async fn commit(&self, scope: &Scope) -> Result<()> {
        let key = scope.qualified();
        let snapshot = self
            .working
            .lock()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default();
        self.committed.lock().await.insert(key, snapshot);
        Ok(())
    }
}
