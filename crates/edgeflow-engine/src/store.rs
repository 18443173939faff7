//! Local filesystem state backend
//!
//! Persists one JSON snapshot per scope under the project directory:
//! `{root}/.edgeflow/state/{app}/{stage}.json`. Every write lands via a
//! temporary file and an atomic rename, so a reader of the same scope
//! always sees a complete snapshot. The snapshot as it existed when the
//! run lock was taken is preserved next to it as `{stage}.json.backup`.

use crate::error::{EngineError, Result};
use crate::state::{CorruptEntry, STATE_VERSION, ScopeState, StateBackend, StateEntry, StateLock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgeflow_core::{ResourceId, Scope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const STATE_DIR: &str = ".edgeflow";
const STATE_SUBDIR: &str = "state";

/// A lock file older than this is considered abandoned and taken over
const LOCK_STALE_HOURS: i64 = 1;

/// On-disk snapshot shape
///
/// Entries are read as raw JSON first so a single unreadable entry is
/// quarantined instead of failing the whole snapshot.
#[derive(Debug, Deserialize)]
struct DiskSnapshot {
    version: u32,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    entries: serde_json::Map<String, serde_json::Value>,
}

/// Lock file contents
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// File-based state backend
///
/// Keeps a working copy per scope in memory so that per-node writes
/// during a run stay cheap; every mutation is still flushed to disk
/// before it returns.
pub struct LocalStateBackend {
    root: PathBuf,
    working: Mutex<HashMap<String, ScopeState>>,
}

impl LocalStateBackend {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            working: Mutex::new(HashMap::new()),
        }
    }

    fn scope_dir(&self, scope: &Scope) -> PathBuf {
        self.root
            .join(STATE_DIR)
            .join(STATE_SUBDIR)
            .join(&scope.app)
    }

    fn state_path(&self, scope: &Scope) -> PathBuf {
        self.scope_dir(scope).join(format!("{}.json", scope.stage))
    }

    fn backup_path(&self, scope: &Scope) -> PathBuf {
        self.scope_dir(scope)
            .join(format!("{}.json.backup", scope.stage))
    }

    fn lock_path(&self, scope: &Scope) -> PathBuf {
        self.scope_dir(scope).join(format!("{}.lock", scope.stage))
    }

    async fn ensure_dir(&self, scope: &Scope) -> Result<()> {
        let dir = self.scope_dir(scope);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!(dir = %dir.display(), "Created state directory");
        }
        Ok(())
    }

    /// Read and decode the snapshot, quarantining unreadable entries
    async fn read_snapshot(&self, scope: &Scope) -> Result<ScopeState> {
        let path = self.state_path(scope);
        if !path.exists() {
            tracing::debug!(scope = %scope, "No state file yet, starting empty");
            return Ok(ScopeState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let snapshot: DiskSnapshot = serde_json::from_str(&content).map_err(|e| {
            EngineError::State(format!("state file {} is not readable: {e}", path.display()))
        })?;
        if snapshot.version > STATE_VERSION {
            return Err(EngineError::State(format!(
                "state file {} has version {}, newer than supported version {}",
                path.display(),
                snapshot.version,
                STATE_VERSION
            )));
        }

        let mut state = ScopeState::new();
        state.version = snapshot.version;
        state.updated_at = snapshot.updated_at;
        for (raw_id, value) in snapshot.entries {
            let parsed = ResourceId::new(&raw_id)
                .map_err(|e| e.to_string())
                .and_then(|id| {
                    serde_json::from_value::<StateEntry>(value.clone())
                        .map(|entry| (id, entry))
                        .map_err(|e| e.to_string())
                });
            match parsed {
                Ok((id, entry)) => {
                    state.entries.insert(id, entry);
                }
                Err(error) => {
                    tracing::warn!(
                        scope = %scope,
                        entry = %raw_id,
                        error = %error,
                        "Quarantined unreadable state entry"
                    );
                    state.corrupt.insert(raw_id, CorruptEntry { error, raw: value });
                }
            }
        }
        tracing::debug!(
            scope = %scope,
            entries = state.entries.len(),
            corrupt = state.corrupt.len(),
            "Loaded state"
        );
        Ok(state)
    }

    /// Write the snapshot durably via temp file and atomic rename
    async fn persist(&self, scope: &Scope, state: &ScopeState) -> Result<()> {
        self.ensure_dir(scope).await?;

        let mut entries = serde_json::Map::new();
        for (id, entry) in &state.entries {
            entries.insert(id.to_string(), serde_json::to_value(entry)?);
        }
        // Quarantined entries ride along unchanged; a commit never drops
        // a record it could not read.
        for (raw_id, corrupt) in &state.corrupt {
            entries.insert(raw_id.clone(), corrupt.raw.clone());
        }
        let snapshot = serde_json::json!({
            "version": STATE_VERSION,
            "updated_at": state.updated_at,
            "entries": entries,
        });

        let path = self.state_path(scope);
        let tmp = self.scope_dir(scope).join(format!("{}.json.tmp", scope.stage));
        fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Load-or-reuse the working copy, apply a mutation and flush it
    async fn mutate<F>(&self, scope: &Scope, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ScopeState),
    {
        let mut working = self.working.lock().await;
        let key = scope.qualified();
        let mut state = match working.remove(&key) {
            Some(state) => state,
            None => self.read_snapshot(scope).await?,
        };
        apply(&mut state);
        self.persist(scope, &state).await?;
        working.insert(key, state);
        Ok(())
    }
}

#[async_trait]
impl StateBackend for LocalStateBackend {
    async fn load(&self, scope: &Scope) -> Result<ScopeState> {
        let state = self.read_snapshot(scope).await?;
        self.working
            .lock()
            .await
            .insert(scope.qualified(), state.clone());
        Ok(state)
    }

    async fn upsert(&self, scope: &Scope, id: &ResourceId, entry: StateEntry) -> Result<()> {
        let id = id.clone();
        self.mutate(scope, move |state| state.set(id, entry)).await
    }

    async fn delete(&self, scope: &Scope, id: &ResourceId) -> Result<()> {
        let id = id.clone();
        self.mutate(scope, move |state| {
            state.remove(&id);
        })
        .await
    }

    async fn commit(&self, scope: &Scope) -> Result<()> {
        let working = self.working.lock().await;
        let Some(state) = working.get(&scope.qualified()).cloned() else {
            return Ok(());
        };
        drop(working);
        self.persist(scope, &state).await?;
        tracing::debug!(scope = %scope, entries = state.entries.len(), "Committed state file");
        Ok(())
    }

    async fn acquire_lock(&self, scope: &Scope) -> Result<StateLock> {
        self.ensure_dir(scope).await?;
        let lock_path = self.lock_path(scope);

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let info: LockInfo = serde_json::from_str(&content)?;
            let age = Utc::now().signed_duration_since(info.acquired_at);
            if age.num_hours() < LOCK_STALE_HOURS {
                return Err(EngineError::Lock(format!(
                    "scope {} is locked by {} since {}",
                    scope, info.holder, info.acquired_at
                )));
            }
            tracing::warn!(scope = %scope, holder = %info.holder, "Taking over stale lock");
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        fs::write(&lock_path, serde_json::to_string_pretty(&info)?).await?;
        tracing::debug!(scope = %scope, "Acquired state lock");

        // Preserve the pre-run snapshot for the duration of the run.
        let state_path = self.state_path(scope);
        if state_path.exists() {
            let backup = self.backup_path(scope);
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::copy(&state_path, &backup).await?;
            tracing::debug!(scope = %scope, "Created state backup");
        }

        Ok(StateLock::held(lock_path))
    }
}
