//! Pluggable persistence for cross-invocation resume.
//!
//! The engine serializes a versioned [`RunSnapshot`] after every completed
//! stage and on suspension. The store itself is external (a database in
//! production); [`MemorySnapshotStore`] ships here so downstream consumers
//! and the engine's own tests can exercise snapshot resume deterministically.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::RunState;

/// Current snapshot schema version. Bump on incompatible `RunState` changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Versioned envelope around a persisted [`RunState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub version: u32,
    pub state: RunState,
}

impl RunSnapshot {
    /// Capture the current state under the current schema version.
    pub fn capture(state: &RunState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            state: state.clone(),
        }
    }
}

/// Persistence seam for run snapshots and per-step resume data.
///
/// Keys are opaque to the store: `run_id` for whole-run snapshots and
/// `(run_id, step_id)` for step data. Object-safe so the manager can hold
/// it as `Arc<dyn SnapshotStore>`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a whole-run snapshot, replacing any prior one.
    async fn save(&self, snapshot: &RunSnapshot) -> anyhow::Result<()>;

    /// Load the snapshot for a run, if one exists. Unknown schema versions
    /// are an error, not a silent downgrade.
    async fn load(&self, run_id: Uuid) -> anyhow::Result<Option<RunSnapshot>>;

    /// Persist opaque per-step resume data.
    async fn save_step(
        &self,
        run_id: Uuid,
        step_id: &str,
        data: &serde_json::Value,
    ) -> anyhow::Result<()>;

    /// Load per-step resume data.
    async fn load_step(
        &self,
        run_id: Uuid,
        step_id: &str,
    ) -> anyhow::Result<Option<serde_json::Value>>;

    /// Drop everything stored for a run.
    async fn remove(&self, run_id: Uuid) -> anyhow::Result<()>;
}

/// In-memory [`SnapshotStore`].
///
/// Stores records as serialized JSON so the round-trip matches what a real
/// database-backed store would see.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    runs: Mutex<HashMap<Uuid, String>>,
    steps: Mutex<HashMap<(Uuid, String), serde_json::Value>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &RunSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.runs
            .lock()
            .expect("snapshot lock poisoned")
            .insert(snapshot.state.run_id, json);
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> anyhow::Result<Option<RunSnapshot>> {
        let json = {
            let runs = self.runs.lock().expect("snapshot lock poisoned");
            runs.get(&run_id).cloned()
        };
        let Some(json) = json else {
            return Ok(None);
        };
        let snapshot: RunSnapshot = serde_json::from_str(&json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            anyhow::bail!(
                "unsupported snapshot version {} for run {}",
                snapshot.version,
                run_id
            );
        }
        Ok(Some(snapshot))
    }

    async fn save_step(
        &self,
        run_id: Uuid,
        step_id: &str,
        data: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.steps
            .lock()
            .expect("snapshot lock poisoned")
            .insert((run_id, step_id.to_string()), data.clone());
        Ok(())
    }

    async fn load_step(
        &self,
        run_id: Uuid,
        step_id: &str,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self
            .steps
            .lock()
            .expect("snapshot lock poisoned")
            .get(&(run_id, step_id.to_string()))
            .cloned())
    }

    async fn remove(&self, run_id: Uuid) -> anyhow::Result<()> {
        self.runs
            .lock()
            .expect("snapshot lock poisoned")
            .remove(&run_id);
        self.steps
            .lock()
            .expect("snapshot lock poisoned")
            .retain(|(id, _), _| *id != run_id);
        Ok(())
    }
}
