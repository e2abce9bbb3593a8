//! Persistence for dispatch run records, one JSON file per run.

use std::path::PathBuf;

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::fs::{ensure_dir, read_json_opt, write_json_atomic};
use crate::store::model::RunRecord;

/// Store for run records under a single directory.
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn run_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist a run record. Called once when the run starts (status
    /// `running`) and once more when it finishes; the second write replaces
    /// the first through the same atomic path.
    pub async fn save(&self, run: &RunRecord) -> Result<(), StoreError> {
        write_json_atomic(&self.run_path(run.id), run).await
    }

    /// Fetch a run record by id.
    pub async fn get(&self, id: Uuid) -> Result<RunRecord, StoreError> {
        read_json_opt(&self.run_path(id))
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "run".to_string(),
                id: id.to_string(),
            })
    }

    /// All run records, most recently started first. Malformed files are
    /// skipped and logged, same policy as the task index rebuild.
    pub async fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        let mut runs = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_json_opt::<RunRecord>(&path).await {
                Ok(Some(run)) => runs.push(run),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed run record");
                }
            }
        }
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}
