//! File-backed task store with a denormalized summary index.
//!
//! One JSON file per task named by its id, plus `index.json` holding the
//! sorted summary projection. The index is a cache, not a source of truth:
//! it is rebuilt from a full scan after every mutation and regenerated on
//! demand if missing or unreadable.
//!
//! Mutations are read-modify-write with atomic rename. Concurrent writers
//! can lose updates (last rename wins) but never corrupt a record.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::fs::{ensure_dir, read_json_opt, write_json_atomic};
use crate::store::model::{Board, Comment, Task, TaskPatch, TaskStatus, TaskSummary};

/// Fields accepted when creating a task. Everything else is defaulted:
/// status `backlog`, priority 100, empty comments and links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Store for task records under a single directory.
pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn task_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("index.json")
    }

    /// Create a task with a fresh id, persist it, and rebuild the index.
    pub async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        let mut task = Task::new(new.title);
        if let Some(description) = new.description {
            task.description = description;
        }
        if let Some(priority) = new.priority {
            task.priority = priority;
        }
        task.assignee = new.assignee.filter(|a| !a.is_empty());
        if let Some(tags) = new.tags {
            task.tags = tags;
        }

        self.persist(&task).await?;
        Ok(task)
    }

    /// Fetch a task by id.
    pub async fn get(&self, id: Uuid) -> Result<Task, StoreError> {
        read_json_opt(&self.task_path(id))
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "task".to_string(),
                id: id.to_string(),
            })
    }

    /// Merge a partial update over an existing task. The id and creation
    /// timestamp survive unconditionally.
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Task, StoreError> {
        let mut task = self.get(id).await?;
        patch.apply(&mut task);
        self.persist(&task).await?;
        Ok(task)
    }

    /// Remove a task. Deleting an id that does not exist is a no-op.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match fs::remove_file(self.task_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.rebuild_index().await?;
        Ok(())
    }

    /// Append a comment and persist through the same path as `update`.
    pub async fn add_comment(
        &self,
        id: Uuid,
        author: &str,
        text: &str,
    ) -> Result<Task, StoreError> {
        let mut task = self.get(id).await?;
        task.comments.push(Comment::new(author, text));
        task.updated_at = Utc::now();
        self.persist(&task).await?;
        Ok(task)
    }

    /// Read the summary index, applying optional equality filters. A missing
    /// or unreadable index file is rebuilt from the task records first.
    pub async fn list(
        &self,
        status: Option<TaskStatus>,
        assignee: Option<&str>,
    ) -> Result<Vec<TaskSummary>, StoreError> {
        let summaries = match read_json_opt::<Vec<TaskSummary>>(&self.index_path()).await {
            Ok(Some(summaries)) => summaries,
            Ok(None) => self.rebuild_index().await?,
            Err(e) => {
                warn!(error = %e, "Summary index unreadable, rebuilding");
                self.rebuild_index().await?
            }
        };

        Ok(summaries
            .into_iter()
            .filter(|s| status.is_none_or(|want| s.status == want))
            .filter(|s| assignee.is_none_or(|want| s.assignee.as_deref() == Some(want)))
            .collect())
    }

    /// Group all summaries into the four status columns.
    pub async fn board(&self) -> Result<Board, StoreError> {
        Ok(Board::from_summaries(self.list(None, None).await?))
    }

    /// Write the record, then rebuild the index so reads stay consistent
    /// with the scan.
    async fn persist(&self, task: &Task) -> Result<(), StoreError> {
        write_json_atomic(&self.task_path(task.id), task).await?;
        self.rebuild_index().await?;
        Ok(())
    }

    /// Scan every task file, skip anything malformed, sort, and write the
    /// index atomically. O(number of tasks) and runs after every mutation.
    pub async fn rebuild_index(&self) -> Result<Vec<TaskSummary>, StoreError> {
        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = task_id_from_path(&entry.path()) else {
                continue;
            };
            match read_json_opt::<Task>(&entry.path()).await {
                Ok(Some(task)) => summaries.push(task.summary()),
                // Deleted between listing and reading; nothing to index.
                Ok(None) => {}
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Skipping malformed task file in index rebuild");
                }
            }
        }

        summaries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });

        write_json_atomic(&self.index_path(), &summaries).await?;
        Ok(summaries)
    }
}

/// Extract the task id from a `<uuid>.json` filename. Anything else in the
/// directory (the index, temp files) is not a task record.
fn task_id_from_path(path: &Path) -> Option<Uuid> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}
