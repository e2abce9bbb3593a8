//! Task data model — records, summaries, and the board projection.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Backlog,
    InProgress,
    Review,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Backlog => write!(f, "backlog"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(TaskStatus::Backlog),
            "in-progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A comment on a task. Append-only; comments are never edited or removed
/// individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: author.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// A single unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique ID. Immutable after creation.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Higher = more urgent.
    pub priority: i32,
    /// Who should pick this up, if anyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Discussion trail, append-only.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Related URLs or references.
    #[serde(default)]
    pub links: Vec<String>,
    /// When the task was created. Immutable after creation.
    pub created_at: DateTime<Utc>,
    /// When the task was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task with defaults: backlog status, priority 100.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Backlog,
            priority: 100,
            assignee: None,
            tags: Vec::new(),
            comments: Vec::new(),
            links: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set assignee.
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Builder: set tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Derive the summary projection for the index.
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            title: self.title.clone(),
            status: self.status,
            priority: self.priority,
            assignee: self.assignee.clone(),
            tags: self.tags.clone(),
            updated_at: self.updated_at,
            comment_count: self.comments.len(),
            link_count: self.links.len(),
        }
    }
}

/// Denormalized projection of a task, kept in the summary index so list
/// queries never have to read every task file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub comment_count: usize,
    pub link_count: usize,
}

/// Partial update for a task. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// An empty string clears the assignee.
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub links: Option<Vec<String>>,
}

impl TaskPatch {
    /// Apply this patch over a task, preserving id and creation time and
    /// stamping a fresh update time.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assignee) = self.assignee {
            task.assignee = if assignee.is_empty() { None } else { Some(assignee) };
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
        if let Some(links) = self.links {
            task.links = links;
        }
        task.updated_at = Utc::now();
    }
}

/// Board view: all summaries grouped by status, list order preserved
/// within each column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Board {
    pub backlog: Vec<TaskSummary>,
    pub in_progress: Vec<TaskSummary>,
    pub review: Vec<TaskSummary>,
    pub done: Vec<TaskSummary>,
}

impl Board {
    pub fn from_summaries(summaries: Vec<TaskSummary>) -> Self {
        let mut board = Board::default();
        for summary in summaries {
            match summary.status {
                TaskStatus::Backlog => board.backlog.push(summary),
                TaskStatus::InProgress => board.in_progress.push(summary),
                TaskStatus::Review => board.review.push(summary),
                TaskStatus::Done => board.done.push(summary),
            }
        }
        board
    }
}

/// Status of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one dispatch attempt. Created when the dispatch begins,
/// finalized exactly once when the agent process exits, then immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub persona: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    /// Start a new run record in the `running` state.
    pub fn new(task_id: Uuid, persona: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            persona: persona.into(),
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            output: String::new(),
            error: None,
        }
    }

    /// Finalize the record from the process outcome.
    pub fn finish(&mut self, success: bool, output: String, error: Option<String>) {
        self.completed_at = Some(Utc::now());
        self.status = if success { RunStatus::Completed } else { RunStatus::Failed };
        self.output = output;
        self.error = error.filter(|e| !e.is_empty());
    }
}
