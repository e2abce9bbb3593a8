//! Error types for taskdeck.

use std::path::PathBuf;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Persistence errors for the file-backed stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Malformed record at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dispatch-cycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("No personas available")]
    NoPersonas,

    #[error("Failed to spawn agent command {command:?}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Store error during dispatch: {0}")]
    Store(#[from] StoreError),
}

/// Rate-limited queue and worker-bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Worker process is not running")]
    NotRunning,

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Worker process exited with requests pending")]
    ProcessExited,

    #[error("Worker returned an error: {0}")]
    Worker(String),

    #[error("Queue is closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
