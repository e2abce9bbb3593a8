//! Persistence layer — file-backed stores for tasks, runs, chats, and reports.

pub mod chats;
pub mod fs;
pub mod model;
pub mod reports;
pub mod runs;
pub mod tasks;

pub use chats::ChatStore;
pub use model::{Board, Comment, RunRecord, RunStatus, Task, TaskPatch, TaskStatus, TaskSummary};
pub use reports::ReportStore;
pub use runs::RunStore;
pub use tasks::{NewTask, TaskStore};
