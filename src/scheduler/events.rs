//! Dispatch lifecycle events, fanned out over a broadcast channel.
//!
//! Subscribers (tests, future UI surfaces) use these to observe runs
//! without polling the stores. Lagged or absent subscribers never block a
//! dispatch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted by the scheduler as a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// A task was claimed and the agent process is being driven.
    RunStarted {
        run_id: Uuid,
        task_id: Uuid,
        persona: String,
    },
    /// The agent process exited and the task was reconciled.
    RunFinished {
        run_id: Uuid,
        task_id: Uuid,
        success: bool,
    },
}

impl DispatchEvent {
    /// Whether this event ends a run's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchEvent::RunFinished { .. })
    }
}
