//! Worker scheduler — cron-timed dispatch of backlog tasks to an external
//! agent process.

pub mod agent;
pub mod engine;
pub mod events;

pub use agent::{AgentOutcome, AgentRunner, ProcessAgent};
pub use engine::{
    DispatchOutcome, Scheduler, SchedulerSettings, SchedulerStatus, SettingsPatch,
    spawn_timer_loop,
};
pub use events::DispatchEvent;
