//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Service configuration, read from `TASKDECK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for all persisted state (tasks, runs, chats, reports).
    pub data_dir: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Agent command to spawn for each dispatch.
    pub agent_cmd: String,
    /// Extra arguments passed to the agent command.
    pub agent_args: Vec<String>,
    /// Assignee strings that mark a task as eligible for dispatch.
    pub assignees: Vec<String>,
    /// Cron expression driving the dispatch timer (six-field).
    pub cron: String,
    /// Maximum number of concurrently running dispatches.
    pub max_running: usize,
    /// Whether the dispatch timer starts enabled.
    pub scheduler_enabled: bool,
    /// Persona id preferred when composing prompts.
    pub default_persona: String,
    /// Directory of persona template files.
    pub personas_dir: PathBuf,
    /// Worker process command; the worker bridge starts only when set.
    pub worker_cmd: Option<String>,
    /// Delay inserted between consecutive worker calls.
    pub worker_delay: Duration,
    /// Per-request timeout for worker calls.
    pub worker_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            port: 8787,
            agent_cmd: "claude".to_string(),
            agent_args: Vec::new(),
            assignees: vec!["ai".to_string(), "agent".to_string()],
            cron: "0 */10 * * * *".to_string(), // every 10 minutes
            max_running: 1,
            scheduler_enabled: true,
            default_persona: "implementer".to_string(),
            personas_dir: PathBuf::from("./personas"),
            worker_cmd: None,
            worker_delay: Duration::from_millis(1000),
            worker_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("TASKDECK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let port: u16 = std::env::var("TASKDECK_PORT")
            .unwrap_or_else(|_| "8787".to_string())
            .parse()
            .unwrap_or(defaults.port);

        let agent_cmd =
            std::env::var("TASKDECK_AGENT_CMD").unwrap_or_else(|_| defaults.agent_cmd.clone());

        let agent_args: Vec<String> = std::env::var("TASKDECK_AGENT_ARGS")
            .unwrap_or_default()
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();

        let assignees: Vec<String> = std::env::var("TASKDECK_ASSIGNEES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| defaults.assignees.clone());

        let cron = std::env::var("TASKDECK_CRON").unwrap_or_else(|_| defaults.cron.clone());

        let max_running: usize = std::env::var("TASKDECK_MAX_RUNNING")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(defaults.max_running);

        let scheduler_enabled = std::env::var("TASKDECK_SCHEDULER_ENABLED")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(defaults.scheduler_enabled);

        let default_persona = std::env::var("TASKDECK_DEFAULT_PERSONA")
            .unwrap_or_else(|_| defaults.default_persona.clone());

        let personas_dir = std::env::var("TASKDECK_PERSONAS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.personas_dir);

        let worker_cmd = std::env::var("TASKDECK_WORKER_CMD").ok().filter(|s| !s.is_empty());

        let worker_delay_ms: u64 = std::env::var("TASKDECK_WORKER_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);

        let worker_timeout_secs: u64 = std::env::var("TASKDECK_WORKER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        Self {
            data_dir,
            port,
            agent_cmd,
            agent_args,
            assignees,
            cron,
            max_running,
            scheduler_enabled,
            default_persona,
            personas_dir,
            worker_cmd,
            worker_delay: Duration::from_millis(worker_delay_ms),
            worker_timeout: Duration::from_secs(worker_timeout_secs),
        }
    }
}
