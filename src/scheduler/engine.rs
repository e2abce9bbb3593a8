//! Dispatch engine.
//!
//! A timer (or a manual trigger) runs one check-then-dispatch cycle at a
//! time: pick the highest-priority eligible backlog task, claim it, record
//! a run, and drive the agent process in a background task. The in-memory
//! running set is the only guard against dispatching the same task twice
//! within this process; a single scheduler process per store directory is
//! assumed.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::agent::AgentRunner;
use super::events::DispatchEvent;
use crate::config::Config;
use crate::error::SchedulerError;
use crate::personas::PersonaCatalog;
use crate::store::model::{RunRecord, TaskPatch, TaskStatus, TaskSummary};
use crate::store::{RunStore, TaskStore};

/// Runtime-mutable scheduler settings.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSettings {
    /// Whether the dispatch timer is running. Manual triggers work either way.
    pub enabled: bool,
    /// Six-field cron expression for the dispatch timer.
    pub cron: String,
    /// Concurrency ceiling for in-flight runs.
    pub max_running: usize,
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub max_running: Option<usize>,
}

/// Snapshot returned by the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    #[serde(flatten)]
    pub settings: SchedulerSettings,
    /// Ids of tasks currently being worked by an agent.
    pub running: Vec<Uuid>,
}

/// What one check-then-dispatch cycle did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Dispatched { run_id: Uuid, task_id: Uuid },
    NoEligibleTask,
    AtCapacity,
}

/// The dispatch engine. One instance per process; constructed with its
/// collaborators injected, no ambient globals.
pub struct Scheduler {
    store: Arc<TaskStore>,
    runs: Arc<RunStore>,
    personas: Arc<PersonaCatalog>,
    agent: Arc<dyn AgentRunner>,
    /// Assignee strings that mark a task as agent work, matched case-insensitively.
    assignees: Vec<String>,
    default_persona: String,
    settings: RwLock<SchedulerSettings>,
    running: Arc<RwLock<HashSet<Uuid>>>,
    /// Wakes the timer loop after a settings change.
    reload: Notify,
    events: broadcast::Sender<DispatchEvent>,
}

impl Scheduler {
    pub fn new(
        store: Arc<TaskStore>,
        runs: Arc<RunStore>,
        personas: Arc<PersonaCatalog>,
        agent: Arc<dyn AgentRunner>,
        config: &Config,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            runs,
            personas,
            agent,
            assignees: config.assignees.clone(),
            default_persona: config.default_persona.clone(),
            settings: RwLock::new(SchedulerSettings {
                enabled: config.scheduler_enabled,
                cron: config.cron.clone(),
                max_running: config.max_running,
            }),
            running: Arc::new(RwLock::new(HashSet::new())),
            reload: Notify::new(),
            events,
        }
    }

    /// Subscribe to dispatch lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Settings plus the ids currently being worked.
    pub async fn status(&self) -> SchedulerStatus {
        let settings = self.settings.read().await.clone();
        let mut running: Vec<Uuid> = self.running.read().await.iter().copied().collect();
        running.sort();
        SchedulerStatus { settings, running }
    }

    /// Apply a partial settings update with immediate effect. A changed
    /// interval restarts the timer without touching in-flight runs.
    pub async fn update_settings(
        &self,
        patch: SettingsPatch,
    ) -> Result<SchedulerSettings, SchedulerError> {
        if let Some(cron_expr) = &patch.cron {
            // Reject bad expressions up front; the timer loop assumes a valid one.
            cron::Schedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron {
                expr: cron_expr.clone(),
                reason: e.to_string(),
            })?;
        }

        let snapshot = {
            let mut settings = self.settings.write().await;
            if let Some(enabled) = patch.enabled {
                settings.enabled = enabled;
            }
            if let Some(cron_expr) = patch.cron {
                settings.cron = cron_expr;
            }
            if let Some(max_running) = patch.max_running {
                settings.max_running = max_running;
            }
            settings.clone()
        };

        self.reload.notify_one();
        info!(
            enabled = snapshot.enabled,
            cron = %snapshot.cron,
            max_running = snapshot.max_running,
            "Scheduler settings updated"
        );
        Ok(snapshot)
    }

    /// One check-then-dispatch cycle. Used by both the timer and the
    /// manual trigger; at most one task is dispatched per call, and only
    /// when the running set is below the ceiling.
    pub async fn try_dispatch(&self) -> Result<DispatchOutcome, SchedulerError> {
        let max_running = self.settings.read().await.max_running;
        if self.running.read().await.len() >= max_running {
            info!(max_running, "Dispatch declined, concurrency ceiling reached");
            return Ok(DispatchOutcome::AtCapacity);
        }

        // The index is already priority/time sorted; the first eligible
        // summary is the deterministic choice.
        let backlog = self.store.list(Some(TaskStatus::Backlog), None).await?;
        let Some(candidate) = backlog.iter().find(|s| self.is_eligible(s)) else {
            return Ok(DispatchOutcome::NoEligibleTask);
        };
        let task_id = candidate.id;

        {
            let mut running = self.running.write().await;
            if running.len() >= max_running {
                return Ok(DispatchOutcome::AtCapacity);
            }
            if !running.insert(task_id) {
                // Already claimed by a concurrent cycle.
                return Ok(DispatchOutcome::NoEligibleTask);
            }
        }

        match self.begin_run(task_id).await {
            Ok(run_id) => Ok(DispatchOutcome::Dispatched { run_id, task_id }),
            Err(e) => {
                // Roll the claim back so a later cycle can retry the task
                // from scratch. No retry within this cycle.
                self.unclaim(task_id).await;
                Err(e)
            }
        }
    }

    /// Backlog tasks qualify when their assignee matches the allow-list.
    fn is_eligible(&self, summary: &TaskSummary) -> bool {
        summary.assignee.as_deref().is_some_and(|assignee| {
            self.assignees
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(assignee))
        })
    }

    /// Everything after the in-memory claim: load the record, flip it to
    /// in-progress, resolve a persona, persist the run record, and hand
    /// the agent process off to a background task.
    async fn begin_run(&self, task_id: Uuid) -> Result<Uuid, SchedulerError> {
        let task = self.store.get(task_id).await?;

        self.store
            .update(
                task_id,
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..TaskPatch::default()
                },
            )
            .await?;

        let persona = self
            .personas
            .resolve(&self.default_persona)
            .ok_or(SchedulerError::NoPersonas)?
            .clone();

        // Persisted immediately so an observer can see in-flight work.
        let run = RunRecord::new(task_id, persona.id.clone());
        self.runs.save(&run).await?;

        let prompt = persona.compose_prompt(&task.title, &task.description);

        info!(
            task_id = %task_id,
            run_id = %run.id,
            persona = %persona.id,
            title = %task.title,
            "Dispatching task to agent"
        );
        let _ = self.events.send(DispatchEvent::RunStarted {
            run_id: run.id,
            task_id,
            persona: persona.id.clone(),
        });

        let run_id = run.id;
        let ctx = DriveContext {
            store: Arc::clone(&self.store),
            runs: Arc::clone(&self.runs),
            agent: Arc::clone(&self.agent),
            running: Arc::clone(&self.running),
            events: self.events.clone(),
        };
        tokio::spawn(async move {
            drive(ctx, run, prompt).await;
        });

        Ok(run_id)
    }

    /// Undo an in-memory claim after a failed dispatch, requeueing the
    /// task if its status was already flipped.
    async fn unclaim(&self, task_id: Uuid) {
        self.running.write().await.remove(&task_id);
        match self.store.get(task_id).await {
            Ok(task) if task.status == TaskStatus::InProgress => {
                let patch = TaskPatch {
                    status: Some(TaskStatus::Backlog),
                    ..TaskPatch::default()
                };
                if let Err(e) = self.store.update(task_id, patch).await {
                    warn!(task_id = %task_id, error = %e, "Failed to requeue task after aborted dispatch");
                }
            }
            _ => {}
        }
    }
}

/// Cloned handles handed to the background task that drives one run.
struct DriveContext {
    store: Arc<TaskStore>,
    runs: Arc<RunStore>,
    agent: Arc<dyn AgentRunner>,
    running: Arc<RwLock<HashSet<Uuid>>>,
    events: broadcast::Sender<DispatchEvent>,
}

/// Drive the agent process to completion and reconcile the task from its
/// outcome. Store failures here are logged, never fatal.
async fn drive(ctx: DriveContext, mut run: RunRecord, prompt: String) {
    let task_id = run.task_id;
    let outcome = ctx.agent.run(&prompt).await;

    ctx.running.write().await.remove(&task_id);

    let (success, exit_code, output, error) = match outcome {
        Ok(o) => {
            let error = Some(o.stderr.clone()).filter(|s| !s.trim().is_empty());
            (o.success, o.exit_code, o.stdout, error)
        }
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Agent process failed to start");
            (false, None, String::new(), Some(e.to_string()))
        }
    };

    let comment = if success {
        let text = output.trim();
        if text.is_empty() {
            "(no output)".to_string()
        } else {
            text.to_string()
        }
    } else {
        match error.as_deref() {
            Some(err) => format!("Run failed: {}", err.trim()),
            None => match exit_code {
                Some(code) => format!("Run failed with exit code {code}"),
                None => "Run failed".to_string(),
            },
        }
    };

    run.finish(success, output, error);
    if let Err(e) = ctx.runs.save(&run).await {
        error!(run_id = %run.id, error = %e, "Failed to persist finished run record");
    }

    if let Err(e) = ctx.store.add_comment(task_id, &run.persona, &comment).await {
        error!(task_id = %task_id, error = %e, "Failed to append run comment");
    }

    let next_status = if success {
        TaskStatus::Review
    } else {
        TaskStatus::Backlog
    };
    if let Err(e) = ctx
        .store
        .update(
            task_id,
            TaskPatch {
                status: Some(next_status),
                ..TaskPatch::default()
            },
        )
        .await
    {
        error!(task_id = %task_id, error = %e, "Failed to transition task after run");
    }

    info!(
        task_id = %task_id,
        run_id = %run.id,
        success,
        status = %next_status,
        "Run reconciled"
    );
    let _ = ctx.events.send(DispatchEvent::RunFinished {
        run_id: run.id,
        task_id,
        success,
    });
}

/// Spawn the dispatch timer. Each firing runs at most one cycle. The loop
/// recomputes its sleep from the cron expression on every pass, so a
/// settings change restarts the timer without touching in-flight runs.
pub fn spawn_timer_loop(scheduler: Arc<Scheduler>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Dispatch timer started");
        loop {
            let (enabled, cron_expr) = {
                let settings = scheduler.settings.read().await;
                (settings.enabled, settings.cron.clone())
            };

            if !enabled {
                scheduler.reload.notified().await;
                continue;
            }

            let next = match next_fire(&cron_expr) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    warn!(cron = %cron_expr, "Cron expression has no upcoming firings, timer paused");
                    scheduler.reload.notified().await;
                    continue;
                }
                Err(e) => {
                    warn!(cron = %cron_expr, error = %e, "Invalid cron expression, timer paused");
                    scheduler.reload.notified().await;
                    continue;
                }
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    match scheduler.try_dispatch().await {
                        Ok(DispatchOutcome::Dispatched { run_id, task_id }) => {
                            info!(run_id = %run_id, task_id = %task_id, "Timer dispatched a task");
                        }
                        Ok(DispatchOutcome::NoEligibleTask) | Ok(DispatchOutcome::AtCapacity) => {}
                        Err(e) => {
                            // Cycle boundary: log it and let the next firing
                            // retry selection from scratch.
                            error!(error = %e, "Dispatch cycle failed");
                        }
                    }
                }
                _ = scheduler.reload.notified() => {}
            }
        }
    })
}

/// Next firing time for a cron expression, if it has one.
fn next_fire(cron_expr: &str) -> Result<Option<DateTime<Utc>>, SchedulerError> {
    let schedule = cron::Schedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron {
        expr: cron_expr.to_string(),
        reason: e.to_string(),
    })?;
    Ok(schedule.upcoming(Utc).next())
}
