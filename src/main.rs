use std::sync::Arc;

use taskdeck::api::{self, AppState};
use taskdeck::config::Config;
use taskdeck::personas::PersonaCatalog;
use taskdeck::queue::WorkerBridge;
use taskdeck::scheduler::{ProcessAgent, Scheduler, spawn_timer_loop};
use taskdeck::store::{ChatStore, ReportStore, RunStore, TaskStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut config = Config::from_env();

    // A bad cron expression would leave the timer parked forever; boot on
    // the default instead.
    if let Err(e) = config.cron.parse::<cron::Schedule>() {
        eprintln!(
            "Warning: invalid TASKDECK_CRON {:?} ({}), using default",
            config.cron, e
        );
        config.cron = Config::default().cron;
    }

    eprintln!("📋 taskdeck v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data: {}", config.data_dir.display());
    eprintln!("   API: http://0.0.0.0:{}/api/tasks", config.port);
    eprintln!(
        "   Agent: {} (assignees: {})",
        config.agent_cmd,
        config.assignees.join(", ")
    );
    eprintln!(
        "   Scheduler: {} (cron {}, max {} running)",
        if config.scheduler_enabled { "enabled" } else { "disabled" },
        config.cron,
        config.max_running
    );

    // ── Stores ──────────────────────────────────────────────────────────
    let tasks = Arc::new(TaskStore::open(config.data_dir.join("tasks")).await?);
    let runs = Arc::new(RunStore::open(config.data_dir.join("runs")).await?);
    let chats = Arc::new(ChatStore::open(config.data_dir.join("chats")).await?);
    let reports = Arc::new(ReportStore::open(config.data_dir.join("reports")).await?);

    // ── Personas ────────────────────────────────────────────────────────
    let personas = Arc::new(PersonaCatalog::load(&config.personas_dir).await);
    eprintln!(
        "   Personas: {}",
        personas
            .all()
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // ── Scheduler ───────────────────────────────────────────────────────
    let agent = Arc::new(ProcessAgent::new(
        config.agent_cmd.clone(),
        config.agent_args.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&tasks),
        Arc::clone(&runs),
        Arc::clone(&personas),
        agent,
        &config,
    ));
    let _timer_handle = spawn_timer_loop(Arc::clone(&scheduler));

    // ── Worker bridge ───────────────────────────────────────────────────
    let worker = match &config.worker_cmd {
        Some(command) => {
            match WorkerBridge::start(command, config.worker_delay, config.worker_timeout) {
                Ok(bridge) => {
                    eprintln!(
                        "   Worker: {} (delay {:?}, timeout {:?})",
                        command, config.worker_delay, config.worker_timeout
                    );
                    Some(Arc::new(bridge))
                }
                Err(e) => {
                    eprintln!("   Warning: could not start worker {:?}: {}", command, e);
                    None
                }
            }
        }
        None => {
            eprintln!("   Worker: none configured");
            None
        }
    };
    eprintln!();

    let state = AppState {
        tasks,
        runs,
        chats,
        reports,
        personas,
        scheduler,
        worker,
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
