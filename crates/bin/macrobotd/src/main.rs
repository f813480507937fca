//! # macrobotd — macrobot daemon
//!
//! Composition root that wires all adapters together and runs tasks.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations and the simulated devices
//! - Construct the task service and the automation engine
//! - Log every event published on the bus
//! - Turn Ctrl-C into an emergency stop
//!
//! ## Usage
//! ```text
//! macrobotd list              # print stored tasks
//! macrobotd run <task.json>   # store the task from the file and run it
//! ```
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing_subscriber::EnvFilter;

use macrobot_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteSettingsRepository, SqliteTaskRepository,
};
use macrobot_adapter_virtual::{VirtualInput, VirtualScreen};
use macrobot_app::engine::AutomationEngine;
use macrobot_app::event_bus::InProcessEventBus;
use macrobot_app::ports::{SettingsRepository, TaskRepository};
use macrobot_app::services::task_service::TaskService;
use macrobot_domain::action::Action;
use macrobot_domain::error::MacrobotError;
use macrobot_domain::geometry::Point;
use macrobot_domain::task::Task;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay scripted UI-automation tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print stored tasks
    List,
    /// Store the task defined in a JSON file and run it
    Run {
        /// Path to the task definition
        path: PathBuf,
    },
}

/// On-disk task definition. Ids and statistics are assigned on import.
#[derive(Debug, Deserialize)]
struct TaskFile {
    name: String,
    #[serde(default)]
    description: Option<String>,
    actions: Vec<Action>,
}

impl TaskFile {
    fn read(path: &Path) -> anyhow::Result<Task> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let mut builder = Task::builder().name(file.name).actions(file.actions);
        if let Some(description) = file.description {
            builder = builder.description(description);
        }
        match builder.build() {
            Ok(task) => Ok(task),
            Err(errors) => {
                for error in errors.errors() {
                    tracing::error!(%error, "invalid task");
                }
                Err(MacrobotError::from(errors))
                    .with_context(|| format!("{} is not a valid task", path.display()))
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Repositories
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let settings = SqliteSettingsRepository::new(pool);

    let mut automation = settings.get_automation_config().await?;
    if config.automation.apply(&mut automation) {
        tracing::info!("storing automation overrides from configuration");
        settings.save_automation_config(automation).await?;
    }

    match cli.command {
        Command::List => list(&TaskService::new(tasks)).await,
        Command::Run { path } => {
            let screen = VirtualScreen::default();
            for (template, [x, y]) in &config.virtual_screen.templates {
                screen.show_at(template.as_str(), Point::new(*x, *y));
            }
            run(&path, tasks, settings, screen).await
        }
    }
}

async fn list<R: TaskRepository>(service: &TaskService<R>) -> anyhow::Result<()> {
    let tasks = service.list_tasks().await?;
    if tasks.is_empty() {
        println!("no tasks stored");
    }
    for task in tasks {
        let last = match task.last_run_success {
            Some(true) => "ok",
            Some(false) => "failed",
            None => "never run",
        };
        println!(
            "{}  {:<24} {:>3} steps  {:>4} runs  {}{}",
            task.id,
            task.name,
            task.actions.len(),
            task.run_count,
            last,
            if task.enabled { "" } else { "  (disabled)" },
        );
    }
    Ok(())
}

async fn run(
    path: &Path,
    tasks: Arc<SqliteTaskRepository>,
    settings: SqliteSettingsRepository,
    screen: VirtualScreen,
) -> anyhow::Result<()> {
    let task = TaskFile::read(path)?;
    let task = TaskService::new(Arc::clone(&tasks)).save_task(task).await?;
    tracing::info!(task_id = %task.id, name = %task.name, "task stored");

    // Event bus
    let bus = Arc::new(InProcessEventBus::new(256));
    let mut events = BroadcastStream::new(bus.subscribe());
    let logger = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => tracing::info!(
                    event = %event.event_type,
                    data = %event.data,
                    "event"
                ),
                Err(err) => tracing::warn!(error = %err, "event logger fell behind"),
            }
        }
    });

    let engine = AutomationEngine::new(tasks, settings, bus, VirtualInput::default(), screen);

    let result = {
        let run = engine.start_task(task.id);
        tokio::pin!(run);
        let mut interrupted = false;
        loop {
            tokio::select! {
                result = &mut run => break result,
                signal = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    match signal {
                        Ok(()) => engine.emergency_stop().await,
                        Err(err) => tracing::warn!(error = %err, "unable to listen for ctrl-c"),
                    }
                }
            }
        }
    };

    // dropping the engine drops the last bus sender, which ends the logger
    drop(engine);
    if let Err(err) = logger.await {
        tracing::warn!(error = %err, "event logger task failed");
    }

    let outcome = result.context("run failed")?;
    println!("{}: {}", task.name, outcome.as_str());
    Ok(())
}
