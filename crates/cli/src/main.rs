//! tasktide CLI - deadline-aware task scheduling.

mod config;
mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tasktide_core::{RecordId, RecordStatus, TaskRecord, Time};
use tasktide_storage::{JsonStorage, Storage};
use tasktide_work::{BasicScheduleManager, ScheduleManager, TaskPatch, TaskSpec};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{parse_time, AppConfig};

#[derive(Parser)]
#[command(name = "tasktide")]
#[command(about = "Deadline-aware task scheduler", long_about = None)]
struct Cli {
    /// Config file (defaults to ./tasktide.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Schedule from this time instead of now
    #[arg(long, global = true)]
    at: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print records as calendar JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task and reschedule
    Add {
        /// Task title
        name: String,
        /// Priority (1-10)
        #[arg(long, default_value = "5")]
        priority: u8,
        /// Deadline
        #[arg(long)]
        due: String,
        /// Hours of work
        #[arg(long)]
        duration: f64,
        /// Notes
        #[arg(long)]
        details: Option<String>,
    },
    /// List tasks
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show task details
    Show {
        /// Task ID
        id: RecordId,
    },
    /// Edit a task and reschedule
    Update {
        /// Task ID
        id: RecordId,
        /// New title
        #[arg(long)]
        name: Option<String>,
        /// New priority
        #[arg(long)]
        priority: Option<u8>,
        /// New deadline
        #[arg(long)]
        due: Option<String>,
        /// New duration in hours
        #[arg(long)]
        duration: Option<f64>,
        /// New notes
        #[arg(long)]
        details: Option<String>,
    },
    /// Remove a task
    Remove {
        /// Task ID
        id: RecordId,
    },
    /// Rerun the schedule
    Schedule,
    /// Simulate a task list file without touching storage
    Simulate {
        /// TOML task list
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut app = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        app.data_dir = dir;
    }
    let clock = cli.at.as_deref().map(parse_time).transpose()?;

    match cli.command {
        Commands::Simulate { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Could not read {}", file.display()))?;
            let outcome = simulate::simulate(&contents, &app.scheduler, clock)?;

            println!("Completed ({})", outcome.completed.len());
            for task in &outcome.completed {
                println!("  {} | {} -> {} | {}", task.id, task.arrival_time, task.due_date, task.name);
            }
            println!("Failed ({})", outcome.failed.len());
            for task in &outcome.failed {
                println!("  {} | due {} | {}", task.id, task.due_date, task.name);
            }
        }
        Commands::Add { name, priority, due, duration, details } => {
            let manager = open_manager(&app, clock).await?;
            let mut spec = TaskSpec::new(name, priority, parse_time(&due)?, duration);
            spec.details = details;
            let records = manager.create_task(spec).await?;
            print_records(&records, cli.json)?;
        }
        Commands::List { status } => {
            let manager = open_manager(&app, clock).await?;
            let status = status.map(|s| parse_status(&s)).transpose()?;
            let records: Vec<TaskRecord> = manager
                .list_tasks()
                .await?
                .into_iter()
                .filter(|r| status.map_or(true, |s| r.status == s))
                .collect();
            print_records(&records, cli.json)?;
        }
        Commands::Show { id } => {
            let manager = open_manager(&app, clock).await?;
            let storage = manager.storage();
            let Some(record) = storage.lock().await.load_record(id).await? else {
                println!("Task not found");
                return Ok(());
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&record.to_calendar_event())?);
                return Ok(());
            }
            println!("Task: {}", record.id);
            println!("  Title: {}", record.title);
            println!("  Priority: {}", record.priority);
            println!("  Duration: {} hours", record.duration);
            println!("  Deadline: {}", record.deadline);
            println!("  Status: {}", format_status(record.status));
            println!("  Start: {}", format_slot(record.start));
            println!("  End: {}", format_slot(record.end));
            if let Some(details) = &record.details {
                println!("  Details: {}", details);
            }
            println!("  Created: {}", record.created_at);
        }
        Commands::Update { id, name, priority, due, duration, details } => {
            let manager = open_manager(&app, clock).await?;
            let patch = TaskPatch {
                title: name,
                priority,
                details,
                duration,
                deadline: due.as_deref().map(parse_time).transpose()?,
            };
            let record = manager.update_task(id, patch).await?;
            print_records(&[record], cli.json)?;
        }
        Commands::Remove { id } => {
            let manager = open_manager(&app, clock).await?;
            let outcome = manager.delete_task(id).await?;
            if outcome.was_queued {
                println!("Task deleted successfully from both the queue and storage");
            } else {
                println!("Task deleted from storage, but it was not found in the queue");
            }
        }
        Commands::Schedule => {
            let manager = open_manager(&app, clock).await?;
            let records = manager.reschedule().await?;
            info!("Rescheduled {} task(s)", records.len());
            print_records(&records, cli.json)?;
        }
    }

    Ok(())
}

async fn open_manager(app: &AppConfig, clock: Option<Time>) -> Result<BasicScheduleManager<JsonStorage>> {
    let storage = JsonStorage::new(&app.data_dir)
        .await
        .with_context(|| format!("Could not open {}", app.data_dir.display()))?;
    let manager = BasicScheduleManager::new(storage).with_config(app.scheduler.clone());
    Ok(match clock {
        Some(now) => manager.with_clock(now),
        None => manager,
    })
}

fn print_records(records: &[TaskRecord], json: bool) -> Result<()> {
    if json {
        let events: Vec<_> = records.iter().map(TaskRecord::to_calendar_event).collect();
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!("Tasks ({})", records.len());
    for record in records {
        println!(
            "  {} | {} | P{} | {} -> {} | {}",
            record.id,
            format_status(record.status),
            record.priority,
            format_slot(record.start),
            format_slot(record.end),
            record.title,
        );
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<RecordStatus> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(RecordStatus::Pending),
        "scheduled" => Ok(RecordStatus::Scheduled),
        "missed" => Ok(RecordStatus::Missed),
        "unscheduled" => Ok(RecordStatus::Unscheduled),
        other => anyhow::bail!("Unknown status '{}'", other),
    }
}

fn format_status(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Pending => "PENDING",
        RecordStatus::Scheduled => "SCHEDULED",
        RecordStatus::Missed => "MISSED",
        RecordStatus::Unscheduled => "UNSCHEDULED",
    }
}

fn format_slot(time: Option<Time>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
