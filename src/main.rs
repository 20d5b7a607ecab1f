//! # TaskPing: notification scheduler for study task tracking
//!
//! Sends reminders, summaries and motivational messages to students over SMS.
//!
//! Usage:
//!   taskping serve                                   # Run the scheduler until Ctrl-C
//!   taskping send --user u1 --kind task_reminder --task t1
//!   taskping send --user u1 --kind motivational --field streak=3
//!   taskping send --user u1 --message "Exam moved to Friday"
//!   taskping summary --user u1                       # Send today's summary now
//!   taskping remind --user u1 --task t1 --at "2026-03-02 18:30"
//!   taskping jobs                                    # Show built-in jobs and next runs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taskping_core::TaskPingConfig;
use taskping_scheduler::{AppContext, Job, NotificationRequest};

/// How long shutdown waits for running jobs.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "taskping",
    version,
    about = "⏰ TaskPing: reminders and summaries for study tasks"
)]
struct Cli {
    /// Config file (default: ~/.taskping/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted
    Serve,
    /// Send one notification
    Send {
        #[arg(long)]
        user: String,
        /// task_created, task_updated, task_completed, task_reminder,
        /// progress_update, motivational, daily_summary or custom
        #[arg(long, required_unless_present = "message")]
        kind: Option<String>,
        #[arg(long)]
        task: Option<String>,
        /// Free text to send as a custom notification
        #[arg(long, conflicts_with_all = ["kind", "task"])]
        message: Option<String>,
        /// Extra payload field as key=value (value parsed as JSON when possible)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, serde_json::Value)>,
    },
    /// Send today's summary to one user
    Summary {
        #[arg(long)]
        user: String,
    },
    /// Schedule a one-off task reminder and wait for it to fire
    Remind {
        #[arg(long)]
        user: String,
        #[arg(long)]
        task: String,
        /// Local time, "YYYY-MM-DD HH:MM"
        #[arg(long, value_parser = parse_local_time)]
        at: chrono::DateTime<Local>,
    },
    /// List the built-in jobs and their next runs
    Jobs,
}

fn parse_field(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

fn parse_local_time(raw: &str) -> std::result::Result<chrono::DateTime<Local>, String> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").map_err(|e| e.to_string())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{raw}' does not exist in the local time zone"))
}

fn load_config(path: Option<&PathBuf>) -> Result<TaskPingConfig> {
    let mut config = match path {
        Some(path) => TaskPingConfig::load_from(path)?,
        None => TaskPingConfig::load()?,
    };
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "taskping=debug,taskping_scheduler=debug,taskping_channels=debug,taskping_store=debug"
    } else {
        "taskping=info,taskping_scheduler=info,taskping_channels=info,taskping_store=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_ref())?;
    let ctx = AppContext::from_config(&config).context("invalid configuration")?;

    match cli.command {
        Command::Serve => serve(&ctx, &config).await,
        Command::Send {
            user,
            kind,
            task,
            message,
            fields,
        } => {
            let mut fields: serde_json::Map<String, serde_json::Value> = fields.into_iter().collect();
            let kind = match message {
                Some(text) => {
                    fields.insert("text".into(), serde_json::Value::String(text));
                    "custom".to_string()
                }
                None => kind.unwrap_or_default(),
            };
            let request = NotificationRequest {
                user_id: user,
                kind,
                task_id: task,
                fields,
            };
            let result = ctx.dispatch_request(request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Summary { user } => {
            let outcome = ctx.trigger_daily_summary(&user).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.success {
                Ok(())
            } else {
                anyhow::bail!(outcome.message)
            }
        }
        Command::Remind { user, task, at } => remind(&ctx, &user, &task, at).await,
        Command::Jobs => {
            ctx.register_builtin_jobs();
            println!("{}", serde_json::to_string_pretty(&ctx.jobs())?);
            Ok(())
        }
    }
}

async fn serve(ctx: &AppContext, config: &TaskPingConfig) -> Result<()> {
    ctx.start();

    println!("⏰ TaskPing v{}", env!("CARGO_PKG_VERSION"));
    println!("   📡 Channel:  {}", config.channel.provider);
    println!("   🗄️  Store:    {}", config.store.expanded_path().display());
    println!("   🔁 Tick:     every {}s", config.scheduler.tick_secs);
    for job in ctx.jobs() {
        let next = job
            .next_run
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into());
        println!("   📅 {:<18} {:<24} next {next}", job.id, job.trigger);
    }
    println!();

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    shutdown(ctx).await;
    Ok(())
}

async fn remind(ctx: &AppContext, user: &str, task: &str, at: chrono::DateTime<Local>) -> Result<()> {
    if !ctx.schedule_reminder(user, task, at) {
        anyhow::bail!("reminder for task '{task}' could not be scheduled");
    }
    ctx.scheduler().start();
    println!("⏰ Reminder for '{task}' scheduled at {}", at.format("%Y-%m-%d %H:%M"));

    let id = Job::reminder_id(user, task);
    let registry = ctx.scheduler().registry().clone();
    let wait = async {
        while registry.contains(&id) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    };
    tokio::select! {
        _ = wait => {}
        _ = tokio::signal::ctrl_c() => println!("Interrupted"),
    }
    shutdown(ctx).await;

    for record in ctx.recent_deliveries() {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

async fn shutdown(ctx: &AppContext) {
    tracing::info!("🛑 Shutting down");
    ctx.stop();
    if tokio::time::timeout(DRAIN_TIMEOUT, ctx.drain()).await.is_err() {
        tracing::warn!("⚠️ Jobs still running after {}s, exiting anyway", DRAIN_TIMEOUT.as_secs());
    }
}
