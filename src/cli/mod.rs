//! Command-line interface for marketfeed.
//!
//! Provides commands for running one cycle now, running the hourly
//! scheduler, inspecting the run log, and showing configuration.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fs2::FileExt;

use crate::adapters::SqliteRunLog;
use crate::config::{self, ResolvedConfig};
use crate::core::{CycleTrigger, Firing, Orchestrator};
use crate::domain::CycleState;

/// marketfeed - Scheduled market-data acquisition pipeline
#[derive(Parser, Debug)]
#[command(name = "marketfeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one acquisition cycle now
    Run {
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run cycles on the configured cadence until interrupted
    Schedule,

    /// List recent run-log records
    Runs {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?;

        match self.command {
            Commands::Run { json } => run_once(config, json).await,
            Commands::Schedule => schedule(config).await,
            Commands::Runs { limit } => list_runs(config, limit).await,
            Commands::Config => show_config(config),
        }
    }
}

fn build_trigger(config: &ResolvedConfig) -> Result<CycleTrigger> {
    let orchestrator = Orchestrator::from_config(config)?;
    Ok(CycleTrigger::new(
        Arc::new(orchestrator),
        config.retry.clone(),
        config.cadence,
    ))
}

/// Fire the trigger once and report what happened
async fn run_once(config: &ResolvedConfig, json: bool) -> Result<()> {
    let trigger = build_trigger(config)?;

    match trigger.fire().await {
        Firing::Completed { outcome, attempts } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Cycle: {}", outcome.cycle_id);
                println!("Date: {}", outcome.date);
                println!("Status: {}", outcome.status());
                println!("Attempts: {}", attempts);
                for artifact in &outcome.artifacts {
                    println!("  {} -> {} ({} bytes)", artifact.name, artifact.location, artifact.size_bytes);
                }
                println!("Run records written: {}", outcome.records_appended);
                println!("Notified: {}", outcome.notified);
            }

            if let CycleState::Failed { reason } = &outcome.state {
                eprintln!("\n[Cycle {} failed: {}]", outcome.cycle_id, reason);
                std::process::exit(1);
            }
            Ok(())
        }
        Firing::Exhausted { attempts, error } => {
            eprintln!("[Cycle gave up after {} attempt(s): {}]", attempts, error);
            std::process::exit(1);
        }
        Firing::Skipped => {
            eprintln!("[Another cycle is already running]");
            Ok(())
        }
    }
}

/// Run the scheduler loop until Ctrl-C
async fn schedule(config: &ResolvedConfig) -> Result<()> {
    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create home directory: {}", config.home.display()))?;

    let lock_path = config.scheduler_lock_path();
    let lock_file = acquire_scheduler_lock(&lock_path)?;

    let trigger = build_trigger(config)?;
    eprintln!(
        "Scheduler started (every {}s, retry {} x {}ms). Press Ctrl-C to stop.",
        trigger.cadence().interval().as_secs(),
        config.retry.max_attempts,
        config.retry.backoff_delay_ms
    );

    trigger
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    lock_file
        .unlock()
        .with_context(|| format!("Failed to release lock file: {}", lock_path.display()))?;
    Ok(())
}

/// Take the exclusive scheduler lock; held until the file is unlocked or dropped
pub fn acquire_scheduler_lock(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("Another scheduler already holds {}", path.display()))?;
    Ok(file)
}

/// List recent run-log records
async fn list_runs(config: &ResolvedConfig, limit: usize) -> Result<()> {
    if !config.run_log_path.exists() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    let run_log = SqliteRunLog::open(&config.run_log_path)?;
    let records = run_log.recent(limit).await?;

    if records.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!("{:<12} {:<8} {:<38} LOCATION / REASON", "DATE", "STATUS", "CYCLE");
    println!("{}", "-".repeat(90));

    for record in records {
        println!(
            "{:<12} {:<8} {:<38} {}",
            record.date, record.status, record.cycle_id, record.location_or_reason
        );
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("marketfeed Configuration");
    println!("========================\n");

    if let Some(ref path) = config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: (none found, using defaults)");
    }

    println!("\nHome:      {}", config.home.display());
    println!("Provider:  {} (symbol {})", config.provider.base_url, config.provider.symbol);
    println!("API token: {}", config.masked_token());
    println!("Objects:   {}/{}", config.storage_root.display(), config.bucket);
    println!("Run log:   {}", config.run_log_path.display());
    println!("Notify:    {}", serde_json::to_string(&config.notify)?);
    println!("Topic:     {}", config.topic);
    println!(
        "Retry:     {} attempts, {}ms apart",
        config.retry.max_attempts, config.retry.backoff_delay_ms
    );
    println!("Cadence:   every {}s", config.cadence.interval().as_secs());

    println!("\nEnvironment overrides:");
    for var in ["MARKETFEED_HOME", "MARKETFEED_API_TOKEN", "MARKETFEED_BASE_URL"] {
        let state = if std::env::var(var).is_ok() { "(set)" } else { "(not set)" };
        println!("  {}: {}", var, state);
    }

    Ok(())
}
