use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::{CheckpointCommands, Commands};
use ticketwarden::config::Config;
use ticketwarden::connection::{ConnectionManager, RelogConfig};
use ticketwarden::daemon::PollLoop;
use ticketwarden::executor::Executor;
use ticketwarden::modules::build_registries;
use ticketwarden::store::CheckpointStore;
use ticketwarden::tracker::{JiraConfig, JiraConnector};

fn setup_logging(default_level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ticketwarden")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ticketwarden.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_poll_loop(config: &Config) -> Result<PollLoop> {
    let jira = JiraConfig::from_tracker_config(&config.tracker).context("Invalid tracker configuration")?;
    let connection = ConnectionManager::new(
        Arc::new(JiraConnector::new(jira)),
        RelogConfig::new(config.min_cycle_interval()),
    );
    let executor = Executor::new(build_registries(config));
    let store = CheckpointStore::new(&config.checkpoint_path);
    Ok(PollLoop::new(connection, executor, store, config.min_cycle_interval()))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Run) => handle_run_command(config).await,
        Some(Commands::Once) => handle_once_command(config).await,
        Some(Commands::Checkpoint { command }) => handle_checkpoint_command(command, config),
    }
}

async fn handle_run_command(config: &Config) -> Result<()> {
    println!("{}", "Starting poll loop...".cyan());
    let mut poll = build_poll_loop(config)?;

    tokio::select! {
        result = poll.run() => result.context("Poll loop stopped"),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            println!("{}", "Stopped".yellow());
            Ok(())
        }
    }
}

async fn handle_once_command(config: &Config) -> Result<()> {
    let mut poll = build_poll_loop(config)?;
    poll.connect().await.context("Failed to connect to tracker")?;
    let report = poll.run_cycle().await.context("Cycle failed")?;

    println!(
        "Window: {} .. {}{}",
        report.timeframe.last_run_time,
        report.timeframe.current_run_time,
        if report.timeframe.open_ended { " (open-ended)" } else { "" }
    );
    for key in &report.result.failed_tickets {
        println!("  {} {}", "failed".red(), key);
    }

    if report.result.successful {
        println!("{}", "Cycle succeeded".green());
        Ok(())
    } else {
        eyre::bail!("Cycle aborted; checkpoint not advanced")
    }
}

fn handle_checkpoint_command(command: &CheckpointCommands, config: &Config) -> Result<()> {
    let store = CheckpointStore::new(&config.checkpoint_path);
    let checkpoint = match command {
        CheckpointCommands::Show => store.load(),
        CheckpointCommands::Reset => {
            let checkpoint = store.reset().context("Failed to reset checkpoint")?;
            println!("{}", "Checkpoint reset".green());
            checkpoint
        }
    };

    println!("Path:  {}", store.path().display());
    println!("Time:  {} ({})", checkpoint.time, checkpoint.time.timestamp_millis());
    if checkpoint.failed_tickets.is_empty() {
        println!("Failed tickets: {}", "none".green());
    } else {
        println!("Failed tickets:");
        for key in &checkpoint.failed_tickets {
            println!("  {}", key.red());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    let level = if cli.is_verbose() {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    setup_logging(level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
