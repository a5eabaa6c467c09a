//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: poll the tracker forever (the default)
//! - once: run a single cycle and exit
//! - checkpoint: inspect or reset the persisted checkpoint

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ticketwarden - unattended moderation bot for a ticket tracker
#[derive(Parser, Debug)]
#[command(name = "ticketwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the tracker until stopped
    Run,

    /// Run a single cycle and exit
    Once,

    /// Checkpoint management commands
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointCommands {
    /// Print the checkpoint time and failed tickets
    Show,

    /// Rewind the checkpoint to the default window and forget failed tickets
    Reset,
}
