//! CLI module for ticketwarden - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the poll loop
//! and managing the checkpoint.

pub mod commands;

pub use commands::Cli;
