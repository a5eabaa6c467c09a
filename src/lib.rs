//! Ticketwarden - an unattended moderation bot for a ticket tracker
//!
//! Ticketwarden polls the tracker for recently updated tickets and runs a set
//! of rule modules over them, batching the resulting edits so that each ticket
//! gets at most one update and one transition per cycle.

pub mod cache;
pub mod config;
pub mod connection;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod executor;
pub mod modules;
pub mod registry;
pub mod store;
pub mod tracker;

pub use error::{Result, WardenError};
