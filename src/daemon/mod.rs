//! Daemon - the long-running poll loop
//!
//! The daemon owns the connection manager, the executor and the checkpoint,
//! and cycles until the process is stopped or hits a configuration fault.

pub mod poll;

pub use poll::{CycleReport, CycleStats, PollLoop};
