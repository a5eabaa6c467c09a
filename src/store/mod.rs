//! Persistent state between process restarts

pub mod checkpoint;

pub use checkpoint::{Checkpoint, CheckpointStore, DEFAULT_LOOKBACK};
