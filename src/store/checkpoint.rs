//! Checkpoint persistence
//!
//! The checkpoint is a single JSON document, `{"time": <epoch-millis>,
//! "failedTickets": [...]}`, rewritten after every successful cycle. Older
//! installs kept a flat text file (epoch millis on the first line, one ticket
//! key per following line); it is converted the first time it is read.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::timeframe::truncate_to_millis;
use crate::error::{Result, WardenError};

/// How far back the first cycle looks when there is no usable checkpoint
pub const DEFAULT_LOOKBACK: TimeDelta = TimeDelta::minutes(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub failed_tickets: BTreeSet<String>,
}

impl Checkpoint {
    pub fn new(time: DateTime<Utc>, failed_tickets: BTreeSet<String>) -> Self {
        Self {
            time: truncate_to_millis(time),
            failed_tickets,
        }
    }

    /// `now - DEFAULT_LOOKBACK`, nothing to retry.
    pub fn default_window(now: DateTime<Utc>) -> Self {
        Self::new(now - DEFAULT_LOOKBACK, BTreeSet::new())
    }

    /// Parse the legacy flat format.
    pub fn from_legacy(content: &str) -> Result<Self> {
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        let first = lines
            .next()
            .ok_or_else(|| WardenError::Checkpoint("empty legacy checkpoint".to_string()))?;
        let millis: i64 = first
            .parse()
            .map_err(|_| WardenError::Checkpoint(format!("bad legacy timestamp: {}", first)))?;
        let time = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| WardenError::Checkpoint(format!("legacy timestamp out of range: {}", millis)))?;
        Ok(Self::new(time, lines.map(str::to_string).collect()))
    }
}

pub struct CheckpointStore {
    path: PathBuf,
    legacy_path: PathBuf,
}

impl CheckpointStore {
    /// Store at `path`. The legacy file is looked for next to it, with a `.txt` extension.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let legacy_path = path.with_extension("txt");
        Self { path, legacy_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint. Never fails: anything unreadable yields the default window.
    pub fn load(&self) -> Checkpoint {
        match self.try_load() {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                log::info!("No checkpoint at {}, starting from the default window", self.path.display());
                Checkpoint::default_window(Utc::now())
            }
            Err(e) => {
                log::warn!("Unusable checkpoint at {}: {}; using the default window", self.path.display(), e);
                Checkpoint::default_window(Utc::now())
            }
        }
    }

    fn try_load(&self) -> Result<Option<Checkpoint>> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            return match serde_json::from_str::<Checkpoint>(&content) {
                Ok(checkpoint) => Ok(Some(checkpoint)),
                Err(json_error) => match Checkpoint::from_legacy(&content) {
                    Ok(checkpoint) => {
                        log::info!("Converting legacy checkpoint in {}", self.path.display());
                        self.save(&checkpoint)?;
                        Ok(Some(checkpoint))
                    }
                    Err(_) => Err(json_error.into()),
                },
            };
        }

        if self.legacy_path.exists() {
            let content = fs::read_to_string(&self.legacy_path)?;
            let checkpoint = Checkpoint::from_legacy(&content)?;
            log::info!(
                "Migrating legacy checkpoint {} to {}",
                self.legacy_path.display(),
                self.path.display()
            );
            self.save(&checkpoint)?;
            if let Err(e) = fs::remove_file(&self.legacy_path) {
                log::warn!("Failed to remove legacy checkpoint {}: {}", self.legacy_path.display(), e);
            }
            return Ok(Some(checkpoint));
        }

        Ok(None)
    }

    /// Write the checkpoint, replacing the previous one atomically.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(checkpoint)?)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!(
            "Checkpoint saved: {} ({} failed tickets)",
            checkpoint.time.timestamp_millis(),
            checkpoint.failed_tickets.len()
        );
        Ok(())
    }

    /// Overwrite with the default window and return it.
    pub fn reset(&self) -> Result<Checkpoint> {
        let checkpoint = Checkpoint::default_window(Utc::now());
        self.save(&checkpoint)?;
        Ok(checkpoint)
    }
}
