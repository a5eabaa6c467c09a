//! Poll loop - the daemon's main loop
//!
//! Each cycle:
//! - Computes the window from the checkpoint
//! - Runs every registry over it, re-querying last cycle's failed tickets
//! - On success, saves the new checkpoint and sleeps the minimum interval
//! - On failure, leaves the checkpoint alone and sleeps whatever the relog decided

use std::time::Duration;

use crate::connection::ConnectionManager;
use crate::domain::ExecutionTimeframe;
use crate::error::Result;
use crate::executor::{ExecutionResult, Executor};
use crate::store::{Checkpoint, CheckpointStore};

/// What one cycle did and how long to wait before the next
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timeframe: ExecutionTimeframe,
    pub result: ExecutionResult,
    pub sleep: Duration,
}

/// Counters since start
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub successful: u64,
    pub failed: u64,
}

impl CycleStats {
    pub fn record(&mut self, successful: bool) {
        self.cycles += 1;
        if successful {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub struct PollLoop {
    connection: ConnectionManager,
    executor: Executor,
    store: CheckpointStore,
    checkpoint: Checkpoint,
    min_interval: Duration,
    stats: CycleStats,
}

impl PollLoop {
    /// Reads the checkpoint once; it is only written back after successful cycles.
    pub fn new(connection: ConnectionManager, executor: Executor, store: CheckpointStore, min_interval: Duration) -> Self {
        let checkpoint = store.load();
        log::info!(
            "Starting from checkpoint {} with {} failed tickets",
            checkpoint.time,
            checkpoint.failed_tickets.len()
        );
        Self {
            connection,
            executor,
            store,
            checkpoint,
            min_interval,
            stats: CycleStats::default(),
        }
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.connection.connect().await.map(|_| ())
    }

    /// Run one cycle. Requires an established connection.
    ///
    /// Only a configuration fault is returned as `Err`; everything else is
    /// reported through `CycleReport::result`.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let timeframe = ExecutionTimeframe::from_checkpoint_time(self.checkpoint.time);
        log::debug!(
            "Cycle window {} .. {} (open-ended: {})",
            timeframe.last_run_time,
            timeframe.current_run_time,
            timeframe.open_ended
        );

        let client = self.connection.client()?;
        let result = self
            .executor
            .execute(client.as_ref(), &timeframe, &self.checkpoint.failed_tickets)
            .await;
        self.stats.record(result.successful);

        let sleep = if result.successful {
            let next = Checkpoint::new(timeframe.current_run_time, result.failed_tickets.clone());
            if let Err(e) = self.store.save(&next) {
                log::error!("Failed to save checkpoint to {}: {}", self.store.path().display(), e);
            }
            self.checkpoint = next;
            self.connection.notify_of_successful_connection();
            self.min_interval
        } else {
            self.connection.try_relog().await?.sleep()
        };

        Ok(CycleReport {
            timeframe,
            result,
            sleep,
        })
    }

    /// Connect, then cycle forever. Returns only on a configuration fault.
    pub async fn run(&mut self) -> Result<()> {
        self.connect().await?;
        loop {
            let report = self.run_cycle().await?;
            log::info!(
                "Cycle {} {} ({} failed tickets), sleeping {:?}",
                self.stats.cycles,
                if report.result.successful { "succeeded" } else { "failed" },
                report.result.failed_tickets.len(),
                report.sleep
            );
            tokio::time::sleep(report.sleep).await;
        }
    }
}
