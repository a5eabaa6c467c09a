//! Connection manager - authenticated client handle and relog backoff
//!
//! The manager owns the only client handle. After a failed cycle the daemon
//! asks it to relog; the manager decides whether a relog is worth trying and
//! how long the daemon should sleep afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, WardenError};
use crate::tracker::{Connector, TrackerClient};

/// Idle time after which a failed cycle triggers a relog
pub const MAX_IDLE: Duration = Duration::from_secs(60);

/// Sleep after a failed cycle when the connection was recently fine
pub const NO_RELOG_BACKOFF: Duration = Duration::from_secs(40);

/// Sleep after a relog attempt failed
pub const FAILED_RELOG_BACKOFF: Duration = Duration::from_secs(300);

/// Backoff timings. Every sleep is floored to `min_interval`.
#[derive(Debug, Clone)]
pub struct RelogConfig {
    pub max_idle: Duration,
    pub no_relog_backoff: Duration,
    pub failed_relog_backoff: Duration,
    pub min_interval: Duration,
}

impl RelogConfig {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            max_idle: MAX_IDLE,
            no_relog_backoff: NO_RELOG_BACKOFF,
            failed_relog_backoff: FAILED_RELOG_BACKOFF,
            min_interval,
        }
    }
}

/// What `try_relog` did, and how long to sleep afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelogOutcome {
    SuccessfulRelog(Duration),
    UnsuccessfulRelog(Duration),
    NoRelogAttempted(Duration),
}

impl RelogOutcome {
    pub fn sleep(&self) -> Duration {
        match self {
            RelogOutcome::SuccessfulRelog(d) | RelogOutcome::UnsuccessfulRelog(d) | RelogOutcome::NoRelogAttempted(d) => *d,
        }
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: RelogConfig,
    client: Option<Arc<dyn TrackerClient>>,
    last_successful_connection: Option<Instant>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: RelogConfig) -> Self {
        Self {
            connector,
            config,
            client: None,
            last_successful_connection: None,
        }
    }

    /// The current client handle
    pub fn client(&self) -> Result<Arc<dyn TrackerClient>> {
        self.client.clone().ok_or(WardenError::NotConnected)
    }

    pub fn last_successful_connection(&self) -> Option<Instant> {
        self.last_successful_connection
    }

    /// Authenticate once. Success replaces the client and resets the idle timer.
    pub async fn establish_connection(&mut self) -> Result<Arc<dyn TrackerClient>> {
        let client = self.connector.connect().await?;
        self.client = Some(client.clone());
        self.last_successful_connection = Some(Instant::now());
        log::info!("Connected to tracker");
        Ok(client)
    }

    /// Called after every successful cycle.
    pub fn notify_of_successful_connection(&mut self) {
        self.last_successful_connection = Some(Instant::now());
    }

    /// Decide whether to relog after a failed cycle, and for how long to sleep.
    ///
    /// Only a configuration fault escapes as `Err`.
    pub async fn try_relog(&mut self) -> Result<RelogOutcome> {
        self.try_relog_at(Instant::now()).await
    }

    async fn try_relog_at(&mut self, now: Instant) -> Result<RelogOutcome> {
        let floor = self.config.min_interval;
        let idle = self.last_successful_connection.map(|t| now.saturating_duration_since(t));

        if idle.is_some_and(|idle| idle <= self.config.max_idle) {
            let sleep = self.config.no_relog_backoff.max(floor);
            tracing::warn!(
                idle_secs = idle.map(|d| d.as_secs()).unwrap_or_default(),
                sleep_secs = sleep.as_secs(),
                "Cycle failed on a recent connection, not relogging"
            );
            return Ok(RelogOutcome::NoRelogAttempted(sleep));
        }

        match self.establish_connection().await {
            Ok(_) => {
                tracing::info!(sleep_secs = floor.as_secs(), "Relogged into tracker");
                Ok(RelogOutcome::SuccessfulRelog(floor))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let sleep = self.config.failed_relog_backoff.max(floor);
                tracing::warn!(
                    idle_secs = idle.map(|d| d.as_secs()),
                    sleep_secs = sleep.as_secs(),
                    error = %e,
                    "Relog failed, backing off"
                );
                Ok(RelogOutcome::UnsuccessfulRelog(sleep))
            }
        }
    }

    /// Startup connection. Transient faults are retried with backoff until a
    /// client is established; configuration faults are returned.
    pub async fn connect(&mut self) -> Result<Arc<dyn TrackerClient>> {
        match self.establish_connection().await {
            Ok(client) => return Ok(client),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::warn!("Initial connection failed: {}", e),
        }

        loop {
            let outcome = self.try_relog().await?;
            if let RelogOutcome::SuccessfulRelog(_) = outcome {
                return self.client();
            }
            tokio::time::sleep(outcome.sleep()).await;
        }
    }
}
