//! Execution timeframe - the window of ticket updates one cycle covers
//!
//! The window starts at the last checkpoint and ends either now (open-ended)
//! or at most `MAX_CATCH_UP` after the checkpoint, so that after a long outage
//! the checkpoint still advances in bounded steps.

use chrono::{DateTime, TimeDelta, Utc};

/// Longest window a single cycle will cover
pub const MAX_CATCH_UP: TimeDelta = TimeDelta::minutes(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeframe {
    pub last_run_time: DateTime<Utc>,
    pub current_run_time: DateTime<Utc>,
    /// True when `current_run_time` is "now" rather than the catch-up cap
    pub open_ended: bool,
}

/// Drop sub-millisecond precision so the window matches what the tracker can compare against.
pub fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

impl ExecutionTimeframe {
    /// Compute the window for a cycle starting from `checkpoint_time`.
    pub fn compute(checkpoint_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let now = truncate_to_millis(now);
        // A checkpoint from the future (clock skew) is treated as "now".
        let last_run_time = checkpoint_time.min(now);
        let capped = last_run_time + MAX_CATCH_UP;
        let open_ended = now < capped;

        Self {
            last_run_time,
            current_run_time: if open_ended { now } else { capped },
            open_ended,
        }
    }

    /// Compute the window against the wall clock.
    pub fn from_checkpoint_time(checkpoint_time: DateTime<Utc>) -> Self {
        Self::compute(checkpoint_time, Utc::now())
    }

    /// Whether `t` falls inside the window. An open-ended window has no upper bound.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t > self.last_run_time && (self.open_ended || t <= self.current_run_time)
    }

    /// Same end, earlier start. Used by lazily refreshed registries.
    pub fn widened_to(&self, start: DateTime<Utc>) -> Self {
        Self {
            last_run_time: start.min(self.current_run_time),
            ..*self
        }
    }

    /// `updated > last` with `AND updated <= current` only when the window is closed.
    pub fn updated_since_jql(&self) -> String {
        let lower = format!("updated > {}", self.last_run_time.timestamp_millis());
        if self.open_ended {
            lower
        } else {
            format!("{} AND updated <= {}", lower, self.current_run_time.timestamp_millis())
        }
    }

    /// Both bounds shifted `delay` into the past. Always closed.
    pub fn delayed_jql(&self, delay: TimeDelta) -> String {
        format!(
            "updated > {} AND updated <= {}",
            (self.last_run_time - delay).timestamp_millis(),
            (self.current_run_time - delay).timestamp_millis()
        )
    }
}
