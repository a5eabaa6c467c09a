//! Scheduling strategy shared by every module in a registry

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::ExecutionTimeframe;

use super::entry::WindowQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Tickets updated inside the cycle window
    Immediate,
    /// Tickets updated inside the cycle window shifted this far into the past
    Delayed(TimeDelta),
    /// At most once per interval, over everything updated since the previous pass
    Lazy(TimeDelta),
}

impl Strategy {
    /// The window a registry with this strategy covers this cycle, or None to skip it.
    pub fn timeframe(&self, cycle: &ExecutionTimeframe, last_lazy_run: Option<DateTime<Utc>>) -> Option<ExecutionTimeframe> {
        match self {
            Strategy::Immediate | Strategy::Delayed(_) => Some(*cycle),
            Strategy::Lazy(interval) => match last_lazy_run {
                None => Some(cycle.widened_to(cycle.last_run_time - *interval)),
                Some(last) if cycle.current_run_time - last >= *interval => Some(cycle.widened_to(last)),
                Some(_) => None,
            },
        }
    }

    /// Window query builder for entries registered under this strategy.
    pub fn window_query(&self) -> WindowQuery {
        match *self {
            Strategy::Delayed(delay) => Box::new(move |tf: &ExecutionTimeframe| tf.delayed_jql(delay)),
            Strategy::Immediate | Strategy::Lazy(_) => Box::new(|tf: &ExecutionTimeframe| tf.updated_since_jql()),
        }
    }
}
