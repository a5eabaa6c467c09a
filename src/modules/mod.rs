//! Built-in moderation modules and the registries they run in

pub mod duplicate_message;
pub mod empty;
pub mod future_version;
pub mod transfer_versions;
pub mod update_linked;

use chrono::TimeDelta;

pub use duplicate_message::DuplicateMessageModule;
pub use empty::EmptyModule;
pub use future_version::FutureVersionModule;
pub use transfer_versions::TransferVersionsModule;
pub use update_linked::UpdateLinkedModule;

use crate::config::{Config, ModuleConfig};
use crate::domain::ticket::DUPLICATE_RESOLUTION;
use crate::domain::{Link, Ticket};
use crate::registry::{ModuleRegistry, Strategy, UNRESOLVED};

/// Default delay for the delayed registry, in minutes
pub const DEFAULT_DELAY_MINUTES: u64 = 5;

/// Default refresh interval for the lazy registry, in minutes
pub const DEFAULT_REFRESH_MINUTES: u64 = 60;

/// Module config with a resolution filter filled in when the file leaves it unset.
fn with_resolutions(mut config: ModuleConfig, resolutions: &[&str]) -> ModuleConfig {
    if config.resolution_filter.is_none() {
        config.resolution_filter = Some(resolutions.iter().map(|r| r.to_string()).collect());
    }
    config
}

fn minutes(value: Option<u64>, default: u64) -> TimeDelta {
    TimeDelta::minutes(value.unwrap_or(default).max(1) as i64)
}

/// The ticket a duplicate points at, if any.
pub(crate) fn duplicate_parent(ticket: &Ticket) -> Option<&Link> {
    ticket.outward_links(crate::domain::ticket::DUPLICATE_LINK).next()
}

/// Every built-in module, grouped by strategy.
pub fn build_registries(config: &Config) -> Vec<ModuleRegistry> {
    let mut immediate = ModuleRegistry::new("immediate", Strategy::Immediate, &config.debug);
    immediate.register(
        empty::NAME,
        with_resolutions(config.module(empty::NAME), &[UNRESOLVED]),
        EmptyModule,
    );
    immediate.register(
        future_version::NAME,
        with_resolutions(config.module(future_version::NAME), &[UNRESOLVED]),
        FutureVersionModule,
    );
    immediate.register(
        transfer_versions::NAME,
        with_resolutions(config.module(transfer_versions::NAME), &[DUPLICATE_RESOLUTION]),
        TransferVersionsModule,
    );

    let duplicate_config = config.module(duplicate_message::NAME);
    let delay = minutes(duplicate_config.delay_minutes, DEFAULT_DELAY_MINUTES);
    let mut delayed = ModuleRegistry::new(format!("delayed-{}m", delay.num_minutes()), Strategy::Delayed(delay), &config.debug);
    delayed.register(
        duplicate_message::NAME,
        with_resolutions(duplicate_config, &[DUPLICATE_RESOLUTION]),
        DuplicateMessageModule,
    );

    let linked_config = config.module(update_linked::NAME);
    let interval = minutes(linked_config.refresh_minutes, DEFAULT_REFRESH_MINUTES);
    let mut lazy = ModuleRegistry::new(format!("lazy-{}m", interval.num_minutes()), Strategy::Lazy(interval), &config.debug);
    lazy.register(update_linked::NAME, linked_config, UpdateLinkedModule);

    vec![immediate, delayed, lazy]
}
