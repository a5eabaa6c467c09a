//! Module registries and query composition
//!
//! A registry groups modules that share a scheduling strategy. Each cycle it
//! composes one search out of every enabled entry's query plus the tickets
//! that failed last cycle, so one paginated fetch feeds all of its modules.

pub mod entry;
pub mod module;
pub mod scope;
pub mod strategy;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

pub use entry::{RegistryEntry, WindowQuery};
pub use module::{Module, ModuleContext};
pub use scope::{ModuleScope, UNRESOLVED, quote, quoted_list};
pub use strategy::Strategy;

use crate::config::{DebugConfig, ModuleConfig};
use crate::domain::ExecutionTimeframe;

#[derive(Debug)]
pub struct ModuleRegistry {
    pub name: String,
    pub strategy: Strategy,
    entries: Vec<RegistryEntry>,
    debug: DebugConfig,
    last_lazy_run: Option<DateTime<Utc>>,
    /// Tickets this registry's modules failed on in its last pass
    retries: BTreeSet<String>,
}

impl ModuleRegistry {
    pub fn new(name: impl Into<String>, strategy: Strategy, debug: &DebugConfig) -> Self {
        Self {
            name: name.into(),
            strategy,
            entries: Vec::new(),
            debug: debug.clone(),
            last_lazy_run: None,
            retries: BTreeSet::new(),
        }
    }

    /// Add a module. The debug module allow-list, when set, decides enablement on its own.
    pub fn register(&mut self, name: &str, config: ModuleConfig, module: impl Module + 'static) {
        let enabled = match &self.debug.enabled_modules {
            Some(allowed) => allowed.iter().any(|m| m == name),
            None => config.enabled,
        };
        let scope = ModuleScope::from_config(&config, self.debug.ticket_whitelist.as_ref());
        log::debug!("Registering module {} in {} (enabled: {})", name, self.name, enabled);
        self.entries.push(RegistryEntry::new(
            name,
            config,
            scope,
            enabled,
            self.strategy.window_query(),
            Box::new(module),
        ));
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn enabled_entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }

    pub fn last_lazy_run(&self) -> Option<DateTime<Utc>> {
        self.last_lazy_run
    }

    /// Window this registry covers for `cycle`, or None when it should sit this cycle out.
    pub fn effective_timeframe(&self, cycle: &ExecutionTimeframe) -> Option<ExecutionTimeframe> {
        self.strategy.timeframe(cycle, self.last_lazy_run)
    }

    /// Record a successful cycle. Only lazy registries keep the mark.
    pub fn mark_run(&mut self, cycle: &ExecutionTimeframe) {
        if let Strategy::Lazy(_) = self.strategy {
            if self.effective_timeframe(cycle).is_some() {
                self.last_lazy_run = Some(cycle.current_run_time);
            }
        }
    }

    /// Tickets still owed a retry by this registry.
    pub fn pending_retries(&self) -> &BTreeSet<String> {
        &self.retries
    }

    /// Replace the retry set with the failures of the pass that just ran.
    pub fn record_failures(&mut self, failed: BTreeSet<String>) {
        self.retries = failed;
    }

    /// `key IN (failed) OR (<entry queries>) ORDER BY updated ASC`.
    ///
    /// None when no entry is enabled; failed tickets alone never justify a search.
    pub fn full_jql(&self, timeframe: &ExecutionTimeframe, failed: &BTreeSet<String>) -> Option<String> {
        let mut queries: Vec<String> = Vec::new();
        for entry in self.enabled_entries() {
            let query = format!("({})", entry.query(timeframe));
            if !queries.contains(&query) {
                queries.push(query);
            }
        }
        if queries.is_empty() {
            return None;
        }

        let windowed = queries.join(" OR ");
        let jql = if failed.is_empty() {
            windowed
        } else {
            format!("key IN ({}) OR ({})", quoted_list(failed), windowed)
        };
        Some(format!("{} ORDER BY updated ASC", jql))
    }
}
