//! Registry entry - one module with its settings, scope and query builder

use std::fmt;

use crate::config::ModuleConfig;
use crate::domain::{ExecutionTimeframe, Ticket};

use super::module::Module;
use super::scope::ModuleScope;

/// Builds the time-window part of an entry's query
pub type WindowQuery = Box<dyn Fn(&ExecutionTimeframe) -> String + Send + Sync>;

pub struct RegistryEntry {
    pub name: String,
    pub config: ModuleConfig,
    pub scope: ModuleScope,
    pub enabled: bool,
    window: WindowQuery,
    module: Box<dyn Module>,
}

impl RegistryEntry {
    pub fn new(
        name: impl Into<String>,
        config: ModuleConfig,
        scope: ModuleScope,
        enabled: bool,
        window: WindowQuery,
        module: Box<dyn Module>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            scope,
            enabled,
            window,
            module,
        }
    }

    /// Scope clause AND window clause
    pub fn query(&self, timeframe: &ExecutionTimeframe) -> String {
        let window = (self.window)(timeframe);
        match self.scope.to_jql() {
            Some(scope) => format!("{} AND {}", scope, window),
            None => window,
        }
    }

    pub fn applies_to(&self, ticket: &Ticket) -> bool {
        self.scope.matches(ticket)
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
