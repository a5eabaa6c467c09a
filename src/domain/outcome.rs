//! Module execution outcome types.

use std::fmt;

use crate::error::WardenError;

/// Outcome of a module that ran to completion on a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOutcome {
    /// The module changed (or queued changes for) the ticket
    Success,
    /// The ticket did not need anything from this module
    OperationNotNeeded,
}

/// A module could not finish its work on a ticket. The ticket is retried next cycle.
#[derive(Debug)]
pub struct ModuleFailure {
    pub errors: Vec<WardenError>,
}

impl ModuleFailure {
    pub fn new(errors: Vec<WardenError>) -> Self {
        Self { errors }
    }

    /// Failure carrying a single message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::new(vec![WardenError::Module(msg.into())])
    }
}

impl From<WardenError> for ModuleFailure {
    fn from(err: WardenError) -> Self {
        Self::new(vec![err])
    }
}

impl fmt::Display for ModuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// What a module handler returns.
pub type ModuleResult = std::result::Result<ModuleOutcome, ModuleFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_outcome_variants() {
        assert_eq!(ModuleOutcome::Success, ModuleOutcome::Success);
        assert_ne!(ModuleOutcome::Success, ModuleOutcome::OperationNotNeeded);
    }

    #[test]
    fn test_failure_from_error() {
        let failure: ModuleFailure = WardenError::NotConnected.into();
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.to_string(), "Not connected to tracker");
    }

    #[test]
    fn test_failure_display_joins_errors() {
        let failure = ModuleFailure::new(vec![
            WardenError::Module("first".into()),
            WardenError::Module("second".into()),
        ]);
        assert_eq!(failure.to_string(), "Module error: first; Module error: second");
    }
}
