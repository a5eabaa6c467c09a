//! Mutation batch cache - one pending field edit and transition per ticket per cycle
//!
//! The first module that wants to change a ticket creates its PendingMutation;
//! every later module writes into the same one. `apply_changes` then issues at
//! most one field update and one transition request per ticket.
//!
//! A mutation remembers which ticket's module run created it. Modules sometimes
//! write to a linked ticket (a duplicate's parent, say), and a failed write is
//! retried by re-processing the ticket that triggered it.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::error::WardenError;
use crate::tracker::{FieldUpdate, TrackerClient};

/// Transition used when a module sets transition fields without naming one
pub const DEFAULT_TRANSITION: &str = "Resolve Issue";

/// Accumulated changes for one ticket
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub ticket_key: String,
    /// Ticket whose module invocation created this mutation
    pub triggered_by: String,
    pub edits: FieldUpdate,
    pub transition_fields: FieldUpdate,
    pub transition: String,
    transition_requested: bool,
}

impl PendingMutation {
    pub fn new(ticket_key: impl Into<String>, triggered_by: impl Into<String>) -> Self {
        Self {
            ticket_key: ticket_key.into(),
            triggered_by: triggered_by.into(),
            edits: FieldUpdate::new(),
            transition_fields: FieldUpdate::new(),
            transition: DEFAULT_TRANSITION.to_string(),
            transition_requested: false,
        }
    }

    pub fn set_field(&mut self, field: impl Into<String>, value: Value) {
        self.edits.set(field, value);
    }

    pub fn add_to_field(&mut self, field: impl Into<String>, value: Value) {
        self.edits.add(field, value);
    }

    pub fn remove_from_field(&mut self, field: impl Into<String>, value: Value) {
        self.edits.remove(field, value);
    }

    /// Request a transition. The last label written wins.
    pub fn request_transition(&mut self, transition: impl Into<String>) {
        self.transition = transition.into();
        self.transition_requested = true;
    }

    /// Resolve with the default transition and the given resolution.
    pub fn resolve_as(&mut self, resolution: &str) {
        self.transition_fields.set("resolution", json!({ "name": resolution }));
        self.request_transition(DEFAULT_TRANSITION);
    }

    pub fn has_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn has_transition(&self) -> bool {
        self.transition_requested || !self.transition_fields.is_empty()
    }
}

/// A write that failed during `apply_changes`
#[derive(Debug)]
pub struct MutationFailure {
    pub ticket_key: String,
    pub triggered_by: String,
    pub error: WardenError,
}

#[derive(Debug, Default)]
pub struct MutationBatchCache {
    pending: BTreeMap<String, PendingMutation>,
}

impl MutationBatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pending mutation for `ticket_key`, created on first use.
    /// `triggered_by` is only recorded by the call that creates it.
    pub fn entry(&mut self, ticket_key: &str, triggered_by: &str) -> &mut PendingMutation {
        self.pending
            .entry(ticket_key.to_string())
            .or_insert_with(|| PendingMutation::new(ticket_key, triggered_by))
    }

    pub fn get(&self, ticket_key: &str) -> Option<&PendingMutation> {
        self.pending.get(ticket_key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Send every pending mutation and empty the cache.
    pub async fn apply_changes(&mut self, client: &dyn TrackerClient) -> Vec<MutationFailure> {
        let mut failures = Vec::new();

        for (_, mutation) in std::mem::take(&mut self.pending) {
            if mutation.has_edits() {
                log::debug!("Updating fields on {}", mutation.ticket_key);
                if let Err(error) = client.update_fields(&mutation.ticket_key, &mutation.edits).await {
                    failures.push(MutationFailure {
                        ticket_key: mutation.ticket_key.clone(),
                        triggered_by: mutation.triggered_by.clone(),
                        error,
                    });
                }
            }

            if mutation.has_transition() {
                log::debug!("Transitioning {} via {:?}", mutation.ticket_key, mutation.transition);
                if let Err(error) = client
                    .transition(&mutation.ticket_key, &mutation.transition, &mutation.transition_fields)
                    .await
                {
                    failures.push(MutationFailure {
                        ticket_key: mutation.ticket_key.clone(),
                        triggered_by: mutation.triggered_by.clone(),
                        error,
                    });
                }
            }
        }

        failures
    }
}
