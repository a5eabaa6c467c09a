//! Executor - runs one cycle over every registry
//!
//! For each registry: compose the query, fetch all pages, hand every ticket to
//! each enabled module whose scope it matches, then flush the ticket's own
//! changes and the batched field edits and transitions. A module that fails or
//! panics only marks its ticket for retry; a failed fetch aborts the cycle.
//! A registry that sits a cycle out keeps its last failures in the retry set.

pub mod apply;
pub mod pagination;

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

pub use apply::apply_ticket_changes;
pub use pagination::fetch_all;

use crate::cache::{CommentCache, MutationBatchCache, ProjectCache, QueryCache};
use crate::domain::{ExecutionTimeframe, ModuleOutcome};
use crate::error::Result;
use crate::registry::{ModuleContext, ModuleRegistry};
use crate::tracker::TrackerClient;

/// What one cycle produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// False when any registry's fetch failed
    pub successful: bool,
    /// Tickets to include in the next cycle's queries
    pub failed_tickets: BTreeSet<String>,
}

pub struct Executor {
    registries: Vec<ModuleRegistry>,
    queries: QueryCache,
    projects: ProjectCache,
    comments: CommentCache,
    mutations: MutationBatchCache,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Executor {
    pub fn new(registries: Vec<ModuleRegistry>) -> Self {
        Self::with_project_cache(registries, ProjectCache::new())
    }

    pub fn with_project_cache(registries: Vec<ModuleRegistry>, projects: ProjectCache) -> Self {
        Self {
            registries,
            queries: QueryCache::new(),
            projects,
            comments: CommentCache::new(),
            mutations: MutationBatchCache::new(),
        }
    }

    pub fn comments(&self) -> &CommentCache {
        &self.comments
    }

    /// Run one cycle. `rerun` holds the tickets that failed last cycle.
    pub async fn execute(
        &mut self,
        client: &dyn TrackerClient,
        timeframe: &ExecutionTimeframe,
        rerun: &BTreeSet<String>,
    ) -> ExecutionResult {
        let mut failed = BTreeSet::new();
        let mut successful = true;

        for index in 0..self.registries.len() {
            match self.run_registry(index, client, timeframe, rerun).await {
                Ok(Some(registry_failed)) => {
                    failed.extend(registry_failed.iter().cloned());
                    self.registries[index].record_failures(registry_failed);
                }
                Ok(None) => {
                    let registry = &self.registries[index];
                    if !registry.pending_retries().is_empty() {
                        log::debug!("Registry {} keeps {} retries", registry.name, registry.pending_retries().len());
                    }
                    failed.extend(registry.pending_retries().iter().cloned());
                }
                Err(e) => {
                    log::error!("Fetch for registry {} failed, aborting cycle: {}", self.registries[index].name, e);
                    successful = false;
                    break;
                }
            }
        }

        self.comments.flush();
        self.mutations.clear();
        self.queries.clear();

        if successful {
            for registry in &mut self.registries {
                registry.mark_run(timeframe);
            }
        }

        ExecutionResult {
            successful,
            failed_tickets: failed,
        }
    }

    /// Run one registry's pass. Returns the tickets it failed on, or None when it did not run.
    async fn run_registry(
        &mut self,
        index: usize,
        client: &dyn TrackerClient,
        cycle: &ExecutionTimeframe,
        rerun: &BTreeSet<String>,
    ) -> Result<Option<BTreeSet<String>>> {
        let Self {
            registries,
            queries,
            projects,
            comments,
            mutations,
        } = self;
        let registry = &registries[index];

        let Some(timeframe) = registry.effective_timeframe(cycle) else {
            log::debug!("Registry {} not due this cycle", registry.name);
            return Ok(None);
        };
        let Some(jql) = registry.full_jql(&timeframe, rerun) else {
            log::debug!("Registry {} has no enabled modules", registry.name);
            return Ok(None);
        };

        let mut failed = BTreeSet::new();

        let mut tickets = queries.get_or_fetch(client, &jql).await?;
        log::info!("Registry {}: {} tickets", registry.name, tickets.len());

        for ticket in tickets.iter_mut() {
            let key = ticket.key.clone();

            for entry in registry.enabled_entries() {
                if !entry.applies_to(ticket) {
                    continue;
                }

                let outcome = {
                    let mut ctx = ModuleContext::new(client, queries, projects, comments, mutations, &entry.config, &key);
                    AssertUnwindSafe(entry.module().execute(ticket, &timeframe, &mut ctx))
                        .catch_unwind()
                        .await
                };

                match outcome {
                    Ok(Ok(ModuleOutcome::Success)) => log::info!("Module {} applied to {}", entry.name, key),
                    Ok(Ok(ModuleOutcome::OperationNotNeeded)) => {}
                    Ok(Err(failure)) => {
                        failed.insert(key.clone());
                        for error in &failure.errors {
                            log::error!("Module {} failed on {}: {}", entry.name, key, error);
                        }
                    }
                    Err(payload) => {
                        failed.insert(key.clone());
                        log::error!("Module {} panicked on {}: {}", entry.name, key, panic_message(payload.as_ref()));
                    }
                }
            }

            let changed = ticket.changed_fields();
            if !changed.is_empty() {
                log::debug!("{} changed fields: {}", key, changed.join(", "));
            }

            for error in apply_ticket_changes(client, ticket, comments).await {
                failed.insert(key.clone());
                log::error!("Failed to apply changes to {}: {}", key, error);
            }
        }

        for failure in mutations.apply_changes(client).await {
            log::error!(
                "Failed to update {} (triggered by {}): {}",
                failure.ticket_key,
                failure.triggered_by,
                failure.error
            );
            failed.insert(failure.triggered_by);
        }

        queries.clear();
        Ok(Some(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use serde_json::json;

    use crate::config::{DebugConfig, ModuleConfig};
    use crate::domain::timeframe::truncate_to_millis;
    use crate::domain::{ModuleFailure, ModuleResult, Ticket};
    use crate::registry::{Module, Strategy};
    use crate::tracker::{MockTrackerClient, TrackerCall};

    /// Records every ticket it sees; panics or fails on request.
    #[derive(Clone, Default)]
    struct Probe {
        seen: Arc<Mutex<Vec<String>>>,
        panic_on: Option<String>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Module for Probe {
        async fn execute(&self, ticket: &mut Ticket, _: &ExecutionTimeframe, _: &mut ModuleContext<'_>) -> ModuleResult {
            self.seen.lock().unwrap().push(ticket.key.clone());
            if self.panic_on.as_deref() == Some(ticket.key.as_str()) {
                panic!("boom on {}", ticket.key);
            }
            if self.fail_on.as_deref() == Some(ticket.key.as_str()) {
                return Err(ModuleFailure::message("cannot handle"));
            }
            Ok(ModuleOutcome::Success)
        }
    }

    /// Comments on every ticket and resolves it through the batch cache.
    struct Commenter;

    #[async_trait]
    impl Module for Commenter {
        async fn execute(&self, ticket: &mut Ticket, _: &ExecutionTimeframe, ctx: &mut ModuleContext<'_>) -> ModuleResult {
            ticket.add_comment("please attach logs");
            ctx.mutate(&ticket.key).set_field("labels", json!(["needs-logs"]));
            Ok(ModuleOutcome::Success)
        }
    }

    /// Writes to a fixed other ticket.
    struct WritesTo(&'static str);

    #[async_trait]
    impl Module for WritesTo {
        async fn execute(&self, _: &mut Ticket, _: &ExecutionTimeframe, ctx: &mut ModuleContext<'_>) -> ModuleResult {
            ctx.mutate(self.0).add_to_field("versions", json!({ "id": "1" }));
            Ok(ModuleOutcome::Success)
        }
    }

    /// Optionally sets a field, then requests a transition on the ticket it runs on.
    struct Transitions {
        field: Option<&'static str>,
        label: &'static str,
    }

    #[async_trait]
    impl Module for Transitions {
        async fn execute(&self, ticket: &mut Ticket, _: &ExecutionTimeframe, ctx: &mut ModuleContext<'_>) -> ModuleResult {
            let mutation = ctx.mutate(&ticket.key);
            if let Some(field) = self.field {
                mutation.set_field(field, json!(1));
            }
            mutation.request_transition(self.label);
            Ok(ModuleOutcome::Success)
        }
    }

    fn cycle() -> ExecutionTimeframe {
        let now = truncate_to_millis(Utc::now());
        ExecutionTimeframe::compute(now - TimeDelta::seconds(10), now)
    }

    fn tickets(keys: &[&str]) -> Vec<Ticket> {
        keys.iter().map(|k| Ticket::new(*k, "MC")).collect()
    }

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new("immediate", Strategy::Immediate, &DebugConfig::default())
    }

    fn keys(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn single(name: &str, module: impl Module + 'static) -> Vec<ModuleRegistry> {
        let mut r = registry();
        r.register(name, ModuleConfig::default(), module);
        vec![r]
    }

    #[tokio::test]
    async fn test_panicking_module_does_not_stop_the_registry() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-1", "MC-2", "MC-3"]));
        let probe = Probe {
            panic_on: Some("MC-2".to_string()),
            ..Default::default()
        };
        let after = Probe::default();

        let mut r = registry();
        r.register("probe", ModuleConfig::default(), probe.clone());
        r.register("after", ModuleConfig::default(), after.clone());
        let mut executor = Executor::new(vec![r]);

        let result = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(result.successful);
        assert_eq!(result.failed_tickets, ["MC-2".to_string()].into_iter().collect());
        assert_eq!(*probe.seen.lock().unwrap(), vec!["MC-1", "MC-2", "MC-3"]);
        // the second module still ran on the ticket the first one panicked on
        assert_eq!(*after.seen.lock().unwrap(), vec!["MC-1", "MC-2", "MC-3"]);
    }

    #[tokio::test]
    async fn test_module_failure_marks_ticket() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-1", "MC-2"]));
        let probe = Probe {
            fail_on: Some("MC-1".to_string()),
            ..Default::default()
        };
        let mut executor = Executor::new(single("probe", probe.clone()));

        let result = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(result.successful);
        assert!(result.failed_tickets.contains("MC-1"));
        assert!(!result.failed_tickets.contains("MC-2"));
    }

    #[tokio::test]
    async fn test_failed_tickets_are_requeried() {
        let mock = MockTrackerClient::new();
        let mut executor = Executor::new(single("probe", Probe::default()));

        let rerun: BTreeSet<String> = ["MC-9".to_string()].into_iter().collect();
        executor.execute(&mock, &cycle(), &rerun).await;
        assert!(mock.searches()[0].starts_with("key IN (\"MC-9\") OR "));
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_cycle_and_still_flushes() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-1"]));
        let mut executor = Executor::new(single("commenter", Commenter));

        let result = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(result.successful);
        assert!(executor.comments().is_duplicate("MC-1", "please attach logs"));

        mock.fail_searches(true);
        let result = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(!result.successful);
        assert!(result.failed_tickets.is_empty());
        // rotated even though the cycle failed
        assert!(executor.comments().is_empty());
    }

    #[tokio::test]
    async fn test_changes_are_applied_once_per_ticket() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-1"]));
        let mut executor = Executor::new(single("commenter", Commenter));

        executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert!(matches!(&writes[0], TrackerCall::AddComment { key, .. } if key == "MC-1"));
        assert!(matches!(&writes[1], TrackerCall::UpdateFields { key, .. } if key == "MC-1"));

        // same comment next cycle is suppressed
        mock.clear_calls();
        executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(!mock.writes().iter().any(|c| matches!(c, TrackerCall::AddComment { .. })));
    }

    #[tokio::test]
    async fn test_mutation_failure_is_attributed_to_trigger() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-2"]));
        mock.fail_writes_to("MC-1");
        let mut executor = Executor::new(single("writer", WritesTo("MC-1")));

        let result = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(result.successful);
        assert_eq!(result.failed_tickets, ["MC-2".to_string()].into_iter().collect());
    }

    #[tokio::test]
    async fn test_out_of_scope_tickets_are_skipped() {
        let mock = MockTrackerClient::new().with_tickets(vec![Ticket::new("MC-1", "MC"), Ticket::new("WEB-1", "WEB")]);
        let probe = Probe::default();
        let mut r = registry();
        r.register(
            "probe",
            ModuleConfig {
                project_whitelist: Some(vec!["MC".to_string()]),
                ..Default::default()
            },
            probe.clone(),
        );
        let mut executor = Executor::new(vec![r]);

        executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert_eq!(*probe.seen.lock().unwrap(), vec!["MC-1"]);
    }

    #[tokio::test]
    async fn test_two_modules_share_one_update_and_one_transition() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-1"]));
        let mut r = registry();
        r.register(
            "closer",
            ModuleConfig::default(),
            Transitions {
                field: Some("customfield_1"),
                label: "Close Issue",
            },
        );
        r.register(
            "resolver",
            ModuleConfig::default(),
            Transitions {
                field: None,
                label: "Resolve Issue",
            },
        );
        let mut executor = Executor::new(vec![r]);

        let result = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert!(result.successful);
        assert!(result.failed_tickets.is_empty());

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        match &writes[0] {
            TrackerCall::UpdateFields { key, update } => {
                assert_eq!(key, "MC-1");
                assert_eq!(update.fields.get("customfield_1"), Some(&json!(1)));
            }
            other => panic!("Expected update, got {:?}", other),
        }
        match &writes[1] {
            TrackerCall::Transition { key, transition, .. } => {
                assert_eq!(key, "MC-1");
                assert_eq!(transition, "Resolve Issue");
            }
            other => panic!("Expected transition, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lazy_failures_are_kept_while_the_registry_is_not_due() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-5"]));
        let lazy_probe = Probe {
            fail_on: Some("MC-5".to_string()),
            ..Default::default()
        };

        let mut immediate = registry();
        immediate.register("noop", ModuleConfig::default(), Probe::default());
        let mut lazy = ModuleRegistry::new("lazy", Strategy::Lazy(TimeDelta::hours(1)), &DebugConfig::default());
        lazy.register("lazy-probe", ModuleConfig::default(), lazy_probe.clone());
        let mut executor = Executor::new(vec![immediate, lazy]);

        let first = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert_eq!(first.failed_tickets, keys(&["MC-5"]));

        // lazy registry sits this cycle out; the immediate pass succeeds on MC-5
        let second = executor.execute(&mock, &cycle(), &first.failed_tickets).await;
        assert!(second.successful);
        assert_eq!(second.failed_tickets, keys(&["MC-5"]));
        assert_eq!(lazy_probe.seen.lock().unwrap().len(), 1);

        // next due pass queries MC-5 again
        mock.clear_calls();
        let later = truncate_to_millis(Utc::now() + TimeDelta::hours(2));
        let due = ExecutionTimeframe::compute(later - TimeDelta::seconds(10), later);
        let third = executor.execute(&mock, &due, &second.failed_tickets).await;
        assert_eq!(*lazy_probe.seen.lock().unwrap(), vec!["MC-5", "MC-5"]);
        assert!(mock.searches().iter().all(|s| s.starts_with("key IN (\"MC-5\") OR ")));
        assert_eq!(third.failed_tickets, keys(&["MC-5"]));
    }

    #[tokio::test]
    async fn test_recovered_lazy_ticket_leaves_retry_set() {
        let mock = MockTrackerClient::new().with_tickets(tickets(&["MC-5"]));
        let mut lazy = ModuleRegistry::new("lazy", Strategy::Lazy(TimeDelta::hours(1)), &DebugConfig::default());
        let probe = Probe {
            fail_on: Some("MC-5".to_string()),
            ..Default::default()
        };
        lazy.register("lazy-probe", ModuleConfig::default(), probe);
        let mut executor = Executor::new(vec![lazy]);

        let first = executor.execute(&mock, &cycle(), &BTreeSet::new()).await;
        assert_eq!(first.failed_tickets, keys(&["MC-5"]));
        assert_eq!(executor.registries[0].pending_retries(), &keys(&["MC-5"]));

        // the ticket is gone from the next due pass, so nothing fails
        let empty = MockTrackerClient::new();
        let later = truncate_to_millis(Utc::now() + TimeDelta::hours(2));
        let due = ExecutionTimeframe::compute(later - TimeDelta::seconds(10), later);
        let second = executor.execute(&empty, &due, &first.failed_tickets).await;
        assert!(second.failed_tickets.is_empty());
        assert!(executor.registries[0].pending_retries().is_empty());
    }
}
