//! Module trait and the context a handler runs with

use async_trait::async_trait;

use crate::cache::{CommentCache, MutationBatchCache, PendingMutation, ProjectCache, QueryCache};
use crate::config::ModuleConfig;
use crate::domain::{ExecutionTimeframe, ModuleResult, ProjectMetadata, Ticket};
use crate::error::Result;
use crate::tracker::TrackerClient;

/// A business rule applied to one ticket at a time.
///
/// Handlers change the ticket only through its own accumulators (comments,
/// links) and through the caches in `ModuleContext`. Returning `Err` or
/// panicking marks the ticket for retry on the next cycle.
#[async_trait]
pub trait Module: Send + Sync {
    async fn execute(
        &self,
        ticket: &mut Ticket,
        timeframe: &ExecutionTimeframe,
        ctx: &mut ModuleContext<'_>,
    ) -> ModuleResult;
}

/// Caches and settings lent to a handler for one invocation.
pub struct ModuleContext<'a> {
    pub client: &'a dyn TrackerClient,
    pub queries: &'a mut QueryCache,
    pub projects: &'a mut ProjectCache,
    pub comments: &'a CommentCache,
    pub mutations: &'a mut MutationBatchCache,
    pub config: &'a ModuleConfig,
    triggered_by: &'a str,
}

impl<'a> ModuleContext<'a> {
    pub fn new(
        client: &'a dyn TrackerClient,
        queries: &'a mut QueryCache,
        projects: &'a mut ProjectCache,
        comments: &'a CommentCache,
        mutations: &'a mut MutationBatchCache,
        config: &'a ModuleConfig,
        triggered_by: &'a str,
    ) -> Self {
        Self {
            client,
            queries,
            projects,
            comments,
            mutations,
            config,
            triggered_by,
        }
    }

    /// Pending mutation for `ticket_key`, attributed to the ticket being processed.
    pub fn mutate(&mut self, ticket_key: &str) -> &mut PendingMutation {
        self.mutations.entry(ticket_key, self.triggered_by)
    }

    /// Tickets matching `jql`, shared with every other module in this pass.
    pub async fn search(&mut self, jql: &str) -> Result<Vec<Ticket>> {
        self.queries.get_or_fetch(self.client, jql).await
    }

    pub async fn project(&mut self, key: &str) -> Result<Option<ProjectMetadata>> {
        self.projects.get(self.client, key).await
    }
}
