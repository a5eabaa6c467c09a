//! Keeps the linked-count custom field equal to the number of duplicates pointing at a ticket

use async_trait::async_trait;
use serde_json::json;

use crate::domain::ticket::DUPLICATE_LINK;
use crate::domain::{ExecutionTimeframe, ModuleOutcome, ModuleResult, Ticket};
use crate::registry::{Module, ModuleContext};

pub const NAME: &str = "update_linked";

/// Custom field holding the duplicate count, unless the module config names another
pub const DEFAULT_LINKED_FIELD: &str = "customfield_10500";

pub struct UpdateLinkedModule;

#[async_trait]
impl Module for UpdateLinkedModule {
    async fn execute(
        &self,
        ticket: &mut Ticket,
        _timeframe: &ExecutionTimeframe,
        ctx: &mut ModuleContext<'_>,
    ) -> ModuleResult {
        let field = ctx.config.field.clone().unwrap_or_else(|| DEFAULT_LINKED_FIELD.to_string());
        let count = ticket.inward_links(DUPLICATE_LINK).count() as f64;
        let current = ticket.fields.get(&field).and_then(|v| v.as_f64()).unwrap_or(0.0);
        if current == count {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        ctx.mutate(&ticket.key).set_field(field.clone(), json!(count));
        ticket.fields.insert(field, json!(count));
        Ok(ModuleOutcome::Success)
    }
}
