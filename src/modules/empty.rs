//! Resolves newly created tickets that have no description

use async_trait::async_trait;

use crate::domain::{ExecutionTimeframe, ModuleOutcome, ModuleResult, Ticket};
use crate::registry::{Module, ModuleContext};

pub const NAME: &str = "empty";

pub const RESOLUTION: &str = "Incomplete";

pub const DEFAULT_MESSAGE: &str = "This ticket has been resolved as Incomplete because it has no description. \
Please create a new ticket describing the problem, the steps to reproduce it and what you expected to happen.";

pub struct EmptyModule;

fn is_blank(text: Option<&str>) -> bool {
    text.is_none_or(|t| t.trim().is_empty())
}

#[async_trait]
impl Module for EmptyModule {
    async fn execute(
        &self,
        ticket: &mut Ticket,
        timeframe: &ExecutionTimeframe,
        ctx: &mut ModuleContext<'_>,
    ) -> ModuleResult {
        // only tickets created in this window; older ones may have been edited on purpose
        if !timeframe.contains(ticket.created) || !ticket.is_unresolved() || !is_blank(ticket.description.as_deref()) {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        let message = ctx.config.message.clone().unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        ctx.mutate(&ticket.key).resolve_as(RESOLUTION);
        ticket.resolution = Some(RESOLUTION.to_string());
        ticket.add_comment(message);
        Ok(ModuleOutcome::Success)
    }
}
