//! Copies a duplicate's affected versions onto its parent ticket

use async_trait::async_trait;
use serde_json::json;

use super::duplicate_parent;
use super::future_version::VERSIONS_FIELD;
use crate::domain::ticket::DUPLICATE_RESOLUTION;
use crate::domain::{ExecutionTimeframe, ModuleFailure, ModuleOutcome, ModuleResult, Ticket};
use crate::registry::{Module, ModuleContext, quote};

pub const NAME: &str = "transfer_versions";

pub struct TransferVersionsModule;

#[async_trait]
impl Module for TransferVersionsModule {
    async fn execute(
        &self,
        ticket: &mut Ticket,
        _timeframe: &ExecutionTimeframe,
        ctx: &mut ModuleContext<'_>,
    ) -> ModuleResult {
        if ticket.resolution.as_deref() != Some(DUPLICATE_RESOLUTION) || ticket.affected_versions.is_empty() {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }
        let Some(parent_key) = duplicate_parent(ticket).map(|l| l.other_key.clone()) else {
            return Ok(ModuleOutcome::OperationNotNeeded);
        };

        let parent = ctx
            .search(&format!("key = {}", quote(&parent_key)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModuleFailure::message(format!("parent {} of {} not found", parent_key, ticket.key)))?;

        let missing: Vec<&str> = ticket
            .affected_versions
            .iter()
            .filter(|v| !v.archived && !parent.affected_versions.iter().any(|pv| pv.id == v.id))
            .map(|v| v.id.as_str())
            .collect();
        if missing.is_empty() {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        log::debug!("Transferring {} versions from {} to {}", missing.len(), ticket.key, parent.key);
        let mutation = ctx.mutate(&parent.key);
        for id in missing {
            mutation.add_to_field(VERSIONS_FIELD, json!({ "id": id }));
        }
        Ok(ModuleOutcome::Success)
    }
}
