//! Replaces unreleased affected versions with the latest released one
//!
//! Reporters sometimes pick a version that has not shipped yet. The project
//! cache says which versions are released.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{ExecutionTimeframe, ModuleFailure, ModuleOutcome, ModuleResult, Ticket};
use crate::registry::{Module, ModuleContext};

pub const NAME: &str = "future_version";

pub const VERSIONS_FIELD: &str = "versions";

pub struct FutureVersionModule;

#[async_trait]
impl Module for FutureVersionModule {
    async fn execute(
        &self,
        ticket: &mut Ticket,
        _timeframe: &ExecutionTimeframe,
        ctx: &mut ModuleContext<'_>,
    ) -> ModuleResult {
        if ticket.affected_versions.is_empty() {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        let project = ctx
            .project(&ticket.project)
            .await?
            .ok_or_else(|| ModuleFailure::message(format!("unknown project {}", ticket.project)))?;

        let unreleased: Vec<String> = ticket
            .affected_versions
            .iter()
            .filter(|v| project.find_version(&v.id).is_some_and(|pv| !pv.released))
            .map(|v| v.id.clone())
            .collect();
        if unreleased.is_empty() {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        let latest = project
            .latest_released()
            .ok_or_else(|| ModuleFailure::message(format!("{} has no released version", project.key)))?
            .clone();

        let mutation = ctx.mutate(&ticket.key);
        for id in &unreleased {
            mutation.remove_from_field(VERSIONS_FIELD, json!({ "id": id }));
        }
        ticket.affected_versions.retain(|v| !unreleased.contains(&v.id));

        if !ticket.affected_versions.iter().any(|v| v.id == latest.id) {
            mutation.add_to_field(VERSIONS_FIELD, json!({ "id": latest.id }));
            ticket.affected_versions.push(latest);
        }

        if let Some(message) = &ctx.config.message {
            ticket.add_comment(message.clone());
        }
        Ok(ModuleOutcome::Success)
    }
}
