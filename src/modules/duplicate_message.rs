//! Tells reporters which ticket theirs duplicates
//!
//! Runs delayed so that a moderator who resolves and comments by hand gets to
//! write their own message first.

use async_trait::async_trait;

use super::duplicate_parent;
use crate::domain::ticket::DUPLICATE_RESOLUTION;
use crate::domain::{ExecutionTimeframe, ModuleOutcome, ModuleResult, Ticket};
use crate::registry::{Module, ModuleContext};

pub const NAME: &str = "duplicate_message";

/// `{parent}` is replaced with the parent ticket key
pub const DEFAULT_MESSAGE: &str = "Thank you for your report! This issue is a duplicate of {parent}. \
Please search before reporting, and follow {parent} for updates.";

pub struct DuplicateMessageModule;

#[async_trait]
impl Module for DuplicateMessageModule {
    async fn execute(
        &self,
        ticket: &mut Ticket,
        _timeframe: &ExecutionTimeframe,
        ctx: &mut ModuleContext<'_>,
    ) -> ModuleResult {
        if ticket.resolution.as_deref() != Some(DUPLICATE_RESOLUTION) {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }
        let Some(parent_key) = duplicate_parent(ticket).map(|l| l.other_key.clone()) else {
            return Ok(ModuleOutcome::OperationNotNeeded);
        };

        // someone already pointed at the parent
        if ticket.comments.iter().any(|c| c.body.contains(&parent_key)) {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        let template = ctx.config.message.as_deref().unwrap_or(DEFAULT_MESSAGE);
        let message = template.replace("{parent}", &parent_key);
        if ctx.comments.is_duplicate(&ticket.key, &message) {
            return Ok(ModuleOutcome::OperationNotNeeded);
        }

        ticket.add_comment(message);
        Ok(ModuleOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{Comment, Link};
    use crate::modules::harness::Harness;
    use crate::tracker::MockTrackerClient;

    fn duplicate() -> Ticket {
        let mut ticket = Ticket::new("MC-2", "MC");
        ticket.resolution = Some(DUPLICATE_RESOLUTION.to_string());
        ticket.links.push(Link {
            id: "100".to_string(),
            link_type: "Duplicate".to_string(),
            outward: true,
            other_key: "MC-1".to_string(),
        });
        ticket
    }

    fn comment(body: &str) -> Comment {
        Comment {
            id: "1".to_string(),
            author: Some("helper".to_string()),
            body: body.to_string(),
            created: Utc::now(),
            visibility: None,
        }
    }

    #[tokio::test]
    async fn test_comment_names_parent() {
        let mut h = Harness::new(MockTrackerClient::new());
        let mut ticket = duplicate();

        let outcome = h.run(&DuplicateMessageModule, &mut ticket).await.unwrap();
        assert_eq!(outcome, ModuleOutcome::Success);
        let body = &ticket.pending_changes().comments_to_add[0].body;
        assert!(body.contains("duplicate of MC-1"));
        assert!(!body.contains("{parent}"));
    }

    #[tokio::test]
    async fn test_existing_mention_suppresses_comment() {
        let mut h = Harness::new(MockTrackerClient::new());
        let mut ticket = duplicate();
        ticket.comments.push(comment("Duplicate of MC-1, see there"));

        let outcome = h.run(&DuplicateMessageModule, &mut ticket).await.unwrap();
        assert_eq!(outcome, ModuleOutcome::OperationNotNeeded);
        assert!(!ticket.has_pending_changes());
    }

    #[tokio::test]
    async fn test_recently_posted_comment_is_not_repeated() {
        let mut h = Harness::new(MockTrackerClient::new());
        let message = DEFAULT_MESSAGE.replace("{parent}", "MC-1");
        h.comments.record("MC-2", &message);

        let outcome = h.run(&DuplicateMessageModule, &mut duplicate()).await.unwrap();
        assert_eq!(outcome, ModuleOutcome::OperationNotNeeded);
    }

    #[tokio::test]
    async fn test_without_parent_link() {
        let mut h = Harness::new(MockTrackerClient::new());
        let mut ticket = duplicate();
        ticket.links.clear();

        let outcome = h.run(&DuplicateMessageModule, &mut ticket).await.unwrap();
        assert_eq!(outcome, ModuleOutcome::OperationNotNeeded);
    }
}
