//! Flush a ticket's own accumulators (comments and links) to the tracker

use crate::cache::CommentCache;
use crate::domain::Ticket;
use crate::error::WardenError;
use crate::tracker::TrackerClient;

/// Send the ticket's queued comments and link changes. Comment additions are
/// checked against the dedup cache and recorded once posted.
///
/// Every change is attempted; the errors of the ones that failed are returned.
pub async fn apply_ticket_changes(
    client: &dyn TrackerClient,
    ticket: &mut Ticket,
    comments: &mut CommentCache,
) -> Vec<WardenError> {
    let changes = ticket.take_changes();
    let mut errors = Vec::new();

    for comment in &changes.comments_to_add {
        if comments.is_duplicate(&ticket.key, &comment.body) {
            log::info!("Skipping duplicate comment on {}", ticket.key);
            continue;
        }
        match client.add_comment(&ticket.key, comment).await {
            Ok(()) => comments.record(&ticket.key, &comment.body),
            Err(e) => errors.push(e),
        }
    }

    for edit in &changes.comments_to_edit {
        if let Err(e) = client.update_comment(&ticket.key, edit).await {
            errors.push(e);
        }
    }

    for link in &changes.links_to_add {
        if let Err(e) = client.create_link(&ticket.key, link).await {
            errors.push(e);
        }
    }

    for link_id in &changes.links_to_remove {
        if let Err(e) = client.delete_link(link_id).await {
            errors.push(e);
        }
    }

    errors
}
