//! Paginated fetch

use crate::domain::Ticket;
use crate::error::Result;
use crate::tracker::{PAGE_SIZE, TrackerClient};

/// Fetch every page of `jql`, `PAGE_SIZE` tickets at a time.
///
/// Each ticket gets its original snapshot taken before any module sees it.
pub async fn fetch_all(client: &dyn TrackerClient, jql: &str) -> Result<Vec<Ticket>> {
    let mut tickets = Vec::new();
    let mut start_at = 0;

    loop {
        log::debug!("Searching from {}: {}", start_at, jql);
        let page = client.search(jql, start_at, PAGE_SIZE).await?;
        if page.tickets.is_empty() {
            break;
        }

        start_at += page.tickets.len();
        tickets.extend(page.tickets.into_iter().map(|mut ticket| {
            ticket.snapshot();
            ticket
        }));

        if !page.has_more {
            break;
        }
    }

    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{MockTrackerClient, TrackerCall};

    fn tickets(n: usize) -> Vec<Ticket> {
        (1..=n).map(|i| Ticket::new(format!("MC-{}", i), "MC")).collect()
    }

    #[tokio::test]
    async fn test_fetch_all_walks_every_page() {
        let mock = MockTrackerClient::new().with_tickets(tickets(120));
        let all = fetch_all(&mock, "project = MC").await.unwrap();
        assert_eq!(all.len(), 120);
        assert_eq!(all[119].key, "MC-120");

        let starts: Vec<usize> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                TrackerCall::Search { start_at, .. } => Some(start_at),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_fetched_tickets_have_snapshots() {
        let mock = MockTrackerClient::new().with_tickets(tickets(1));
        let all = fetch_all(&mock, "project = MC").await.unwrap();
        assert!(all[0].original().is_some());
    }

    #[tokio::test]
    async fn test_empty_result_is_one_search() {
        let mock = MockTrackerClient::new();
        let all = fetch_all(&mock, "project = MC").await.unwrap();
        assert!(all.is_empty());
        assert_eq!(mock.searches().len(), 1);
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let mock = MockTrackerClient::new().with_tickets(tickets(3));
        mock.fail_searches(true);
        assert!(fetch_all(&mock, "project = MC").await.is_err());
    }
}
