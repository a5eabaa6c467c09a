//! In-memory tracker for tests
//!
//! Answers searches from scripted result lists and records every write so
//! tests can assert on exactly which requests a cycle issued.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::{Connector, FieldUpdate, SearchPage, TrackerClient};
use crate::domain::{CommentEdit, NewComment, NewLink, ProjectMetadata, Ticket};
use crate::error::{Result, WardenError};

/// A request the mock received
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCall {
    Search { jql: String, start_at: usize },
    UpdateFields { key: String, update: FieldUpdate },
    Transition { key: String, transition: String, update: FieldUpdate },
    AddComment { key: String, body: String },
    UpdateComment { key: String, comment_id: String },
    CreateLink { key: String, other_key: String },
    DeleteLink { link_id: String },
    ListProjects,
}

#[derive(Default)]
struct MockState {
    /// Results for queries containing the given fragment, checked in insertion order
    results: Vec<(String, Vec<Ticket>)>,
    /// Results for every other query
    default_results: Vec<Ticket>,
    projects: Vec<ProjectMetadata>,
    failing_searches: bool,
    failing_keys: HashSet<String>,
    calls: Vec<TrackerCall>,
}

/// Scriptable `TrackerClient`
#[derive(Default)]
pub struct MockTrackerClient {
    state: Mutex<MockState>,
}

impl MockTrackerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the calls it recorded
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tickets returned for any query without a more specific match.
    pub fn with_tickets(self, tickets: Vec<Ticket>) -> Self {
        self.state().default_results = tickets;
        self
    }

    /// Tickets returned for queries containing `fragment`.
    pub fn with_query(self, fragment: impl Into<String>, tickets: Vec<Ticket>) -> Self {
        self.state().results.push((fragment.into(), tickets));
        self
    }

    pub fn with_projects(self, projects: Vec<ProjectMetadata>) -> Self {
        self.state().projects = projects;
        self
    }

    /// Make every search fail with a server error.
    pub fn fail_searches(&self, failing: bool) {
        self.state().failing_searches = failing;
    }

    /// Make every write against `key` fail.
    pub fn fail_writes_to(&self, key: impl Into<String>) {
        self.state().failing_keys.insert(key.into());
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.state().calls.clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TrackerCall::Search { jql, .. } => Some(jql),
                _ => None,
            })
            .collect()
    }

    /// Calls other than searches and project listings
    pub fn writes(&self) -> Vec<TrackerCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, TrackerCall::Search { .. } | TrackerCall::ListProjects))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn record_write(&self, key: &str, call: TrackerCall) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing_keys.contains(key) {
            return Err(WardenError::Tracker {
                status: 400,
                message: format!("write to {} rejected", key),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerClient for MockTrackerClient {
    async fn search(&self, jql: &str, start_at: usize, max_results: usize) -> Result<SearchPage> {
        let mut state = self.state();
        state.calls.push(TrackerCall::Search {
            jql: jql.to_string(),
            start_at,
        });
        if state.failing_searches {
            return Err(WardenError::Tracker {
                status: 503,
                message: "search unavailable".to_string(),
            });
        }

        let all = state
            .results
            .iter()
            .find(|(fragment, _)| jql.contains(fragment.as_str()))
            .map(|(_, tickets)| tickets)
            .unwrap_or(&state.default_results);

        let tickets: Vec<Ticket> = all.iter().skip(start_at).take(max_results).cloned().collect();
        let has_more = start_at + tickets.len() < all.len();
        Ok(SearchPage { tickets, has_more })
    }

    async fn update_fields(&self, key: &str, update: &FieldUpdate) -> Result<()> {
        self.record_write(
            key,
            TrackerCall::UpdateFields {
                key: key.to_string(),
                update: update.clone(),
            },
        )
    }

    async fn transition(&self, key: &str, transition: &str, update: &FieldUpdate) -> Result<()> {
        self.record_write(
            key,
            TrackerCall::Transition {
                key: key.to_string(),
                transition: transition.to_string(),
                update: update.clone(),
            },
        )
    }

    async fn add_comment(&self, key: &str, comment: &NewComment) -> Result<()> {
        self.record_write(
            key,
            TrackerCall::AddComment {
                key: key.to_string(),
                body: comment.body.clone(),
            },
        )
    }

    async fn update_comment(&self, key: &str, edit: &CommentEdit) -> Result<()> {
        self.record_write(
            key,
            TrackerCall::UpdateComment {
                key: key.to_string(),
                comment_id: edit.comment_id.clone(),
            },
        )
    }

    async fn create_link(&self, key: &str, link: &NewLink) -> Result<()> {
        self.record_write(
            key,
            TrackerCall::CreateLink {
                key: key.to_string(),
                other_key: link.other_key.clone(),
            },
        )
    }

    async fn delete_link(&self, link_id: &str) -> Result<()> {
        self.record_write(
            link_id,
            TrackerCall::DeleteLink {
                link_id: link_id.to_string(),
            },
        )
    }

    async fn list_projects(&self) -> Result<Vec<ProjectMetadata>> {
        let mut state = self.state();
        state.calls.push(TrackerCall::ListProjects);
        Ok(state.projects.clone())
    }
}

/// Scriptable `Connector`: fails a set number of times, then hands out the mock client.
pub struct MockConnector {
    client: Arc<MockTrackerClient>,
    failures_remaining: AtomicUsize,
    fatal: bool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(client: Arc<MockTrackerClient>) -> Self {
        Self {
            client,
            failures_remaining: AtomicUsize::new(0),
            fatal: false,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` connection attempts with a transient error.
    pub fn failing(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every attempt with a configuration error.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn TrackerClient>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fatal {
            return Err(WardenError::Configuration("malformed credentials".to_string()));
        }
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(WardenError::Authentication("tracker unavailable".to_string()));
        }
        let client: Arc<dyn TrackerClient> = self.client.clone();
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickets(n: usize) -> Vec<Ticket> {
        (1..=n).map(|i| Ticket::new(format!("MC-{}", i), "MC")).collect()
    }

    #[tokio::test]
    async fn test_search_pages() {
        let mock = MockTrackerClient::new().with_tickets(tickets(3));
        let first = mock.search("anything", 0, 2).await.unwrap();
        assert_eq!(first.tickets.len(), 2);
        assert!(first.has_more);

        let second = mock.search("anything", 2, 2).await.unwrap();
        assert_eq!(second.tickets.len(), 1);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_search_by_fragment() {
        let mock = MockTrackerClient::new()
            .with_tickets(tickets(3))
            .with_query("key = MC-9", vec![Ticket::new("MC-9", "MC")]);
        let page = mock.search("key = MC-9", 0, 50).await.unwrap();
        assert_eq!(page.tickets[0].key, "MC-9");
        assert_eq!(mock.searches(), vec!["key = MC-9"]);
    }

    #[tokio::test]
    async fn test_failing_writes_are_recorded() {
        let mock = MockTrackerClient::new();
        mock.fail_writes_to("MC-1");
        assert!(mock.update_fields("MC-1", &FieldUpdate::new()).await.is_err());
        assert!(mock.update_fields("MC-2", &FieldUpdate::new()).await.is_ok());
        assert_eq!(mock.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_connector_fails_then_succeeds() {
        let connector = MockConnector::new(Arc::new(MockTrackerClient::new())).failing(1);
        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_ok());
        assert_eq!(connector.attempts(), 2);
    }
}
