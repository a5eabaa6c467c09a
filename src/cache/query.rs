//! Query cache - fetched ticket lists keyed by exact query string
//!
//! Modules that look up the same query during one registry pass share a single
//! fetch. The executor clears the cache after every pass.

use std::collections::HashMap;

use crate::domain::Ticket;
use crate::error::Result;
use crate::executor::fetch_all;
use crate::tracker::TrackerClient;

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<String, Vec<Ticket>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, jql: &str) -> Option<&Vec<Ticket>> {
        self.entries.get(jql)
    }

    pub fn insert(&mut self, jql: impl Into<String>, tickets: Vec<Ticket>) {
        self.entries.insert(jql.into(), tickets);
    }

    /// Cached result for `jql`, fetching every page on a miss.
    pub async fn get_or_fetch(&mut self, client: &dyn TrackerClient, jql: &str) -> Result<Vec<Ticket>> {
        if let Some(tickets) = self.entries.get(jql) {
            log::debug!("Query cache hit: {}", jql);
            return Ok(tickets.clone());
        }
        let tickets = fetch_all(client, jql).await?;
        self.entries.insert(jql.to_string(), tickets.clone());
        Ok(tickets)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
