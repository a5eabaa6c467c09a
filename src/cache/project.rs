//! Project cache - per-project metadata, refreshed wholesale on a fixed interval
//!
//! The tracker offers no cheap incremental lookup, so the whole project list is
//! reloaded once the cache is older than its TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::ProjectMetadata;
use crate::error::Result;
use crate::tracker::TrackerClient;

/// Default refresh interval
pub const PROJECT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
pub struct ProjectCache {
    projects: HashMap<String, ProjectMetadata>,
    refreshed_at: Option<Instant>,
    ttl: Duration,
}

impl Default for ProjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectCache {
    pub fn new() -> Self {
        Self::with_ttl(PROJECT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            projects: HashMap::new(),
            refreshed_at: None,
            ttl,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.refreshed_at.map(|t| t.elapsed() >= self.ttl).unwrap_or(true)
    }

    /// Reload every project from the tracker.
    pub async fn refresh(&mut self, client: &dyn TrackerClient) -> Result<()> {
        let projects = client.list_projects().await?;
        log::debug!("Refreshed project cache with {} projects", projects.len());
        self.projects = projects.into_iter().map(|p| (p.key.clone(), p)).collect();
        self.refreshed_at = Some(Instant::now());
        Ok(())
    }

    /// Metadata for `key`, refreshing first when the cache is stale.
    pub async fn get(&mut self, client: &dyn TrackerClient, key: &str) -> Result<Option<ProjectMetadata>> {
        if self.is_stale() {
            self.refresh(client).await?;
        }
        Ok(self.projects.get(key).cloned())
    }

    /// Drop everything; the next lookup reloads.
    pub fn clear(&mut self) {
        self.projects.clear();
        self.refreshed_at = None;
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
