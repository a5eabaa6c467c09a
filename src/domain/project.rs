//! Project-level metadata

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A version (release) defined on a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
}

impl Version {
    pub fn new(id: impl Into<String>, name: impl Into<String>, released: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            released,
            archived: false,
            release_date: None,
        }
    }
}

/// Metadata for one project, as served by the project cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub key: String,
    pub name: String,
    /// Versions in the order the tracker lists them (oldest first)
    pub versions: Vec<Version>,
}

impl ProjectMetadata {
    pub fn find_version(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The most recently released, non-archived version.
    pub fn latest_released(&self) -> Option<&Version> {
        self.versions.iter().rev().find(|v| v.released && !v.archived)
    }
}
