//! Core tracker client types and trait definitions

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::domain::{CommentEdit, NewComment, NewLink, ProjectMetadata, Ticket};
use crate::error::Result;

/// Page size for every search request
pub const PAGE_SIZE: usize = 50;

/// Authenticated handle to the ticket tracker
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// One page of search results, in the order the query asks for
    async fn search(&self, jql: &str, start_at: usize, max_results: usize) -> Result<SearchPage>;

    /// Apply field edits in a single request
    async fn update_fields(&self, key: &str, update: &FieldUpdate) -> Result<()>;

    /// Perform the named workflow transition, setting `update` fields alongside
    async fn transition(&self, key: &str, transition: &str, update: &FieldUpdate) -> Result<()>;

    async fn add_comment(&self, key: &str, comment: &NewComment) -> Result<()>;

    async fn update_comment(&self, key: &str, edit: &CommentEdit) -> Result<()>;

    /// Create a link with `key` as the outward side
    async fn create_link(&self, key: &str, link: &NewLink) -> Result<()>;

    async fn delete_link(&self, link_id: &str) -> Result<()>;

    /// Every project visible to the bot, with versions
    async fn list_projects(&self) -> Result<Vec<ProjectMetadata>>;
}

/// Establishes authenticated sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn TrackerClient>>;
}

/// One page of a search
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub tickets: Vec<Ticket>,
    pub has_more: bool,
}

/// Field edits for one request: plain sets plus add/remove operations on multi-value fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub fields: Map<String, Value>,
    pub update: BTreeMap<String, Vec<Value>>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a field. A later set of the same field wins.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn add(&mut self, field: impl Into<String>, value: Value) {
        self.update.entry(field.into()).or_default().push(json!({ "add": value }));
    }

    pub fn remove(&mut self, field: impl Into<String>, value: Value) {
        self.update.entry(field.into()).or_default().push(json!({ "remove": value }));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.update.values().all(|ops| ops.is_empty())
    }

    /// Request body fragment: `{"fields": {...}, "update": {...}}`, omitting empty parts.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if !self.fields.is_empty() {
            body.insert("fields".to_string(), Value::Object(self.fields.clone()));
        }
        let update: Map<String, Value> = self
            .update
            .iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(k, ops)| (k.clone(), Value::Array(ops.clone())))
            .collect();
        if !update.is_empty() {
            body.insert("update".to_string(), Value::Object(update));
        }
        Value::Object(body)
    }
}
