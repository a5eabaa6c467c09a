//! Ticket record and its pending-change accumulators
//!
//! A Ticket is created per fetch and discarded at the end of the cycle. Field
//! edits and transitions go through the mutation batch cache; comments and links
//! accumulate on the ticket itself and are flushed by the executor after each
//! registry pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::project::Version;

/// Link type name used for duplicate relations
pub const DUPLICATE_LINK: &str = "Duplicate";

/// Resolution name for duplicates
pub const DUPLICATE_RESOLUTION: &str = "Duplicate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub created: DateTime<Utc>,
    /// Group or role the comment is restricted to, if any
    pub visibility: Option<String>,
}

/// One side of an issue link, seen from the ticket that holds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub link_type: String,
    /// True when this ticket is the source ("duplicates"), false when it is the target ("is duplicated by")
    pub outward: bool,
    pub other_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub comment_id: String,
    pub body: String,
}

/// A link to create with this ticket as the outward side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub link_type: String,
    pub other_key: String,
}

/// Changes queued on a ticket that are not field edits or transitions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketChanges {
    pub comments_to_add: Vec<NewComment>,
    pub comments_to_edit: Vec<CommentEdit>,
    pub links_to_add: Vec<NewLink>,
    pub links_to_remove: Vec<String>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        self.comments_to_add.is_empty()
            && self.comments_to_edit.is_empty()
            && self.links_to_add.is_empty()
            && self.links_to_remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    //=== Identity ===
    pub key: String,
    pub project: String,

    //=== Tracker fields ===
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    /// None means unresolved
    pub resolution: Option<String>,
    pub reporter: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub affected_versions: Vec<Version>,
    /// Custom fields by field id
    pub fields: BTreeMap<String, Value>,
    pub comments: Vec<Comment>,
    pub links: Vec<Link>,

    //=== Accumulators ===
    changes: TicketChanges,

    /// Unmodified state as fetched, for diffing
    original: Option<Box<Ticket>>,
}

impl Ticket {
    /// Create a ticket with empty fields. Mostly useful for clients and tests.
    pub fn new(key: impl Into<String>, project: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            project: project.into(),
            summary: String::new(),
            description: None,
            status: "Open".to_string(),
            resolution: None,
            reporter: None,
            created: now,
            updated: now,
            affected_versions: Vec::new(),
            fields: BTreeMap::new(),
            comments: Vec::new(),
            links: Vec::new(),
            changes: TicketChanges::default(),
            original: None,
        }
    }

    /// Record the current state as the original. Called once per fetch.
    pub fn snapshot(&mut self) {
        let mut copy = self.clone();
        copy.original = None;
        copy.changes = TicketChanges::default();
        self.original = Some(Box::new(copy));
    }

    pub fn original(&self) -> Option<&Ticket> {
        self.original.as_deref()
    }

    /// Names of fields that differ from the original snapshot.
    pub fn changed_fields(&self) -> Vec<String> {
        let Some(original) = self.original() else {
            return Vec::new();
        };

        let mut changed = Vec::new();
        if self.status != original.status {
            changed.push("status".to_string());
        }
        if self.resolution != original.resolution {
            changed.push("resolution".to_string());
        }
        if self.affected_versions != original.affected_versions {
            changed.push("versions".to_string());
        }
        for (name, value) in &self.fields {
            if original.fields.get(name) != Some(value) {
                changed.push(name.clone());
            }
        }
        for name in original.fields.keys() {
            if !self.fields.contains_key(name) {
                changed.push(name.clone());
            }
        }
        changed
    }

    pub fn is_unresolved(&self) -> bool {
        self.resolution.is_none()
    }

    /// Keys of tickets this one is linked to as the outward side of `link_type`.
    pub fn outward_links(&self, link_type: &str) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(move |l| l.outward && l.link_type.eq_ignore_ascii_case(link_type))
    }

    /// Links where another ticket points at this one with `link_type`.
    pub fn inward_links(&self, link_type: &str) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(move |l| !l.outward && l.link_type.eq_ignore_ascii_case(link_type))
    }

    //=== Accumulators ===

    pub fn add_comment(&mut self, body: impl Into<String>) {
        self.changes.comments_to_add.push(NewComment { body: body.into() });
    }

    pub fn edit_comment(&mut self, comment_id: impl Into<String>, body: impl Into<String>) {
        self.changes.comments_to_edit.push(CommentEdit {
            comment_id: comment_id.into(),
            body: body.into(),
        });
    }

    pub fn add_link(&mut self, link_type: impl Into<String>, other_key: impl Into<String>) {
        self.changes.links_to_add.push(NewLink {
            link_type: link_type.into(),
            other_key: other_key.into(),
        });
    }

    pub fn remove_link(&mut self, link_id: impl Into<String>) {
        self.changes.links_to_remove.push(link_id.into());
    }

    pub fn pending_changes(&self) -> &TicketChanges {
        &self.changes
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drain the accumulators, leaving them empty.
    pub fn take_changes(&mut self) -> TicketChanges {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(id: &str, outward: bool, other: &str) -> Link {
        Link {
            id: id.to_string(),
            link_type: DUPLICATE_LINK.to_string(),
            outward,
            other_key: other.to_string(),
        }
    }

    #[test]
    fn test_new_ticket_is_unresolved() {
        let t = Ticket::new("MC-1", "MC");
        assert!(t.is_unresolved());
        assert!(t.original().is_none());
        assert!(!t.has_pending_changes());
    }

    #[test]
    fn test_snapshot_and_changed_fields() {
        let mut t = Ticket::new("MC-1", "MC");
        t.fields.insert("customfield_1".into(), json!(1));
        t.snapshot();
        assert!(t.changed_fields().is_empty());

        t.resolution = Some("Incomplete".into());
        t.fields.insert("customfield_1".into(), json!(2));
        t.fields.insert("customfield_2".into(), json!("x"));

        let changed = t.changed_fields();
        assert_eq!(changed, vec!["resolution", "customfield_1", "customfield_2"]);
    }

    #[test]
    fn test_changed_fields_reports_removed_field() {
        let mut t = Ticket::new("MC-1", "MC");
        t.fields.insert("gone".into(), json!(true));
        t.snapshot();
        t.fields.remove("gone");
        assert_eq!(t.changed_fields(), vec!["gone"]);
    }

    #[test]
    fn test_snapshot_does_not_nest() {
        let mut t = Ticket::new("MC-1", "MC");
        t.snapshot();
        t.snapshot();
        assert!(t.original().unwrap().original().is_none());
    }

    #[test]
    fn test_accumulators_take_changes() {
        let mut t = Ticket::new("MC-1", "MC");
        t.add_comment("hello");
        t.edit_comment("10", "edited");
        t.add_link(DUPLICATE_LINK, "MC-2");
        t.remove_link("99");
        assert!(t.has_pending_changes());

        let changes = t.take_changes();
        assert_eq!(changes.comments_to_add.len(), 1);
        assert_eq!(changes.comments_to_edit[0].comment_id, "10");
        assert_eq!(changes.links_to_add[0].other_key, "MC-2");
        assert_eq!(changes.links_to_remove, vec!["99"]);
        assert!(!t.has_pending_changes());
    }

    #[test]
    fn test_link_direction_filters() {
        let mut t = Ticket::new("MC-1", "MC");
        t.links = vec![link("1", true, "MC-2"), link("2", false, "MC-3"), link("3", false, "MC-4")];
        let parents: Vec<&str> = t.outward_links("duplicate").map(|l| l.other_key.as_str()).collect();
        assert_eq!(parents, vec!["MC-2"]);
        assert_eq!(t.inward_links(DUPLICATE_LINK).count(), 2);
    }
}
