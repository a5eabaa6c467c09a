//! Comment dedup cache - two generations of posted comment texts per ticket
//!
//! `new` collects what this cycle posted, `old` holds the previous cycle. A
//! text found in either is a duplicate, which covers both repeated posts within
//! one cycle and a retry of a cycle whose checkpoint was never written.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct CommentCache {
    new: HashMap<String, HashSet<String>>,
    old: HashMap<String, HashSet<String>>,
}

impl CommentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, ticket: &str, body: &str) -> bool {
        [&self.new, &self.old]
            .iter()
            .any(|generation| generation.get(ticket).is_some_and(|texts| texts.contains(body)))
    }

    pub fn record(&mut self, ticket: &str, body: &str) {
        self.new.entry(ticket.to_string()).or_default().insert(body.to_string());
    }

    /// Rotate `new` into `old`. Runs at the end of every cycle.
    pub fn flush(&mut self) {
        self.old = std::mem::take(&mut self.new);
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.old.is_empty()
    }
}
