//! Module scope - which tickets a module looks at
//!
//! The same scope renders to a JQL clause for the search and is checked again
//! in memory before dispatch, since one registry search serves many modules.

use crate::config::ModuleConfig;
use crate::domain::Ticket;

/// Resolution filter value meaning "no resolution"
pub const UNRESOLVED: &str = "Unresolved";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleScope {
    pub projects: Option<Vec<String>>,
    pub resolutions: Option<Vec<String>>,
    pub excluded_statuses: Vec<String>,
    /// Replaces `projects` when set
    pub ticket_whitelist: Option<Vec<String>>,
}

/// Quote a JQL string literal
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Comma-separated JQL string literals
pub fn quoted_list<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values.into_iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
}

impl ModuleScope {
    pub fn from_config(config: &ModuleConfig, ticket_whitelist: Option<&Vec<String>>) -> Self {
        Self {
            projects: config.project_whitelist.clone(),
            resolutions: config.resolution_filter.clone(),
            excluded_statuses: config.excluded_statuses.clone(),
            ticket_whitelist: ticket_whitelist.cloned(),
        }
    }

    /// JQL clauses joined with AND, or None when the scope is unrestricted.
    pub fn to_jql(&self) -> Option<String> {
        let mut clauses = Vec::new();

        if let Some(keys) = &self.ticket_whitelist {
            clauses.push(format!("key IN ({})", quoted_list(keys)));
        } else if let Some(projects) = &self.projects {
            clauses.push(format!("project IN ({})", quoted_list(projects)));
        }

        if let Some(resolutions) = &self.resolutions {
            let named: Vec<String> = resolutions.iter().filter(|r| r.as_str() != UNRESOLVED).cloned().collect();
            let unresolved = named.len() != resolutions.len();
            let clause = match (unresolved, named.is_empty()) {
                (true, true) => "resolution IS EMPTY".to_string(),
                (true, false) => format!("(resolution IS EMPTY OR resolution IN ({}))", quoted_list(&named)),
                (false, _) => format!("resolution IN ({})", quoted_list(&named)),
            };
            clauses.push(clause);
        }

        if !self.excluded_statuses.is_empty() {
            clauses.push(format!("status NOT IN ({})", quoted_list(&self.excluded_statuses)));
        }

        if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
    }

    /// In-memory check mirroring `to_jql`.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(keys) = &self.ticket_whitelist {
            if !keys.iter().any(|k| k.eq_ignore_ascii_case(&ticket.key)) {
                return false;
            }
        } else if let Some(projects) = &self.projects {
            if !projects.iter().any(|p| p.eq_ignore_ascii_case(&ticket.project)) {
                return false;
            }
        }

        if let Some(resolutions) = &self.resolutions {
            let ok = match &ticket.resolution {
                None => resolutions.iter().any(|r| r == UNRESOLVED),
                Some(res) => resolutions.iter().any(|r| r.eq_ignore_ascii_case(res)),
            };
            if !ok {
                return false;
            }
        }

        !self.excluded_statuses.iter().any(|s| s.eq_ignore_ascii_case(&ticket.status))
    }
}
