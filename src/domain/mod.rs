//! Domain types for ticketwarden
//!
//! This module contains all core domain types:
//! - Ticket: tracker fields plus the per-ticket change accumulators
//! - ExecutionTimeframe: the bounded window one poll cycle covers
//! - ModuleOutcome / ModuleFailure: the result of running one module on one ticket
//! - ProjectMetadata / Version: project-level data served by the project cache

pub mod outcome;
pub mod project;
pub mod ticket;
pub mod timeframe;

pub use outcome::{ModuleFailure, ModuleOutcome, ModuleResult};
pub use project::{ProjectMetadata, Version};
pub use ticket::{Comment, CommentEdit, Link, NewComment, NewLink, Ticket, TicketChanges};
pub use timeframe::{ExecutionTimeframe, MAX_CATCH_UP};
