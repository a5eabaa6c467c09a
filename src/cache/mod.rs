//! Caches owned by the executor
//!
//! - QueryCache: ticket lists per exact query, cleared every registry pass
//! - ProjectCache: project metadata, refreshed wholesale on a TTL
//! - CommentCache: two-generation dedup of posted comments
//! - MutationBatchCache: one pending field edit + transition per ticket

pub mod comments;
pub mod mutation;
pub mod project;
pub mod query;

pub use comments::CommentCache;
pub use mutation::{DEFAULT_TRANSITION, MutationBatchCache, MutationFailure, PendingMutation};
pub use project::{PROJECT_CACHE_TTL, ProjectCache};
pub use query::QueryCache;
