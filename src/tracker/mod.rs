//! Tracker client layer - the remote ticket tracker behind a trait
//!
//! This module provides:
//! - TrackerClient / Connector traits for API abstraction
//! - JiraClient / JiraConnector implementation over reqwest
//! - MockTrackerClient / MockConnector for tests

pub mod client;
pub mod jira;
pub mod mock;

pub use client::{Connector, FieldUpdate, PAGE_SIZE, SearchPage, TrackerClient};
pub use jira::{JiraClient, JiraConfig, JiraConnector};
pub use mock::{MockConnector, MockTrackerClient, TrackerCall};
