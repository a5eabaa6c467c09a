//! Error types for ticketwarden
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in ticketwarden
#[derive(Debug, Error)]
pub enum WardenError {
    /// Configuration is unusable (malformed URL, empty credential). Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The tracker rejected our credentials or session
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The tracker answered with an error status
    #[error("Tracker error {status}: {message}")]
    Tracker { status: u16, message: String },

    /// The tracker answered with something we could not interpret
    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),

    /// No client handle has been established yet
    #[error("Not connected to tracker")]
    NotConnected,

    /// Checkpoint persistence error
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Error raised from inside a module handler
    #[error("Module error: {0}")]
    Module(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl WardenError {
    /// Fatal errors halt the process instead of entering the relog backoff.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WardenError::Configuration(_))
    }
}

/// Result type alias for ticketwarden operations
pub type Result<T> = std::result::Result<T, WardenError>;
