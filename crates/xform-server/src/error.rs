//! Error types for the xform server
//!
//! Only startup concerns live here: configuration, logging setup and the
//! listener. Evaluation failures never surface as a `ServerError`; they are
//! folded into error envelopes by the dispatcher.

use std::io;
use std::path::PathBuf;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Main error type for server startup and lifecycle
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON configuration parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Tracing subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Listener or serve loop failure
    #[error("Server error: {0}")]
    Server(#[from] io::Error),
}

impl ServerError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
