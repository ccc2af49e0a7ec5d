//! Error types for the xform core library
//!
//! This module defines the top-level error type returned by the dispatcher's
//! engine invocation. Each engine keeps its own error enum; they are folded
//! into [`Error`] so the dispatcher has a single failure type to render.

use crate::jolt::JoltError;
use crate::jsonata::JsonataError;
use thiserror::Error;

/// Main error type for xform operations
#[derive(Error, Debug)]
pub enum Error {
    /// The request envelope is missing a field or has the wrong shape
    #[error("Invalid request: {message}")]
    Request {
        message: String,
        field: Option<String>,
    },

    /// JSONata compilation or evaluation failed
    #[error("{0}")]
    Jsonata(#[from] JsonataError),

    /// Jolt spec parsing or chain application failed
    #[error("{0}")]
    Jolt(#[from] JoltError),

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a request validation error for a specific field
    pub fn request(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error without an underlying source
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Short machine-friendly category, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Request { .. } => "request",
            Error::Jsonata(_) => "jsonata",
            Error::Jolt(_) => "jolt",
            Error::Json { .. } => "json",
            Error::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
