//! Error types for Jolt chain parsing and application

use thiserror::Error;

/// Jolt error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JoltError {
    /// The chain text is not valid JSON
    #[error("Unable to parse Jolt spec: {message}")]
    Parse { message: String },

    /// The chain or one of its operation specs is malformed
    #[error("Invalid Jolt spec{}: {message}", .location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Spec {
        message: String,
        location: Option<String>,
    },

    /// An operation failed while transforming the input
    #[error("Jolt {operation} failed: {message}")]
    Transform {
        operation: &'static str,
        message: String,
    },
}

impl JoltError {
    /// Create a spec error without a location
    pub fn spec(message: impl Into<String>) -> Self {
        Self::Spec {
            message: message.into(),
            location: None,
        }
    }

    /// Create a spec error for a specific location in the chain
    pub fn spec_at(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spec {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Create a transform error for an operation
    pub fn transform(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transform {
            operation,
            message: message.into(),
        }
    }

    /// Attach a location to a spec error that has none
    pub fn within(self, location: impl Into<String>) -> Self {
        match self {
            Self::Spec {
                message,
                location: None,
            } => Self::Spec {
                message,
                location: Some(location.into()),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for JoltError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}
