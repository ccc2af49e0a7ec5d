//! Error types and handling for the CLI
//!
//! An error envelope from the engine is not an `Error`: it is printed like
//! any other result and mapped to exit code 2 by `main`.

use std::io;
use std::path::PathBuf;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code used when evaluation produced an error envelope
pub const EXIT_EVALUATION_FAILED: i32 = 2;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (file operations, stdin, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File not found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Input document could not be parsed
    #[error("Invalid input in {source_name}: {message}")]
    InvalidInput { source_name: String, message: String },

    /// Invalid argument combination
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidInput {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::FileNotFound { .. } => 3,
            Self::InvalidInput { .. } => 4,
            Self::InvalidArgs(_) => 5,
            Self::Json(_) => 6,
            Self::Yaml(_) => 7,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), error)
    } else {
        format!("Error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_do_not_collide_with_evaluation_failure() {
        let errors = [
            Error::Io(io::Error::new(io::ErrorKind::Other, "x")),
            Error::FileNotFound { path: PathBuf::from("a") },
            Error::invalid_input("stdin", "bad"),
            Error::invalid_args("bad"),
            Error::other("bad"),
        ];
        for error in errors {
            assert_ne!(error.exit_code(), EXIT_EVALUATION_FAILED);
            assert_ne!(error.exit_code(), 0);
        }
    }

    #[test]
    fn test_format_error_without_color() {
        let error = Error::invalid_args("no expression given");
        assert_eq!(
            format_error(&error, false),
            "Error: Invalid arguments: no expression given"
        );
        assert!(error.should_show_help());
    }
}
