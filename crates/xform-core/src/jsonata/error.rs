//! Error types for JSONata compilation and evaluation
//!
//! Codes follow the JSONata reference numbering: `S0xxx` for syntax,
//! `T0xxx`/`T1xxx`/`T2xxx` for type errors and `D1xxx`/`D3xxx` for dynamic
//! failures raised while evaluating.

use thiserror::Error;

/// JSONata error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonataError {
    /// Syntax errors during tokenizing or parsing
    #[error("{code}: {message} (at position {position})")]
    Syntax {
        code: &'static str,
        message: String,
        position: usize,
    },

    /// Operand or argument of the wrong type
    #[error("{code}: {message}")]
    Type { code: &'static str, message: String },

    /// Builtin function failures
    #[error("{code}: {function}() - {message}")]
    Function {
        code: &'static str,
        function: String,
        message: String,
    },

    /// Runtime failures that are not type related
    #[error("{code}: {message}")]
    Evaluation { code: &'static str, message: String },

    /// Evaluation nested deeper than the configured limit
    #[error("U1001: Stack overflow error: evaluation exceeded the maximum depth of {limit}")]
    DepthExceeded { limit: usize },
}

impl JsonataError {
    /// Create a syntax error at a byte position
    pub fn syntax(code: &'static str, message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            code,
            message: message.into(),
            position,
        }
    }

    /// Create a type error
    pub fn type_error(code: &'static str, message: impl Into<String>) -> Self {
        Self::Type {
            code,
            message: message.into(),
        }
    }

    /// Create a builtin function error
    pub fn function(
        code: &'static str,
        function: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Function {
            code,
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a dynamic evaluation error
    pub fn evaluation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Evaluation {
            code,
            message: message.into(),
        }
    }

    /// The JSONata error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { code, .. }
            | Self::Type { code, .. }
            | Self::Function { code, .. }
            | Self::Evaluation { code, .. } => code,
            Self::DepthExceeded { .. } => "U1001",
        }
    }

    /// Byte position for syntax errors
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Whether the failure happened before evaluation started
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}
