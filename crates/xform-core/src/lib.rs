//! xform Core - evaluation engine for JSON transformation requests
//!
//! This crate accepts a JSON document together with a JSONata expression or
//! a Jolt chain spec and produces the transformed document inside a uniform
//! response envelope.
//!
//! # Main Components
//!
//! - **Envelopes**: request/response types for the evaluate operation
//! - **Dispatcher**: selects the engine by mode and normalizes every outcome
//! - **JSONata**: compiler and evaluator for JSONata expressions
//! - **Jolt**: chain parser and the shift/default/remove/sort/cardinality operations
//! - **Error Handling**: layered error types using `thiserror`
//!
//! # Example
//!
//! ```
//! use xform_core::{Dispatcher, EvaluateRequest};
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new();
//! let response = dispatcher.evaluate(&EvaluateRequest::new("a.b", json!({"a": {"b": 5}})));
//! assert!(response.is_success());
//! assert_eq!(response.result(), Some(&json!(5)));
//! ```

pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod jolt;
pub mod jsonata;

// Re-export main types for convenience
pub use dispatcher::{Dispatcher, Evaluation};
pub use envelope::{
    EngineKind, EvaluateRequest, EvaluateResponse, Mode, Status, JOLT_ENGINE, JSONATA_ENGINE,
};
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
