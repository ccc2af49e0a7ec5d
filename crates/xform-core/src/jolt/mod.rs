//! Jolt JSON-to-JSON transformation chains
//!
//! A chain is an ordered list of operations (`shift`, `default`, `remove`,
//! `sort`, `cardinality` and the `modify-overwrite-beta`,
//! `modify-default-beta` and `modify-define-beta` family), each fed the
//! output of the previous one.
//!
//! ```
//! use xform_core::jolt::Chain;
//! use serde_json::json;
//!
//! let chain: Chain = r#"[{"operation": "shift", "spec": {"a": "b"}}]"#.parse().unwrap();
//! assert_eq!(chain.apply(json!({"a": 5})).unwrap(), json!({"b": 5}));
//! ```

pub mod cardinality;
pub mod default;
pub mod error;
pub mod functions;
pub mod modify;
pub mod path;
pub mod remove;
pub mod shift;
pub mod sort;
pub mod spec;

pub use error::JoltError;
pub use spec::Operation;

use serde_json::Value;
use std::str::FromStr;
use tracing::trace;

/// A parsed, reusable transformation chain
#[derive(Debug, Clone)]
pub struct Chain {
    operations: Vec<Operation>,
}

impl Chain {
    /// Build a chain from its JSON description
    pub fn from_value(spec: &Value) -> Result<Self, JoltError> {
        let Value::Array(entries) = spec else {
            return Err(JoltError::spec(
                "a chain spec must be a JSON array of operations",
            ));
        };
        let operations = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| Operation::from_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { operations })
    }

    /// Operations in application order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Run every operation in order
    pub fn apply(&self, input: Value) -> Result<Value, JoltError> {
        self.operations
            .iter()
            .enumerate()
            .try_fold(input, |value, (index, operation)| {
                trace!(index, operation = operation.name(), "applying jolt operation");
                operation.apply(value)
            })
    }
}

impl FromStr for Chain {
    type Err = JoltError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(spec)?;
        Self::from_value(&value)
    }
}
