//! JSONata query and transformation language
//!
//! An expression is compiled once into an AST and can then be evaluated
//! against any number of JSON inputs:
//!
//! ```
//! use xform_core::jsonata::Jsonata;
//! use serde_json::json;
//!
//! let expr = Jsonata::compile("$sum(items.price)").unwrap();
//! let total = expr.evaluate(&json!({"items": [{"price": 2}, {"price": 3}]})).unwrap();
//! assert_eq!(total, json!(5));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::JsonataError;
pub use evaluator::DEFAULT_MAX_DEPTH;

use ast::Expr;
use evaluator::Evaluator;
use value::{Frame, Value};

/// A compiled JSONata expression
#[derive(Debug, Clone)]
pub struct Jsonata {
    source: String,
    expr: Expr,
    max_depth: usize,
}

impl Jsonata {
    /// Compile an expression
    pub fn compile(expression: &str) -> Result<Self, JsonataError> {
        let expr = parser::parse(expression)?;
        Ok(Self {
            source: expression.to_string(),
            expr,
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    /// Override the maximum evaluation depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The expression text this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against an input document; an undefined result is `null`
    pub fn evaluate(&self, input: &serde_json::Value) -> Result<serde_json::Value, JsonataError> {
        let root = Value::from(input);
        let evaluator = Evaluator::new(root.clone(), self.max_depth);
        let result = evaluator.evaluate(&self.expr, &root, &Frame::root())?;
        result.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_once_evaluate_many() {
        let expr = Jsonata::compile("name & '!'").unwrap();
        assert_eq!(expr.evaluate(&json!({"name": "a"})).unwrap(), json!("a!"));
        assert_eq!(expr.evaluate(&json!({"name": "b"})).unwrap(), json!("b!"));
        assert_eq!(expr.source(), "name & '!'");
    }

    #[test]
    fn test_null_input() {
        let expr = Jsonata::compile("$").unwrap();
        assert_eq!(expr.evaluate(&json!(null)).unwrap(), json!(null));
        let literal = Jsonata::compile("'constant'").unwrap();
        assert_eq!(literal.evaluate(&json!(null)).unwrap(), json!("constant"));
    }

    #[test]
    fn test_custom_depth_limit() {
        let expr = Jsonata::compile("[[[[1]]]]").unwrap().with_max_depth(3);
        assert!(matches!(
            expr.evaluate(&json!(null)),
            Err(JsonataError::DepthExceeded { limit: 3 })
        ));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = Jsonata::compile("Account.Order[").unwrap_err();
        assert!(err.is_syntax());
        assert!(err.position().is_some());
    }
}
