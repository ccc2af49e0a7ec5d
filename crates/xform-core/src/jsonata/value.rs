//! Runtime values for JSONata evaluation
//!
//! JSONata distinguishes *undefined* (no value) from JSON `null`, and treats
//! functions and regexes as first-class values. Neither exists in
//! `serde_json::Value`, so evaluation runs on this richer type and converts
//! at the boundary.

use super::ast::LambdaExpr;
use super::error::JsonataError;
use super::evaluator::Evaluator;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Number;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Largest integer an f64 holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Object members in insertion order
pub type Object = IndexMap<String, Value>;

/// Signature of a builtin function
pub type BuiltinFn = fn(&Evaluator, &[Value], &Value) -> Result<Value, JsonataError>;

/// A JSONata runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Shared so that paths return the same object they navigated into
    Object(Rc<Object>),
    Lambda(Rc<Closure>),
    Builtin(Builtin),
    Regex(Regex),
}

/// A user-defined function together with its captured scope
pub struct Closure {
    pub lambda: Rc<LambdaExpr>,
    pub env: Rc<Frame>,
    /// Context value at the point of definition
    pub context: Value,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lambda({})>", self.lambda.params.join(", "))
    }
}

/// A native function
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
    /// Substitute the context value when called without arguments
    pub context_arg: bool,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin ${}>", self.name)
    }
}

/// A lexical scope of variable bindings
#[derive(Default)]
pub struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    /// Create a top-level scope
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Create a scope nested inside `parent`
    pub fn child(parent: &Rc<Frame>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Bind a variable in this scope
    pub fn bind(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Resolve a variable through the enclosing scopes
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Drop all bindings, breaking closure reference cycles
    pub fn clear(&self) {
        self.bindings.borrow_mut().clear();
    }
}

impl Value {
    pub fn object(members: Object) -> Value {
        Value::Object(Rc::new(members))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Builtin(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Collapse a sequence: nothing is undefined, one item is the item
    pub fn from_sequence(mut items: Vec<Value>) -> Value {
        match items.len() {
            0 => Value::Undefined,
            1 => items.pop().unwrap_or(Value::Undefined),
            _ => Value::Array(items),
        }
    }

    /// View a value as a sequence of items
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Undefined => Vec::new(),
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    /// Number of declared parameters for functions
    pub fn arity(&self) -> usize {
        match self {
            Value::Lambda(closure) => closure.lambda.params.len(),
            Value::Builtin(_) => 1,
            _ => 0,
        }
    }

    /// JSONata type name as returned by `$type`
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Value::Undefined => None,
            Value::Null => Some("null"),
            Value::Bool(_) => Some("boolean"),
            Value::Number(_) => Some("number"),
            Value::String(_) => Some("string"),
            Value::Array(_) => Some("array"),
            Value::Object(_) => Some("object"),
            Value::Lambda(_) | Value::Builtin(_) => Some("function"),
            Value::Regex(_) => Some("regex"),
        }
    }

    /// JSONata truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => match items.len() {
                0 => false,
                1 => items[0].is_truthy(),
                _ => items.iter().any(Value::is_truthy),
            },
            Value::Object(map) => !map.is_empty(),
            Value::Lambda(_) | Value::Builtin(_) => false,
            Value::Regex(_) => true,
        }
    }

    /// Structural equality used by `=`, `in` and `$distinct`
    pub fn deep_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map_or(false, |w| v.deep_equals(w)))
            }
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }

    /// Convert to plain JSON; undefined becomes `null`, functions become `""`
    pub fn to_json(&self) -> Result<serde_json::Value, JsonataError> {
        Ok(match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(number_to_json(*n)?),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter().filter(|v| !v.is_undefined()) {
                    out.push(item.to_json()?);
                }
                serde_json::Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                    out.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Value::Lambda(_) | Value::Builtin(_) | Value::Regex(_) => {
                serde_json::Value::String(String::new())
            }
        })
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Render a number as JSON, using an integer where it is exact
pub fn number_to_json(n: f64) -> Result<Number, JsonataError> {
    if !n.is_finite() {
        return Err(JsonataError::evaluation(
            "D1001",
            format!("Number out of range: {}", n),
        ));
    }
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Ok(Number::from(n as i64));
    }
    Number::from_f64(n)
        .ok_or_else(|| JsonataError::evaluation("D1001", format!("Number out of range: {}", n)))
}

/// Round to 15 significant digits, hiding binary floating point noise
pub fn round_significant(n: f64) -> f64 {
    if n == 0.0 || !n.is_finite() {
        return n;
    }
    format!("{:.14e}", n).parse().unwrap_or(n)
}

/// Format a number the way `$string` does
///
/// Magnitudes of 1e21 and above or below 1e-6 use exponent notation with
/// an explicit sign, as in `1e+21` and `1.5e-7`.
pub fn format_number(n: f64) -> String {
    let rounded = round_significant(n);
    let magnitude = rounded.abs();
    if magnitude != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        let text = format!("{:e}", rounded);
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => text,
        };
    }
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i128)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(!Value::Array(vec![Value::Bool(false)]).is_truthy());
        assert!(Value::Array(vec![Value::Bool(false), Value::Number(1.0)]).is_truthy());
        assert!(!Value::object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let value = Value::from(&json!({"a": [1, 2.5, "x", null]}));
        assert_eq!(value.to_json().unwrap(), json!({"a": [1, 2.5, "x", null]}));
    }

    #[test]
    fn test_non_finite_number_is_an_error() {
        let err = Value::Number(f64::INFINITY).to_json().unwrap_err();
        assert_eq!(err.code(), "D1001");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(0.000001), "0.000001");
    }

    #[test]
    fn test_format_number_exponents() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-1.25e22), "-1.25e+22");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn test_sequence_collapse() {
        assert!(Value::from_sequence(vec![]).is_undefined());
        assert!(matches!(
            Value::from_sequence(vec![Value::Number(1.0)]),
            Value::Number(_)
        ));
    }

    #[test]
    fn test_frame_lookup_walks_parents() {
        let root = Frame::root();
        root.bind("x", Value::Number(1.0));
        let child = Frame::child(&root);
        child.bind("y", Value::Bool(true));
        assert!(child.lookup("x").is_some());
        assert!(root.lookup("y").is_none());
    }
}
