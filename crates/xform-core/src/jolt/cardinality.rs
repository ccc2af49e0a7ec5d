//! The `cardinality` operation: force values to be single items or arrays

use super::error::JoltError;
use super::path::KeyPattern;
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, JoltError>;

/// Target shape for a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Unwrap arrays to their first element
    One,
    /// Wrap non-arrays in an array
    Many,
}

impl Cardinality {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "ONE" => Some(Self::One),
            "MANY" => Some(Self::Many),
            _ => None,
        }
    }

    fn apply(self, value: &mut Value) {
        match (self, value.take()) {
            (Cardinality::One, Value::Array(items)) => {
                *value = items.into_iter().next().unwrap_or(Value::Null);
            }
            (Cardinality::Many, taken @ Value::Array(_)) | (Cardinality::One, taken) => {
                *value = taken;
            }
            (Cardinality::Many, taken) => *value = Value::Array(vec![taken]),
        }
    }
}

/// A compiled cardinality spec
#[derive(Debug, Clone)]
pub struct CardinalitySpec {
    root: CardinalityNode,
}

#[derive(Debug, Clone, Default)]
struct CardinalityNode {
    /// `@`: applies to the node's own value before its children
    current: Option<Cardinality>,
    entries: Vec<(KeyPattern, CardinalityAction)>,
}

#[derive(Debug, Clone)]
enum CardinalityAction {
    Leaf(Cardinality),
    Recurse(CardinalityNode),
}

impl CardinalitySpec {
    /// Compile a cardinality spec object
    pub fn new(spec: &Value) -> Result<Self> {
        let Value::Object(map) = spec else {
            return Err(JoltError::spec("cardinality spec must be a JSON object"));
        };
        Ok(Self {
            root: CardinalityNode::compile(map, "")?,
        })
    }

    pub fn apply(&self, mut input: Value) -> Value {
        self.root.apply(&mut input);
        input
    }
}

impl CardinalityNode {
    fn compile(spec: &Map<String, Value>, location: &str) -> Result<Self> {
        let mut node = CardinalityNode::default();
        for (key, value) in spec {
            let here = if location.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", location, key)
            };
            let action = match value {
                Value::Object(child) => CardinalityAction::Recurse(CardinalityNode::compile(child, &here)?),
                Value::String(text) => CardinalityAction::Leaf(Cardinality::parse(text).ok_or_else(|| {
                    JoltError::spec_at(&here, format!("cardinality must be ONE or MANY, got '{}'", text))
                })?),
                _ => {
                    return Err(JoltError::spec_at(
                        here,
                        "cardinality leaf must be \"ONE\" or \"MANY\"",
                    ))
                }
            };

            if key == "@" {
                match action {
                    CardinalityAction::Leaf(cardinality) => node.current = Some(cardinality),
                    CardinalityAction::Recurse(_) => {
                        return Err(JoltError::spec_at(here, "'@' must map to ONE or MANY"))
                    }
                }
            } else {
                node.entries.push((KeyPattern::parse(key), action));
            }
        }
        Ok(node)
    }

    fn apply(&self, target: &mut Value) {
        if let Some(cardinality) = self.current {
            cardinality.apply(target);
        }

        match target {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if let Some(action) = self.action_for(key) {
                        action.apply(value);
                    }
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter_mut().enumerate() {
                    if let Some(action) = self.action_for(&index.to_string()) {
                        action.apply(value);
                    }
                }
            }
            _ => {}
        }
    }

    fn action_for(&self, key: &str) -> Option<&CardinalityAction> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(key).is_some())
            .map(|(_, action)| action)
    }
}

impl CardinalityAction {
    fn apply(&self, value: &mut Value) {
        match self {
            CardinalityAction::Leaf(cardinality) => cardinality.apply(value),
            CardinalityAction::Recurse(node) => node.apply(value),
        }
    }
}
