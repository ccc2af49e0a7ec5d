//! The `default` operation: fill in values that are missing or null

use super::error::JoltError;
use super::path::KeyPattern;
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, JoltError>;

/// A compiled default spec
#[derive(Debug, Clone)]
pub struct Defaults {
    root: DefaultNode,
}

#[derive(Debug, Clone, Default)]
struct DefaultNode {
    /// Literal keys, each possibly listing several `|` alternatives
    literals: Vec<(Vec<String>, DefaultValue)>,
    /// `*` style keys applied to every existing matching child
    wildcards: Vec<(KeyPattern, DefaultValue)>,
}

#[derive(Debug, Clone)]
enum DefaultValue {
    /// Nested spec; `array` is set by a `key[]` spec key
    Node { node: DefaultNode, array: bool },
    Leaf(Value),
}

impl Defaults {
    /// Compile a default spec object
    pub fn new(spec: &Value) -> Result<Self> {
        let Value::Object(map) = spec else {
            return Err(JoltError::spec("default spec must be a JSON object"));
        };
        Ok(Self {
            root: DefaultNode::compile(map)?,
        })
    }

    pub fn apply(&self, input: Value) -> Value {
        let mut output = match input {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        self.root.apply(&mut output);
        output
    }
}

impl DefaultNode {
    fn compile(spec: &Map<String, Value>) -> Result<Self> {
        let mut node = DefaultNode::default();
        for (key, value) in spec {
            let (key, array) = match key.strip_suffix("[]") {
                Some(stripped) => (stripped, true),
                None => (key.as_str(), false),
            };
            let value = match value {
                Value::Object(child) => DefaultValue::Node {
                    node: DefaultNode::compile(child)?,
                    array,
                },
                leaf => DefaultValue::Leaf(leaf.clone()),
            };

            if key.contains('*') {
                node.wildcards.push((KeyPattern::parse(key), value));
            } else {
                let names = key.split('|').map(str::to_string).collect();
                node.literals.push((names, value));
            }
        }
        Ok(node)
    }

    fn apply(&self, target: &mut Value) {
        for (names, value) in &self.literals {
            for name in names {
                match target {
                    Value::Object(map) => {
                        let slot = map.entry(name.clone()).or_insert(Value::Null);
                        value.fill(slot);
                    }
                    Value::Array(items) => {
                        let Ok(index) = name.parse::<usize>() else {
                            continue;
                        };
                        if items.len() <= index {
                            items.resize(index + 1, Value::Null);
                        }
                        value.fill(&mut items[index]);
                    }
                    _ => {}
                }
            }
        }

        for (pattern, value) in &self.wildcards {
            match target {
                Value::Object(map) => {
                    for (key, slot) in map.iter_mut() {
                        if pattern.matches(key).is_some() {
                            value.fill_existing(slot);
                        }
                    }
                }
                Value::Array(items) => {
                    for (index, slot) in items.iter_mut().enumerate() {
                        if pattern.matches(&index.to_string()).is_some() {
                            value.fill_existing(slot);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl DefaultValue {
    /// Apply to a slot that may be missing
    fn fill(&self, slot: &mut Value) {
        match self {
            DefaultValue::Leaf(default) => {
                if slot.is_null() {
                    *slot = default.clone();
                }
            }
            DefaultValue::Node { node, array } => {
                if slot.is_null() {
                    *slot = if *array {
                        Value::Array(Vec::new())
                    } else {
                        Value::Object(Map::new())
                    };
                }
                node.apply(slot);
            }
        }
    }

    /// Apply to an existing child matched by a wildcard
    fn fill_existing(&self, slot: &mut Value) {
        match self {
            DefaultValue::Leaf(_) => self.fill(slot),
            DefaultValue::Node { node, .. } => node.apply(slot),
        }
    }
}
