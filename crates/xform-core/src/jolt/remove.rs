//! The `remove` operation: delete keys named by the spec

use super::error::JoltError;
use super::path::KeyPattern;
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, JoltError>;

/// A compiled remove spec
#[derive(Debug, Clone)]
pub struct Remove {
    root: RemoveNode,
}

#[derive(Debug, Clone, Default)]
struct RemoveNode {
    entries: Vec<(KeyPattern, RemoveAction)>,
}

#[derive(Debug, Clone)]
enum RemoveAction {
    Delete,
    Recurse(RemoveNode),
}

impl Remove {
    /// Compile a remove spec object
    pub fn new(spec: &Value) -> Result<Self> {
        let Value::Object(map) = spec else {
            return Err(JoltError::spec("remove spec must be a JSON object"));
        };
        Ok(Self {
            root: RemoveNode::compile(map)?,
        })
    }

    pub fn apply(&self, mut input: Value) -> Value {
        self.root.apply(&mut input);
        input
    }
}

impl RemoveNode {
    fn compile(spec: &Map<String, Value>) -> Result<Self> {
        let mut entries = Vec::with_capacity(spec.len());
        for (key, value) in spec {
            let action = match value {
                Value::Object(child) => RemoveAction::Recurse(RemoveNode::compile(child)?),
                Value::String(s) if s.is_empty() => RemoveAction::Delete,
                Value::Null => RemoveAction::Delete,
                _ => {
                    return Err(JoltError::spec_at(
                        key.clone(),
                        "remove leaf must be an empty string or an object",
                    ))
                }
            };
            entries.push((KeyPattern::parse(key), action));
        }
        Ok(Self { entries })
    }

    fn apply(&self, target: &mut Value) {
        match target {
            Value::Object(map) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                for key in keys {
                    let Some(action) = self.action_for(&key) else {
                        continue;
                    };
                    match action {
                        RemoveAction::Delete => {
                            map.shift_remove(&key);
                        }
                        RemoveAction::Recurse(node) => {
                            if let Some(child) = map.get_mut(&key) {
                                node.apply(child);
                            }
                        }
                    }
                }
            }
            Value::Array(items) => {
                let mut doomed = Vec::new();
                for (index, item) in items.iter_mut().enumerate() {
                    match self.action_for(&index.to_string()) {
                        Some(RemoveAction::Delete) => doomed.push(index),
                        Some(RemoveAction::Recurse(node)) => node.apply(item),
                        None => {}
                    }
                }
                for index in doomed.into_iter().rev() {
                    items.remove(index);
                }
            }
            _ => {}
        }
    }

    /// The first entry matching a key
    fn action_for(&self, key: &str) -> Option<&RemoveAction> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(key).is_some())
            .map(|(_, action)| action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remove(spec: Value, input: Value) -> Value {
        Remove::new(&spec).unwrap().apply(input)
    }

    #[test]
    fn test_removes_leaves() {
        let spec = json!({"password": "", "meta": {"internal": ""}});
        let input = json!({"user": "a", "password": "x", "meta": {"internal": 1, "public": 2}});
        assert_eq!(
            remove(spec, input),
            json!({"user": "a", "meta": {"public": 2}})
        );
    }

    #[test]
    fn test_wildcards_and_arrays() {
        let spec = json!({"rows": {"*": {"debug*": ""}}, "0": ""});
        let input = json!({"rows": [{"id": 1, "debugA": 1}, {"id": 2, "debugB": 2}]});
        assert_eq!(
            remove(spec, input),
            json!({"rows": [{"id": 1}, {"id": 2}]})
        );
    }

    #[test]
    fn test_removes_array_indices() {
        let spec = json!({"list": {"0|2": ""}});
        let input = json!({"list": ["a", "b", "c", "d"]});
        assert_eq!(remove(spec, input), json!({"list": ["b", "d"]}));
    }

    #[test]
    fn test_invalid_leaf() {
        assert!(Remove::new(&json!({"a": 1})).is_err());
    }
}
