//! The `modify-*-beta` operations: compute values in place
//!
//! Spec leaves are either literals, `@(up,path)` lookups into the input or
//! `=function(args)` calls from [`super::functions`]. The three flavours only
//! differ in when a leaf is written:
//!
//! - overwrite always writes
//! - default writes when the key is missing or null
//! - define writes when the key is missing
//!
//! Lookups and function arguments read the document as it was before the
//! operation started, so the order of keys in the spec does not matter.

use super::error::JoltError;
use super::functions::{self, ModifyFn};
use super::path::{KeyPattern, Transpose, WalkedPath};
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, JoltError>;

/// Highest array index a modify spec may write to
const MAX_INDEX: usize = 1 << 16;

static NULL: Value = Value::Null;

/// When a leaf replaces what is already there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Overwrite,
    Default,
    Define,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Overwrite => "modify-overwrite-beta",
            Mode::Default => "modify-default-beta",
            Mode::Define => "modify-define-beta",
        }
    }

    fn writes_over(self, existing: Option<&Value>) -> bool {
        match self {
            Mode::Overwrite => true,
            Mode::Default => existing.map_or(true, Value::is_null),
            Mode::Define => existing.is_none(),
        }
    }
}

/// A compiled modify spec
#[derive(Debug, Clone)]
pub struct Modify {
    mode: Mode,
    root: ModifyNode,
}

#[derive(Debug, Clone, Default)]
struct ModifyNode {
    literals: Vec<(String, ModifyAction)>,
    /// Applied to every existing child not named by a literal key
    wildcards: Vec<(KeyPattern, ModifyAction)>,
}

#[derive(Debug, Clone)]
enum ModifyAction {
    Node(ModifyNode),
    Leaf(Producer),
}

#[derive(Debug, Clone)]
enum Producer {
    Literal(Value),
    Lookup(Transpose),
    Call { function: ModifyFn, args: Vec<Arg> },
}

#[derive(Debug, Clone)]
enum Arg {
    Literal(Value),
    Lookup(Transpose),
}

impl Modify {
    /// Compile a modify spec object
    pub fn new(mode: Mode, spec: &Value) -> Result<Self> {
        let Value::Object(map) = spec else {
            return Err(JoltError::spec(format!("{} spec must be a JSON object", mode.name())));
        };
        Ok(Self {
            mode,
            root: ModifyNode::compile(map)?,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn apply(&self, input: Value) -> Result<Value> {
        let source = match input {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let mut output = source.clone();
        let mut walked = WalkedPath::new("modify", &source);
        self.root.apply(&source, &mut output, &mut walked, self.mode)?;
        Ok(output)
    }
}

impl ModifyNode {
    fn compile(spec: &Map<String, Value>) -> Result<Self> {
        let mut node = ModifyNode::default();
        for (key, value) in spec {
            let action = match value {
                Value::Object(child) => ModifyAction::Node(ModifyNode::compile(child)?),
                leaf => ModifyAction::Leaf(
                    Producer::compile(leaf).map_err(|err| err.within(key.as_str()))?,
                ),
            };
            if key.contains('*') {
                node.wildcards.push((KeyPattern::parse(key), action));
            } else {
                node.literals.push((key.clone(), action));
            }
        }
        Ok(node)
    }

    fn apply<'a>(
        &self,
        source: &'a Value,
        target: &mut Value,
        walked: &mut WalkedPath<'a>,
        mode: Mode,
    ) -> Result<()> {
        for (name, action) in &self.literals {
            let value = child(source, name).unwrap_or(&NULL);
            walked.push(name.as_str(), Vec::new(), value);
            let result = action.apply(name, value, target, walked, mode);
            walked.pop();
            result?;
        }

        if self.wildcards.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = match source {
            Value::Object(map) => map.keys().cloned().collect(),
            Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };
        for (pattern, action) in &self.wildcards {
            for key in &keys {
                if self.literals.iter().any(|(name, _)| name == key) {
                    continue;
                }
                let Some(captures) = pattern.matches(key) else {
                    continue;
                };
                let value = child(source, key).unwrap_or(&NULL);
                walked.push(key.as_str(), captures, value);
                let result = action.apply(key, value, target, walked, mode);
                walked.pop();
                result?;
            }
        }
        Ok(())
    }
}

impl ModifyAction {
    fn apply<'a>(
        &self,
        key: &str,
        source: &'a Value,
        target: &mut Value,
        walked: &mut WalkedPath<'a>,
        mode: Mode,
    ) -> Result<()> {
        match self {
            ModifyAction::Leaf(producer) => {
                let present = existing(target, key);
                if !mode.writes_over(present) {
                    return Ok(());
                }
                let current = present.cloned().unwrap_or(Value::Null);
                if let Some(value) = producer.produce(&current, walked)? {
                    store(target, key, value)?;
                }
            }
            ModifyAction::Node(node) => {
                // what was there before an object had to be created
                let replaced = match existing(target, key) {
                    Some(Value::Object(_) | Value::Array(_)) => None,
                    Some(Value::Null) if mode != Mode::Define => Some(Some(Value::Null)),
                    Some(_) => return Ok(()),
                    None => Some(None),
                };
                if replaced.is_some() && !store(target, key, Value::Object(Map::new()))? {
                    return Ok(());
                }
                let Some(child) = existing_mut(target, key) else {
                    return Ok(());
                };
                node.apply(source, child, walked, mode)?;
                let empty = matches!(child, Value::Object(map) if map.is_empty());
                match replaced {
                    Some(Some(previous)) if empty => *child = previous,
                    Some(None) if empty => {
                        if let Value::Object(map) = target {
                            map.remove(key);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

impl Producer {
    fn compile(leaf: &Value) -> Result<Self> {
        match leaf {
            Value::String(text) if text.starts_with('=') => Self::call(text),
            Value::String(text) if text.starts_with('@') => Ok(Producer::Lookup(Transpose::parse(text)?)),
            other => Ok(Producer::Literal(other.clone())),
        }
    }

    /// Parse `=name` or `=name(arg, ...)`
    fn call(text: &str) -> Result<Self> {
        let body = &text[1..];
        let (name, args) = match body.find('(') {
            Some(open) => {
                let inner = body[open + 1..].strip_suffix(')').ok_or_else(|| {
                    JoltError::spec(format!("unbalanced parentheses in '{}'", text))
                })?;
                (&body[..open], split_args(inner, text)?)
            }
            None => (body, Vec::new()),
        };
        let name = name.trim();
        let function = functions::lookup(name)
            .ok_or_else(|| JoltError::spec(format!("unknown modify function '{}'", name)))?;
        let args = args
            .into_iter()
            .map(|arg| Arg::parse(arg, text))
            .collect::<Result<Vec<_>>>()?;
        Ok(Producer::Call { function, args })
    }

    fn produce(&self, current: &Value, walked: &WalkedPath) -> Result<Option<Value>> {
        Ok(match self {
            Producer::Literal(value) => Some(value.clone()),
            Producer::Lookup(transpose) => transpose.lookup(walked)?.cloned(),
            Producer::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(walked))
                    .collect::<Result<Vec<_>>>()?;
                function(&args, current)
            }
        })
    }
}

impl Arg {
    fn parse(arg: &str, call: &str) -> Result<Self> {
        let arg = arg.trim();
        if arg.starts_with('@') {
            return Ok(Arg::Lookup(Transpose::parse(arg)?));
        }
        for quote in ['\'', '"'] {
            if let Some(inner) = arg.strip_prefix(quote).and_then(|a| a.strip_suffix(quote)) {
                return Ok(Arg::Literal(Value::String(inner.to_string())));
            }
        }
        match serde_json::from_str::<Value>(arg) {
            Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => Ok(Arg::Literal(value)),
            _ => Err(JoltError::spec(format!(
                "argument '{}' in '{}' must be a quoted string, a number, true, false, null or an '@' reference",
                arg, call
            ))),
        }
    }

    fn evaluate(&self, walked: &WalkedPath) -> Result<Value> {
        Ok(match self {
            Arg::Literal(value) => value.clone(),
            Arg::Lookup(transpose) => transpose.lookup(walked)?.cloned().unwrap_or(Value::Null),
        })
    }
}

/// Split on commas outside quotes and parentheses
fn split_args<'s>(inner: &'s str, call: &str) -> Result<Vec<&'s str>> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in inner.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    JoltError::spec(format!("unbalanced parentheses in '{}'", call))
                })?
            }
            (None, ',') if depth == 0 => {
                args.push(&inner[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(JoltError::spec(format!("unterminated argument list in '{}'", call)));
    }
    args.push(&inner[start..]);
    Ok(args)
}

fn child<'a>(source: &'a Value, key: &str) -> Option<&'a Value> {
    match source {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn existing<'t>(target: &'t Value, key: &str) -> Option<&'t Value> {
    child(target, key)
}

fn existing_mut<'t>(target: &'t mut Value, key: &str) -> Option<&'t mut Value> {
    match target {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

/// Write `value` under `key`; false when the target cannot hold it
fn store(target: &mut Value, key: &str, value: Value) -> Result<bool> {
    match target {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            Ok(true)
        }
        Value::Array(items) => {
            let Ok(index) = key.parse::<usize>() else {
                return Ok(false);
            };
            if index > MAX_INDEX {
                return Err(JoltError::transform(
                    "modify",
                    format!("array index {} is larger than {}", index, MAX_INDEX),
                ));
            }
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn modify(mode: Mode, spec: Value, input: Value) -> Value {
        Modify::new(mode, &spec).unwrap().apply(input).unwrap()
    }

    #[test]
    fn test_overwrite_calls_function_on_current_value() {
        let output = modify(
            Mode::Overwrite,
            json!({"a": "=toUpper", "n": "=toInteger"}),
            json!({"a": "abc", "n": "42"}),
        );
        assert_eq!(output, json!({"a": "ABC", "n": 42}));
    }

    #[test]
    fn test_arguments_read_sibling_values() {
        let spec = json!({"full": "=concat(@(1,first), ' ', @(1,last))"});
        let output = modify(Mode::Overwrite, spec, json!({"first": "Ada", "last": "Lovelace"}));
        assert_eq!(output["full"], json!("Ada Lovelace"));
    }

    #[test]
    fn test_modes_decide_when_to_write() {
        let spec = json!({"a": 1, "b": 2, "c": 3});
        let input = json!({"a": 10, "b": null});
        assert_eq!(
            modify(Mode::Overwrite, spec.clone(), input.clone()),
            json!({"a": 1, "b": 2, "c": 3})
        );
        assert_eq!(
            modify(Mode::Default, spec.clone(), input.clone()),
            json!({"a": 10, "b": 2, "c": 3})
        );
        assert_eq!(
            modify(Mode::Define, spec, input),
            json!({"a": 10, "b": null, "c": 3})
        );
    }

    #[test]
    fn test_wildcards_visit_existing_children() {
        let spec = json!({"users": {"*": {"name": "=toLower", "tag": "=concat(@(1,name), '-', &)"}}});
        let err = Modify::new(Mode::Overwrite, &spec).unwrap_err();
        assert!(err.to_string().contains("argument '&'"));

        let spec = json!({"users": {"*": {"name": "=toLower"}}});
        let input = json!({"users": [{"name": "ADA"}, {"name": "Bob"}, {}]});
        assert_eq!(
            modify(Mode::Overwrite, spec, input),
            json!({"users": [{"name": "ada"}, {"name": "bob"}, {}]})
        );
    }

    #[test]
    fn test_lookups_read_the_original_document() {
        let spec = json!({"a": "=toUpper", "copy": "@(1,a)"});
        let output = modify(Mode::Overwrite, spec, json!({"a": "x"}));
        assert_eq!(output, json!({"a": "X", "copy": "x"}));
    }

    #[test]
    fn test_missing_results_leave_key_alone() {
        let spec = json!({"a": "=toUpper", "b": "@(1,nothing)", "c": {"d": "=trim"}});
        let output = modify(Mode::Overwrite, spec, json!({"a": 5}));
        assert_eq!(output, json!({"a": 5}));
    }

    #[test]
    fn test_nested_objects_are_created() {
        let spec = json!({"meta": {"count": "=size(@(2,items))"}});
        let output = modify(Mode::Define, spec, json!({"items": [1, 2]}));
        assert_eq!(output, json!({"items": [1, 2], "meta": {"count": 2}}));
    }

    #[test]
    fn test_array_index_keys() {
        let spec = json!({"list": {"1": "=toUpper"}});
        let output = modify(Mode::Overwrite, spec, json!({"list": ["a", "b"]}));
        assert_eq!(output, json!({"list": ["a", "B"]}));
    }

    #[test]
    fn test_null_input_becomes_object() {
        let output = modify(Mode::Default, json!({"x": 0}), Value::Null);
        assert_eq!(output, json!({"x": 0}));
    }

    #[test]
    fn test_bad_specs() {
        for spec in [
            json!("nope"),
            json!({"a": "=noSuchFunction"}),
            json!({"a": "=concat(foo)"}),
            json!({"a": "=concat('x'"}),
            json!({"a": "@(1,b"}),
        ] {
            let err = Modify::new(Mode::Overwrite, &spec).unwrap_err();
            assert!(matches!(err, JoltError::Spec { .. }), "{}", spec);
        }
    }
}
