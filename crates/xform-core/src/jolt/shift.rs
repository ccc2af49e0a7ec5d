//! The `shift` operation: copy values from the input into a new document
//!
//! The spec mirrors the shape of the input. Keys select input entries,
//! leaves name where the selected values land in the output. Nothing is
//! copied unless the spec asks for it.

use super::error::JoltError;
use super::path::{
    key_text, parse_reference, split_path, KeyPattern, Reference, Template, Transpose, WalkedPath,
};
use serde_json::{Map, Value};

type Result<T> = std::result::Result<T, JoltError>;

/// Largest array index an output path may address
const MAX_OUTPUT_INDEX: usize = 1 << 16;

/// A compiled shift spec
#[derive(Debug, Clone)]
pub struct Shift {
    root: ShiftNode,
}

#[derive(Debug, Clone, Default)]
struct ShiftNode {
    /// `@`, `$` and `#` entries, applied to the node's own input
    specials: Vec<Special>,
    /// Entries matched against input keys, most specific first
    children: Vec<Child>,
}

#[derive(Debug, Clone)]
enum SpecialKind {
    /// `@`, `@n`, `@(n,path)`: a value taken from the input
    Lookup(Transpose),
    /// `$`, `$n`, `$(n,m)`: a matched key
    Key(Reference),
    /// `#text`: a constant string
    Constant(String),
}

#[derive(Debug, Clone)]
struct Special {
    key: String,
    kind: SpecialKind,
    action: Action,
}

#[derive(Debug, Clone)]
enum KeyMatcher {
    Pattern(KeyPattern),
    /// A key computed from `&` references, compared literally
    Reference(Template),
}

#[derive(Debug, Clone)]
struct Child {
    matcher: KeyMatcher,
    action: Action,
}

#[derive(Debug, Clone)]
enum Action {
    Recurse(ShiftNode),
    Write(Vec<OutputPath>),
}

/// An output location such as `data.&1.items[]`
#[derive(Debug, Clone)]
struct OutputPath {
    segments: Vec<SegmentSpec>,
}

#[derive(Debug, Clone)]
enum SegmentSpec {
    Key(Template),
    /// `@(n,path)`: the looked-up value names the key
    KeyLookup(Transpose),
    Index(Template),
    /// `[#n]`: the match count `n` levels up
    IndexCount(usize),
    /// `[@(n,path)]`: the looked-up value is the index
    IndexLookup(Transpose),
    Append,
}

/// An output segment with references resolved
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Append,
}

impl Shift {
    /// Compile a shift spec object
    pub fn new(spec: &Value) -> Result<Self> {
        let Value::Object(map) = spec else {
            return Err(JoltError::spec("shift spec must be a JSON object"));
        };
        Ok(Self {
            root: ShiftNode::compile(map, "")?,
        })
    }

    /// Apply the spec; unmatched input yields `null`
    pub fn apply(&self, input: &Value) -> Result<Value> {
        let mut output = Value::Null;
        let mut walked = WalkedPath::new("shift", input);
        self.root.apply(input, &mut walked, &mut output)?;
        Ok(output)
    }
}

impl ShiftNode {
    fn compile(spec: &Map<String, Value>, location: &str) -> Result<Self> {
        let mut node = ShiftNode::default();
        let mut literal = Vec::new();
        let mut computed = Vec::new();

        for (key, value) in spec {
            let here = if location.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", location, key)
            };

            if key.starts_with('@') {
                let transpose = Transpose::parse(key).map_err(|e| e.within(&here))?;
                node.specials.push(Special {
                    key: key.clone(),
                    kind: SpecialKind::Lookup(transpose),
                    action: Action::compile(value, &here)?,
                });
                continue;
            }
            if let Some(rest) = key.strip_prefix('$') {
                let mut chars = rest.chars().peekable();
                let reference = parse_reference(&mut chars, key).map_err(|e| e.within(&here))?;
                if chars.next().is_some() {
                    return Err(JoltError::spec_at(here, format!("unexpected text after '$' in '{}'", key)));
                }
                node.specials.push(Special {
                    key: key.clone(),
                    kind: SpecialKind::Key(reference),
                    action: Action::Write(compile_outputs(value, &here)?),
                });
                continue;
            }
            if let Some(constant) = key.strip_prefix('#') {
                node.specials.push(Special {
                    key: key.clone(),
                    kind: SpecialKind::Constant(constant.to_string()),
                    action: Action::Write(compile_outputs(value, &here)?),
                });
                continue;
            }

            let action = Action::compile(value, &here)?;

            if key.contains('&') {
                let template = Template::parse(key).map_err(|e| e.within(&here))?;
                literal.push(Child {
                    matcher: KeyMatcher::Reference(template),
                    action,
                });
                continue;
            }

            let pattern = KeyPattern::parse(key);
            let child = Child {
                matcher: KeyMatcher::Pattern(pattern.clone()),
                action,
            };
            if pattern.is_literal() {
                literal.push(child);
            } else {
                computed.push((pattern.specificity(), child));
            }
        }

        computed.sort_by(|(a, _), (b, _)| b.cmp(a));
        node.children = literal;
        node.children
            .extend(computed.into_iter().map(|(_, child)| child));
        Ok(node)
    }

    fn apply<'a>(
        &self,
        input: &'a Value,
        walked: &mut WalkedPath<'a>,
        output: &mut Value,
    ) -> Result<()> {
        for special in &self.specials {
            special.apply(walked, output)?;
        }

        if self.children.is_empty() {
            return Ok(());
        }

        let entries: Vec<(String, &'a Value)> = match input {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Value::Null => Vec::new(),
            Value::String(s) => vec![(s.clone(), input)],
            scalar => vec![(scalar.to_string(), input)],
        };

        for (key, value) in entries {
            for child in &self.children {
                let captures = match &child.matcher {
                    KeyMatcher::Pattern(pattern) => pattern.matches(&key),
                    KeyMatcher::Reference(template) => {
                        (template.resolve(walked)? == key).then(Vec::new)
                    }
                };
                let Some(captures) = captures else {
                    continue;
                };

                walked.push(key.clone(), captures, value);
                let result = child.action.run(value, walked, output);
                walked.pop();
                result?;
                if child.action.nests() {
                    walked.count_match();
                }
                break;
            }
        }

        Ok(())
    }
}

impl Special {
    fn apply<'a>(&self, walked: &mut WalkedPath<'a>, output: &mut Value) -> Result<()> {
        let owned;
        let value: &Value = match &self.kind {
            SpecialKind::Lookup(transpose) => {
                let Some(found) = transpose.lookup(walked)? else {
                    return Ok(());
                };
                if transpose.is_current() {
                    walked.push_current();
                } else {
                    walked.push(self.key.clone(), Vec::new(), found);
                }
                let result = self.action.run(found, walked, output);
                walked.pop();
                result?;
                if self.action.nests() {
                    walked.count_match();
                }
                return Ok(());
            }
            SpecialKind::Key(reference) => {
                owned = Value::String(walked.resolve(*reference)?.to_string());
                &owned
            }
            SpecialKind::Constant(text) => {
                owned = Value::String(text.clone());
                &owned
            }
        };

        walked.push_current();
        let result = match &self.action {
            Action::Write(outputs) => write_all(outputs, value, walked, output),
            Action::Recurse(_) => Ok(()),
        };
        walked.pop();
        result
    }
}

impl Action {
    fn compile(value: &Value, location: &str) -> Result<Self> {
        Ok(match value {
            Value::Object(child) => Action::Recurse(ShiftNode::compile(child, location)?),
            other => Action::Write(compile_outputs(other, location)?),
        })
    }

    /// Run against the value of the level just pushed
    fn run<'a>(&self, value: &'a Value, walked: &mut WalkedPath<'a>, output: &mut Value) -> Result<()> {
        match self {
            Action::Recurse(node) => node.apply(value, walked, output),
            Action::Write(outputs) => write_all(outputs, value, walked, output),
        }
    }

    /// Nested specs bump the match count `#n` reads
    fn nests(&self) -> bool {
        matches!(self, Action::Recurse(_))
    }
}

fn compile_outputs(value: &Value, location: &str) -> Result<Vec<OutputPath>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(path) => Ok(vec![OutputPath::parse(path).map_err(|e| e.within(location))?]),
        Value::Array(paths) => paths
            .iter()
            .map(|path| match path {
                Value::String(path) => OutputPath::parse(path).map_err(|e| e.within(location)),
                _ => Err(JoltError::spec_at(location, "output paths must be strings")),
            })
            .collect(),
        _ => Err(JoltError::spec_at(
            location,
            "shift leaf must be an output path string or a list of them",
        )),
    }
}

impl OutputPath {
    fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        if text.is_empty() {
            return Ok(Self { segments });
        }

        for part in split_path(text)? {
            let (key, mut rest) = part.split_at(bracket_start(part));
            if !key.is_empty() {
                segments.push(Self::key_segment(key, text)?);
            } else if rest.is_empty() {
                return Err(JoltError::spec(format!("empty segment in output path '{}'", text)));
            }

            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .filter(|_| rest.starts_with('['))
                    .ok_or_else(|| JoltError::spec(format!("malformed brackets in output path '{}'", text)))?;
                segments.push(Self::index_segment(&rest[1..close], text)?);
                rest = &rest[close + 1..];
            }
        }

        Ok(Self { segments })
    }

    fn key_segment(key: &str, text: &str) -> Result<SegmentSpec> {
        if key.starts_with('@') {
            let transpose = Transpose::parse(key)?;
            if transpose.is_current() {
                return Err(JoltError::spec(format!(
                    "'{}' cannot name a key in output path '{}'; use '@(n,path)'",
                    key, text
                )));
            }
            return Ok(SegmentSpec::KeyLookup(transpose));
        }
        if key.starts_with('$') || has_unescaped(key, '*') {
            return Err(JoltError::spec(format!(
                "'{}' is not a valid segment in output path '{}'",
                key, text
            )));
        }
        Ok(SegmentSpec::Key(Template::parse(key)?))
    }

    fn index_segment(inner: &str, text: &str) -> Result<SegmentSpec> {
        let inner = inner.trim();
        let invalid = || {
            JoltError::spec(format!(
                "array index '{}' in output path '{}' must be a number, an '&' reference, '#n' or '@(n,path)'",
                inner, text
            ))
        };

        if inner.is_empty() {
            return Ok(SegmentSpec::Append);
        }
        if let Some(up) = inner.strip_prefix('#') {
            return up.parse().map(SegmentSpec::IndexCount).map_err(|_| invalid());
        }
        if inner.starts_with('@') {
            return Ok(SegmentSpec::IndexLookup(Transpose::parse(inner)?));
        }

        let template = Template::parse(inner)?;
        match template.as_literal() {
            Some(literal) => match literal.parse::<usize>() {
                Ok(index) if index > MAX_OUTPUT_INDEX => Err(JoltError::spec(format!(
                    "output index {} exceeds the limit of {}",
                    index, MAX_OUTPUT_INDEX
                ))),
                Ok(_) => Ok(SegmentSpec::Index(template)),
                Err(_) => Err(invalid()),
            },
            None => Ok(SegmentSpec::Index(template)),
        }
    }

    /// Resolve references; `None` when the walk gives no usable key or index
    fn resolve(&self, walked: &WalkedPath) -> Result<Option<Vec<Segment>>> {
        let mut resolved = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            resolved.push(match segment {
                SegmentSpec::Key(template) => Segment::Key(template.resolve(walked)?),
                SegmentSpec::KeyLookup(transpose) => {
                    match transpose.lookup(walked)?.and_then(key_text) {
                        Some(key) => Segment::Key(key),
                        None => return Ok(None),
                    }
                }
                SegmentSpec::Index(template) => match template.resolve(walked)?.trim().parse() {
                    Ok(index) => checked_index(index)?,
                    Err(_) => return Ok(None),
                },
                SegmentSpec::IndexCount(up) => checked_index(walked.match_count(*up)?)?,
                SegmentSpec::IndexLookup(transpose) => {
                    match transpose.lookup(walked)?.and_then(array_index) {
                        Some(index) => checked_index(index)?,
                        None => return Ok(None),
                    }
                }
                SegmentSpec::Append => Segment::Append,
            });
        }
        Ok(Some(resolved))
    }
}

/// Byte offset of the first `[` outside parentheses
fn bracket_start(part: &str) -> usize {
    let mut depth = 0usize;
    for (i, c) in part.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '[' if depth == 0 => return i,
            _ => {}
        }
    }
    part.len()
}

fn has_unescaped(text: &str, needle: char) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return true;
        }
    }
    false
}

fn array_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn checked_index(index: usize) -> Result<Segment> {
    if index > MAX_OUTPUT_INDEX {
        return Err(JoltError::transform(
            "shift",
            format!("output index {} exceeds the limit of {}", index, MAX_OUTPUT_INDEX),
        ));
    }
    Ok(Segment::Index(index))
}

fn write_all(
    outputs: &[OutputPath],
    value: &Value,
    walked: &WalkedPath,
    output: &mut Value,
) -> Result<()> {
    for path in outputs {
        if let Some(segments) = path.resolve(walked)? {
            write(output, &segments, value.clone());
        }
    }
    Ok(())
}

/// Place a value, creating containers along the way
fn write(target: &mut Value, segments: &[Segment], value: Value) {
    match segments.split_first() {
        None => collect_into(target, value),
        Some((Segment::Key(key), rest)) => {
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                write(slot, rest, value);
            }
        }
        Some((Segment::Index(index), rest)) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(items) = target {
                if items.len() <= *index {
                    items.resize(index + 1, Value::Null);
                }
                write(&mut items[*index], rest, value);
            }
        }
        Some((Segment::Append, rest)) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(items) = target {
                items.push(Value::Null);
                let last = items.len() - 1;
                write(&mut items[last], rest, value);
            }
        }
    }
}

/// Repeated writes to one location collect into an array
fn collect_into(slot: &mut Value, value: Value) {
    match slot {
        Value::Null => *slot = value,
        Value::Array(items) => match value {
            Value::Array(values) => items.extend(values),
            value => items.push(value),
        },
        existing => {
            let mut items = vec![existing.take()];
            match value {
                Value::Array(values) => items.extend(values),
                value => items.push(value),
            }
            *existing = Value::Array(items);
        }
    }
}
