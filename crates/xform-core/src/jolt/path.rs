//! Key matching and references shared by the Jolt operations
//!
//! While walking the input alongside a spec, every matched key is pushed on
//! a [`WalkedPath`] together with the text captured by its `*` wildcards and
//! the input value found under it. References read those levels back:
//!
//! - `&(up, group)` is the key matched `up` levels above the current one,
//!   group `0` being the whole key and group `n` the n-th wildcard capture
//! - `#up` is how many nested specs have matched so far at that level
//! - `@(up, path)` is the value at `path` below the input of that level

use super::error::JoltError;
use serde_json::Value;
use std::iter::Peekable;
use std::str::Chars;

type Result<T> = std::result::Result<T, JoltError>;

/// A reference to a key matched earlier in the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub up: usize,
    pub group: usize,
}

/// One matched level of the walk
#[derive(Debug, Clone)]
pub struct Level<'a> {
    pub key: String,
    pub captures: Vec<String>,
    /// Input value under the matched key
    pub value: &'a Value,
    /// Nested specs that have matched below this level so far
    pub matches: usize,
}

/// Stack of matched keys from the root to the current position
#[derive(Debug, Clone)]
pub struct WalkedPath<'a> {
    /// Operation name used in error messages
    operation: &'static str,
    levels: Vec<Level<'a>>,
}

impl<'a> WalkedPath<'a> {
    /// A walk positioned at the root, whose key is empty
    pub fn new(operation: &'static str, root: &'a Value) -> Self {
        Self {
            operation,
            levels: vec![Level {
                key: String::new(),
                captures: Vec::new(),
                value: root,
                matches: 0,
            }],
        }
    }

    pub fn push(&mut self, key: impl Into<String>, captures: Vec<String>, value: &'a Value) {
        self.levels.push(Level {
            key: key.into(),
            captures,
            value,
            matches: 0,
        });
    }

    pub fn pop(&mut self) {
        if self.levels.len() > 1 {
            self.levels.pop();
        }
    }

    /// Repeat the current level, used by `@`, `$` and `#` entries
    pub fn push_current(&mut self) {
        let mut current = self.current().clone();
        current.matches = 0;
        self.levels.push(current);
    }

    pub fn current(&self) -> &Level<'a> {
        // the root level is never popped
        &self.levels[self.levels.len() - 1]
    }

    /// Record that a nested spec matched below the current level
    pub fn count_match(&mut self) {
        let last = self.levels.len() - 1;
        self.levels[last].matches += 1;
    }

    fn level(&self, up: usize, reference: &dyn Fn() -> String) -> Result<&Level<'a>> {
        self.levels
            .len()
            .checked_sub(up + 1)
            .map(|index| &self.levels[index])
            .ok_or_else(|| {
                JoltError::transform(
                    self.operation,
                    format!("reference {} goes above the root of the input", reference()),
                )
            })
    }

    /// Look up the text a reference points at
    pub fn resolve(&self, reference: Reference) -> Result<&str> {
        let describe = || format!("&({},{})", reference.up, reference.group);
        let level = self.level(reference.up, &describe)?;

        if reference.group == 0 {
            return Ok(&level.key);
        }
        level
            .captures
            .get(reference.group - 1)
            .map(String::as_str)
            .ok_or_else(|| {
                JoltError::transform(
                    self.operation,
                    format!(
                        "reference &({},{}) names a wildcard capture that does not exist for key '{}'",
                        reference.up, reference.group, level.key
                    ),
                )
            })
    }

    /// Match count of the level `up` steps above the current one
    pub fn match_count(&self, up: usize) -> Result<usize> {
        Ok(self.level(up, &|| format!("#{}", up))?.matches)
    }

    /// Input value of the level `up` steps above the current one
    pub fn value(&self, up: usize) -> Result<&'a Value> {
        Ok(self.level(up, &|| format!("@({})", up))?.value)
    }
}

/// Parse the part of a reference after its sigil: ``, `n` or `(n,m)`
pub fn parse_reference(chars: &mut Peekable<Chars<'_>>, text: &str) -> Result<Reference> {
    match chars.peek() {
        Some(c) if c.is_ascii_digit() => Ok(Reference {
            up: read_number(chars, text)?,
            group: 0,
        }),
        Some('(') => {
            chars.next();
            let up = read_number(chars, text)?;
            let group = if chars.peek() == Some(&',') {
                chars.next();
                read_number(chars, text)?
            } else {
                0
            };
            if chars.next() != Some(')') {
                return Err(JoltError::spec(format!(
                    "unterminated reference in '{}'",
                    text
                )));
            }
            Ok(Reference { up, group })
        }
        _ => Ok(Reference { up: 0, group: 0 }),
    }
}

fn read_number(chars: &mut Peekable<Chars<'_>>, text: &str) -> Result<usize> {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else if c == ' ' {
            chars.next();
        } else {
            break;
        }
    }
    digits
        .parse()
        .map_err(|_| JoltError::spec(format!("expected a number in reference '{}'", text)))
}

/// Piece of a key or output path template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Reference(Reference),
}

/// Text with embedded `&` references, resolved against the walk
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template; `\&` escapes a literal ampersand
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        literal.push(escaped);
                    }
                }
                '&' => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Reference(parse_reference(&mut chars, text)?));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Ok(Self { parts })
    }

    /// Whether the template contains no references
    pub fn is_literal(&self) -> bool {
        self.parts
            .iter()
            .all(|part| matches!(part, TemplatePart::Literal(_)))
    }

    /// The text of a template without references
    pub fn as_literal(&self) -> Option<String> {
        self.is_literal().then(|| {
            self.parts
                .iter()
                .filter_map(|part| match part {
                    TemplatePart::Literal(text) => Some(text.as_str()),
                    TemplatePart::Reference(_) => None,
                })
                .collect()
        })
    }

    /// Produce the concrete text for the current walk
    pub fn resolve(&self, walked: &WalkedPath) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Reference(reference) => out.push_str(walked.resolve(*reference)?),
            }
        }
        Ok(out)
    }
}

/// `@(up, path)`: a value read from the input rather than from the spec
#[derive(Debug, Clone, PartialEq)]
pub struct Transpose {
    pub up: usize,
    path: Vec<Template>,
}

impl Transpose {
    /// Parse `@`, `@n`, `@(n)`, `@(path)` or `@(n,path)`
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || JoltError::spec(format!("invalid '@' reference '{}'", text));
        let rest = text.strip_prefix('@').ok_or_else(invalid)?;

        if rest.is_empty() {
            return Ok(Self {
                up: 0,
                path: Vec::new(),
            });
        }
        if rest.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self {
                up: rest.parse().map_err(|_| invalid())?,
                path: Vec::new(),
            });
        }

        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let (up, path) = match inner.split_once(',') {
            Some((up, path)) if is_number(up) => (up.trim().parse().map_err(|_| invalid())?, path.trim()),
            _ if is_number(inner) => (inner.trim().parse().map_err(|_| invalid())?, ""),
            _ => (0, inner.trim()),
        };

        let path = if path.is_empty() {
            Vec::new()
        } else {
            split_path(path)?
                .into_iter()
                .map(|segment| {
                    if segment.is_empty() {
                        return Err(invalid());
                    }
                    Template::parse(segment)
                })
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Self { up, path })
    }

    /// Plain `@`, the current input value
    pub fn is_current(&self) -> bool {
        self.up == 0 && self.path.is_empty()
    }

    /// Follow the reference; `None` when the path is absent from the input
    pub fn lookup<'a>(&self, walked: &WalkedPath<'a>) -> Result<Option<&'a Value>> {
        let mut value = walked.value(self.up)?;
        for segment in &self.path {
            let key = segment.resolve(walked)?;
            let next = match value {
                Value::Object(map) => map.get(&key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(next) => value = next,
                None => return Ok(None),
            }
        }
        Ok(Some(value))
    }
}

fn is_number(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Text a looked-up value contributes to a key; containers have none
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split a dotted path, ignoring dots inside `(...)`, `[...]` or after `\`
pub fn split_path(text: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    JoltError::spec(format!("unbalanced brackets in '{}'", text))
                })?
            }
            '.' if depth == 0 => {
                segments.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(JoltError::spec(format!("unbalanced brackets in '{}'", text)));
    }
    segments.push(&text[start..]);
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq)]
enum PatternPart {
    Literal(String),
    Star,
}

/// A spec key matched against input keys: `|` separated alternatives,
/// each possibly containing `*` wildcards
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPattern {
    alternatives: Vec<Vec<PatternPart>>,
}

impl KeyPattern {
    pub fn parse(text: &str) -> Self {
        let alternatives = text
            .split('|')
            .map(|alternative| {
                let mut parts = Vec::new();
                let mut literal = String::new();
                for c in alternative.chars() {
                    if c == '*' {
                        if !literal.is_empty() {
                            parts.push(PatternPart::Literal(std::mem::take(&mut literal)));
                        }
                        if parts.last() != Some(&PatternPart::Star) {
                            parts.push(PatternPart::Star);
                        }
                    } else {
                        literal.push(c);
                    }
                }
                if !literal.is_empty() || parts.is_empty() {
                    parts.push(PatternPart::Literal(literal));
                }
                parts
            })
            .collect();
        Self { alternatives }
    }

    /// A single alternative without wildcards
    pub fn is_literal(&self) -> bool {
        self.alternatives.len() == 1 && !self.has_wildcard()
    }

    pub fn has_wildcard(&self) -> bool {
        self.alternatives
            .iter()
            .any(|parts| parts.contains(&PatternPart::Star))
    }

    /// Ordering weight: wildcard-free keys first, then by literal length;
    /// a bare `*` always comes last
    pub fn specificity(&self) -> (bool, usize) {
        let literal_len = self
            .alternatives
            .iter()
            .flatten()
            .map(|part| match part {
                PatternPart::Literal(text) => text.len(),
                PatternPart::Star => 0,
            })
            .min()
            .unwrap_or(0);
        (!self.has_wildcard(), literal_len)
    }

    /// Match a key, returning the wildcard captures on success
    pub fn matches(&self, key: &str) -> Option<Vec<String>> {
        self.alternatives.iter().find_map(|parts| {
            let mut captures = Vec::new();
            match_parts(parts, key, &mut captures).then_some(captures)
        })
    }
}

fn match_parts(parts: &[PatternPart], key: &str, captures: &mut Vec<String>) -> bool {
    match parts.split_first() {
        None => key.is_empty(),
        Some((PatternPart::Literal(text), rest)) => key
            .strip_prefix(text.as_str())
            .map_or(false, |remaining| match_parts(rest, remaining, captures)),
        Some((PatternPart::Star, rest)) => {
            // shortest capture first
            for end in key
                .char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(key.len()))
            {
                captures.push(key[..end].to_string());
                if match_parts(rest, &key[end..], captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
    }
}
