//! Builtin JSONata functions
//!
//! Each builtin receives its evaluated arguments and the calling context.
//! Builtins marked with `context_arg` use the context value when called
//! with no arguments, so `name.$uppercase()` works on the current item.

use super::error::JsonataError;
use super::evaluator::Evaluator;
use super::format::{self, DecimalFormat};
use super::parser;
use super::value::{format_number, round_significant, Builtin, BuiltinFn, Frame, Object, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::rc::Rc;

type Result<T> = std::result::Result<T, JsonataError>;

macro_rules! builtin {
    ($name:literal, $func:ident) => {
        Builtin {
            name: $name,
            func: $func as BuiltinFn,
            context_arg: false,
        }
    };
    ($name:literal, $func:ident, context) => {
        Builtin {
            name: $name,
            func: $func as BuiltinFn,
            context_arg: true,
        }
    };
}

/// Registry of every builtin, keyed by name without the `$`
const BUILTINS: &[Builtin] = &[
    // aggregation
    builtin!("sum", sum),
    builtin!("count", count),
    builtin!("average", average),
    builtin!("max", max),
    builtin!("min", min),
    // strings
    builtin!("string", string, context),
    builtin!("uppercase", uppercase, context),
    builtin!("lowercase", lowercase, context),
    builtin!("substring", substring),
    builtin!("substringBefore", substring_before),
    builtin!("substringAfter", substring_after),
    builtin!("split", split),
    builtin!("join", join),
    builtin!("contains", contains),
    builtin!("replace", replace),
    builtin!("trim", trim, context),
    builtin!("length", length, context),
    builtin!("pad", pad),
    builtin!("match", match_fn),
    builtin!("base64encode", base64_encode, context),
    builtin!("base64decode", base64_decode, context),
    // higher order
    builtin!("map", map),
    builtin!("filter", filter),
    builtin!("reduce", reduce),
    builtin!("each", each),
    builtin!("sort", sort),
    builtin!("sift", sift),
    builtin!("single", single),
    // arrays and objects
    builtin!("reverse", reverse),
    builtin!("append", append),
    builtin!("distinct", distinct),
    builtin!("keys", keys, context),
    builtin!("lookup", lookup_fn),
    builtin!("merge", merge),
    builtin!("spread", spread, context),
    builtin!("zip", zip),
    // boolean and types
    builtin!("not", not, context),
    builtin!("exists", exists),
    builtin!("boolean", boolean, context),
    builtin!("number", number, context),
    builtin!("type", type_of),
    // numeric
    builtin!("abs", abs, context),
    builtin!("floor", floor, context),
    builtin!("ceil", ceil, context),
    builtin!("round", round, context),
    builtin!("power", power),
    builtin!("sqrt", sqrt, context),
    builtin!("formatNumber", format_number_fn),
    builtin!("formatBase", format_base),
    // date and time
    builtin!("now", now),
    builtin!("millis", millis),
    builtin!("fromMillis", from_millis),
    builtin!("toMillis", to_millis, context),
    builtin!("formatDateTime", format_date_time),
    // control
    builtin!("error", error),
    builtin!("assert", assert),
    builtin!("eval", eval),
];

/// Find a builtin by name
pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}

/// Names of all builtins
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

/// String rendering used by `$string` and the `&` operator
pub fn stringify(value: &Value) -> Result<String> {
    match value {
        Value::Undefined => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if !n.is_finite() => Err(JsonataError::function(
            "D3001",
            "$string",
            "Attempting to invoke string function on Infinity or NaN",
        )),
        Value::Number(n) => Ok(format_number(*n)),
        Value::Lambda(_) | Value::Builtin(_) | Value::Regex(_) => Ok(String::new()),
        other => Ok(rounded(other).to_json()?.to_string()),
    }
}

/// Copy of a value with every number rounded to 15 significant digits
fn rounded(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(round_significant(*n)),
        Value::Array(items) => Value::Array(items.iter().map(rounded).collect()),
        Value::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (k.clone(), rounded(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn arg_error(function: &str, index: usize, expected: &str) -> JsonataError {
    JsonataError::function(
        "T0410",
        format!("${}", function),
        format!("Argument {} must be {}", index + 1, expected),
    )
}

fn string_arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<Option<&'a str>> {
    match args.get(index) {
        None | Some(Value::Undefined) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(arg_error(function, index, "a string")),
    }
}

fn number_arg(function: &str, args: &[Value], index: usize) -> Result<Option<f64>> {
    match args.get(index) {
        None | Some(Value::Undefined) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(*n)),
        Some(_) => Err(arg_error(function, index, "a number")),
    }
}

fn function_arg<'a>(function: &str, args: &'a [Value], index: usize) -> Result<&'a Value> {
    match args.get(index) {
        Some(value) if value.is_function() => Ok(value),
        _ => Err(arg_error(function, index, "a function")),
    }
}

/// Array argument; scalars are wrapped, undefined is `None`
fn array_arg(args: &[Value], index: usize) -> Option<Vec<Value>> {
    match args.get(index) {
        None | Some(Value::Undefined) => None,
        Some(Value::Array(items)) => Some(items.clone()),
        Some(other) => Some(vec![other.clone()]),
    }
}

/// Numeric array argument for the aggregation functions
fn numbers_arg(function: &str, args: &[Value]) -> Result<Option<Vec<f64>>> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(None);
    };
    items
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                JsonataError::function(
                    "T0412",
                    format!("${}", function),
                    "Argument 1 must be an array of numbers",
                )
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Arguments for a callback, trimmed to what builtins accept
fn callback_args(callback: &Value, full: Vec<Value>) -> Vec<Value> {
    match callback {
        Value::Builtin(_) => full.into_iter().take(1).collect(),
        _ => full,
    }
}

fn sum(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(match numbers_arg("sum", args)? {
        Some(values) => Value::Number(values.iter().sum()),
        None => Value::Undefined,
    })
}

fn count(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let n = array_arg(args, 0).map_or(0, |items| items.len());
    Ok(Value::Number(n as f64))
}

fn average(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(match numbers_arg("average", args)? {
        Some(values) if !values.is_empty() => {
            Value::Number(values.iter().sum::<f64>() / values.len() as f64)
        }
        _ => Value::Undefined,
    })
}

fn max(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(match numbers_arg("max", args)? {
        Some(values) if !values.is_empty() => {
            Value::Number(values.into_iter().fold(f64::NEG_INFINITY, f64::max))
        }
        _ => Value::Undefined,
    })
}

fn min(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(match numbers_arg("min", args)? {
        Some(values) if !values.is_empty() => {
            Value::Number(values.into_iter().fold(f64::INFINITY, f64::min))
        }
        _ => Value::Undefined,
    })
}

fn string(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    if value.is_undefined() {
        return Ok(Value::Undefined);
    }
    let pretty = args.get(1).map_or(false, Value::is_truthy);
    if pretty && matches!(value, Value::Array(_) | Value::Object(_)) {
        let json = rounded(&value).to_json()?;
        return serde_json::to_string_pretty(&json)
            .map(Value::String)
            .map_err(|e| JsonataError::function("D3001", "$string", e.to_string()));
    }
    stringify(&value).map(Value::String)
}

fn uppercase(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(string_arg("uppercase", args, 0)?
        .map_or(Value::Undefined, |s| Value::String(s.to_uppercase())))
}

fn lowercase(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(string_arg("lowercase", args, 0)?
        .map_or(Value::Undefined, |s| Value::String(s.to_lowercase())))
}

fn substring(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("substring", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let start = number_arg("substring", args, 1)?
        .ok_or_else(|| arg_error("substring", 1, "a number"))?;
    let length = number_arg("substring", args, 2)?;

    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let mut start = start.floor() as i64;
    if start < 0 {
        start = (len + start).max(0);
    }
    if start >= len {
        return Ok(Value::String(String::new()));
    }
    let end = match length {
        None => len,
        Some(l) if l <= 0.0 => start,
        Some(l) => (start + l.floor() as i64).min(len),
    };
    Ok(Value::String(
        chars[start as usize..end as usize].iter().collect(),
    ))
}

fn substring_before(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("substringBefore", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let chars = string_arg("substringBefore", args, 1)?.unwrap_or("");
    Ok(Value::String(match s.find(chars) {
        Some(i) if !chars.is_empty() => s[..i].to_string(),
        _ => s.to_string(),
    }))
}

fn substring_after(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("substringAfter", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let chars = string_arg("substringAfter", args, 1)?.unwrap_or("");
    Ok(Value::String(match s.find(chars) {
        Some(i) if !chars.is_empty() => s[i + chars.len()..].to_string(),
        _ => s.to_string(),
    }))
}

fn split(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("split", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let limit = match number_arg("split", args, 2)? {
        Some(n) if n < 0.0 => {
            return Err(JsonataError::function(
                "D3020",
                "$split",
                "Third argument must be a positive number",
            ))
        }
        Some(n) => Some(n.floor() as usize),
        None => None,
    };

    let parts: Vec<String> = match args.get(1) {
        Some(Value::String(sep)) if sep.is_empty() => s.chars().map(String::from).collect(),
        Some(Value::String(sep)) => s.split(sep.as_str()).map(String::from).collect(),
        Some(Value::Regex(regex)) => regex.split(s).map(String::from).collect(),
        _ => return Err(arg_error("split", 1, "a string or regular expression")),
    };

    let parts = parts.into_iter().take(limit.unwrap_or(usize::MAX));
    Ok(Value::Array(parts.map(Value::String).collect()))
}

fn join(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };
    let separator = string_arg("join", args, 1)?.unwrap_or("");
    let strings = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                JsonataError::function("T0412", "$join", "Argument 1 must be an array of strings")
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::String(strings.join(separator)))
}

fn contains(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("contains", args, 0)? else {
        return Ok(Value::Undefined);
    };
    match args.get(1) {
        Some(Value::String(pattern)) => Ok(Value::Bool(s.contains(pattern.as_str()))),
        Some(Value::Regex(regex)) => Ok(Value::Bool(regex.is_match(s))),
        _ => Err(arg_error("contains", 1, "a string or regular expression")),
    }
}

fn replace(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("replace", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let replacement = string_arg("replace", args, 2)?
        .ok_or_else(|| arg_error("replace", 2, "a string"))?;
    let limit = match number_arg("replace", args, 3)? {
        Some(n) if n < 0.0 => {
            return Err(JsonataError::function(
                "D3011",
                "$replace",
                "Fourth argument must be a positive number",
            ))
        }
        Some(n) => n.floor() as usize,
        None => usize::MAX,
    };

    match args.get(1) {
        Some(Value::String(pattern)) if pattern.is_empty() => Err(JsonataError::function(
            "D3010",
            "$replace",
            "Second argument cannot be an empty string",
        )),
        Some(Value::String(pattern)) => {
            Ok(Value::String(s.replacen(pattern.as_str(), replacement, limit)))
        }
        Some(Value::Regex(regex)) => {
            let limit = if limit == usize::MAX { 0 } else { limit };
            if limit == 0 && args.get(3).is_some_and(|v| !v.is_undefined()) {
                return Ok(Value::String(s.to_string()));
            }
            Ok(Value::String(regex.replacen(s, limit, replacement).into_owned()))
        }
        _ => Err(arg_error("replace", 1, "a string or regular expression")),
    }
}

fn trim(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(string_arg("trim", args, 0)?.map_or(Value::Undefined, |s| {
        Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
    }))
}

fn length(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(string_arg("length", args, 0)?
        .map_or(Value::Undefined, |s| Value::Number(s.chars().count() as f64)))
}

fn map(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };
    let callback = function_arg("map", args, 1)?;
    let array = Value::Array(items.clone());
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let call_args = callback_args(callback, vec![item, Value::Number(i as f64), array.clone()]);
        let result = evaluator.apply(callback, call_args, input)?;
        if !result.is_undefined() {
            out.push(result);
        }
    }
    Ok(Value::from_sequence(out))
}

fn filter(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };
    let callback = function_arg("filter", args, 1)?;
    let array = Value::Array(items.clone());
    let mut out = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        let call_args = callback_args(
            callback,
            vec![item.clone(), Value::Number(i as f64), array.clone()],
        );
        if evaluator.apply(callback, call_args, input)?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::from_sequence(out))
}

fn reduce(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };
    let callback = function_arg("reduce", args, 1)?;
    if matches!(callback, Value::Lambda(_)) && callback.arity() < 2 {
        return Err(JsonataError::function(
            "D3050",
            "$reduce",
            "The second argument must be a function with at least two arguments",
        ));
    }

    let array = Value::Array(items.clone());
    let mut iter = items.into_iter().enumerate();
    let mut accumulator = match args.get(2) {
        Some(init) if !init.is_undefined() => init.clone(),
        _ => match iter.next() {
            Some((_, first)) => first,
            None => return Ok(Value::Undefined),
        },
    };
    for (i, item) in iter {
        accumulator = evaluator.apply(
            callback,
            vec![accumulator, item, Value::Number(i as f64), array.clone()],
            input,
        )?;
    }
    Ok(accumulator)
}

fn each(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let object = match args.first() {
        None | Some(Value::Undefined) => return Ok(Value::Undefined),
        Some(Value::Object(map)) => Rc::clone(map),
        Some(_) => return Err(arg_error("each", 0, "an object")),
    };
    let callback = function_arg("each", args, 1)?;
    let whole = Value::Object(Rc::clone(&object));
    let mut out = Vec::with_capacity(object.len());
    for (key, value) in object.iter() {
        let call_args = callback_args(
            callback,
            vec![value.clone(), Value::String(key.clone()), whole.clone()],
        );
        let result = evaluator.apply(callback, call_args, input)?;
        if !result.is_undefined() {
            out.push(result);
        }
    }
    Ok(Value::from_sequence(out))
}

fn sort(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };

    match args.get(1) {
        None | Some(Value::Undefined) => {
            let mut items = items;
            if items.iter().all(|v| v.as_f64().is_some()) {
                items.sort_by(|a, b| {
                    a.as_f64()
                        .partial_cmp(&b.as_f64())
                        .unwrap_or(Ordering::Equal)
                });
            } else if items.iter().all(|v| v.as_str().is_some()) {
                items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            } else {
                return Err(JsonataError::function(
                    "D3070",
                    "$sort",
                    "The single argument form of the sort function can only be applied to an array of strings or an array of numbers",
                ));
            }
            Ok(Value::Array(items))
        }
        Some(callback) if callback.is_function() => {
            // the comparator returns true when its first argument belongs after the second
            merge_sort(items, &mut |a, b| {
                evaluator
                    .apply(callback, vec![a.clone(), b.clone()], input)
                    .map(|v| v.is_truthy())
            })
            .map(Value::Array)
        }
        Some(_) => Err(arg_error("sort", 1, "a function")),
    }
}

/// Stable merge sort with a fallible comparator
fn merge_sort(
    items: Vec<Value>,
    after: &mut dyn FnMut(&Value, &Value) -> Result<bool>,
) -> Result<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(left, after)?;
    let right = merge_sort(right, after)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        if after(l, r)? {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn reverse(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(array_arg(args, 0).map_or(Value::Undefined, |mut items| {
        items.reverse();
        Value::Array(items)
    }))
}

fn append(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    match (array_arg(args, 0), array_arg(args, 1)) {
        (None, None) => Ok(Value::Undefined),
        (Some(_), None) => Ok(args[0].clone()),
        (None, Some(_)) => Ok(args[1].clone()),
        (Some(mut first), Some(second)) => {
            first.extend(second);
            Ok(Value::Array(first))
        }
    }
}

fn distinct(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    match args.first() {
        None | Some(Value::Undefined) => Ok(Value::Undefined),
        Some(Value::Array(items)) => {
            let mut out: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !out.iter().any(|seen| seen.deep_equals(item)) {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        Some(other) => Ok(other.clone()),
    }
}

fn keys(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let mut out: Vec<String> = Vec::new();
    let objects = array_arg(args, 0).unwrap_or_default();
    for object in &objects {
        if let Value::Object(map) = object {
            for key in map.keys() {
                if !out.contains(key) {
                    out.push(key.clone());
                }
            }
        }
    }
    Ok(Value::from_sequence(out.into_iter().map(Value::String).collect()))
}

fn lookup_key(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(lookup_key(item, key).into_items());
            }
            Value::from_sequence(out)
        }
        _ => Value::Undefined,
    }
}

fn lookup_fn(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let key = string_arg("lookup", args, 1)?.ok_or_else(|| arg_error("lookup", 1, "a string"))?;
    Ok(args
        .first()
        .map_or(Value::Undefined, |value| lookup_key(value, key)))
}

fn merge(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(objects) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };
    let mut merged = IndexMap::new();
    for object in objects {
        let Value::Object(map) = object else {
            return Err(JsonataError::function(
                "T0412",
                "$merge",
                "Argument 1 must be an array of objects",
            ));
        };
        merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Ok(Value::object(merged))
}

fn spread(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    fn spread_into(value: &Value, out: &mut Vec<Value>) {
        match value {
            Value::Object(map) => {
                for (key, value) in map.iter() {
                    let mut single = IndexMap::with_capacity(1);
                    single.insert(key.clone(), value.clone());
                    out.push(Value::object(single));
                }
            }
            Value::Array(items) => items.iter().for_each(|item| spread_into(item, out)),
            other => out.push(other.clone()),
        }
    }

    let mut out = Vec::new();
    if let Some(value) = args.first() {
        spread_into(value, &mut out);
    }
    Ok(Value::from_sequence(out))
}

fn not(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(match args.first() {
        None | Some(Value::Undefined) => Value::Undefined,
        Some(value) => Value::Bool(!value.is_truthy()),
    })
}

fn exists(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(Value::Bool(args.first().is_some_and(|v| !v.is_undefined())))
}

fn boolean(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(match args.first() {
        None | Some(Value::Undefined) => Value::Undefined,
        Some(value) => Value::Bool(value.is_truthy()),
    })
}

fn number(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let cannot_cast = || {
        JsonataError::function("D3030", "$number", "Unable to cast value to a number")
    };
    match args.first() {
        None | Some(Value::Undefined) => Ok(Value::Undefined),
        Some(Value::Number(n)) => Ok(Value::Number(*n)),
        Some(Value::Bool(b)) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            let parsed = if let Some(hex) = trimmed.strip_prefix("0x") {
                i64::from_str_radix(hex, 16).ok().map(|n| n as f64)
            } else {
                trimmed.parse::<f64>().ok()
            };
            match parsed {
                Some(n) if n.is_finite() && !trimmed.is_empty() => Ok(Value::Number(n)),
                _ => Err(cannot_cast()),
            }
        }
        Some(_) => Err(cannot_cast()),
    }
}

fn type_of(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(args
        .first()
        .and_then(Value::type_name)
        .map_or(Value::Undefined, |name| Value::String(name.to_string())))
}

fn abs(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(number_arg("abs", args, 0)?.map_or(Value::Undefined, |n| Value::Number(n.abs())))
}

fn floor(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(number_arg("floor", args, 0)?.map_or(Value::Undefined, |n| Value::Number(n.floor())))
}

fn ceil(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(number_arg("ceil", args, 0)?.map_or(Value::Undefined, |n| Value::Number(n.ceil())))
}

/// Round half to even at the given number of decimal places
fn round(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(n) = number_arg("round", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let precision = number_arg("round", args, 1)?.unwrap_or(0.0).floor() as i32;
    Ok(Value::Number(format::round_half_even(n, precision)))
}

fn power(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(base) = number_arg("power", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let exponent = number_arg("power", args, 1)?
        .ok_or_else(|| arg_error("power", 1, "a number"))?;
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Err(JsonataError::function(
            "D3061",
            "$power",
            format!("The power function has resulted in a value that cannot be represented as a JSON number: base={}, exponent={}", base, exponent),
        ));
    }
    Ok(Value::Number(result))
}

fn sqrt(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    match number_arg("sqrt", args, 0)? {
        None => Ok(Value::Undefined),
        Some(n) if n < 0.0 => Err(JsonataError::function(
            "D3060",
            "$sqrt",
            format!("The sqrt function cannot be applied to a negative number: {}", n),
        )),
        Some(n) => Ok(Value::Number(n.sqrt())),
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a timestamp with the optional `picture, timezone` arguments
/// starting at `picture_at`; without a picture the result is ISO 8601
fn render_timestamp(
    function: &str,
    timestamp: DateTime<Utc>,
    args: &[Value],
    picture_at: usize,
) -> Result<Value> {
    let picture = string_arg(function, args, picture_at)?;
    let offset: Option<FixedOffset> = match string_arg(function, args, picture_at + 1)? {
        Some(zone) => Some(
            format::parse_offset(zone)
                .ok_or_else(|| arg_error(function, picture_at + 1, "a timezone such as +0100"))?,
        ),
        None => None,
    };
    let local = match offset {
        Some(offset) => timestamp.with_timezone(&offset),
        None => timestamp.fixed_offset(),
    };
    match picture {
        Some(picture) => format::format_datetime(local, picture, function).map(Value::String),
        None if offset.is_some() => Ok(Value::String(
            local.to_rfc3339_opts(SecondsFormat::Millis, true),
        )),
        None => Ok(Value::String(format_timestamp(timestamp))),
    }
}

fn millis_timestamp(function: &str, ms: f64) -> Result<DateTime<Utc>> {
    if !ms.is_finite() {
        return Err(JsonataError::function(
            "D3136",
            format!("${}", function),
            "Timestamp must be finite",
        ));
    }
    DateTime::<Utc>::from_timestamp_millis(ms.floor() as i64).ok_or_else(|| {
        JsonataError::function(
            "D3136",
            format!("${}", function),
            format!("Timestamp out of range: {}", ms),
        )
    })
}

fn now(evaluator: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    render_timestamp("now", evaluator.now(), args, 0)
}

fn millis(evaluator: &Evaluator, _: &[Value], _: &Value) -> Result<Value> {
    Ok(Value::Number(evaluator.now().timestamp_millis() as f64))
}

fn from_millis(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(ms) = number_arg("fromMillis", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let timestamp = millis_timestamp("fromMillis", ms)?;
    render_timestamp("fromMillis", timestamp, args, 1)
}

fn unparsable_timestamp(function: &str, text: &str) -> JsonataError {
    JsonataError::function(
        "D3110",
        format!("${}", function),
        format!("The timestamp \"{}\" cannot be parsed as ISO 8601", text),
    )
}

fn to_millis(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("toMillis", args, 0)? else {
        return Ok(Value::Undefined);
    };
    format::parse_timestamp(s)
        .map(|timestamp| Value::Number(timestamp.timestamp_millis() as f64))
        .ok_or_else(|| unparsable_timestamp("toMillis", s))
}

/// `$formatDateTime(timestamp, picture?, timezone?)` for millis or ISO strings
fn format_date_time(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let timestamp = match args.first() {
        None | Some(Value::Undefined) => return Ok(Value::Undefined),
        Some(Value::Number(ms)) => millis_timestamp("formatDateTime", *ms)?,
        Some(Value::String(s)) => format::parse_timestamp(s)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .ok_or_else(|| unparsable_timestamp("formatDateTime", s))?,
        Some(_) => {
            return Err(arg_error(
                "formatDateTime",
                0,
                "a number of milliseconds or an ISO 8601 string",
            ))
        }
    };
    render_timestamp("formatDateTime", timestamp, args, 1)
}

/// Widest result `$pad` will build
const MAX_PAD_WIDTH: f64 = 10_000_000.0;

/// Positive widths pad on the right, negative widths on the left
fn pad(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("pad", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let width = number_arg("pad", args, 1)?.ok_or_else(|| arg_error("pad", 1, "a number"))?;
    if width.abs() > MAX_PAD_WIDTH {
        return Err(arg_error("pad", 1, "a width of at most 10000000"));
    }
    let fill = match string_arg("pad", args, 2)? {
        Some(fill) if !fill.is_empty() => fill,
        _ => " ",
    };
    let len = s.chars().count();
    let target = width.abs().floor() as usize;
    if target <= len {
        return Ok(Value::String(s.to_string()));
    }
    let padding: String = fill.chars().cycle().take(target - len).collect();
    Ok(Value::String(if width < 0.0 {
        padding + s
    } else {
        format!("{}{}", s, padding)
    }))
}

/// Regex matches as `{match, index, groups}` objects
fn match_fn(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("match", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let Some(Value::Regex(regex)) = args.get(1) else {
        return Err(arg_error("match", 1, "a regular expression"));
    };
    let limit = match number_arg("match", args, 2)? {
        Some(n) if n < 0.0 => {
            return Err(JsonataError::function(
                "D3040",
                "$match",
                "Third argument must be a positive number",
            ))
        }
        Some(n) => n.floor() as usize,
        None => usize::MAX,
    };

    let mut out = Vec::new();
    for captures in regex.captures_iter(s).take(limit) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let groups = captures
            .iter()
            .skip(1)
            .map(|group| Value::String(group.map_or_else(String::new, |m| m.as_str().to_string())))
            .collect();
        let mut object = Object::with_capacity(3);
        object.insert("match".to_string(), Value::String(whole.as_str().to_string()));
        object.insert(
            "index".to_string(),
            Value::Number(s[..whole.start()].chars().count() as f64),
        );
        object.insert("groups".to_string(), Value::Array(groups));
        out.push(Value::object(object));
    }
    Ok(Value::from_sequence(out))
}

fn base64_encode(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    Ok(string_arg("base64encode", args, 0)?
        .map_or(Value::Undefined, |s| Value::String(BASE64.encode(s.as_bytes()))))
}

fn base64_decode(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(s) = string_arg("base64decode", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let bytes = BASE64
        .decode(s.trim())
        .map_err(|_| arg_error("base64decode", 0, "a base64 encoded string"))?;
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|_| arg_error("base64decode", 0, "base64 encoded UTF-8 text"))
}

/// Keep the members of an object for which the callback is truthy
fn sift(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let object = match args.first() {
        None | Some(Value::Undefined) => return Ok(Value::Undefined),
        Some(Value::Object(map)) => Rc::clone(map),
        Some(_) => return Err(arg_error("sift", 0, "an object")),
    };
    let callback = function_arg("sift", args, 1)?;
    let whole = Value::Object(Rc::clone(&object));
    let mut kept = Object::new();
    for (key, value) in object.iter() {
        let call_args = callback_args(
            callback,
            vec![value.clone(), Value::String(key.clone()), whole.clone()],
        );
        if evaluator.apply(callback, call_args, input)?.is_truthy() {
            kept.insert(key.clone(), value.clone());
        }
    }
    Ok(if kept.is_empty() {
        Value::Undefined
    } else {
        Value::object(kept)
    })
}

/// The one item matching the optional predicate
fn single(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let Some(items) = array_arg(args, 0) else {
        return Ok(Value::Undefined);
    };
    let callback = match args.get(1) {
        None | Some(Value::Undefined) => None,
        Some(callback) if callback.is_function() => Some(callback),
        Some(_) => return Err(arg_error("single", 1, "a function")),
    };
    let array = Value::Array(items.clone());
    let mut found = None;
    for (i, item) in items.into_iter().enumerate() {
        let matched = match callback {
            None => true,
            Some(callback) => {
                let call_args = callback_args(
                    callback,
                    vec![item.clone(), Value::Number(i as f64), array.clone()],
                );
                evaluator.apply(callback, call_args, input)?.is_truthy()
            }
        };
        if !matched {
            continue;
        }
        if found.is_some() {
            return Err(JsonataError::function(
                "D3138",
                "$single",
                "The $single() function expected exactly 1 matching result. Instead it matched more.",
            ));
        }
        found = Some(item);
    }
    found.ok_or_else(|| {
        JsonataError::function(
            "D3139",
            "$single",
            "The $single() function expected exactly 1 matching result. Instead it matched 0.",
        )
    })
}

/// Convolve arrays into an array of tuples, as long as the shortest
fn zip(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let arrays: Vec<Vec<Value>> = args
        .iter()
        .map(|arg| arg.clone().into_items())
        .collect();
    let len = arrays.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::Array(
        (0..len)
            .map(|i| Value::Array(arrays.iter().map(|array| array[i].clone()).collect()))
            .collect(),
    ))
}

fn format_number_fn(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(n) = number_arg("formatNumber", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let picture = string_arg("formatNumber", args, 1)?
        .ok_or_else(|| arg_error("formatNumber", 1, "a string"))?;
    let mut symbols = DecimalFormat::default();
    match args.get(2) {
        None | Some(Value::Undefined) => {}
        Some(Value::Object(options)) => {
            for (name, value) in options.iter() {
                let mut chars = value.as_str().unwrap_or_default().chars();
                match (chars.next(), chars.next()) {
                    (Some(symbol), None) => symbols.set(name, symbol),
                    _ => return Err(arg_error("formatNumber", 2, "an object of single character symbols")),
                }
            }
        }
        Some(_) => return Err(arg_error("formatNumber", 2, "an object")),
    }
    format::format_number(n, picture, &symbols).map(Value::String)
}

fn format_base(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let Some(n) = number_arg("formatBase", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let radix = number_arg("formatBase", args, 1)?.unwrap_or(10.0);
    format::format_base(n, radix.floor() as u32).map(Value::String)
}

fn error(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    let message = string_arg("error", args, 0)?.unwrap_or("$error() function evaluated");
    Err(JsonataError::function("D3137", "$error", message))
}

fn assert(_: &Evaluator, args: &[Value], _: &Value) -> Result<Value> {
    match args.first() {
        Some(Value::Bool(true)) => Ok(Value::Undefined),
        Some(Value::Bool(false)) => {
            let message = string_arg("assert", args, 1)?.unwrap_or("$assert() statement failed");
            Err(JsonataError::function("D3141", "$assert", message))
        }
        _ => Err(arg_error("assert", 0, "a boolean")),
    }
}

/// Parse and evaluate an expression at runtime, in a fresh scope
fn eval(evaluator: &Evaluator, args: &[Value], input: &Value) -> Result<Value> {
    let Some(expression) = string_arg("eval", args, 0)? else {
        return Ok(Value::Undefined);
    };
    let ast = parser::parse(expression).map_err(|err| {
        JsonataError::function(
            "D3120",
            "$eval",
            format!("Syntax error in expression passed to function eval: {}", err),
        )
    })?;
    let context = match args.get(1) {
        None | Some(Value::Undefined) => input,
        Some(context) => context,
    };
    evaluator
        .evaluate(&ast, context, &Frame::root())
        .map_err(|err| match err {
            JsonataError::DepthExceeded { .. } => err,
            other => JsonataError::function(
                "D3121",
                "$eval",
                format!("Dynamic error evaluating the expression passed to function eval: {}", other),
            ),
        })
}
