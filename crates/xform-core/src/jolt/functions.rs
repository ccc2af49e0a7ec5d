//! Functions callable from `=name(...)` values in the modify operations
//!
//! A function receives its evaluated arguments and the value currently
//! stored under the key being modified. Called without arguments it works
//! on that current value; functions such as `join`, `split` or `leftPad`
//! also fall back to it when only their settings are given, so
//! `"=join(',')"` joins the list already in place. Returning `None` leaves
//! the key untouched.

use serde_json::{Map, Number, Value};

/// Signature of a modify function
pub type ModifyFn = fn(&[Value], &Value) -> Option<Value>;

/// Registry of every function, keyed by its name in the spec
const FUNCTIONS: &[(&str, ModifyFn)] = &[
    // strings
    ("toLower", to_lower),
    ("toUpper", to_upper),
    ("trim", trim),
    ("concat", concat),
    ("join", join),
    ("split", split),
    ("leftPad", left_pad),
    ("rightPad", right_pad),
    ("substring", substring),
    // type conversion
    ("toString", to_string),
    ("toInteger", to_integer),
    ("toLong", to_integer),
    ("toDouble", to_double),
    ("toBoolean", to_boolean),
    ("toList", to_list),
    // numbers
    ("abs", abs),
    ("min", min),
    ("max", max),
    ("avg", avg),
    ("intSum", int_sum),
    ("longSum", int_sum),
    ("doubleSum", double_sum),
    ("intSubtract", int_subtract),
    ("longSubtract", int_subtract),
    ("doubleSubtract", double_subtract),
    ("divide", divide),
    ("divideAndRound", divide_and_round),
    // lists
    ("size", size),
    ("firstElement", first_element),
    ("lastElement", last_element),
    ("elementAt", element_at),
    ("sort", sort),
    ("squashNulls", squash_nulls),
    ("recursivelySquashNulls", recursively_squash_nulls),
    ("noop", noop),
];

/// Find a function by name
pub fn lookup(name: &str) -> Option<ModifyFn> {
    FUNCTIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, function)| *function)
}

/// Names of all functions
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|(name, _)| *name)
}

/// The single operand: the first argument, else the current value
fn operand<'v>(args: &'v [Value], current: &'v Value) -> &'v Value {
    args.first().unwrap_or(current)
}

/// Arguments with lists spread out, or the current value when none are given
fn spread<'v>(args: &'v [Value], current: &'v Value) -> Vec<&'v Value> {
    let source = if args.is_empty() {
        std::slice::from_ref(current)
    } else {
        args
    };
    let mut out = Vec::new();
    for arg in source {
        match arg {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}

/// Text of a scalar; containers and null have none
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn float(n: f64) -> Option<Value> {
    Number::from_f64(n).map(Value::Number)
}

fn to_lower(args: &[Value], current: &Value) -> Option<Value> {
    operand(args, current)
        .as_str()
        .map(|s| Value::String(s.to_lowercase()))
}

fn to_upper(args: &[Value], current: &Value) -> Option<Value> {
    operand(args, current)
        .as_str()
        .map(|s| Value::String(s.to_uppercase()))
}

fn trim(args: &[Value], current: &Value) -> Option<Value> {
    operand(args, current)
        .as_str()
        .map(|s| Value::String(s.trim().to_string()))
}

fn concat(args: &[Value], current: &Value) -> Option<Value> {
    let parts: String = spread(args, current).into_iter().filter_map(text).collect();
    Some(Value::String(parts))
}

fn join(args: &[Value], current: &Value) -> Option<Value> {
    let (separator, rest) = args.split_first()?;
    let separator = text(separator)?;
    let parts: Vec<String> = spread(rest, current).into_iter().filter_map(text).collect();
    Some(Value::String(parts.join(&separator)))
}

fn split(args: &[Value], current: &Value) -> Option<Value> {
    let separator = args.first()?.as_str()?;
    let source = args.get(1).unwrap_or(current).as_str()?;
    let pattern = regex::Regex::new(separator).ok()?;
    Some(Value::Array(
        pattern
            .split(source)
            .map(|part| Value::String(part.to_string()))
            .collect(),
    ))
}

/// Settings for the padding functions: `(value, width, fill)` or `(width, fill)`
fn pad_args<'v>(args: &'v [Value], current: &'v Value) -> Option<(String, usize, char)> {
    let (value, width, fill) = match args {
        [value, width, fill, ..] => (value, width, fill),
        [width, fill] => (current, width, fill),
        _ => return None,
    };
    let width = usize::try_from(as_i64(width)?).ok()?;
    let fill = fill.as_str()?.chars().next()?;
    Some((text(value)?, width, fill))
}

fn left_pad(args: &[Value], current: &Value) -> Option<Value> {
    let (value, width, fill) = pad_args(args, current)?;
    let missing = width.saturating_sub(value.chars().count());
    Some(Value::String(
        std::iter::repeat(fill).take(missing).chain(value.chars()).collect(),
    ))
}

fn right_pad(args: &[Value], current: &Value) -> Option<Value> {
    let (value, width, fill) = pad_args(args, current)?;
    let missing = width.saturating_sub(value.chars().count());
    Some(Value::String(
        value.chars().chain(std::iter::repeat(fill).take(missing)).collect(),
    ))
}

/// `(value, start, end)` or `(start, end)`; out of range bounds give nothing
fn substring(args: &[Value], current: &Value) -> Option<Value> {
    let (value, start, end) = match args {
        [value, start, end, ..] => (value, start, end),
        [start, end] => (current, start, end),
        _ => return None,
    };
    let chars: Vec<char> = value.as_str()?.chars().collect();
    let start = usize::try_from(as_i64(start)?).ok()?;
    let end = usize::try_from(as_i64(end)?).ok()?;
    if start > end || end > chars.len() {
        return None;
    }
    Some(Value::String(chars[start..end].iter().collect()))
}

fn to_string(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Null => None,
        container @ (Value::Array(_) | Value::Object(_)) => {
            Some(Value::String(container.to_string()))
        }
        scalar => text(scalar).map(Value::String),
    }
}

fn to_integer(args: &[Value], current: &Value) -> Option<Value> {
    as_i64(operand(args, current)).map(Value::from)
}

fn to_double(args: &[Value], current: &Value) -> Option<Value> {
    as_f64(operand(args, current)).and_then(float)
}

fn to_boolean(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
        _ => None,
    }
}

fn to_list(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Null => None,
        Value::Array(items) => Some(Value::Array(items.clone())),
        other => Some(Value::Array(vec![other.clone()])),
    }
}

fn abs(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.checked_abs().map(Value::from),
            None => n.as_f64().and_then(|f| float(f.abs())),
        },
        _ => None,
    }
}

/// Numbers among the operands; integers stay integers in the result
fn numbers(args: &[Value], current: &Value) -> Vec<Number> {
    spread(args, current)
        .into_iter()
        .filter_map(|value| match value {
            Value::Number(n) => Some(n.clone()),
            _ => None,
        })
        .collect()
}

fn extreme(args: &[Value], current: &Value, pick_greater: bool) -> Option<Value> {
    let mut best: Option<Number> = None;
    for n in numbers(args, current) {
        let candidate = n.as_f64()?;
        let replace = match &best {
            None => true,
            Some(b) => {
                let b = b.as_f64()?;
                if pick_greater {
                    candidate > b
                } else {
                    candidate < b
                }
            }
        };
        if replace {
            best = Some(n);
        }
    }
    best.map(Value::Number)
}

fn min(args: &[Value], current: &Value) -> Option<Value> {
    extreme(args, current, false)
}

fn max(args: &[Value], current: &Value) -> Option<Value> {
    extreme(args, current, true)
}

fn avg(args: &[Value], current: &Value) -> Option<Value> {
    let values: Vec<f64> = numbers(args, current).iter().filter_map(Number::as_f64).collect();
    if values.is_empty() {
        return None;
    }
    float(values.iter().sum::<f64>() / values.len() as f64)
}

fn int_sum(args: &[Value], current: &Value) -> Option<Value> {
    spread(args, current)
        .into_iter()
        .filter_map(as_i64)
        .try_fold(0i64, i64::checked_add)
        .map(Value::from)
}

fn double_sum(args: &[Value], current: &Value) -> Option<Value> {
    float(spread(args, current).into_iter().filter_map(as_f64).sum())
}

fn int_subtract(args: &[Value], _: &Value) -> Option<Value> {
    let [a, b, ..] = args else {
        return None;
    };
    as_i64(a)?.checked_sub(as_i64(b)?).map(Value::from)
}

fn double_subtract(args: &[Value], _: &Value) -> Option<Value> {
    let [a, b, ..] = args else {
        return None;
    };
    float(as_f64(a)? - as_f64(b)?)
}

fn divide(args: &[Value], _: &Value) -> Option<Value> {
    let [a, b, ..] = args else {
        return None;
    };
    let divisor = as_f64(b)?;
    if divisor == 0.0 {
        return None;
    }
    float(as_f64(a)? / divisor)
}

/// `(digits, numerator, denominator)`, rounding half away from zero
fn divide_and_round(args: &[Value], _: &Value) -> Option<Value> {
    let [digits, a, b, ..] = args else {
        return None;
    };
    let digits = i32::try_from(as_i64(digits)?).ok()?;
    let divisor = as_f64(b)?;
    if divisor == 0.0 {
        return None;
    }
    let scale = 10f64.powi(digits);
    float((as_f64(a)? / divisor * scale).round() / scale)
}

fn size(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Array(items) => Some(Value::from(items.len())),
        Value::Object(map) => Some(Value::from(map.len())),
        Value::String(s) => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

fn first_element(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Array(items) => items.first().cloned(),
        _ => None,
    }
}

fn last_element(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        Value::Array(items) => items.last().cloned(),
        _ => None,
    }
}

/// `(list, index)` or `(index)` against the current list
fn element_at(args: &[Value], current: &Value) -> Option<Value> {
    let (list, index) = match args {
        [list, index, ..] => (list, index),
        [index] => (current, index),
        _ => return None,
    };
    let index = usize::try_from(as_i64(index)?).ok()?;
    match list {
        Value::Array(items) => items.get(index).cloned(),
        _ => None,
    }
}

/// Lists of all numbers or all strings sort; anything else is left alone
fn sort(args: &[Value], current: &Value) -> Option<Value> {
    let Value::Array(items) = operand(args, current) else {
        return None;
    };
    let mut items = items.clone();
    if items.iter().all(Value::is_string) {
        items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    } else if items.iter().all(Value::is_number) {
        items.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(std::cmp::Ordering::Equal));
    } else {
        return None;
    }
    Some(Value::Array(items))
}

fn squash(value: &Value, deep: bool) -> Value {
    let inner = |v: &Value| if deep { squash(v, true) } else { v.clone() };
    match value {
        Value::Array(items) => Value::Array(items.iter().filter(|v| !v.is_null()).map(inner).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), inner(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

fn squash_nulls(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        value @ (Value::Array(_) | Value::Object(_)) => Some(squash(value, false)),
        _ => None,
    }
}

fn recursively_squash_nulls(args: &[Value], current: &Value) -> Option<Value> {
    match operand(args, current) {
        value @ (Value::Array(_) | Value::Object(_)) => Some(squash(value, true)),
        _ => None,
    }
}

fn noop(_: &[Value], _: &Value) -> Option<Value> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Vec<Value>, current: Value) -> Option<Value> {
        let function = lookup(name).unwrap_or_else(|| panic!("no function {}", name));
        function(&args, &current)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("toUpper", vec![], json!("abc")), Some(json!("ABC")));
        assert_eq!(call("toLower", vec![json!("ABC")], Value::Null), Some(json!("abc")));
        assert_eq!(call("trim", vec![], json!("  x ")), Some(json!("x")));
        assert_eq!(call("toUpper", vec![], json!(5)), None);
        assert_eq!(
            call("concat", vec![json!("a"), json!(1), Value::Null, json!("b")], Value::Null),
            Some(json!("a1b"))
        );
    }

    #[test]
    fn test_join_and_split_fall_back_to_current_value() {
        assert_eq!(call("join", vec![json!(",")], json!(["a", "b"])), Some(json!("a,b")));
        assert_eq!(
            call("join", vec![json!("-"), json!("x"), json!(["y", "z"])], Value::Null),
            Some(json!("x-y-z"))
        );
        assert_eq!(call("split", vec![json!(",")], json!("a,b")), Some(json!(["a", "b"])));
        assert_eq!(call("split", vec![json!("[.]"), json!("1.2")], Value::Null), Some(json!(["1", "2"])));
    }

    #[test]
    fn test_padding_and_substring() {
        assert_eq!(call("leftPad", vec![json!(5), json!("0")], json!("42")), Some(json!("00042")));
        assert_eq!(
            call("rightPad", vec![json!("ab"), json!(4), json!("*")], Value::Null),
            Some(json!("ab**"))
        );
        assert_eq!(call("substring", vec![json!(0), json!(3)], json!("abcdef")), Some(json!("abc")));
        assert_eq!(call("substring", vec![json!(2), json!(9)], json!("abc")), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("toInteger", vec![], json!("12")), Some(json!(12)));
        assert_eq!(call("toInteger", vec![], json!(3.9)), Some(json!(3)));
        assert_eq!(call("toDouble", vec![], json!("1.5")), Some(json!(1.5)));
        assert_eq!(call("toBoolean", vec![], json!("TRUE")), Some(json!(true)));
        assert_eq!(call("toString", vec![], json!(7)), Some(json!("7")));
        assert_eq!(call("toList", vec![], json!(1)), Some(json!([1])));
        assert_eq!(call("toInteger", vec![], json!("abc")), None);
    }

    #[test]
    fn test_number_functions() {
        assert_eq!(call("min", vec![], json!([3, 1, 2])), Some(json!(1)));
        assert_eq!(call("max", vec![json!(3), json!(7.5)], Value::Null), Some(json!(7.5)));
        assert_eq!(call("avg", vec![], json!([1, 2])), Some(json!(1.5)));
        assert_eq!(call("intSum", vec![json!(1), json!("2")], Value::Null), Some(json!(3)));
        assert_eq!(call("intSubtract", vec![json!(5), json!(3)], Value::Null), Some(json!(2)));
        assert_eq!(call("divide", vec![json!(1), json!(4)], Value::Null), Some(json!(0.25)));
        assert_eq!(call("divide", vec![json!(1), json!(0)], Value::Null), None);
        assert_eq!(
            call("divideAndRound", vec![json!(2), json!(2), json!(3)], Value::Null),
            Some(json!(0.67))
        );
        assert_eq!(call("abs", vec![], json!(-4)), Some(json!(4)));
    }

    #[test]
    fn test_list_functions() {
        assert_eq!(call("size", vec![], json!([1, 2, 3])), Some(json!(3)));
        assert_eq!(call("firstElement", vec![], json!([1, 2])), Some(json!(1)));
        assert_eq!(call("lastElement", vec![], json!([1, 2])), Some(json!(2)));
        assert_eq!(call("elementAt", vec![json!(1)], json!(["a", "b"])), Some(json!("b")));
        assert_eq!(call("sort", vec![], json!(["b", "a"])), Some(json!(["a", "b"])));
        assert_eq!(call("squashNulls", vec![], json!([1, null, 2])), Some(json!([1, 2])));
        assert_eq!(
            call("recursivelySquashNulls", vec![], json!({"a": null, "b": {"c": null}})),
            Some(json!({"b": {}}))
        );
        assert_eq!(call("noop", vec![], json!(1)), None);
    }

    #[test]
    fn test_registry() {
        assert!(lookup("concat").is_some());
        assert!(lookup("toUpperCase").is_none());
        assert!(names().count() >= 30);
    }
}
