//! JSONata expression evaluator
//!
//! Walks the AST against a context value. Path steps are applied to every
//! item of the incoming sequence and their results are flattened, which is
//! what gives JSONata its implicit mapping over arrays.

use super::ast::*;
use super::error::JsonataError;
use super::functions;
use super::value::{Closure, Frame, Object, Value};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

type Result<T> = std::result::Result<T, JsonataError>;

/// One item of a path evaluated with variable bindings
struct Tuple {
    /// Value produced by the step
    value: Value,
    /// Context for the next step; stays put after `@$name`
    context: Value,
    env: Rc<Frame>,
}

/// Default maximum evaluation depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Evaluation state for one run of an expression
pub struct Evaluator {
    /// The original input, bound to `$$`
    root: Value,
    depth: Cell<usize>,
    max_depth: usize,
    /// Timestamp shared by `$now` and `$millis` within one evaluation
    now: DateTime<Utc>,
    /// Scopes that received bindings; cleared on drop to release closures
    bound_frames: RefCell<Vec<Rc<Frame>>>,
}

impl Evaluator {
    /// Create an evaluator for the given root input
    pub fn new(root: Value, max_depth: usize) -> Self {
        Self {
            root,
            depth: Cell::new(0),
            max_depth,
            now: Utc::now(),
            bound_frames: RefCell::new(Vec::new()),
        }
    }

    /// Evaluation start time
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The root input value
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Evaluate an expression against a context value
    pub fn evaluate(&self, expr: &Expr, input: &Value, env: &Rc<Frame>) -> Result<Value> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(JsonataError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.depth.set(depth);
        let result = self.evaluate_inner(expr, input, env);
        self.depth.set(depth - 1);
        result
    }

    fn evaluate_inner(&self, expr: &Expr, input: &Value, env: &Rc<Frame>) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::String(s) => Value::String(s.clone()),
                Literal::Number(n) => Value::Number(*n),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            Expr::Regex(literal) => Ok(Value::Regex(literal.regex.clone())),
            Expr::Name(name) => Ok(field(input, name)),
            Expr::Wildcard => Ok(wildcard(input)),
            Expr::Descendants => {
                let mut out = Vec::new();
                descendants(input, &mut out);
                Ok(Value::from_sequence(out))
            }
            Expr::Variable(name) => Ok(self.variable(name, input, env)),
            Expr::Path(path) => self.evaluate_path(path, input, env),
            Expr::Binary { op, lhs, rhs } => self.evaluate_binary(*op, lhs, rhs, input, env),
            Expr::Negate(operand) => match self.evaluate(operand, input, env)? {
                Value::Undefined => Ok(Value::Undefined),
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(JsonataError::type_error(
                    "D1002",
                    "Cannot negate a non-numeric value",
                )),
            },
            Expr::Condition {
                condition,
                then,
                otherwise,
            } => {
                if self.evaluate(condition, input, env)?.is_truthy() {
                    self.evaluate(then, input, env)
                } else if let Some(otherwise) = otherwise {
                    self.evaluate(otherwise, input, env)
                } else {
                    Ok(Value::Undefined)
                }
            }
            Expr::Block(expressions) => {
                let scope = Frame::child(env);
                let mut result = Value::Undefined;
                for expression in expressions {
                    result = self.evaluate(expression, input, &scope)?;
                }
                Ok(result)
            }
            Expr::Bind { name, value } => {
                let value = self.evaluate(value, input, env)?;
                env.bind(name.clone(), value.clone());
                self.bound_frames.borrow_mut().push(Rc::clone(env));
                Ok(value)
            }
            Expr::Array(items) => self.evaluate_array(items, input, env),
            Expr::Range { start, end } => Ok(Value::Array(self.evaluate_range(start, end, input, env)?)),
            Expr::Object(pairs) => self.evaluate_group(input.clone(), pairs, env),
            Expr::GroupBy { source, pairs } => {
                let source = self.evaluate(source, input, env)?;
                self.evaluate_group(source, pairs, env)
            }
            Expr::Call { procedure, args } => {
                let function = self.evaluate(procedure, input, env)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg, input, env)?);
                }
                self.apply_function(&function, values, input, procedure)
            }
            Expr::Lambda(lambda) => Ok(Value::Lambda(Rc::new(Closure {
                lambda: Rc::clone(lambda),
                env: Rc::clone(env),
                context: input.clone(),
            }))),
            Expr::Apply { lhs, rhs } => {
                let value = self.evaluate(lhs, input, env)?;
                match rhs.as_ref() {
                    Expr::Call { procedure, args } => {
                        let function = self.evaluate(procedure, input, env)?;
                        let mut values = Vec::with_capacity(args.len() + 1);
                        values.push(value);
                        for arg in args {
                            values.push(self.evaluate(arg, input, env)?);
                        }
                        self.apply_function(&function, values, input, procedure)
                    }
                    other => {
                        let function = self.evaluate(other, input, env)?;
                        self.apply_function(&function, vec![value], input, other)
                    }
                }
            }
            Expr::Transform {
                location,
                update,
                delete,
            } => self.evaluate_transform(location, update, delete.as_deref(), env),
        }
    }

    /// Resolve `$`, `$$`, bound variables and builtins
    fn variable(&self, name: &str, input: &Value, env: &Rc<Frame>) -> Value {
        match name {
            "" => input.clone(),
            "$" => self.root.clone(),
            _ => env
                .lookup(name)
                .or_else(|| functions::lookup(name).map(Value::Builtin))
                .unwrap_or(Value::Undefined),
        }
    }

    fn apply_function(
        &self,
        function: &Value,
        args: Vec<Value>,
        input: &Value,
        procedure: &Expr,
    ) -> Result<Value> {
        if !function.is_function() {
            let name = match procedure {
                Expr::Variable(name) => format!("${}", name),
                _ => "expression".to_string(),
            };
            return Err(JsonataError::type_error(
                "T1006",
                format!("Attempted to invoke a non-function: {}", name),
            ));
        }
        self.apply(function, args, input)
    }

    /// Call a function value with already evaluated arguments
    pub fn apply(&self, function: &Value, args: Vec<Value>, input: &Value) -> Result<Value> {
        match function {
            Value::Lambda(closure) => {
                let scope = Frame::child(&closure.env);
                for (i, param) in closure.lambda.params.iter().enumerate() {
                    scope.bind(param.clone(), args.get(i).cloned().unwrap_or(Value::Undefined));
                }
                self.evaluate(&closure.lambda.body, &closure.context, &scope)
            }
            Value::Builtin(builtin) => {
                if builtin.context_arg && args.is_empty() {
                    (builtin.func)(self, std::slice::from_ref(input), input)
                } else {
                    (builtin.func)(self, &args, input)
                }
            }
            _ => Err(JsonataError::type_error(
                "T1006",
                "Attempted to invoke a non-function",
            )),
        }
    }

    /// Items a path starts from: navigation steps map over an input array
    fn path_start(path: &PathExpr, input: &Value) -> Vec<Value> {
        match (path.steps.first().map(|step| &step.kind), input) {
            (Some(StepKind::Expr(expr)), Value::Array(items)) if expr.is_navigation() => {
                items.clone()
            }
            _ => vec![input.clone()],
        }
    }

    fn evaluate_path(&self, path: &PathExpr, input: &Value, env: &Rc<Frame>) -> Result<Value> {
        if path.has_bindings() {
            return self.evaluate_tuple_path(path, input, env);
        }
        let mut sequence = Self::path_start(path, input);
        let mut plain_array = false;

        for step in &path.steps {
            let (next, is_plain) = match &step.kind {
                StepKind::Expr(expr) => self.evaluate_step(expr, &step.predicates, &sequence, env)?,
                StepKind::Sort(terms) => {
                    let mut keyed = Vec::with_capacity(sequence.len());
                    for item in sequence {
                        keyed.push((self.sort_keys(terms, &item, env)?, item));
                    }
                    let mut sorted = sort_keyed(terms, keyed)?;
                    for predicate in &step.predicates {
                        sorted = self.filter(predicate, sorted, env)?;
                    }
                    (sorted, false)
                }
            };
            sequence = next;
            plain_array = is_plain;
        }

        if plain_array || path.keep_array {
            Ok(Value::Array(sequence))
        } else {
            Ok(Value::from_sequence(sequence))
        }
    }

    /// Apply one step to every item; returns the flattened results and
    /// whether they are a single array value passed through unchanged
    fn evaluate_step(
        &self,
        expr: &Expr,
        predicates: &[Expr],
        sequence: &[Value],
        env: &Rc<Frame>,
    ) -> Result<(Vec<Value>, bool)> {
        let mut results = Vec::new();
        let mut plain_array = false;

        for item in sequence {
            let value = self.evaluate(expr, item, env)?;
            let keep_whole = expr.is_array_constructor() && predicates.is_empty();
            plain_array = sequence.len() == 1
                && value.is_array()
                && !keep_whole
                && predicates.is_empty()
                && !matches!(expr, Expr::Wildcard | Expr::Descendants)
                && !item.is_array();

            let mut items = if keep_whole {
                vec![value]
            } else {
                value.into_items()
            };
            for predicate in predicates {
                items = self.filter(predicate, items, env)?;
            }
            results.extend(items.into_iter().filter(|v| !v.is_undefined()));
        }

        Ok((results, plain_array))
    }

    /// Evaluate a path whose steps bind `@$name` or `#$name`; every item
    /// carries the scope holding the bindings made on the way to it
    fn evaluate_tuple_path(
        &self,
        path: &PathExpr,
        input: &Value,
        env: &Rc<Frame>,
    ) -> Result<Value> {
        let mut stream: Vec<Tuple> = Self::path_start(path, input)
            .into_iter()
            .map(|item| Tuple {
                value: item.clone(),
                context: item,
                env: Rc::clone(env),
            })
            .collect();

        for step in &path.steps {
            stream = match &step.kind {
                StepKind::Expr(expr) => {
                    let mut next = Vec::new();
                    for tuple in &stream {
                        let value = self.evaluate(expr, &tuple.context, &tuple.env)?;
                        let items = if expr.is_array_constructor() && step.predicates.is_empty() {
                            vec![value]
                        } else {
                            value.into_items()
                        };
                        let produced = items
                            .into_iter()
                            .filter(|item| !item.is_undefined())
                            .map(|item| match &step.focus {
                                Some(name) => {
                                    let scope = Frame::child(&tuple.env);
                                    scope.bind(name.clone(), item.clone());
                                    Tuple {
                                        value: item,
                                        context: tuple.context.clone(),
                                        env: scope,
                                    }
                                }
                                None => Tuple {
                                    value: item.clone(),
                                    context: item,
                                    env: Rc::clone(&tuple.env),
                                },
                            })
                            .collect();
                        next.extend(self.filter_tuples(step, produced)?);
                    }
                    next
                }
                StepKind::Sort(terms) => {
                    let mut keyed = Vec::with_capacity(stream.len());
                    for tuple in stream {
                        keyed.push((self.sort_keys(terms, &tuple.context, &tuple.env)?, tuple));
                    }
                    self.filter_tuples(step, sort_keyed(terms, keyed)?)?
                }
            };
        }

        let values = stream.into_iter().map(|tuple| tuple.value).collect();
        if path.keep_array {
            Ok(Value::Array(values))
        } else {
            Ok(Value::from_sequence(values))
        }
    }

    /// Run a step's predicates over tuples, binding `#$name` at its place
    fn filter_tuples(&self, step: &Step, mut tuples: Vec<Tuple>) -> Result<Vec<Tuple>> {
        for stage in 0..=step.predicates.len() {
            if let Some(binding) = step.index.as_ref().filter(|b| b.after == stage) {
                for (i, tuple) in tuples.iter_mut().enumerate() {
                    let scope = Frame::child(&tuple.env);
                    scope.bind(binding.name.clone(), Value::Number(i as f64));
                    tuple.env = scope;
                }
            }
            let Some(predicate) = step.predicates.get(stage) else {
                break;
            };
            let len = tuples.len() as i64;
            let mut kept = Vec::with_capacity(tuples.len());
            for (i, tuple) in tuples.into_iter().enumerate() {
                if self.predicate_keeps(predicate, &tuple.context, &tuple.env, i as i64, len)? {
                    kept.push(tuple);
                }
            }
            tuples = kept;
        }
        Ok(tuples)
    }

    /// Apply a predicate: numbers select by index, anything else filters
    fn filter(&self, predicate: &Expr, items: Vec<Value>, env: &Rc<Frame>) -> Result<Vec<Value>> {
        let len = items.len() as i64;
        let mut out = Vec::new();

        for (i, item) in items.into_iter().enumerate() {
            if self.predicate_keeps(predicate, &item, env, i as i64, len)? {
                out.push(item);
            }
        }

        Ok(out)
    }

    fn predicate_keeps(
        &self,
        predicate: &Expr,
        item: &Value,
        env: &Rc<Frame>,
        i: i64,
        len: i64,
    ) -> Result<bool> {
        Ok(match self.evaluate(predicate, item, env)? {
            Value::Number(n) => index_matches(n, i, len),
            Value::Array(values)
                if !values.is_empty() && values.iter().all(|v| v.as_f64().is_some()) =>
            {
                values
                    .iter()
                    .filter_map(Value::as_f64)
                    .any(|n| index_matches(n, i, len))
            }
            other => other.is_truthy(),
        })
    }

    fn sort_keys(&self, terms: &[SortTerm], item: &Value, env: &Rc<Frame>) -> Result<Vec<Value>> {
        let mut keys = Vec::with_capacity(terms.len());
        for term in terms {
            keys.push(self.evaluate(&term.expr, item, env)?);
        }
        Ok(keys)
    }

    /// Copy the transform target, applying the update and delete clauses
    /// to every object the location selects
    fn evaluate_transform(
        &self,
        location: &Expr,
        update: &Expr,
        delete: Option<&Expr>,
        env: &Rc<Frame>,
    ) -> Result<Value> {
        let target = env.lookup(TRANSFORM_TARGET).unwrap_or(Value::Undefined);
        if target.is_undefined() {
            return Ok(Value::Undefined);
        }
        let selected: Vec<Rc<Object>> = self
            .evaluate(location, &target, env)?
            .into_items()
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(object) => Some(object),
                _ => None,
            })
            .collect();
        if selected.is_empty() {
            return Ok(target);
        }
        self.rebuild(&target, &selected, update, delete, env)
    }

    fn rebuild(
        &self,
        value: &Value,
        selected: &[Rc<Object>],
        update: &Expr,
        delete: Option<&Expr>,
        env: &Rc<Frame>,
    ) -> Result<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.rebuild(item, selected, update, delete, env))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(object) => {
                let mut copy = Object::with_capacity(object.len());
                for (key, member) in object.iter() {
                    copy.insert(key.clone(), self.rebuild(member, selected, update, delete, env)?);
                }
                if selected.iter().any(|s| Rc::ptr_eq(s, object)) {
                    self.update_object(&mut copy, value, update, delete, env)?;
                }
                Ok(Value::object(copy))
            }
            other => Ok(other.clone()),
        }
    }

    fn update_object(
        &self,
        copy: &mut Object,
        original: &Value,
        update: &Expr,
        delete: Option<&Expr>,
        env: &Rc<Frame>,
    ) -> Result<()> {
        match self.evaluate(update, original, env)? {
            Value::Undefined => {}
            Value::Object(changes) => {
                for (key, change) in changes.iter() {
                    copy.insert(key.clone(), change.clone());
                }
            }
            _ => {
                return Err(JsonataError::type_error(
                    "T2011",
                    "The insert/update clause of the transform expression must evaluate to an object",
                ))
            }
        }

        let Some(delete) = delete else {
            return Ok(());
        };
        let bad_delete = || {
            JsonataError::type_error(
                "T2012",
                "The delete clause of the transform expression must evaluate to a string or array of strings",
            )
        };
        match self.evaluate(delete, original, env)? {
            Value::Undefined => {}
            Value::String(key) => {
                copy.shift_remove(&key);
            }
            Value::Array(keys) => {
                for key in keys {
                    let Value::String(key) = key else {
                        return Err(bad_delete());
                    };
                    copy.shift_remove(&key);
                }
            }
            _ => return Err(bad_delete()),
        }
        Ok(())
    }

    fn evaluate_array(&self, items: &[Expr], input: &Value, env: &Rc<Frame>) -> Result<Value> {
        let mut out = Vec::new();
        for item in items {
            if let Expr::Range { start, end } = item {
                out.extend(self.evaluate_range(start, end, input, env)?);
                continue;
            }
            match self.evaluate(item, input, env)? {
                Value::Undefined => {}
                value @ Value::Array(_) if item.is_array_constructor() => out.push(value),
                Value::Array(values) => out.extend(values),
                value => out.push(value),
            }
        }
        Ok(Value::Array(out))
    }

    fn evaluate_range(
        &self,
        start: &Expr,
        end: &Expr,
        input: &Value,
        env: &Rc<Frame>,
    ) -> Result<Vec<Value>> {
        let start = self.evaluate(start, input, env)?;
        let end = self.evaluate(end, input, env)?;
        let (start, end) = match (&start, &end) {
            (Value::Undefined, _) | (_, Value::Undefined) => return Ok(Vec::new()),
            (Value::Number(a), Value::Number(b)) if a.fract() == 0.0 && b.fract() == 0.0 => {
                (*a as i64, *b as i64)
            }
            (Value::Number(a), _) if a.fract() == 0.0 => {
                return Err(JsonataError::type_error(
                    "T2004",
                    "The right side of the range operator (..) must evaluate to an integer",
                ))
            }
            _ => {
                return Err(JsonataError::type_error(
                    "T2003",
                    "The left side of the range operator (..) must evaluate to an integer",
                ))
            }
        };
        if end.saturating_sub(start) > 10_000_000 {
            return Err(JsonataError::evaluation(
                "D2014",
                "The size of the sequence allocated by the range operator (..) must not exceed 1e7",
            ));
        }
        Ok((start..=end).map(|n| Value::Number(n as f64)).collect())
    }

    /// Evaluate object constructor pairs, grouping the source items by key
    fn evaluate_group(
        &self,
        source: Value,
        pairs: &[(Expr, Expr)],
        env: &Rc<Frame>,
    ) -> Result<Value> {
        let items = match source {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut groups: IndexMap<String, (usize, Vec<Value>)> = IndexMap::new();
        for item in &items {
            for (index, (key_expr, _)) in pairs.iter().enumerate() {
                let key = match self.evaluate(key_expr, item, env)? {
                    Value::Undefined => continue,
                    Value::String(key) => key,
                    _ => {
                        return Err(JsonataError::type_error(
                            "T1003",
                            "Key in object structure must evaluate to a string",
                        ))
                    }
                };
                match groups.get_mut(&key) {
                    Some((existing, _)) if *existing != index => {
                        return Err(JsonataError::evaluation(
                            "D1009",
                            format!("Multiple key definitions evaluate to same key: \"{}\"", key),
                        ))
                    }
                    Some((_, data)) => data.push(item.clone()),
                    None => {
                        groups.insert(key, (index, vec![item.clone()]));
                    }
                }
            }
        }

        let mut object = IndexMap::with_capacity(groups.len());
        for (key, (index, data)) in groups {
            let context = if data.len() == 1 {
                data.into_iter().next().unwrap_or(Value::Undefined)
            } else {
                Value::Array(data)
            };
            let value = self.evaluate(&pairs[index].1, &context, env)?;
            if !value.is_undefined() {
                object.insert(key, value);
            }
        }
        Ok(Value::object(object))
    }

    fn evaluate_binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        input: &Value,
        env: &Rc<Frame>,
    ) -> Result<Value> {
        match op {
            BinaryOp::And => {
                let left = self.evaluate(lhs, input, env)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(rhs, input, env)?.is_truthy()))
            }
            BinaryOp::Or => {
                let left = self.evaluate(lhs, input, env)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate(rhs, input, env)?.is_truthy()))
            }
            _ => {
                let left = self.evaluate(lhs, input, env)?;
                let right = self.evaluate(rhs, input, env)?;
                binary(op, &left, &right)
            }
        }
    }
}

impl Drop for Evaluator {
    fn drop(&mut self) {
        for frame in self.bound_frames.borrow().iter() {
            frame.clear();
        }
    }
}

/// Apply a non short-circuiting binary operator to evaluated operands
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Concat => Ok(Value::String(format!(
            "{}{}",
            functions::stringify(left)?,
            functions::stringify(right)?
        ))),
        BinaryOp::In => {
            if left.is_undefined() {
                return Ok(Value::Bool(false));
            }
            let found = match right {
                Value::Array(items) => items.iter().any(|item| item.deep_equals(left)),
                other => other.deep_equals(left),
            };
            Ok(Value::Bool(found))
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            if left.is_undefined() || right.is_undefined() {
                return Ok(Value::Bool(false));
            }
            let equal = left.deep_equals(right);
            Ok(Value::Bool(if op == BinaryOp::Equal { equal } else { !equal }))
        }
        _ if op.is_ordering() => {
            if left.is_undefined() || right.is_undefined() {
                return Ok(Value::Undefined);
            }
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                    return Err(JsonataError::type_error(
                        "T2009",
                        format!(
                            "The values {} and {} either side of operator {} must be of the same data type",
                            functions::stringify(left)?,
                            functions::stringify(right)?,
                            op.symbol()
                        ),
                    ))
                }
                _ => {
                    return Err(JsonataError::type_error(
                        "T2010",
                        format!(
                            "The expressions either side of operator {} must evaluate to numeric or string values",
                            op.symbol()
                        ),
                    ))
                }
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::LessThan => ordering == Ordering::Less,
                BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                BinaryOp::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        _ => {
            let a = match left {
                Value::Undefined => return Ok(Value::Undefined),
                Value::Number(n) => *n,
                _ => {
                    return Err(JsonataError::type_error(
                        "T2001",
                        format!(
                            "The left side of the {} operator must evaluate to a number",
                            op.symbol()
                        ),
                    ))
                }
            };
            let b = match right {
                Value::Undefined => return Ok(Value::Undefined),
                Value::Number(n) => *n,
                _ => {
                    return Err(JsonataError::type_error(
                        "T2002",
                        format!(
                            "The right side of the {} operator must evaluate to a number",
                            op.symbol()
                        ),
                    ))
                }
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                _ => a % b,
            };
            if !result.is_finite() {
                return Err(JsonataError::evaluation(
                    "D1001",
                    format!("Number out of range: {} {} {}", a, op.symbol(), b),
                ));
            }
            Ok(Value::Number(result))
        }
    }
}

/// Field lookup, mapping over arrays
fn field(input: &Value, name: &str) -> Value {
    match input {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match field(item, name) {
                    Value::Undefined => {}
                    Value::Array(values) => out.extend(values),
                    value => out.push(value),
                }
            }
            Value::from_sequence(out)
        }
        _ => Value::Undefined,
    }
}

/// All values of an object, with array values flattened
fn wildcard(input: &Value) -> Value {
    let mut out = Vec::new();
    match input {
        Value::Object(map) => {
            for value in map.values() {
                match value {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                out.extend(wildcard(item).into_items());
            }
        }
        _ => {}
    }
    Value::from_sequence(out)
}

/// The value itself and every nested value, depth first
fn descendants(input: &Value, out: &mut Vec<Value>) {
    if !input.is_array() {
        out.push(input.clone());
    }
    match input {
        Value::Array(items) => items.iter().for_each(|item| descendants(item, out)),
        Value::Object(map) => map.values().for_each(|value| descendants(value, out)),
        _ => {}
    }
}

/// Order items by their precomputed sort keys; undefined keys sort last
fn sort_keyed<T>(terms: &[SortTerm], mut keyed: Vec<(Vec<Value>, T)>) -> Result<Vec<T>> {
    for (t, _) in terms.iter().enumerate() {
        let mut kind: Option<&'static str> = None;
        for (keys, _) in &keyed {
            let key_kind = match &keys[t] {
                Value::Undefined => continue,
                Value::Number(_) => "number",
                Value::String(_) => "string",
                _ => {
                    return Err(JsonataError::type_error(
                        "T2008",
                        "The expressions within an order-by clause must evaluate to numeric or string values",
                    ))
                }
            };
            match kind {
                Some(k) if k != key_kind => {
                    return Err(JsonataError::type_error(
                        "T2007",
                        "Type mismatch within order-by clause. All values must be of the same type",
                    ))
                }
                _ => kind = Some(key_kind),
            }
        }
    }

    keyed.sort_by(|(a, _), (b, _)| {
        for (t, term) in terms.iter().enumerate() {
            let ordering = compare_keys(&a[t], &b[t]);
            let ordering = if term.descending && !a[t].is_undefined() && !b[t].is_undefined() {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn index_matches(n: f64, position: i64, len: i64) -> bool {
    let mut index = n.floor() as i64;
    if index < 0 {
        index += len;
    }
    index == position
}

/// Order-by key comparison; undefined keys sort last
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonata::parser::parse;
    use serde_json::json;

    fn eval(expression: &str, input: serde_json::Value) -> Result<serde_json::Value> {
        let expr = parse(expression)?;
        let evaluator = Evaluator::new(Value::from(&input), DEFAULT_MAX_DEPTH);
        let root = evaluator.root().clone();
        evaluator
            .evaluate(&expr, &root, &Frame::root())?
            .to_json()
    }

    fn orders() -> serde_json::Value {
        json!({
            "Account": {
                "Order": [
                    {"id": "o1", "Product": [{"Price": 10, "Quantity": 2}, {"Price": 5, "Quantity": 1}]},
                    {"id": "o2", "Product": [{"Price": 3, "Quantity": 4}]}
                ]
            }
        })
    }

    #[test]
    fn test_path_flattens_across_arrays() {
        let result = eval("Account.Order.Product.Price", orders()).unwrap();
        assert_eq!(result, json!([10, 5, 3]));
    }

    #[test]
    fn test_predicate_applies_per_context_item() {
        let result = eval("Account.Order.Product[0].Price", orders()).unwrap();
        assert_eq!(result, json!([10, 3]));
        let last = eval("Account.Order[-1].id", orders()).unwrap();
        assert_eq!(last, json!("o2"));
    }

    #[test]
    fn test_singleton_array_field_is_preserved() {
        let result = eval("a.b", json!({"a": {"b": [1]}})).unwrap();
        assert_eq!(result, json!([1]));
        let collapsed = eval("a.b", json!({"a": [{"b": 1}]})).unwrap();
        assert_eq!(collapsed, json!(1));
    }

    #[test]
    fn test_keep_array_marker() {
        let result = eval("Account.Order[0].id[]", orders()).unwrap();
        assert_eq!(result, json!(["o1"]));
    }

    #[test]
    fn test_filter_predicate() {
        let result = eval("Account.Order.Product[Price > 4].Price", orders()).unwrap();
        assert_eq!(result, json!([10, 5]));
    }

    #[test]
    fn test_missing_path_is_undefined() {
        assert_eq!(eval("nothing.here", orders()).unwrap(), json!(null));
    }

    #[test]
    fn test_order_by() {
        let input = json!({"items": [{"n": "b", "p": 2}, {"n": "a", "p": 3}, {"n": "c", "p": 1}]});
        assert_eq!(eval("items^(p).n", input.clone()).unwrap(), json!(["c", "b", "a"]));
        assert_eq!(eval("items^(>p).n", input).unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_group_by() {
        let input = json!({"sales": [
            {"region": "east", "amount": 5},
            {"region": "west", "amount": 2},
            {"region": "east", "amount": 1}
        ]});
        let result = eval("sales{region: $sum(amount)}", input).unwrap();
        assert_eq!(result, json!({"east": 6, "west": 2}));
    }

    #[test]
    fn test_object_constructor_key_must_be_string() {
        let err = eval("{1: 2}", json!(null)).unwrap_err();
        assert_eq!(err.code(), "T1003");
    }

    #[test]
    fn test_array_constructor_and_range() {
        assert_eq!(eval("[1..3, 5]", json!(null)).unwrap(), json!([1, 2, 3, 5]));
        assert_eq!(eval("[[1, 2], [3]]", json!(null)).unwrap(), json!([[1, 2], [3]]));
        assert_eq!(eval("[1, 2, 3][1]", json!(null)).unwrap(), json!(2));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        assert_eq!(eval("1 + 2 * 3", json!(null)).unwrap(), json!(7));
        assert_eq!(eval("7 % 4 = 3", json!(null)).unwrap(), json!(true));
        assert_eq!(eval("'a' < 'b' and 2 >= 2", json!(null)).unwrap(), json!(true));
        assert_eq!(eval("missing + 1", json!({})).unwrap(), json!(null));
    }

    #[test]
    fn test_type_errors() {
        assert_eq!(eval("'a' + 1", json!(null)).unwrap_err().code(), "T2001");
        assert_eq!(eval("1 < 'a'", json!(null)).unwrap_err().code(), "T2009");
        assert_eq!(eval("1 / 0", json!(null)).unwrap_err().code(), "D1001");
    }

    #[test]
    fn test_concat_and_in() {
        assert_eq!(eval("'a' & 1 & true", json!(null)).unwrap(), json!("a1true"));
        assert_eq!(eval("2 in [1, 2]", json!(null)).unwrap(), json!(true));
    }

    #[test]
    fn test_blocks_bindings_and_lambdas() {
        let result = eval(
            "($double := function($x) { $x * 2 }; $double(21))",
            json!(null),
        )
        .unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn test_closures_capture_scope() {
        let result = eval(
            "($add := function($a) { function($b) { $a + $b } }; $add(2)(3))",
            json!(null),
        )
        .unwrap();
        assert_eq!(result, json!(5));
    }

    #[test]
    fn test_chain_operator() {
        let result = eval("'hello' ~> $uppercase()", json!(null)).unwrap();
        assert_eq!(result, json!("HELLO"));
    }

    #[test]
    fn test_conditional() {
        let result = eval("x > 1 ? 'big' : 'small'", json!({"x": 5})).unwrap();
        assert_eq!(result, json!("big"));
        assert_eq!(eval("false ? 1", json!(null)).unwrap(), json!(null));
    }

    #[test]
    fn test_wildcard_and_descendants() {
        let input = json!({"a": {"x": 1}, "b": {"x": 2, "y": {"x": 3}}});
        assert_eq!(eval("*.x", input.clone()).unwrap(), json!([1, 2]));
        assert_eq!(eval("**.x", input).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_root_variable() {
        let input = json!({"rate": 2, "items": [1, 2]});
        assert_eq!(eval("items.($ * $$.rate)", input).unwrap(), json!([2, 4]));
    }

    #[test]
    fn test_calling_non_function_fails() {
        let err = eval("$nosuch(1)", json!(null)).unwrap_err();
        assert_eq!(err.code(), "T1006");
    }

    #[test]
    fn test_recursion_depth_is_bounded() {
        let err = eval(
            "($f := function($n) { $f($n + 1) }; $f(0))",
            json!(null),
        )
        .unwrap_err();
        assert!(matches!(err, JsonataError::DepthExceeded { .. }));
    }

    #[test]
    fn test_positional_binding() {
        let input = json!({"a": [{"b": 1}, {"b": 2}]});
        assert_eq!(eval("a#$i.b", input.clone()).unwrap(), json!([1, 2]));
        assert_eq!(
            eval("a#$i.{'b': b, 'at': $i}", input.clone()).unwrap(),
            json!([{"b": 1, "at": 0}, {"b": 2, "at": 1}])
        );
        assert_eq!(eval("a#$i[$i > 0].b", input).unwrap(), json!(2));
    }

    #[test]
    fn test_positional_binding_counts_after_earlier_predicates() {
        let input = json!({"a": [{"b": 1}, {"b": 2}, {"b": 3}]});
        assert_eq!(eval("a[b > 1]#$i.$i", input.clone()).unwrap(), json!([0, 1]));
        assert_eq!(eval("a^(>b)#$i[0].b", input).unwrap(), json!(3));
    }

    #[test]
    fn test_context_binding_joins() {
        let input = json!({
            "loans": [{"isbn": "1", "who": "ann"}, {"isbn": "2", "who": "bob"}],
            "books": [{"isbn": "2", "title": "B"}, {"isbn": "1", "title": "A"}]
        });
        let result = eval(
            "loans@$l.books@$b[$l.isbn = $b.isbn].{'who': $l.who, 'title': $b.title}",
            input,
        )
        .unwrap();
        assert_eq!(
            result,
            json!([{"who": "ann", "title": "A"}, {"who": "bob", "title": "B"}])
        );
    }

    #[test]
    fn test_transform_copies_and_updates() {
        let input = json!({"a": {"x": 1}, "b": 2});
        assert_eq!(
            eval("$ ~> |a|{'c': 1}|", input.clone()).unwrap(),
            json!({"a": {"x": 1, "c": 1}, "b": 2})
        );
        // the input itself is left alone
        assert_eq!(
            eval("($t := $ ~> |a|{'c': 1}|; [$t.a.c, a.c])", input).unwrap(),
            json!([1])
        );
    }

    #[test]
    fn test_transform_delete_clause() {
        let input = json!({"items": [{"id": 1, "secret": "x"}, {"id": 2, "tmp": 0}]});
        assert_eq!(
            eval("$ ~> |items|{'seen': true}, ['secret', 'tmp']|", input.clone()).unwrap(),
            json!({"items": [{"id": 1, "seen": true}, {"id": 2, "seen": true}]})
        );
        assert_eq!(
            eval("$ ~> |items[id = 2]|{}, 'tmp'|", input).unwrap(),
            json!({"items": [{"id": 1, "secret": "x"}, {"id": 2}]})
        );
    }

    #[test]
    fn test_transform_errors() {
        let input = json!({"a": {"x": 1}});
        assert_eq!(eval("$ ~> |a|5|", input.clone()).unwrap_err().code(), "T2011");
        assert_eq!(eval("$ ~> |a|{}, 5|", input.clone()).unwrap_err().code(), "T2012");
        assert_eq!(eval("nothing ~> |a|{}|", input).unwrap(), json!(null));
    }
}
