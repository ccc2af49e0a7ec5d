//! Abstract syntax tree for JSONata expressions
//!
//! Paths are kept as flat step lists so that the evaluator can apply
//! JSONata's sequence flattening between steps. Predicates hang off the
//! step they filter.

use regex::Regex;
use std::rc::Rc;

/// A parsed JSONata expression
#[derive(Debug, Clone)]
pub enum Expr {
    /// String, number, boolean or null literal
    Literal(Literal),
    /// Regular expression literal
    Regex(RegexLiteral),
    /// Field lookup against the context value
    Name(String),
    /// `*` - all values of the context object
    Wildcard,
    /// `**` - the context value and all of its descendants
    Descendants,
    /// `$name`; the empty name is the context, `$` is the root input
    Variable(String),
    /// Location path built from the `.` operator
    Path(PathExpr),
    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Unary minus
    Negate(Box<Expr>),
    /// `condition ? then : otherwise`
    Condition {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    /// `( expr; expr; ... )` with its own variable scope
    Block(Vec<Expr>),
    /// `$name := value`
    Bind { name: String, value: Box<Expr> },
    /// `[a, b, ...]`
    Array(Vec<Expr>),
    /// `start..end`, only meaningful inside an array constructor
    Range { start: Box<Expr>, end: Box<Expr> },
    /// `{key: value, ...}` evaluated against the context
    Object(Vec<(Expr, Expr)>),
    /// `source{key: value, ...}` grouping the items of `source`
    GroupBy {
        source: Box<Expr>,
        pairs: Vec<(Expr, Expr)>,
    },
    /// `procedure(args...)`
    Call {
        procedure: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `function($a, $b) { body }`
    Lambda(Rc<LambdaExpr>),
    /// `lhs ~> rhs`
    Apply { lhs: Box<Expr>, rhs: Box<Expr> },
    /// Body of `|location|update, delete|`; the object being copied is
    /// bound to [`TRANSFORM_TARGET`]
    Transform {
        location: Box<Expr>,
        update: Box<Expr>,
        delete: Option<Box<Expr>>,
    },
}

/// Parameter name under which a transform receives its input; not a
/// valid variable name so expressions cannot shadow it
pub const TRANSFORM_TARGET: &str = "|";

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// Compiled regular expression with its source text
#[derive(Debug, Clone)]
pub struct RegexLiteral {
    pub pattern: String,
    pub flags: String,
    pub regex: Regex,
}

/// A location path
#[derive(Debug, Clone)]
pub struct PathExpr {
    /// Steps applied left to right
    pub steps: Vec<Step>,
    /// Set by a trailing `[]`: never collapse a singleton result
    pub keep_array: bool,
}

/// A single path step with its predicates
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    /// Predicate expressions applied in order to the step result
    pub predicates: Vec<Expr>,
    /// `@$name`: bind each result while keeping the current context
    pub focus: Option<String>,
    /// `#$name`: bind each result's position
    pub index: Option<IndexBinding>,
}

/// A positional binding and where it sits among the step predicates
#[derive(Debug, Clone)]
pub struct IndexBinding {
    pub name: String,
    /// Number of predicates applied before the position is taken
    pub after: usize,
}

/// What a path step does
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Evaluate an expression against each item of the input sequence
    Expr(Expr),
    /// Order the whole input sequence
    Sort(Vec<SortTerm>),
}

/// One `^(...)` ordering term
#[derive(Debug, Clone)]
pub struct SortTerm {
    pub expr: Expr,
    pub descending: bool,
}

/// Lambda definition shared by every closure created from it
#[derive(Debug)]
pub struct LambdaExpr {
    pub params: Vec<String>,
    pub body: Expr,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    In,
    Concat,
}

impl BinaryOp {
    /// Operator text as written in an expression
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::Concat => "&",
        }
    }

    /// Arithmetic operators require numeric operands
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
        )
    }

    /// Ordering comparisons require two numbers or two strings
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }
}

impl Expr {
    /// Wrap an expression as a single-step path, reusing existing paths
    pub fn into_path(self) -> PathExpr {
        match self {
            Expr::Path(path) => path,
            other => PathExpr {
                steps: vec![Step::new(other)],
                keep_array: false,
            },
        }
    }

    /// Steps that navigate into the context rather than produce values
    pub fn is_navigation(&self) -> bool {
        matches!(self, Expr::Name(_) | Expr::Wildcard | Expr::Descendants)
    }

    /// Array constructors keep their shape when used as a path step
    pub fn is_array_constructor(&self) -> bool {
        matches!(self, Expr::Array(_))
    }
}

impl Step {
    /// A plain expression step without predicates
    pub fn new(expr: Expr) -> Self {
        Self::with_kind(StepKind::Expr(expr))
    }

    pub fn with_kind(kind: StepKind) -> Self {
        Self {
            kind,
            predicates: Vec::new(),
            focus: None,
            index: None,
        }
    }

    /// Steps carrying variable bindings force tuple evaluation of the path
    pub fn binds(&self) -> bool {
        self.focus.is_some() || self.index.is_some()
    }
}

impl PathExpr {
    /// Whether any step binds a variable
    pub fn has_bindings(&self) -> bool {
        self.steps.iter().any(Step::binds)
    }
}
