//! JSONata expression parser
//!
//! A top-down operator precedence parser over the token list produced by
//! the lexer. Binding powers follow the JSONata reference grammar.

use super::ast::*;
use super::error::JsonataError;
use super::lexer::{tokenize, Token, TokenKind};
use regex::RegexBuilder;
use std::rc::Rc;

type Result<T> = std::result::Result<T, JsonataError>;

/// Binding power of unary minus
const UNARY_MINUS_BP: u8 = 70;

/// Deepest expression nesting accepted by the parser
const MAX_NESTING: usize = 256;

/// JSONata expression parser
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    /// Create a parser for the given input
    pub fn new(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        Ok(Self {
            tokens,
            index: 0,
            depth: 0,
        })
    }

    /// Parse the full expression
    pub fn parse(mut self) -> Result<Expr> {
        let expr = self.parse_expression(0)?;
        let next = self.current();
        if !matches!(next.kind, TokenKind::End) {
            return Err(JsonataError::syntax(
                "S0201",
                format!("Syntax error: unexpected token {}", next.describe()),
                next.position,
            ));
        }
        Ok(expr)
    }

    /// Parse an expression whose operators bind tighter than `rbp`
    fn parse_expression(&mut self, rbp: u8) -> Result<Expr> {
        if self.depth >= MAX_NESTING {
            return Err(JsonataError::DepthExceeded { limit: MAX_NESTING });
        }
        let saved = self.depth;
        self.depth += 1;
        let result = self.parse_expression_inner(rbp);
        self.depth = saved;
        result
    }

    fn parse_expression_inner(&mut self, rbp: u8) -> Result<Expr> {
        let token = self.advance();
        let mut left = self.parse_prefix(token)?;

        while rbp < self.left_binding_power() {
            // every infix operator wraps `left` one level deeper
            if self.depth >= MAX_NESTING {
                return Err(JsonataError::DepthExceeded { limit: MAX_NESTING });
            }
            self.depth += 1;
            let token = self.advance();
            left = self.parse_infix(left, token)?;
        }

        Ok(left)
    }

    /// Binding power of the current token in infix position
    fn left_binding_power(&self) -> u8 {
        match &self.current().kind {
            TokenKind::Op(op) => match *op {
                "." => 75,
                "[" | "(" | "@" | "#" => 80,
                "{" => 70,
                "*" | "/" | "%" => 60,
                "+" | "-" | "&" => 50,
                "=" | "!=" | "<" | "<=" | ">" | ">=" | "~>" | "^" => 40,
                "?" | ".." => 20,
                ":=" => 10,
                _ => 0,
            },
            TokenKind::Name(name) => match name.as_str() {
                "in" => 40,
                "and" => 30,
                "or" => 25,
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Parse a token in prefix position
    fn parse_prefix(&mut self, token: Token) -> Result<Expr> {
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::QuotedName(name) => Ok(Expr::Path(Expr::Name(name).into_path())),
            TokenKind::Variable(name) => Ok(Expr::Variable(name)),
            TokenKind::Regex { pattern, flags } => self.build_regex(pattern, flags, token.position),
            TokenKind::Name(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                "function" | "λ" if self.current().is_op("(") => self.parse_lambda(),
                _ => Ok(Expr::Path(Expr::Name(name).into_path())),
            },
            TokenKind::Op(op) => match op {
                "-" => {
                    let operand = self.parse_expression(UNARY_MINUS_BP)?;
                    Ok(match operand {
                        Expr::Literal(Literal::Number(n)) => Expr::Literal(Literal::Number(-n)),
                        other => Expr::Negate(Box::new(other)),
                    })
                }
                "*" => Ok(Expr::Path(Expr::Wildcard.into_path())),
                "**" => Ok(Expr::Path(Expr::Descendants.into_path())),
                "(" => self.parse_block(),
                "[" => self.parse_array(),
                "{" => Ok(Expr::Object(self.parse_object_pairs()?)),
                "|" => self.parse_transform(),
                _ => Err(JsonataError::syntax(
                    "S0211",
                    format!("The symbol {} cannot be used as a unary operator", op),
                    token.position,
                )),
            },
            TokenKind::End => Err(JsonataError::syntax(
                "S0207",
                "Unexpected end of expression",
                token.position,
            )),
        }
    }

    /// Parse a token in infix position
    fn parse_infix(&mut self, left: Expr, token: Token) -> Result<Expr> {
        if let TokenKind::Name(name) = &token.kind {
            let op = match name.as_str() {
                "and" => BinaryOp::And,
                "or" => BinaryOp::Or,
                _ => BinaryOp::In,
            };
            let bp = if op == BinaryOp::In { 40 } else if op == BinaryOp::And { 30 } else { 25 };
            return self.parse_binary(left, op, bp);
        }

        let TokenKind::Op(op) = token.kind else {
            return Err(JsonataError::syntax(
                "S0201",
                format!("Syntax error: unexpected token {}", token.describe()),
                token.position,
            ));
        };

        match op {
            "." => {
                let rhs = self.parse_expression(75)?;
                Ok(Self::join_paths(left, rhs))
            }
            "[" => self.parse_predicate(left),
            "{" => Ok(Expr::GroupBy {
                source: Box::new(left),
                pairs: self.parse_object_pairs()?,
            }),
            "(" => {
                let args = self.parse_arguments()?;
                Ok(Expr::Call {
                    procedure: Box::new(left),
                    args,
                })
            }
            "^" => self.parse_sort(left, token.position),
            "@" | "#" => self.parse_binding(left, op, token.position),
            "?" => {
                let then = self.parse_expression(0)?;
                let otherwise = if self.current().is_op(":") {
                    self.advance();
                    Some(Box::new(self.parse_expression(0)?))
                } else {
                    None
                };
                Ok(Expr::Condition {
                    condition: Box::new(left),
                    then: Box::new(then),
                    otherwise,
                })
            }
            ":=" => {
                let Expr::Variable(name) = left else {
                    return Err(JsonataError::syntax(
                        "S0212",
                        "The left side of := must be a variable name (start with $)",
                        token.position,
                    ));
                };
                let value = self.parse_expression(9)?;
                Ok(Expr::Bind {
                    name,
                    value: Box::new(value),
                })
            }
            "~>" => {
                let rhs = self.parse_expression(40)?;
                Ok(Expr::Apply {
                    lhs: Box::new(left),
                    rhs: Box::new(rhs),
                })
            }
            ".." => {
                let end = self.parse_expression(20)?;
                Ok(Expr::Range {
                    start: Box::new(left),
                    end: Box::new(end),
                })
            }
            "+" => self.parse_binary(left, BinaryOp::Add, 50),
            "-" => self.parse_binary(left, BinaryOp::Subtract, 50),
            "&" => self.parse_binary(left, BinaryOp::Concat, 50),
            "*" => self.parse_binary(left, BinaryOp::Multiply, 60),
            "/" => self.parse_binary(left, BinaryOp::Divide, 60),
            "%" => self.parse_binary(left, BinaryOp::Modulo, 60),
            "=" => self.parse_binary(left, BinaryOp::Equal, 40),
            "!=" => self.parse_binary(left, BinaryOp::NotEqual, 40),
            "<" => self.parse_binary(left, BinaryOp::LessThan, 40),
            "<=" => self.parse_binary(left, BinaryOp::LessThanOrEqual, 40),
            ">" => self.parse_binary(left, BinaryOp::GreaterThan, 40),
            ">=" => self.parse_binary(left, BinaryOp::GreaterThanOrEqual, 40),
            _ => Err(JsonataError::syntax(
                "S0201",
                format!("Syntax error: unexpected token {}", op),
                token.position,
            )),
        }
    }

    /// Parse the right operand of a left-associative binary operator
    fn parse_binary(&mut self, left: Expr, op: BinaryOp, bp: u8) -> Result<Expr> {
        let rhs = self.parse_expression(bp)?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(left),
            rhs: Box::new(rhs),
        })
    }

    /// Combine both sides of `.` into one flat path
    fn join_paths(left: Expr, right: Expr) -> Expr {
        let mut path = left.into_path();
        match right {
            Expr::Path(rhs) => {
                path.keep_array |= rhs.keep_array;
                path.steps.extend(rhs.steps);
            }
            other => path.steps.push(Step::new(other)),
        }
        Expr::Path(path)
    }

    /// Parse `[predicate]` or the keep-array marker `[]`
    fn parse_predicate(&mut self, left: Expr) -> Result<Expr> {
        let mut path = left.into_path();

        if self.current().is_op("]") {
            self.advance();
            path.keep_array = true;
            return Ok(Expr::Path(path));
        }

        let predicate = self.parse_expression(0)?;
        self.expect_op("]")?;
        if let Some(step) = path.steps.last_mut() {
            step.predicates.push(predicate);
        }
        Ok(Expr::Path(path))
    }

    /// Parse `^( <term, >term, ... )` after the caret
    fn parse_sort(&mut self, left: Expr, position: usize) -> Result<Expr> {
        if !self.current().is_op("(") {
            return Err(JsonataError::syntax(
                "S0201",
                "Syntax error: ^ must be followed by an order-by clause in parentheses",
                position,
            ));
        }
        self.advance();

        let mut terms = Vec::new();
        loop {
            let mut descending = false;
            if self.current().is_op("<") {
                self.advance();
            } else if self.current().is_op(">") {
                self.advance();
                descending = true;
            }
            let expr = self.parse_expression(0)?;
            terms.push(SortTerm { expr, descending });

            if self.current().is_op(",") {
                self.advance();
                continue;
            }
            self.expect_op(")")?;
            break;
        }

        let mut path = left.into_path();
        path.steps.push(Step::with_kind(StepKind::Sort(terms)));
        Ok(Expr::Path(path))
    }

    /// Parse `@$name` or `#$name` onto the last step of a path
    fn parse_binding(&mut self, left: Expr, op: &'static str, position: usize) -> Result<Expr> {
        let token = self.advance();
        let TokenKind::Variable(name) = token.kind else {
            return Err(JsonataError::syntax(
                "S0214",
                format!("The right side of {} must be a variable name (start with $)", op),
                token.position,
            ));
        };
        let mut path = left.into_path();
        if let Some(step) = path.steps.last_mut() {
            if op == "#" {
                step.index = Some(IndexBinding {
                    name,
                    after: step.predicates.len(),
                });
            } else if matches!(step.kind, StepKind::Sort(_)) {
                return Err(JsonataError::syntax(
                    "S0216",
                    "A context variable binding cannot follow an order-by clause",
                    position,
                ));
            } else if !step.predicates.is_empty() {
                return Err(JsonataError::syntax(
                    "S0215",
                    "A context variable binding must precede any predicates on a step",
                    position,
                ));
            } else {
                step.focus = Some(name);
            }
        }
        Ok(Expr::Path(path))
    }

    /// Parse `location | update [, delete] |` after the opening bar
    fn parse_transform(&mut self) -> Result<Expr> {
        let location = self.parse_expression(0)?;
        self.expect_op("|")?;
        let update = self.parse_expression(0)?;
        let delete = if self.current().is_op(",") {
            self.advance();
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };
        self.expect_op("|")?;
        Ok(Expr::Lambda(Rc::new(LambdaExpr {
            params: vec![TRANSFORM_TARGET.to_string()],
            body: Expr::Transform {
                location: Box::new(location),
                update: Box::new(update),
                delete,
            },
        })))
    }

    /// Parse `( expr; expr )` after the opening parenthesis
    fn parse_block(&mut self) -> Result<Expr> {
        let mut expressions = Vec::new();
        while !self.current().is_op(")") {
            expressions.push(self.parse_expression(0)?);
            if !self.current().is_op(";") {
                break;
            }
            self.advance();
        }
        self.expect_op(")")?;
        Ok(Expr::Block(expressions))
    }

    /// Parse `[a, b..c]` after the opening bracket
    fn parse_array(&mut self) -> Result<Expr> {
        let mut items = Vec::new();
        if !self.current().is_op("]") {
            loop {
                items.push(self.parse_expression(0)?);
                if !self.current().is_op(",") {
                    break;
                }
                self.advance();
            }
        }
        self.expect_op("]")?;
        Ok(Expr::Array(items))
    }

    /// Parse `key: value` pairs after the opening brace
    fn parse_object_pairs(&mut self) -> Result<Vec<(Expr, Expr)>> {
        let mut pairs = Vec::new();
        if !self.current().is_op("}") {
            loop {
                let key = self.parse_expression(0)?;
                self.expect_op(":")?;
                let value = self.parse_expression(0)?;
                pairs.push((key, value));
                if !self.current().is_op(",") {
                    break;
                }
                self.advance();
            }
        }
        self.expect_op("}")?;
        Ok(pairs)
    }

    /// Parse call arguments after the opening parenthesis
    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.current().is_op(")") {
            loop {
                args.push(self.parse_expression(0)?);
                if !self.current().is_op(",") {
                    break;
                }
                self.advance();
            }
        }
        self.expect_op(")")?;
        Ok(args)
    }

    /// Parse `function($a, $b)<sig> { body }` after the keyword
    fn parse_lambda(&mut self) -> Result<Expr> {
        self.expect_op("(")?;
        let mut params = Vec::new();
        if !self.current().is_op(")") {
            loop {
                let token = self.advance();
                match token.kind {
                    TokenKind::Variable(name) if !name.is_empty() => params.push(name),
                    _ => {
                        return Err(JsonataError::syntax(
                            "S0208",
                            format!(
                                "Parameter {} of function definition must be a variable name (start with $)",
                                token.describe()
                            ),
                            token.position,
                        ))
                    }
                }
                if !self.current().is_op(",") {
                    break;
                }
                self.advance();
            }
        }
        self.expect_op(")")?;

        // Type signatures are accepted and ignored
        if self.current().is_op("<") {
            let mut depth = 0usize;
            loop {
                let token = self.advance();
                match &token.kind {
                    TokenKind::Op("<") => depth += 1,
                    TokenKind::Op(">") => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    TokenKind::End => {
                        return Err(JsonataError::syntax(
                            "S0401",
                            "Unterminated function signature",
                            token.position,
                        ))
                    }
                    _ => {}
                }
            }
        }

        self.expect_op("{")?;
        let body = self.parse_expression(0)?;
        self.expect_op("}")?;

        Ok(Expr::Lambda(Rc::new(LambdaExpr { params, body })))
    }

    /// Compile a regex literal, translating JSONata flags
    fn build_regex(&self, pattern: String, flags: String, position: usize) -> Result<Expr> {
        let mut builder = RegexBuilder::new(&pattern);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                'g' => {}
                other => {
                    return Err(JsonataError::syntax(
                        "S0302",
                        format!("Unsupported regular expression flag: {}", other),
                        position,
                    ))
                }
            }
        }
        let regex = builder.build().map_err(|e| {
            JsonataError::syntax("S0302", format!("Invalid regular expression: {}", e), position)
        })?;
        Ok(Expr::Regex(RegexLiteral {
            pattern,
            flags,
            regex,
        }))
    }

    /// Consume the expected operator or fail
    fn expect_op(&mut self, expected: &'static str) -> Result<()> {
        let token = self.current();
        if token.is_op(expected) {
            self.advance();
            return Ok(());
        }
        let code = if matches!(token.kind, TokenKind::End) { "S0203" } else { "S0202" };
        Err(JsonataError::syntax(
            code,
            format!("Expected '{}', got {}", expected, token.describe()),
            token.position,
        ))
    }

    /// Current token without consuming it
    fn current(&self) -> &Token {
        // tokenize always terminates the list with End
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    /// Consume and return the current token; End is sticky
    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }
}

/// Parse an expression string into an AST
pub fn parse(input: &str) -> Result<Expr> {
    Parser::new(input)?.parse()
}
