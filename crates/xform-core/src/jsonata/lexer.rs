//! JSONata tokenizer
//!
//! Splits an expression into tokens with byte positions. Whether a `/`
//! starts a regex literal or is the division operator depends on the
//! previous token, so the lexer produces the whole token list up front.

use super::error::JsonataError;
use std::iter::Peekable;
use std::str::Chars;

/// Operators made of two characters, checked before single characters
const DOUBLE_OPERATORS: &[&str] = &["..", ":=", "!=", "<=", ">=", "**", "~>"];

/// Single-character operators and punctuation
const SINGLE_OPERATORS: &[char] = &[
    '.', '[', ']', '{', '}', '(', ')', ',', ';', ':', '?', '+', '-', '*', '/', '%', '|', '^',
    '<', '>', '=', '&', '!', '~', '@', '#',
];

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal
    Number(f64),
    /// String literal with escapes resolved
    Str(String),
    /// Field name or keyword (`and`, `or`, `in`, `true`, `function`, ...)
    Name(String),
    /// Backtick-quoted field name, never a keyword
    QuotedName(String),
    /// Variable reference without the leading `$`; `""` is `$`, `"$"` is `$$`
    Variable(String),
    /// Regular expression literal
    Regex { pattern: String, flags: String },
    /// Operator or punctuation
    Op(&'static str),
    /// End of input
    End,
}

/// A token with its starting byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    /// Whether this token is the given operator
    pub fn is_op(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Op(o) if *o == op)
    }

    /// Human-readable rendering for error messages
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Str(s) => format!("\"{}\"", s),
            TokenKind::Name(n) => n.clone(),
            TokenKind::QuotedName(n) => format!("`{}`", n),
            TokenKind::Variable(v) => format!("${}", v),
            TokenKind::Regex { pattern, flags } => format!("/{}/{}", pattern, flags),
            TokenKind::Op(op) => op.to_string(),
            TokenKind::End => "end of expression".to_string(),
        }
    }
}

/// Tokenizer over a JSONata expression
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer for the given input
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole input; the last token is always `End`
    pub fn tokenize(mut self) -> Result<Vec<Token>, JsonataError> {
        loop {
            self.skip_whitespace_and_comments()?;
            let start = self.position;

            let Some(ch) = self.current_char() else {
                self.tokens.push(Token {
                    kind: TokenKind::End,
                    position: start,
                });
                return Ok(self.tokens);
            };

            let kind = match ch {
                '"' | '\'' => TokenKind::Str(self.read_string(ch)?),
                '`' => TokenKind::QuotedName(self.read_backtick_name()?),
                '$' => TokenKind::Variable(self.read_variable()),
                '/' if self.regex_allowed() => self.read_regex()?,
                c if c.is_ascii_digit() => TokenKind::Number(self.read_number()?),
                _ => {
                    if let Some(op) = self.match_double_operator() {
                        TokenKind::Op(op)
                    } else if let Some(op) = self.match_single_operator(ch) {
                        TokenKind::Op(op)
                    } else {
                        TokenKind::Name(self.read_name())
                    }
                }
            };

            self.tokens.push(Token {
                kind,
                position: start,
            });
        }
    }

    /// A `/` starts a regex unless the previous token ends an operand
    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Number(_))
            | Some(TokenKind::Str(_))
            | Some(TokenKind::QuotedName(_))
            | Some(TokenKind::Variable(_))
            | Some(TokenKind::Regex { .. }) => false,
            Some(TokenKind::Name(name)) => matches!(name.as_str(), "and" | "or" | "in"),
            Some(TokenKind::Op(op)) => !matches!(*op, ")" | "]" | "}" | "*"),
            Some(TokenKind::End) => true,
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, JsonataError> {
        let start = self.position;
        self.advance();
        let mut value = String::new();

        while let Some(ch) = self.advance() {
            if ch == quote {
                return Ok(value);
            }
            if ch != '\\' {
                value.push(ch);
                continue;
            }
            match self.advance() {
                Some('"') => value.push('"'),
                Some('\'') => value.push('\''),
                Some('\\') => value.push('\\'),
                Some('/') => value.push('/'),
                Some('b') => value.push('\u{0008}'),
                Some('f') => value.push('\u{000C}'),
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some('u') => value.push(self.read_unicode_escape()?),
                Some(other) => {
                    return Err(JsonataError::syntax(
                        "S0103",
                        format!("Unsupported escape sequence: \\{}", other),
                        self.position,
                    ))
                }
                None => break,
            }
        }

        Err(JsonataError::syntax(
            "S0101",
            "String literal must be terminated by a matching quote",
            start,
        ))
    }

    fn read_unicode_escape(&mut self) -> Result<char, JsonataError> {
        let start = self.position;
        let mut hex = String::with_capacity(4);
        for _ in 0..4 {
            match self.advance() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => {
                    return Err(JsonataError::syntax(
                        "S0104",
                        "The escape sequence \\u must be followed by 4 hex digits",
                        start,
                    ))
                }
            }
        }
        let code = u32::from_str_radix(&hex, 16).map_err(|_| {
            JsonataError::syntax("S0104", "Invalid unicode escape", start)
        })?;
        // Lone surrogates cannot be represented in a Rust string
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn read_backtick_name(&mut self) -> Result<String, JsonataError> {
        let start = self.position;
        self.advance();
        let mut name = String::new();
        while let Some(ch) = self.advance() {
            if ch == '`' {
                return Ok(name);
            }
            name.push(ch);
        }
        Err(JsonataError::syntax(
            "S0105",
            "Quoted property name must be terminated with a backquote (`)",
            start,
        ))
    }

    fn read_variable(&mut self) -> String {
        self.advance(); // consume '$'
        if self.current_char() == Some('$') {
            self.advance();
            return "$".to_string();
        }
        self.read_name()
    }

    fn read_regex(&mut self) -> Result<TokenKind, JsonataError> {
        let start = self.position;
        self.advance(); // consume opening '/'
        let mut pattern = String::new();
        let mut escaped = false;

        loop {
            let Some(ch) = self.advance() else {
                return Err(JsonataError::syntax(
                    "S0302",
                    "No terminating / in regular expression",
                    start,
                ));
            };
            if escaped {
                pattern.push(ch);
                escaped = false;
            } else if ch == '\\' {
                pattern.push(ch);
                escaped = true;
            } else if ch == '/' {
                break;
            } else {
                pattern.push(ch);
            }
        }

        if pattern.is_empty() {
            return Err(JsonataError::syntax(
                "S0301",
                "Empty regular expressions are not allowed",
                start,
            ));
        }

        let mut flags = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphabetic() {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Ok(TokenKind::Regex { pattern, flags })
    }

    fn read_number(&mut self) -> Result<f64, JsonataError> {
        let start = self.position;
        let mut number = String::new();

        while let Some(ch) = self.current_char().filter(|c| c.is_ascii_digit()) {
            number.push(ch);
            self.advance();
        }

        // A '.' only continues the number when a digit follows, so `1..5` stays a range
        if self.current_char() == Some('.')
            && self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            number.push('.');
            self.advance();
            while let Some(ch) = self.current_char().filter(|c| c.is_ascii_digit()) {
                number.push(ch);
                self.advance();
            }
        }

        if matches!(self.current_char(), Some('e') | Some('E')) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            let next = lookahead.next();
            let has_exponent = match next {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => lookahead.next().map(|c| c.is_ascii_digit()).unwrap_or(false),
                _ => false,
            };
            if has_exponent {
                number.push('e');
                self.advance();
                if let Some(sign) = self.current_char().filter(|c| *c == '+' || *c == '-') {
                    number.push(sign);
                    self.advance();
                }
                while let Some(ch) = self.current_char().filter(|c| c.is_ascii_digit()) {
                    number.push(ch);
                    self.advance();
                }
            }
        }

        let value: f64 = number.parse().map_err(|_| {
            JsonataError::syntax("S0102", format!("Invalid number: {}", number), start)
        })?;
        if !value.is_finite() {
            return Err(JsonataError::syntax(
                "S0102",
                format!("Number out of range: {}", number),
                start,
            ));
        }
        Ok(value)
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() || SINGLE_OPERATORS.contains(&ch) || matches!(ch, '"' | '\'' | '`' | '$') {
                break;
            }
            name.push(ch);
            self.advance();
        }
        name
    }

    fn match_double_operator(&mut self) -> Option<&'static str> {
        let mut lookahead = self.chars.clone();
        let first = lookahead.next()?;
        let second = lookahead.next()?;
        let op = DOUBLE_OPERATORS
            .iter()
            .find(|op| {
                let mut it = op.chars();
                it.next() == Some(first) && it.next() == Some(second)
            })
            .copied()?;
        self.advance();
        self.advance();
        Some(op)
    }

    fn match_single_operator(&mut self, ch: char) -> Option<&'static str> {
        let op = match ch {
            '.' => ".",
            '[' => "[",
            ']' => "]",
            '{' => "{",
            '}' => "}",
            '(' => "(",
            ')' => ")",
            ',' => ",",
            ';' => ";",
            ':' => ":",
            '?' => "?",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '|' => "|",
            '^' => "^",
            '<' => "<",
            '>' => ">",
            '=' => "=",
            '&' => "&",
            '!' => "!",
            '~' => "~",
            '@' => "@",
            '#' => "#",
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), JsonataError> {
        loop {
            while self.current_char().map(char::is_whitespace).unwrap_or(false) {
                self.advance();
            }
            if self.current_char() == Some('/') && self.peek_char() == Some('*') {
                let start = self.position;
                self.advance();
                self.advance();
                let mut closed = false;
                while let Some(ch) = self.advance() {
                    if ch == '*' && self.current_char() == Some('/') {
                        self.advance();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(JsonataError::syntax("S0106", "Comment has no closing tag", start));
                }
                continue;
            }
            return Ok(());
        }
    }

    fn current_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_char(&self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.position += ch.len_utf8();
        Some(ch)
    }
}

/// Tokenize an expression
pub fn tokenize(input: &str) -> Result<Vec<Token>, JsonataError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_path_tokens() {
        assert_eq!(
            kinds("a.b"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Op("."),
                TokenKind::Name("b".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_decimal() {
        assert_eq!(
            kinds("[1..3]"),
            vec![
                TokenKind::Op("["),
                TokenKind::Number(1.0),
                TokenKind::Op(".."),
                TokenKind::Number(3.0),
                TokenKind::Op("]"),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_decimal_and_exponent() {
        assert_eq!(kinds("1.5e2")[0], TokenKind::Number(150.0));
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            kinds("$ $$ $foo"),
            vec![
                TokenKind::Variable("".into()),
                TokenKind::Variable("$".into()),
                TokenKind::Variable("foo".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_regex_versus_division() {
        assert!(matches!(kinds("a / 2")[1], TokenKind::Op("/")));
        assert!(matches!(
            &kinds("$contains(s, /ab+c/i)")[4],
            TokenKind::Regex { pattern, flags } if pattern == "ab+c" && flags == "i"
        ));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"bA""#)[0], TokenKind::Str("a\"bA".into()));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(kinds("/* note */ a").len(), 2);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("ab + cd").unwrap();
        assert_eq!(tokens[1].position, 3);
        assert_eq!(tokens[2].position, 5);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err.code(), "S0101");
    }

    #[test]
    fn test_chain_operator() {
        assert!(matches!(kinds("a ~> $f()")[1], TokenKind::Op("~>")));
    }
}
