//! Recursive-descent expression parser.
//!
//! Grammar, highest level first:
//!
//! ```text
//! program    := expression ((';' | ',')* expression)*
//! expression := binary ('?' expression ':' expression)?
//! binary     := token (infix token)*          -- operator-precedence reduction
//! token      := number | string | array | unary token | variable
//! variable   := (identifier | '(' expression ')') postfix*
//! postfix    := '.' name | '[' expression ']' | '(' arguments ')'
//! ```
//!
//! Binary precedence (lowest → highest):
//!   `||`  →  `&&`  →  `|`  →  `^`  →  `&`  →  equality  →  relational  →
//!   shift  →  additive  →  multiplicative
//!
//! Each call to [`parse`] runs over its own character cursor; the parser
//! keeps no state between calls.  Nesting (groups, arrays, unary prefixes,
//! operator and postfix chains) is capped at [`MAX_DEPTH`] levels so that
//! neither parsing nor evaluation can exhaust the stack.

use std::collections::BTreeSet;

use super::ast::{BinaryOp, LogicalOp, Node, UnaryOp};
use crate::error::ParseError;
use crate::value::Value;

/// Deepest tree the parser will build.
pub const MAX_DEPTH: usize = 256;

// ── Infix operators ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Infix {
    Logical(LogicalOp),
    Binary(BinaryOp),
}

impl Infix {
    fn precedence(self) -> u8 {
        match self {
            Infix::Logical(LogicalOp::Or) => 1,
            Infix::Logical(LogicalOp::And) => 2,
            Infix::Binary(op) => match op {
                BinaryOp::BitOr => 3,
                BinaryOp::BitXor => 4,
                BinaryOp::BitAnd => 5,
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::StrictEq | BinaryOp::StrictNe => 6,
                BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 7,
                BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 8,
                BinaryOp::Add | BinaryOp::Sub => 9,
                BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
            },
        }
    }

    fn build(self, left: Node, right: Node) -> Node {
        let (left, right) = (Box::new(left), Box::new(right));
        match self {
            Infix::Logical(op) => Node::Logical { op, left, right },
            Infix::Binary(op) => Node::Binary { op, left, right },
        }
    }
}

/// Longest spellings first so that `>>>` wins over `>>` and `>`.
const INFIX_OPS: &[(&str, Infix)] = &[
    ("===", Infix::Binary(BinaryOp::StrictEq)),
    ("!==", Infix::Binary(BinaryOp::StrictNe)),
    (">>>", Infix::Binary(BinaryOp::UShr)),
    ("||", Infix::Logical(LogicalOp::Or)),
    ("&&", Infix::Logical(LogicalOp::And)),
    ("==", Infix::Binary(BinaryOp::Eq)),
    ("!=", Infix::Binary(BinaryOp::Ne)),
    ("<=", Infix::Binary(BinaryOp::Le)),
    (">=", Infix::Binary(BinaryOp::Ge)),
    ("<<", Infix::Binary(BinaryOp::Shl)),
    (">>", Infix::Binary(BinaryOp::Shr)),
    ("|", Infix::Binary(BinaryOp::BitOr)),
    ("^", Infix::Binary(BinaryOp::BitXor)),
    ("&", Infix::Binary(BinaryOp::BitAnd)),
    ("<", Infix::Binary(BinaryOp::Lt)),
    (">", Infix::Binary(BinaryOp::Gt)),
    ("+", Infix::Binary(BinaryOp::Add)),
    ("-", Infix::Binary(BinaryOp::Sub)),
    ("*", Infix::Binary(BinaryOp::Mul)),
    ("/", Infix::Binary(BinaryOp::Div)),
    ("%", Infix::Binary(BinaryOp::Rem)),
];

fn unary_op(ch: char) -> Option<UnaryOp> {
    match ch {
        '-' => Some(UnaryOp::Neg),
        '+' => Some(UnaryOp::Plus),
        '~' => Some(UnaryOp::BitNot),
        '!' => Some(UnaryOp::Not),
        _ => None,
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '$' || ch == '_' || ch.is_ascii_alphabetic() || !ch.is_ascii()
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

fn describe(ch: Option<char>) -> String {
    match ch {
        Some(c) => format!("\"{c}\""),
        None => "end of input".to_owned(),
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Parser {
            chars: src.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn deepen(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { index: self.pos });
        }
        Ok(())
    }

    fn unexpected(&self) -> ParseError {
        ParseError::UnexpectedToken {
            index: self.pos,
            found: describe(self.peek()),
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_program(mut self) -> Result<Node, ParseError> {
        let mut nodes = Vec::new();
        while let Some(ch) = self.peek() {
            if ch == ';' || ch == ',' {
                self.pos += 1;
                continue;
            }
            match self.parse_expression()? {
                Some(node) => nodes.push(node),
                None => match self.peek() {
                    None | Some(';' | ',') => {}
                    Some(_) => return Err(self.unexpected()),
                },
            }
        }
        if nodes.len() == 1 {
            Ok(nodes.remove(0))
        } else {
            Ok(Node::Compound(nodes))
        }
    }

    fn parse_expression(&mut self) -> Result<Option<Node>, ParseError> {
        self.deepen()?;
        let node = self.parse_conditional()?;
        self.depth -= 1;
        Ok(node)
    }

    fn parse_conditional(&mut self) -> Result<Option<Node>, ParseError> {
        let Some(test) = self.parse_binary()? else {
            return Ok(None);
        };
        self.skip_ws();
        if self.peek() != Some('?') {
            return Ok(Some(test));
        }
        self.pos += 1;
        let consequent = self.require_expression()?;
        self.skip_ws();
        if self.peek() != Some(':') {
            return Err(self.unexpected());
        }
        self.pos += 1;
        let alternate = self.require_expression()?;
        Ok(Some(Node::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }))
    }

    fn require_expression(&mut self) -> Result<Node, ParseError> {
        match self.parse_expression()? {
            Some(node) => Ok(node),
            None => Err(ParseError::MissingExpression { index: self.pos }),
        }
    }

    fn parse_infix(&mut self) -> Option<Infix> {
        self.skip_ws();
        let (text, op) = INFIX_OPS.iter().find(|(text, _)| self.starts_with(text))?;
        self.pos += text.chars().count();
        Some(*op)
    }

    /// Operator-precedence parsing over an operand stack and an operator
    /// stack.  Before an operator is pushed, every stacked operator of equal
    /// or higher precedence is reduced, which makes all binary operators
    /// left-associative.
    fn parse_binary(&mut self) -> Result<Option<Node>, ParseError> {
        let Some(first) = self.parse_token()? else {
            return Ok(None);
        };
        let mut operands = vec![first];
        let mut operators: Vec<Infix> = Vec::new();
        let base = self.depth;

        while let Some(op) = self.parse_infix() {
            self.deepen()?;
            while let Some(&top) = operators.last() {
                if op.precedence() > top.precedence() {
                    break;
                }
                operators.pop();
                reduce(&mut operands, top);
            }
            let Some(right) = self.parse_token()? else {
                return Err(ParseError::MissingExpression { index: self.pos });
            };
            operators.push(op);
            operands.push(right);
        }
        while let Some(op) = operators.pop() {
            reduce(&mut operands, op);
        }
        self.depth = base;
        Ok(operands.pop())
    }

    fn parse_token(&mut self) -> Result<Option<Node>, ParseError> {
        self.skip_ws();
        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        if ch.is_ascii_digit() || ch == '.' {
            return self.parse_number().map(Some);
        }
        if ch == '"' || ch == '\'' {
            return self.parse_string().map(Some);
        }
        if ch == '[' {
            return self.parse_array().map(Some);
        }
        if let Some(op) = unary_op(ch) {
            self.pos += 1;
            self.deepen()?;
            let Some(operand) = self.parse_token()? else {
                return Err(ParseError::MissingExpression { index: self.pos });
            };
            self.depth -= 1;
            return Ok(Some(Node::Unary {
                op,
                operand: Box::new(operand),
            }));
        }
        if is_identifier_start(ch) || ch == '(' {
            return self.parse_variable().map(Some);
        }
        Ok(None)
    }

    fn take_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            out.push(c);
            self.pos += 1;
        }
    }

    fn parse_number(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        let mut text = String::new();
        self.take_digits(&mut text);
        if self.peek() == Some('.') {
            text.push('.');
            self.pos += 1;
            self.take_digits(&mut text);
        }
        if let Some(e) = self.peek().filter(|c| matches!(c, 'e' | 'E')) {
            text.push(e);
            self.pos += 1;
            if let Some(sign) = self.peek().filter(|c| matches!(c, '+' | '-')) {
                text.push(sign);
                self.pos += 1;
            }
            let before = text.len();
            self.take_digits(&mut text);
            if text.len() == before {
                return Err(ParseError::InvalidNumber {
                    index: self.pos,
                    detail: format!("expected exponent ({text}{})", self.peek().unwrap_or(' ')),
                });
            }
        }

        match self.peek() {
            Some(c) if is_identifier_start(c) => Err(ParseError::InvalidNumber {
                index: self.pos,
                detail: format!("variable names cannot start with a number ({text}{c})"),
            }),
            Some('.') => Err(ParseError::InvalidNumber {
                index: self.pos,
                detail: "unexpected period".to_owned(),
            }),
            _ => match text.parse::<f64>() {
                Ok(n) => Ok(Node::Literal(Value::Number(n))),
                Err(_) => Err(ParseError::InvalidNumber {
                    index: start,
                    detail: format!("`{text}` is not a number"),
                }),
            },
        }
    }

    fn parse_string(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        let Some(quote) = self.advance() else {
            return Err(ParseError::UnclosedQuote { index: start });
        };
        let mut s = String::new();
        while let Some(ch) = self.advance() {
            if ch == quote {
                return Ok(Node::Literal(Value::Str(s)));
            }
            if ch != '\\' {
                s.push(ch);
                continue;
            }
            match self.advance() {
                Some('n') => s.push('\n'),
                Some('r') => s.push('\r'),
                Some('t') => s.push('\t'),
                Some('b') => s.push('\u{8}'),
                Some('f') => s.push('\u{c}'),
                Some('v') => s.push('\u{b}'),
                Some(c) => s.push(c),
                None => break,
            }
        }
        Err(ParseError::UnclosedQuote { index: start })
    }

    fn read_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_identifier_start(c) => self.pos += 1,
            _ => return Err(self.unexpected()),
        }
        while self.peek().is_some_and(is_identifier_part) {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// An identifier, or the keyword literals `true`/`false`/`null` and `this`.
    fn parse_identifier(&mut self) -> Result<Node, ParseError> {
        let name = self.read_name()?;
        Ok(match name.as_str() {
            "true" => Node::Literal(Value::Bool(true)),
            "false" => Node::Literal(Value::Bool(false)),
            "null" => Node::Literal(Value::Null),
            "this" => Node::This,
            _ => Node::Identifier(name),
        })
    }

    fn parse_variable(&mut self) -> Result<Node, ParseError> {
        let mut node = if self.peek() == Some('(') {
            self.parse_group()?
        } else {
            self.parse_identifier()?
        };
        let base = self.depth;

        loop {
            self.skip_ws();
            if matches!(self.peek(), Some('.' | '[' | '(')) {
                self.deepen()?;
            }
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    self.skip_ws();
                    let name = self.read_name()?;
                    node = Node::Member {
                        object: Box::new(node),
                        property: Box::new(Node::Identifier(name)),
                        computed: false,
                    };
                }
                Some('[') => {
                    let open = self.pos;
                    self.pos += 1;
                    let property = self.require_expression()?;
                    self.skip_ws();
                    if self.peek() != Some(']') {
                        return Err(ParseError::UnclosedBracket { index: open });
                    }
                    self.pos += 1;
                    node = Node::Member {
                        object: Box::new(node),
                        property: Box::new(property),
                        computed: true,
                    };
                }
                Some('(') => {
                    let open = self.pos;
                    self.pos += 1;
                    let arguments = self.parse_list(')', open)?.into_iter().flatten().collect();
                    node = Node::Call {
                        callee: Box::new(node),
                        arguments,
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(node);
                }
            }
        }
    }

    fn parse_group(&mut self) -> Result<Node, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let node = self.require_expression()?;
        self.skip_ws();
        if self.peek() != Some(')') {
            return Err(ParseError::UnclosedGroup { index: open });
        }
        self.pos += 1;
        Ok(node)
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        let open = self.pos;
        self.pos += 1;
        Ok(Node::Array(self.parse_list(']', open)?))
    }

    /// Comma-separated expressions up to `close`; the opener at `open` has
    /// already been consumed.  In arrays a run of commas leaves `None` holes;
    /// in argument lists a missing argument is an error.
    fn parse_list(&mut self, close: char, open: usize) -> Result<Vec<Option<Node>>, ParseError> {
        let mut items: Vec<Option<Node>> = Vec::new();
        let mut separators = 0usize;
        loop {
            self.skip_ws();
            match self.peek() {
                None => {
                    return Err(if close == ']' {
                        ParseError::UnclosedBracket { index: open }
                    } else {
                        ParseError::UnclosedGroup { index: open }
                    });
                }
                Some(c) if c == close => {
                    if close == ')' && separators > 0 && separators >= items.len() {
                        return Err(self.unexpected());
                    }
                    self.pos += 1;
                    return Ok(items);
                }
                Some(',') => {
                    separators += 1;
                    if separators != items.len() {
                        if close == ')' {
                            return Err(self.unexpected());
                        }
                        items.resize_with(separators, || None);
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    if items.len() > separators {
                        return Err(self.unexpected());
                    }
                    match self.parse_expression()? {
                        Some(node) => items.push(Some(node)),
                        None => return Err(self.unexpected()),
                    }
                }
            }
        }
    }
}

fn reduce(operands: &mut Vec<Node>, op: Infix) {
    if let (Some(right), Some(left)) = (operands.pop(), operands.pop()) {
        operands.push(op.build(left, right));
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// A parsed expression together with the free identifiers it references.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpr {
    pub node: Node,
    pub identifiers: BTreeSet<String>,
}

/// Parse an expression string into an AST plus the set of identifiers used.
pub fn parse(src: &str) -> Result<ParsedExpr, ParseError> {
    let node = parse_expr(src)?;
    let identifiers = node.identifiers();
    Ok(ParsedExpr { node, identifiers })
}

/// Parse an expression string into an AST.
///
/// A single expression is returned as-is; zero or several expressions
/// separated by `;` or `,` are wrapped in a [`Node::Compound`].
pub fn parse_expr(src: &str) -> Result<Node, ParseError> {
    Parser::new(src).parse_program()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
