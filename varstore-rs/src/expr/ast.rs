//! Expression AST.
//!
//! Nodes are immutable once parsed and may be evaluated any number of times
//! against any number of stores.

use std::collections::BTreeSet;
use std::fmt;

use crate::value::Value;

// ── Operators ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    BitNot,
    Not,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    UShr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    Or,
    And,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::Or => "||",
            LogicalOp::And => "&&",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `1`, `"abc"`, `true`, `null`.
    Literal(Value),
    Identifier(String),
    /// `this`: the store being evaluated against.
    This,
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `test ? consequent : alternate`.
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    /// `object.property` (`computed == false`, `property` is an
    /// [`Node::Identifier`]) or `object[property]` (`computed == true`).
    Member {
        object: Box<Node>,
        property: Box<Node>,
        computed: bool,
    },
    Call {
        callee: Box<Node>,
        arguments: Vec<Node>,
    },
    /// `[a, , b]`; `None` marks a skipped position.
    Array(Vec<Option<Node>>),
    /// Several top-level expressions separated by `;` or `,`.
    Compound(Vec<Node>),
}

impl Node {
    /// Node kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Literal(_) => "Literal",
            Node::Identifier(_) => "Identifier",
            Node::This => "ThisExpression",
            Node::Unary { .. } => "UnaryExpression",
            Node::Binary { .. } => "BinaryExpression",
            Node::Logical { .. } => "LogicalExpression",
            Node::Conditional { .. } => "ConditionalExpression",
            Node::Member { .. } => "MemberExpression",
            Node::Call { .. } => "CallExpression",
            Node::Array(_) => "ArrayExpression",
            Node::Compound(_) => "Compound",
        }
    }

    /// Names of every free identifier referenced by this expression.
    /// Property names of non-computed member accesses are not included.
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers(&self, names: &mut BTreeSet<String>) {
        match self {
            Node::Literal(_) | Node::This => {}
            Node::Identifier(name) => {
                names.insert(name.clone());
            }
            Node::Unary { operand, .. } => operand.collect_identifiers(names),
            Node::Binary { left, right, .. } | Node::Logical { left, right, .. } => {
                left.collect_identifiers(names);
                right.collect_identifiers(names);
            }
            Node::Conditional { test, consequent, alternate } => {
                test.collect_identifiers(names);
                consequent.collect_identifiers(names);
                alternate.collect_identifiers(names);
            }
            Node::Member { object, property, computed } => {
                object.collect_identifiers(names);
                if *computed {
                    property.collect_identifiers(names);
                }
            }
            Node::Call { callee, arguments } => {
                callee.collect_identifiers(names);
                for arg in arguments {
                    arg.collect_identifiers(names);
                }
            }
            Node::Array(elements) => {
                for element in elements.iter().flatten() {
                    element.collect_identifiers(names);
                }
            }
            Node::Compound(body) => {
                for node in body {
                    node.collect_identifiers(names);
                }
            }
        }
    }
}
