//! Expression language over a [`Store`](crate::store::Store).
//!
//! A small JavaScript-flavoured expression grammar:
//!
//! - number, string, boolean, `null` and array literals
//! - identifiers resolved through the store's scope chain, `this` for the store itself
//! - member access (`a.b`, `a[expr]`) and calls (`a.f(x)`) with receiver binding
//! - unary `- + ~ !`, the usual binary arithmetic, bitwise, shift and comparison
//!   operators, short-circuit `||`/`&&` and the ternary `?:`
//!
//! # Quick start
//!
//! ```rust
//! use varstore::{evaluate, Store, Value};
//!
//! let store = Store::new("demo").unwrap();
//! store.set_value("a", 2).unwrap();
//! store.set_value("b", 4).unwrap();
//! assert_eq!(evaluate("a * b + 1", &store).unwrap(), Value::from(9));
//! ```

pub mod ast;
pub mod eval;
pub mod parser;

// Re-exports for convenience.
pub use ast::{BinaryOp, LogicalOp, Node, UnaryOp};
pub use eval::{evaluate, evaluate_node};
pub use parser::{parse, parse_expr, ParsedExpr};
