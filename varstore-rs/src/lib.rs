//! Hierarchically scoped variable store with an embedded expression language.
//!
//! - [`Store`]: a named stack of contexts, forkable into child scopes that
//!   see their ancestors' base contexts
//! - dotted/bracketed paths (`employee.name.first`, `rows[2].id`) for reads
//!   and auto-vivifying writes
//! - change subscriptions delivered off the caller's stack
//! - a JavaScript-flavoured expression parser and evaluator
//! - `%{path}` / `$[expr]` template expansion
//!
//! # Quick start
//!
//! ```rust
//! use varstore::{evaluate, expand, Store, Value};
//!
//! let globals = Store::new("globals").unwrap();
//! globals.set_value("user.name", "ada").unwrap();
//!
//! let local = globals.fork("local").unwrap();
//! local.set_value("count", 3).unwrap();
//!
//! assert_eq!(evaluate("count * 2", &local).unwrap(), Value::from(6));
//! assert_eq!(expand("hi %{user.name} x%{count}", &local).unwrap(), "hi ada x3");
//! assert_eq!(globals.get_value("count").unwrap(), Value::Unset);
//! ```

pub mod config;
pub mod error;
pub mod expand;
pub mod expr;
pub mod notify;
pub mod path;
pub mod store;
pub mod value;

// Re-exports for convenience.
pub use error::{ConfigError, EvalError, ParseError, StoreError};
pub use expand::expand;
pub use expr::{evaluate, evaluate_node, parse, Node, ParsedExpr};
pub use store::Store;
pub use value::{Context, Function, Value};
