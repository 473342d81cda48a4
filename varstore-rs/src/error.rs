//! Error types for the store, the expression parser and the evaluator.
//!
//! Errors are raised at the point of violation and propagate to the caller
//! unchanged; nothing in the crate retries or swallows them.

use thiserror::Error;

// ── StoreError ────────────────────────────────────────────────────────────────

/// Failures raised by [`Store`](crate::store::Store) and the path resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A store was constructed with an empty or blank name.
    #[error("store name is required")]
    NameRequired,

    /// `super` / `super.<path>` was used on a store without a parent.
    #[error("super is not defined: store `{store}` has no parent")]
    SuperUndefined { store: String },

    /// `subscribe`/`unsubscribe` was called with a blank key.
    #[error("a key is required to subscribe or unsubscribe")]
    MissingKey,

    /// `subscribe`/`unsubscribe` was called with something that is not callable.
    #[error("a callable handler is required to subscribe or unsubscribe")]
    MissingHandler,

    /// Bracketed access on an unset, null or non-container value, or a
    /// malformed path.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl StoreError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidPath {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}

// ── ParseError ────────────────────────────────────────────────────────────────

/// Failures raised by the expression parser.  Every variant carries the
/// zero-based character index at which parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unclosed quote at character {index}")]
    UnclosedQuote { index: usize },

    #[error("unclosed [ at character {index}")]
    UnclosedBracket { index: usize },

    #[error("unclosed ( at character {index}")]
    UnclosedGroup { index: usize },

    #[error("invalid number at character {index}: {detail}")]
    InvalidNumber { index: usize, detail: String },

    #[error("unexpected {found} at character {index}")]
    UnexpectedToken { index: usize, found: String },

    #[error("expected expression at character {index}")]
    MissingExpression { index: usize },

    /// The expression nests deeper than the parser allows.
    #[error("expression nested too deeply at character {index}")]
    TooDeep { index: usize },
}

impl ParseError {
    /// Character index at which the parser gave up.
    pub fn index(&self) -> usize {
        match self {
            ParseError::UnclosedQuote { index }
            | ParseError::UnclosedBracket { index }
            | ParseError::UnclosedGroup { index }
            | ParseError::InvalidNumber { index, .. }
            | ParseError::UnexpectedToken { index, .. }
            | ParseError::MissingExpression { index }
            | ParseError::TooDeep { index } => *index,
        }
    }
}

// ── EvalError ─────────────────────────────────────────────────────────────────

/// Failures raised while evaluating an expression against a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// There was no node to evaluate (an empty expression).
    #[error("node to evaluate cannot be null")]
    NullNode,
}

// ── ConfigError ───────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading bindings into a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}
