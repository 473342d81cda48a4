//! Loading initial state into a [`Store`].
//!
//! Two formats are understood.
//!
//! A line-oriented binding file:
//!
//! | Line                      | Action                                        |
//! |---------------------------|-----------------------------------------------|
//! | `<path> = <expression>`   | evaluate `expression`, then `set_value(path)` |
//! | Lines starting with `;`/`#` | comment, ignored                            |
//! | Blank lines               | ignored                                       |
//!
//! Expressions are evaluated against the store being loaded, so a binding
//! may refer to any binding above it.
//!
//! A JSON document whose top level is an object, merged into the base
//! context with [`Store::update_state`].

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::expr::evaluate;
use crate::store::Store;
use crate::value::Value;

const BINDING_PATTERN: &str =
    r"^(?P<path>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*|\[[^\]]*\])*)\s*=(?P<expr>.*)$";

static BINDING: OnceLock<Regex> = OnceLock::new();

fn binding_re() -> Result<&'static Regex, ConfigError> {
    if let Some(re) = BINDING.get() {
        return Ok(re);
    }
    let re = Regex::new(BINDING_PATTERN).map_err(|e| ConfigError {
        line: 0,
        message: e.to_string(),
    })?;
    Ok(BINDING.get_or_init(|| re))
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Apply every binding in `src` to `store`.
///
/// A bad line does not stop the load; it is reported in the returned list
/// and the remaining lines are still applied.
pub fn load_str(store: &Store, src: &str) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let re = match binding_re() {
        Ok(re) => re,
        Err(e) => return vec![e],
    };

    for (i, raw) in src.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Err(message) = apply_binding(re, store, line) {
            tracing::warn!(store = store.name(), line = lineno, "skipping binding: {message}");
            errors.push(ConfigError { line: lineno, message });
        }
    }

    errors
}

/// Read a binding file from disk and apply it to `store`.
pub fn load_file(store: &Store, path: &Path) -> std::io::Result<Vec<ConfigError>> {
    let s = std::fs::read_to_string(path)?;
    Ok(load_str(store, &s))
}

/// Merge a JSON object into the base context of `store`.
pub fn load_json(store: &Store, src: &str) -> Result<(), ConfigError> {
    let json: serde_json::Value = serde_json::from_str(src).map_err(|e| ConfigError {
        line: e.line(),
        message: e.to_string(),
    })?;
    if !json.is_object() {
        return Err(ConfigError {
            line: 1,
            message: "top-level JSON value must be an object".into(),
        });
    }
    store.update_state(&Value::from(json));
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn apply_binding(re: &Regex, store: &Store, line: &str) -> Result<(), String> {
    let caps = re
        .captures(line)
        .ok_or_else(|| format!("expected `<path> = <expression>`, got `{line}`"))?;
    let path = &caps["path"];
    let expr = caps["expr"].trim();
    if expr.is_empty() {
        return Err(format!("missing expression for `{path}`"));
    }
    // `a == b` is a comparison, not a binding
    if expr.starts_with('=') {
        return Err(format!("expected `<path> = <expression>`, got `{line}`"));
    }

    let value = evaluate(expr, store).map_err(|e| e.to_string())?;
    store.set_value(path, value).map_err(|e| e.to_string())?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
