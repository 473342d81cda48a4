//! Template substitution against a [`Store`].
//!
//! | Sequence           | Meaning                                              |
//! |--------------------|------------------------------------------------------|
//! | `%{path}`          | Value at `path`, rendered as text (unset → empty)    |
//! | `${path}`          | Same, dollar-brace form                              |
//! | `%{path-default}`  | Value at `path`, or `default` if unset/null/empty    |
//! | `$[expr]`          | Evaluate `expr` and substitute the result            |
//! | `%(expr)`          | Same as `$[expr]`, alternate inline-expression form  |
//! | `$$`               | Literal `$`                                          |
//! | `%%`               | Literal `%`                                          |
//!
//! Paths use the store's path syntax (`a.b[0]`, `super.x`).  Any other
//! character, including a lone `$` or `%`, is copied through unchanged.

use crate::error::{EvalError, ParseError};
use crate::expr::evaluate;
use crate::store::Store;
use crate::value::Value;

/// Expand all substitution sequences in `src` against `store`.
pub fn expand(src: &str, store: &Store) -> Result<String, EvalError> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        match (ch, next) {
            ('$', Some('$')) | ('%', Some('%')) => {
                out.push(ch);
                i += 2;
            }
            ('%', Some('{')) | ('$', Some('{')) => {
                let (name, end) = read_delimited(&chars, i, '{', '}')?;
                out.push_str(&resolve_brace(&name, store)?);
                i = end;
            }
            ('$', Some('[')) => {
                let (expr_src, end) = read_delimited(&chars, i, '[', ']')?;
                out.push_str(&render(&evaluate(&expr_src, store)?));
                i = end;
            }
            ('%', Some('(')) => {
                let (expr_src, end) = read_delimited(&chars, i, '(', ')')?;
                out.push_str(&render(&evaluate(&expr_src, store)?));
                i = end;
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    Ok(out)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Read the body of a sequence whose sigil sits at `start` and whose opener
/// is at `start + 1`, tracking nested `open`/`close` pairs so that
/// `$[a[0]]` yields `a[0]`.  In expression bodies, delimiters inside `'…'`
/// or `"…"` are part of the body.  Returns the body and the index just past the closing
/// delimiter.
fn read_delimited(
    chars: &[char],
    start: usize,
    open: char,
    close: char,
) -> Result<(String, usize), ParseError> {
    let mut body = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = start + 2;
    while let Some(&c) = chars.get(i) {
        i += 1;
        if let Some(q) = quote {
            body.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i) {
                    body.push(escaped);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if open != '{' && (c == '\'' || c == '"') {
            quote = Some(c);
        } else if c == close {
            if depth == 0 {
                return Ok((body, i));
            }
            depth -= 1;
        } else if c == open {
            depth += 1;
        }
        body.push(c);
    }
    Err(match open {
        '(' => ParseError::UnclosedGroup { index: start },
        _ => ParseError::UnclosedBracket { index: start },
    })
}

/// Resolve the body of `%{...}` / `${...}`, honouring a `-default` suffix.
fn resolve_brace(body: &str, store: &Store) -> Result<String, EvalError> {
    let (path, default) = match body.split_once('-') {
        Some((path, default)) => (path, Some(default)),
        None => (body, None),
    };
    let value = store.get_value(path.trim())?;
    let text = render(&value);
    match default {
        Some(d) if value.is_nullish() || text.is_empty() => Ok(expand_default(d, store)),
        _ => Ok(text),
    }
}

/// A default may itself contain substitutions; if those fail the default is
/// used verbatim.
fn expand_default(src: &str, store: &Store) -> String {
    expand(src, store).unwrap_or_else(|e| {
        tracing::debug!("default `{src}` left unexpanded: {e}");
        src.to_owned()
    })
}

fn render(value: &Value) -> String {
    if value.is_unset() {
        String::new()
    } else {
        value.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
