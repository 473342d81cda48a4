//! Path resolution over a [`Context`].
//!
//! A path is a dotted sequence of keys, optionally followed by bracketed
//! index/key segments: `name`, `employee.name.first`, `list[3]`,
//! `data.employees[1].name`, `grid[0][2]`, `map['some key']`.
//!
//! Reads never create anything.  Writes auto-vivify missing intermediates,
//! choosing a sequence or a mapping by peeking at the following segment.

use crate::error::StoreError;
use crate::value::{Context, Value};

static UNSET: Value = Value::Unset;

/// How far past the end of an array a write may pad with unset slots.
const MAX_INDEX_GAP: usize = 1 << 16;

// ── Step ──────────────────────────────────────────────────────────────────────

/// One segment of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// `.name` (or the leading name).
    Key(String),
    /// `[token]`.
    Index(String),
}

impl Step {
    fn token(&self) -> &str {
        match self {
            Step::Key(k) | Step::Index(k) => k,
        }
    }

    fn index(&self) -> Option<usize> {
        self.token().parse().ok()
    }

    /// Empty container to create in front of this step on write.
    fn container(&self) -> Value {
        match self {
            Step::Index(_) if self.index().is_some() => Value::Array(Vec::new()),
            _ => Value::Object(Context::new()),
        }
    }
}

fn parse_path(id: &str) -> Result<Vec<Step>, StoreError> {
    let mut steps = Vec::new();
    let mut key = String::new();
    let mut chars = id.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                let after_index = matches!(steps.last(), Some(Step::Index(_)));
                if !(key.is_empty() && after_index) {
                    steps.push(Step::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() || steps.is_empty() {
                    steps.push(Step::Key(std::mem::take(&mut key)));
                }
                let mut token = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    token.push(c);
                }
                if !closed {
                    return Err(StoreError::invalid_path(id, "unclosed ["));
                }
                steps.push(Step::Index(unquote(token.trim()).to_owned()));
            }
            c => key.push(c),
        }
    }
    if !key.is_empty() || !matches!(steps.last(), Some(Step::Index(_))) {
        steps.push(Step::Key(key));
    }
    Ok(steps)
}

fn unquote(token: &str) -> &str {
    for q in ['\'', '"'] {
        if let Some(inner) = token.strip_prefix(q).and_then(|t| t.strip_suffix(q)) {
            return inner;
        }
    }
    token
}

// ── Read ──────────────────────────────────────────────────────────────────────

/// Look up `id` in `context`.
///
/// Returns `Ok(None)` when the path does not exist.  A bracket segment applied
/// to an unset, null or non-container value is an error; a bracket segment on
/// a container always "exists" and yields [`Value::Unset`] for a missing
/// element.
pub fn resolve<'a>(context: &'a Context, id: &str) -> Result<Option<&'a Value>, StoreError> {
    if id.is_empty() {
        return Ok(None);
    }
    let steps = parse_path(id)?;
    let Some((first, rest)) = steps.split_first() else {
        return Ok(None);
    };
    let Some(mut current) = context.get(first.token()) else {
        return Ok(None);
    };

    for step in rest {
        current = match step {
            Step::Key(key) => match lookup_key(current, key) {
                Some(v) => v,
                None => return Ok(None),
            },
            Step::Index(token) => lookup_index(current, token, id)?,
        };
    }
    Ok(Some(current))
}

fn lookup_key<'a>(current: &'a Value, key: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn lookup_index<'a>(current: &'a Value, token: &str, id: &str) -> Result<&'a Value, StoreError> {
    match current {
        Value::Unset => Err(StoreError::invalid_path(id, "variable not initialized")),
        Value::Null => Err(StoreError::invalid_path(id, "variable is null")),
        Value::Array(items) => Ok(token
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .unwrap_or(&UNSET)),
        Value::Object(map) => Ok(map.get(token).unwrap_or(&UNSET)),
        _ => Err(StoreError::invalid_path(id, "variable is not an array/object")),
    }
}

// ── Write ─────────────────────────────────────────────────────────────────────

/// Assign `value` at `id`, creating intermediate containers as needed.
///
/// Returns `Ok(false)` for an empty path.
pub fn assign(context: &mut Context, id: &str, value: Value) -> Result<bool, StoreError> {
    if id.is_empty() {
        return Ok(false);
    }
    let steps = parse_path(id)?;
    let Some((first, rest)) = steps.split_first() else {
        return Ok(false);
    };
    let key = first.token().to_owned();

    match rest.first() {
        None => {
            context.insert(key, value);
            Ok(true)
        }
        Some(next) => {
            let slot = context.entry(key).or_insert_with(|| next.container());
            assign_into(slot, rest, value, id)
        }
    }
}

/// Walk `steps` below `slot`, writing `value` at the last one.  `steps` is
/// never empty.
fn assign_into(slot: &mut Value, steps: &[Step], value: Value, id: &str) -> Result<bool, StoreError> {
    let (step, rest) = match steps.split_first() {
        Some(split) => split,
        None => return Ok(false),
    };
    if slot.is_nullish() {
        *slot = step.container();
    }

    let child = match slot {
        Value::Object(map) => {
            let key = step.token().to_owned();
            match rest.first() {
                None => {
                    map.insert(key, value);
                    return Ok(true);
                }
                Some(next) => map.entry(key).or_insert_with(|| next.container()),
            }
        }
        Value::Array(items) => {
            let Some(index) = step.index() else {
                return Err(StoreError::invalid_path(
                    id,
                    format!("`{}` is not a valid array index", step.token()),
                ));
            };
            if index >= items.len() {
                let len = index
                    .checked_add(1)
                    .filter(|len| len - items.len() <= MAX_INDEX_GAP)
                    .ok_or_else(|| StoreError::invalid_path(id, "index out of range"))?;
                items.resize(len, Value::Unset);
            }
            if rest.is_empty() {
                items[index] = value;
                return Ok(true);
            }
            &mut items[index]
        }
        other => {
            return Err(StoreError::invalid_path(
                id,
                format!("cannot assign into a {}", other.type_name()),
            ));
        }
    };
    assign_into(child, rest, value, id)
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// Shallow right-biased merge: keys in `state` overwrite keys in `context`.
///
/// Returns `None` when `state` is not a mapping.
pub fn merge(context: &Context, state: &Value) -> Option<Context> {
    let Value::Object(overrides) = state else {
        return None;
    };
    let mut merged = context.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    Some(merged)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(json: serde_json::Value) -> Context {
        match Value::from(json) {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn parse_steps() {
        assert_eq!(
            parse_path("data.employees[1].name").unwrap(),
            vec![
                Step::Key("data".into()),
                Step::Key("employees".into()),
                Step::Index("1".into()),
                Step::Key("name".into()),
            ]
        );
        assert_eq!(
            parse_path("grid[0][2]").unwrap(),
            vec![
                Step::Key("grid".into()),
                Step::Index("0".into()),
                Step::Index("2".into()),
            ]
        );
        assert_eq!(
            parse_path("m['a.b']").unwrap(),
            vec![Step::Key("m".into()), Step::Index("a.b".into())]
        );
        assert!(parse_path("a[0").is_err());
    }

    #[test]
    fn resolve_simple_and_dotted() {
        let c = ctx(json!({"employee": {"name": {"username": "sangupta"}}}));
        assert_eq!(
            resolve(&c, "employee.name.username").unwrap(),
            Some(&Value::from("sangupta"))
        );
        assert_eq!(resolve(&c, "employee.age").unwrap(), None);
        assert_eq!(resolve(&c, "nobody.name").unwrap(), None);
        assert_eq!(resolve(&c, "").unwrap(), None);
    }

    #[test]
    fn resolve_array_index() {
        let c = ctx(json!({"arr": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]}));
        assert_eq!(resolve(&c, "arr[3]").unwrap(), Some(&Value::from(4)));
        // the container exists, so a missing element still resolves
        assert_eq!(resolve(&c, "arr[99]").unwrap(), Some(&Value::Unset));
        assert_eq!(resolve(&c, "missing[0]").unwrap(), None);
    }

    #[test]
    fn resolve_object_key_in_brackets() {
        let c = ctx(json!({"numMap": {"10": "ten", "3": "three"}}));
        assert_eq!(resolve(&c, "numMap[3]").unwrap(), Some(&Value::from("three")));
        assert_eq!(resolve(&c, "numMap[\"10\"]").unwrap(), Some(&Value::from("ten")));
    }

    #[test]
    fn resolve_mixed_segments() {
        let c = ctx(json!({
            "data": {"employees": [
                {"name": {"first": "Ada"}},
                {"name": {"first": "Grace"}}
            ]}
        }));
        assert_eq!(
            resolve(&c, "data.employees[1].name.first").unwrap(),
            Some(&Value::from("Grace"))
        );
    }

    #[test]
    fn bracket_on_null_or_unset_fails() {
        let mut c = ctx(json!({"n": null, "x": 5}));
        c.insert("u".into(), Value::Unset);
        assert!(matches!(resolve(&c, "n[0]"), Err(StoreError::InvalidPath { .. })));
        assert!(matches!(resolve(&c, "u[0]"), Err(StoreError::InvalidPath { .. })));
        assert!(matches!(resolve(&c, "x[0]"), Err(StoreError::InvalidPath { .. })));
        // dotted traversal through null short-circuits instead
        assert_eq!(resolve(&c, "n.field").unwrap(), None);
    }

    #[test]
    fn assign_creates_objects() {
        let mut c = Context::new();
        assert!(assign(&mut c, "a.b.c", 1.into()).unwrap());
        assert_eq!(resolve(&c, "a.b.c").unwrap(), Some(&Value::from(1)));
    }

    #[test]
    fn assign_creates_arrays_by_lookahead() {
        let mut c = Context::new();
        assign(&mut c, "list[2]", "x".into()).unwrap();
        assert_eq!(
            c.get("list"),
            Some(&Value::Array(vec![Value::Unset, Value::Unset, "x".into()]))
        );

        assign(&mut c, "rows[0].cells[1]", 7.into()).unwrap();
        assert_eq!(resolve(&c, "rows[0].cells[1]").unwrap(), Some(&Value::from(7)));
        assert!(matches!(c.get("rows"), Some(Value::Array(_))));

        assign(&mut c, "by.name[key]", true.into()).unwrap();
        assert!(matches!(resolve(&c, "by.name").unwrap(), Some(Value::Object(_))));
        assert_eq!(resolve(&c, "by.name[key]").unwrap(), Some(&Value::Bool(true)));
    }

    #[test]
    fn assign_replaces_null_intermediate() {
        let mut c = ctx(json!({"a": null}));
        assign(&mut c, "a.b", 2.into()).unwrap();
        assert_eq!(resolve(&c, "a.b").unwrap(), Some(&Value::from(2)));
    }

    #[test]
    fn assign_through_primitive_fails() {
        let mut c = ctx(json!({"a": 5, "list": [1]}));
        assert!(assign(&mut c, "a.b", 1.into()).is_err());
        assert!(assign(&mut c, "list[x]", 1.into()).is_err());
        assert_eq!(assign(&mut c, "", 1.into()), Ok(false));
    }

    #[test]
    fn assign_rejects_huge_indices() {
        let mut c = Context::new();
        for id in ["a[18446744073709551615]", "a[100000000000]", "b.c[99999999999]"] {
            assert!(
                matches!(assign(&mut c, id, 1.into()), Err(StoreError::InvalidPath { .. })),
                "{id}"
            );
        }
        let mut c = ctx(json!({"list": [1]}));
        assert!(assign(&mut c, &format!("list[{MAX_INDEX_GAP}]"), 2.into()).is_ok());
        assert!(assign(&mut c, &format!("list[{}]", 3 * MAX_INDEX_GAP), 2.into()).is_err());
    }

    #[test]
    fn assign_existing_nested() {
        let mut c = ctx(json!({"employee": {"name": {"first": "A"}, "year": 2020}}));
        assign(&mut c, "employee.name.first", "B".into()).unwrap();
        assert_eq!(resolve(&c, "employee.name.first").unwrap(), Some(&Value::from("B")));
        assert_eq!(resolve(&c, "employee.year").unwrap(), Some(&Value::from(2020)));
    }

    #[test]
    fn merge_is_right_biased() {
        let a = ctx(json!({"x": 1, "y": 2}));
        let merged = merge(&a, &Value::from(json!({"y": 3, "z": 4}))).unwrap();
        assert_eq!(merged.get("x"), Some(&Value::from(1)));
        assert_eq!(merged.get("y"), Some(&Value::from(3)));
        assert_eq!(merged.get("z"), Some(&Value::from(4)));
        assert_eq!(merge(&a, &Value::from(5)), None);
    }
}
