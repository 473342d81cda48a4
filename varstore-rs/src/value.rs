//! Runtime value type shared by the store, the path resolver and the
//! expression evaluator.
//!
//! Values are dynamically typed.  Two distinct "no value" states exist:
//! [`Value::Null`] is an explicitly stored absence, [`Value::Unset`] means the
//! key was never assigned.  Operators coerce freely between variants using
//! the conversions defined here.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::store::Store;

/// One mapping layer: string keys to values.
pub type Context = HashMap<String, Value>;

/// Signature of a host function bound into a store.
///
/// The first argument is the receiver (`foo` in `foo.bar()`), or
/// [`Value::Unset`] for a bare call.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Value + Send + Sync;

// ── Function ──────────────────────────────────────────────────────────────────

/// A callable value.  Clones share the same underlying closure, and equality
/// is identity of that closure.
#[derive(Clone)]
pub struct Function(Arc<NativeFn>);

impl Function {
    pub fn new(f: impl Fn(&Value, &[Value]) -> Value + Send + Sync + 'static) -> Self {
        Function(Arc::new(f))
    }

    /// Invoke with `this` bound as the receiver.
    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A dynamically typed runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Never assigned.
    #[default]
    Unset,
    /// Explicitly assigned absence.
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Context),
    Function(Function),
    Store(Store),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Store(a), Value::Store(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(_) => f.write_str("[function]"),
            Value::Store(s) => write!(f, "[store {}]", s.name()),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        // -0 prints as 0
        f.write_str("0")
    } else {
        write!(f, "{n}")
    }
}

impl Value {
    /// Wrap a closure as a callable value.
    pub fn function(f: impl Fn(&Value, &[Value]) -> Value + Send + Sync + 'static) -> Self {
        Value::Function(Function::new(f))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// `true` for both `Unset` and `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Unset | Value::Null)
    }

    /// Name of the variant as a lowercase word.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unset => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Store(_) => "store",
        }
    }

    // ── Coercions ─────────────────────────────────────────────────────────────

    /// Unset, null, false, 0, NaN and `""` are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Unset | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Store(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Unset => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => str_to_number(s),
            Value::Array(_) => str_to_number(&self.to_string()),
            Value::Object(_) | Value::Function(_) | Value::Store(_) => f64::NAN,
        }
    }

    /// Modular conversion to an unsigned 32-bit integer (NaN and infinities
    /// become 0).
    pub fn to_uint32(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n.trunc().rem_euclid(4_294_967_296.0) as u32
    }

    pub fn to_int32(&self) -> i32 {
        self.to_uint32() as i32
    }

    /// Containers and callables collapse to their text form; primitives are
    /// returned as-is.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Store(_) => {
                Value::Str(self.to_string())
            }
            other => other.clone(),
        }
    }

    /// The string used to look up this value as a mapping key.
    pub fn to_key(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Interpret as a sequence index, if this is a non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => {
                Some(*n as usize)
            }
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    /// `+`: string concatenation if either side is textual, else numeric sum.
    pub fn arith_add(&self, rhs: &Value) -> Value {
        let (a, b) = (self.to_primitive(), rhs.to_primitive());
        if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
            Value::Str(format!("{a}{b}"))
        } else {
            Value::Number(a.to_number() + b.to_number())
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() - rhs.to_number())
    }

    pub fn arith_mul(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() * rhs.to_number())
    }

    /// Division never fails: `x / 0` is an infinity or NaN.
    pub fn arith_div(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() / rhs.to_number())
    }

    pub fn arith_rem(&self, rhs: &Value) -> Value {
        Value::Number(self.to_number() % rhs.to_number())
    }

    pub fn arith_neg(&self) -> Value {
        Value::Number(-self.to_number())
    }

    // ── Comparison helpers ────────────────────────────────────────────────────

    /// Strict equality: same variant and same value.
    pub fn strict_eq(&self, rhs: &Value) -> bool {
        self == rhs
    }

    /// Loose equality with cross-type coercion.
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::Unset | Value::Null, Value::Unset | Value::Null) => true,
            (Value::Unset | Value::Null, _) | (_, Value::Unset | Value::Null) => false,
            (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
                self.to_number() == rhs.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(rhs),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(rhs.to_number())),
            (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::Str(_)) => {
                self.to_primitive().loose_eq(rhs)
            }
            (Value::Number(_) | Value::Str(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_eq(&rhs.to_primitive())
            }
            _ => self.strict_eq(rhs),
        }
    }

    /// Relational ordering.  Text compares lexicographically when both sides
    /// are textual; otherwise numerically, with `None` whenever NaN is involved.
    pub fn compare(&self, rhs: &Value) -> Option<Ordering> {
        match (self.to_primitive(), rhs.to_primitive()) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        }
    }

    // ── JSON ──────────────────────────────────────────────────────────────────

    /// Convert to JSON.  Returns `None` for values with no JSON form
    /// (unset, callables, stores); such entries are dropped from mappings
    /// and become `null` inside sequences.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Value::Unset | Value::Function(_) | Value::Store(_) => return None,
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
                }
            }
            Value::Str(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|v| v.to_json().unwrap_or(Json::Null))
                    .collect(),
            ),
            Value::Object(map) => Json::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                    .collect(),
            ),
        })
    }
}

fn str_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf" and "nan"; only digits, signs, '.' and exponents count.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Context> for Value {
    fn from(map: Context) -> Self {
        Value::Object(map)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Store> for Value {
    fn from(s: Store) -> Self {
        Value::Store(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
