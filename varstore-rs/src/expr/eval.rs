//! Tree-walking evaluator.
//!
//! Every identifier is resolved through [`Store::get_value`], so an
//! expression sees exactly the scope chain the store exposes: overlays,
//! then ancestors' base contexts, with `super` forwarding to the parent.

use super::ast::{BinaryOp, LogicalOp, Node, UnaryOp};
use super::parser::parse;
use crate::error::{EvalError, StoreError};
use crate::store::Store;
use crate::value::Value;

/// Parse `expr` and evaluate it against `store`.
#[tracing::instrument(level = "trace", skip_all, fields(len = expr.len()))]
pub fn evaluate(expr: &str, store: &Store) -> Result<Value, EvalError> {
    let parsed = parse(expr)?;
    evaluate_node(&parsed.node, store)
}

/// Evaluate a pre-parsed AST against `store`.
///
/// The same node may be evaluated any number of times; nothing about the
/// node is cached between calls.
pub fn evaluate_node(node: &Node, store: &Store) -> Result<Value, EvalError> {
    match node {
        Node::Literal(v) => Ok(v.clone()),

        Node::Identifier(name) => Ok(store.get_value(name)?),

        Node::This => Ok(Value::Store(store.clone())),

        Node::Unary { op, operand } => {
            let v = evaluate_node(operand, store)?;
            Ok(match op {
                UnaryOp::Neg => v.arith_neg(),
                UnaryOp::Plus => Value::Number(v.to_number()),
                UnaryOp::BitNot => Value::from(!v.to_int32()),
                UnaryOp::Not => Value::Bool(!v.truthy()),
            })
        }

        Node::Binary { op, left, right } => {
            let l = evaluate_node(left, store)?;
            let r = evaluate_node(right, store)?;
            Ok(eval_binop(*op, &l, &r))
        }

        // The right operand is only evaluated when it decides the result.
        Node::Logical { op, left, right } => {
            let l = evaluate_node(left, store)?;
            let short_circuit = match op {
                LogicalOp::Or => l.truthy(),
                LogicalOp::And => !l.truthy(),
            };
            if short_circuit {
                Ok(l)
            } else {
                evaluate_node(right, store)
            }
        }

        Node::Conditional { test, consequent, alternate } => {
            if evaluate_node(test, store)?.truthy() {
                evaluate_node(consequent, store)
            } else {
                evaluate_node(alternate, store)
            }
        }

        Node::Member { .. } => Ok(evaluate_member(node, store)?.1),

        Node::Call { callee, arguments } => {
            let (receiver, callee) = match callee.as_ref() {
                member @ Node::Member { .. } => evaluate_member(member, store)?,
                other => (Value::Unset, evaluate_node(other, store)?),
            };
            let Value::Function(f) = callee else {
                return Ok(Value::Unset);
            };
            let mut args = Vec::with_capacity(arguments.len());
            for arg in arguments {
                args.push(evaluate_node(arg, store)?);
            }
            Ok(f.call(&receiver, &args))
        }

        Node::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(match element {
                    Some(node) => evaluate_node(node, store)?,
                    None => Value::Null,
                });
            }
            Ok(Value::Array(items))
        }

        Node::Compound(body) => {
            let mut last = None;
            for node in body {
                last = Some(evaluate_node(node, store)?);
            }
            last.ok_or(EvalError::NullNode)
        }
    }
}

/// Evaluate a member expression, returning `(owner, value)` so that a call
/// through the member can bind `owner` as its receiver.
fn evaluate_member(node: &Node, store: &Store) -> Result<(Value, Value), EvalError> {
    let Node::Member { object, property, computed } = node else {
        return Ok((Value::Unset, evaluate_node(node, store)?));
    };
    let owner = evaluate_node(object, store)?;
    let key = match (computed, property.as_ref()) {
        (false, Node::Identifier(name)) => Value::Str(name.clone()),
        _ => evaluate_node(property, store)?,
    };
    let value = member_of(&owner, &key)?;
    Ok((owner, value))
}

fn member_of(owner: &Value, key: &Value) -> Result<Value, StoreError> {
    Ok(match owner {
        Value::Store(s) => s.get_value(&key.to_key())?,
        Value::Object(map) => map.get(&key.to_key()).cloned().unwrap_or_default(),
        Value::Array(items) => match key {
            Value::Str(s) if s == "length" => Value::from(items.len()),
            _ => key
                .as_index()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        },
        Value::Str(text) => match key {
            Value::Str(s) if s == "length" => Value::from(text.chars().count()),
            _ => key
                .as_index()
                .and_then(|i| text.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or_default(),
        },
        Value::Unset | Value::Null => {
            return Err(StoreError::invalid_path(
                &key.to_key(),
                format!("cannot read property of {}", owner.type_name()),
            ));
        }
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Value::Unset,
    })
}

fn eval_binop(op: BinaryOp, l: &Value, r: &Value) -> Value {
    use std::cmp::Ordering;
    match op {
        BinaryOp::Add => l.arith_add(r),
        BinaryOp::Sub => l.arith_sub(r),
        BinaryOp::Mul => l.arith_mul(r),
        BinaryOp::Div => l.arith_div(r),
        BinaryOp::Rem => l.arith_rem(r),

        BinaryOp::Eq => Value::Bool(l.loose_eq(r)),
        BinaryOp::Ne => Value::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_eq(r)),
        BinaryOp::StrictNe => Value::Bool(!l.strict_eq(r)),

        BinaryOp::Lt => Value::Bool(l.compare(r) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(l.compare(r) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(l.compare(r), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Ge => Value::Bool(matches!(
            l.compare(r),
            Some(Ordering::Greater | Ordering::Equal)
        )),

        BinaryOp::BitAnd => Value::from(l.to_int32() & r.to_int32()),
        BinaryOp::BitOr => Value::from(l.to_int32() | r.to_int32()),
        BinaryOp::BitXor => Value::from(l.to_int32() ^ r.to_int32()),
        BinaryOp::Shl => Value::from(l.to_int32().wrapping_shl(r.to_uint32() & 31)),
        BinaryOp::Shr => Value::from(l.to_int32() >> (r.to_uint32() & 31)),
        BinaryOp::UShr => Value::Number(f64::from(l.to_uint32() >> (r.to_uint32() & 31))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
