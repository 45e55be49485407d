//! Operator semantics shared by static folding and runtime evaluation.
//!
//! Declarations, statically reducible body expressions, and row evaluation
//! all go through these functions, so a type error found while folding at
//! compile time is exactly the error the executor would raise.

use super::{Value, ValueType};
use crate::ast::{BinaryOperator, UnaryOperator};
use smol_str::SmolStr;
use std::cmp::Ordering;
use thiserror::Error;

/// Failure of a single operator application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// No semantics are defined for the operand types.
    #[error("Type mismatch: cannot apply '{op}' to {}", operand_types(.left, .right))]
    Type {
        op: &'static str,
        left: ValueType,
        right: Option<ValueType>,
    },
    #[error("Division by zero")]
    DivisionByZero,
}

fn operand_types(left: &ValueType, right: &Option<ValueType>) -> String {
    match right {
        Some(right) => format!("{left} and {right}"),
        None => left.to_string(),
    }
}

impl OpError {
    fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Self {
        OpError::Type {
            op: op.symbol(),
            left: left.value_type(),
            right: Some(right.value_type()),
        }
    }

    fn unary(op: UnaryOperator, operand: &Value) -> Self {
        OpError::Type {
            op: op.symbol(),
            left: operand.value_type(),
            right: None,
        }
    }
}

pub type OpResult = Result<Value, OpError>;

/// Applies a binary operator with Cypher semantics.
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> OpResult {
    use BinaryOperator::*;
    match op {
        Add => add(left, right),
        Sub | Mul | Div | Mod | Pow => arithmetic(op, left, right),
        Eq => Ok(equals(left, right).map_or(Value::Null, Value::Boolean)),
        Neq => Ok(equals(left, right).map_or(Value::Null, |b| Value::Boolean(!b))),
        Lt | Le | Gt | Ge => Ok(compare(op, left, right)),
        And | Or | Xor => logical(op, left, right),
        In => contains(left, right),
    }
}

/// Applies a unary operator with Cypher semantics.
pub fn unary(op: UnaryOperator, operand: &Value) -> OpResult {
    match op {
        UnaryOperator::Negate => match operand {
            Value::Null => Ok(Value::Null),
            Value::Integer(i) => Ok(Value::Integer(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            _ => Err(OpError::unary(op, operand)),
        },
        UnaryOperator::Not => match operand {
            Value::Null => Ok(Value::Null),
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            _ => Err(OpError::unary(op, operand)),
        },
        UnaryOperator::IsNull => Ok(Value::Boolean(operand.is_null())),
        UnaryOperator::IsNotNull => Ok(Value::Boolean(!operand.is_null())),
    }
}

fn add(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::List(a), item) => {
            let mut items = a.clone();
            items.push(item.clone());
            Ok(Value::List(items))
        }
        (item, Value::List(b)) => {
            let mut items = Vec::with_capacity(b.len() + 1);
            items.push(item.clone());
            items.extend(b.iter().cloned());
            Ok(Value::List(items))
        }
        (Value::String(a), b) if is_scalar(b) => Ok(concat(a, &scalar_text(b))),
        (a, Value::String(b)) if is_scalar(a) => Ok(concat(&scalar_text(a), b)),
        _ => arithmetic(BinaryOperator::Add, left, right),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::String(_)
    )
}

/// Text of a scalar as it appears in string concatenation (no quotes).
fn scalar_text(value: &Value) -> SmolStr {
    match value {
        Value::String(s) => s.clone(),
        other => SmolStr::new(other.to_string()),
    }
}

fn concat(a: &str, b: &str) -> Value {
    let mut s = String::with_capacity(a.len() + b.len());
    s.push_str(a);
    s.push_str(b);
    Value::String(SmolStr::from(s))
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> OpResult {
    use BinaryOperator::*;
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                Div => {
                    if b == 0 {
                        return Err(OpError::DivisionByZero);
                    }
                    a.wrapping_div(b)
                }
                Mod => {
                    if b == 0 {
                        return Err(OpError::DivisionByZero);
                    }
                    a.wrapping_rem(b)
                }
                Pow => return Ok(Value::Float((a as f64).powf(b as f64))),
                _ => return Err(OpError::binary(op, left, right)),
            };
            Ok(Value::Integer(result))
        }
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(OpError::binary(op, left, right)),
            };
            let result = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Mod => a % b,
                Pow => a.powf(b),
                _ => return Err(OpError::binary(op, left, right)),
            };
            Ok(Value::Float(result))
        }
        _ => Err(OpError::binary(op, left, right)),
    }
}

/// Cypher equality: `None` means the comparison is unknown (null involved).
pub fn equals(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            numeric_cmp(left, right).map(|ord| ord == Ordering::Equal)
        }
        (Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (x, y) in a.iter().zip(b) {
                match equals(x, y) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown { None } else { Some(true) }
        }
        (Value::Map(a), Value::Map(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (key, x) in a {
                match b.get(key) {
                    None => return Some(false),
                    Some(y) => match equals(x, y) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    },
                }
            }
            if unknown { None } else { Some(true) }
        }
        _ => Some(left == right),
    }
}

fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    let ordering = match (left, right) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            numeric_cmp(left, right)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => Some(a.cmp(b)),
        // Incomparable operands (including null) yield null.
        _ => None,
    };
    let Some(ordering) = ordering else {
        return Value::Null;
    };
    Value::Boolean(match op {
        BinaryOperator::Lt => ordering == Ordering::Less,
        BinaryOperator::Le => ordering != Ordering::Greater,
        BinaryOperator::Gt => ordering == Ordering::Greater,
        BinaryOperator::Ge => ordering != Ordering::Less,
        _ => unreachable!("compare called with a non-comparison operator"),
    })
}

fn logical(op: BinaryOperator, left: &Value, right: &Value) -> OpResult {
    let truth = |v: &Value| match v {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        _ => Err(OpError::binary(op, left, right)),
    };
    let (a, b) = (truth(left)?, truth(right)?);
    let result = match op {
        BinaryOperator::And => match (a, b) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        BinaryOperator::Or => match (a, b) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        BinaryOperator::Xor => match (a, b) {
            (Some(x), Some(y)) => Some(x != y),
            _ => None,
        },
        _ => unreachable!("logical called with a non-logical operator"),
    };
    Ok(result.map_or(Value::Null, Value::Boolean))
}

fn contains(item: &Value, list: &Value) -> OpResult {
    match list {
        Value::Null => Ok(Value::Null),
        Value::List(items) => {
            if item.is_null() {
                return Ok(if items.is_empty() {
                    Value::Boolean(false)
                } else {
                    Value::Null
                });
            }
            let mut unknown = false;
            for candidate in items {
                match equals(item, candidate) {
                    Some(true) => return Ok(Value::Boolean(true)),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            Ok(if unknown {
                Value::Null
            } else {
                Value::Boolean(false)
            })
        }
        _ => Err(OpError::binary(BinaryOperator::In, item, list)),
    }
}

/// Three-valued truth of a predicate result: only `true` passes a filter.
pub fn is_true(value: &Value) -> bool {
    matches!(value, Value::Boolean(true))
}
