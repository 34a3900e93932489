//! Operators and member access on values.

use std::cmp::Ordering;

use crate::render::fmt;
use crate::types::ast;
use crate::{Error, Result, Value};

/// Looks up a field or index on a value.
pub fn member<'a>(source: &str, target: &'a Value, key: &ast::Key) -> Result<&'a Value> {
    match (target, key) {
        (Value::Map(map), ast::Key::Ident(ident)) => {
            let name = &source[ident.span];
            map.get(name)
                .ok_or_else(|| Error::from(format!("key `{name}` not found in map")))
        }
        (Value::Map(map), ast::Key::Index(i, _)) => map
            .get(&i.to_string())
            .ok_or_else(|| Error::from(format!("key `{i}` not found in map"))),
        (Value::List(list), ast::Key::Index(i, _)) => list
            .get(*i)
            .ok_or_else(|| Error::from(format!("index {i} out of bounds"))),
        (value, ast::Key::Ident(_)) => Err(Error::from(format!(
            "cannot access field of {}",
            value.human()
        ))),
        (value, ast::Key::Index(..)) => Err(Error::from(format!(
            "cannot index into {}",
            value.human()
        ))),
    }
}

/// Indexes into a list with an integer or a map with a string or integer.
pub fn index<'a>(target: &'a Value, index: &Value) -> Result<&'a Value> {
    match (target, index) {
        (Value::List(list), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| list.get(i))
            .ok_or_else(|| Error::from(format!("index {i} out of bounds"))),
        (Value::Map(map), Value::String(key)) => map
            .get(key)
            .ok_or_else(|| Error::from(format!("key `{key}` not found in map"))),
        (Value::Map(map), Value::Integer(i)) => map
            .get(&i.to_string())
            .ok_or_else(|| Error::from(format!("key `{i}` not found in map"))),
        (target, index) => Err(Error::from(format!(
            "cannot index into {} with {}",
            target.human(),
            index.human()
        ))),
    }
}

pub fn unary(op: ast::UnaryOp, value: Value) -> Result<Value> {
    match op {
        ast::UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        ast::UnaryOp::Neg => match value {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| Error::from("integer overflow")),
            Value::Float(f) => Ok(Value::Float(-f)),
            value => Err(Error::from(format!("cannot negate {}", value.human()))),
        },
    }
}

/// Applies a binary operator, except for `&&` and `||` which short circuit
/// and are handled by the renderer.
pub fn binary(op: ast::BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use ast::BinaryOp::*;

    match op {
        Eq => Ok(Value::Bool(loose_eq(&lhs, &rhs))),
        NotEq => Ok(Value::Bool(!loose_eq(&lhs, &rhs))),
        Lt | Le | Gt | Ge => {
            let ord = compare(&lhs, &rhs).ok_or_else(|| {
                Error::from(format!(
                    "cannot compare {} with {}",
                    lhs.human(),
                    rhs.human()
                ))
            })?;
            let b = match op {
                Lt => ord == Ordering::Less,
                Le => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Value::Bool(b))
        }
        Add if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) => {
            let mut s = String::new();
            fmt::format(&mut s, &lhs)?;
            fmt::format(&mut s, &rhs)?;
            Ok(Value::String(s))
        }
        Add | Sub | Mul | Div | Rem => arithmetic(op, lhs, rhs),
        And => Ok(Value::Bool(lhs.is_truthy() && rhs.is_truthy())),
        Or => Ok(Value::Bool(lhs.is_truthy() || rhs.is_truthy())),
    }
}

fn arithmetic(op: ast::BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use ast::BinaryOp::*;

    let overflow = || Error::from("integer overflow");

    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => {
            if matches!(op, Div | Rem) && b == 0 {
                return Err(Error::from("division by zero"));
            }
            let v = match op {
                Add => a.checked_add(b).ok_or_else(overflow)?,
                Sub => a.checked_sub(b).ok_or_else(overflow)?,
                Mul => a.checked_mul(b).ok_or_else(overflow)?,
                Rem => a.checked_rem(b).ok_or_else(overflow)?,
                _ => match a.checked_rem(b) {
                    Some(0) => a.checked_div(b).ok_or_else(overflow)?,
                    _ => return Ok(Value::Float(a as f64 / b as f64)),
                },
            };
            Ok(Value::Integer(v))
        }
        (lhs, rhs) => {
            let (Some(a), Some(b)) = (as_float(&lhs), as_float(&rhs)) else {
                return Err(Error::from(format!(
                    "unsupported operand types {} and {}",
                    lhs.human(),
                    rhs.human()
                )));
            };
            if matches!(op, Div | Rem) && b == 0.0 {
                return Err(Error::from("division by zero"));
            }
            let v = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            };
            Ok(Value::Float(v))
        }
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Equality where integers and floats compare by numeric value.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            *a as f64 == *b
        }
        (lhs, rhs) => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (lhs, rhs) => as_float(lhs)?.partial_cmp(&as_float(rhs)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ast::BinaryOp::*;

    #[test]
    fn binary_integer_arithmetic() {
        assert_eq!(binary(Add, 2.into(), 3.into()).unwrap(), Value::Integer(5));
        assert_eq!(binary(Div, 6.into(), 3.into()).unwrap(), Value::Integer(2));
        assert_eq!(binary(Div, 7.into(), 2.into()).unwrap(), Value::Float(3.5));
        assert_eq!(binary(Rem, 7.into(), 2.into()).unwrap(), Value::Integer(1));
        assert!(binary(Div, 1.into(), 0.into()).is_err());
        assert!(binary(Add, i64::MAX.into(), 1.into()).is_err());
    }

    #[test]
    fn binary_string_concat() {
        let v = binary(Add, "n = ".into(), 1.into()).unwrap();
        assert_eq!(v, Value::from("n = 1"));
    }

    #[test]
    fn binary_comparison() {
        assert_eq!(binary(Lt, 1.into(), 1.5.into()).unwrap(), Value::Bool(true));
        assert_eq!(binary(Eq, 2.into(), 2.0.into()).unwrap(), Value::Bool(true));
        assert_eq!(binary(Ge, "b".into(), "a".into()).unwrap(), Value::Bool(true));
        assert!(binary(Lt, Value::None, 1.into()).is_err());
    }

    #[test]
    fn unary_not_uses_truthiness() {
        let v = unary(ast::UnaryOp::Not, Value::from("")).unwrap();
        assert_eq!(v, Value::Bool(true));
    }
}
