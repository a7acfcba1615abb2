//! Binary and short-circuit operators
//!
//! Arithmetic works on numbers, with `+` also joining strings, arrays
//! and maps. Operands of different types are a `TypeError`; nothing is
//! coerced. Inside `… を 整数で` the arithmetic operators require integers
//! and `/` truncates.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Expr, LogicalOp};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::Value;

use super::{Evaluate, Interpreter, Signal};

pub(super) fn eval_binary(
    interp: &mut Interpreter,
    env: &Environment,
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    span: Span,
) -> Result<Value, Signal> {
    let left = lhs.eval(interp, env)?;
    let right = rhs.eval(interp, env)?;
    apply(op, &left, &right, interp.integer_mode).map_err(|e| interp.locate(e, span))
}

pub(super) fn eval_logical(
    interp: &mut Interpreter,
    env: &Environment,
    op: LogicalOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<Value, Signal> {
    let left = lhs.eval(interp, env)?;
    let decided = match op {
        LogicalOp::And => !left.is_truthy(),
        LogicalOp::Or => left.is_truthy(),
    };
    if decided {
        Ok(left)
    } else {
        rhs.eval(interp, env)
    }
}

/// Apply `op` to two values. Also used by compound assignment.
pub(crate) fn apply(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    integer_mode: bool,
) -> Result<Value, Signal> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, left, right),
        BinaryOp::Rem => remainder(left, right),
        _ if integer_mode => integer_arithmetic(op, left, right),
        _ => arithmetic(op, left, right),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> Signal {
    Signal::type_error(format!(
        "{} {} {} は計算できません",
        left.type_name(),
        op.symbol(),
        right.type_name()
    ))
}

// ═══════════════════════════════════════════════════════════════════════
// Arithmetic
// ═══════════════════════════════════════════════════════════════════════

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Signal> {
    match (op, left, right) {
        (_, Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            // IEEE: 1 / 0 is Infinity, 0 / 0 is NaN
            BinaryOp::Div => a / b,
            _ => return Err(mismatch(op, left, right)),
        })),

        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::from(joined))
        }

        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            let mut joined = a.read().clone();
            joined.extend(b.read().iter().cloned());
            Ok(Value::array(joined))
        }

        (BinaryOp::Add, Value::Map(a), Value::Map(b)) => {
            let mut merged: IndexMap<String, Value> = a.read().clone();
            for (k, v) in b.read().iter() {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Value::map(merged))
        }

        (BinaryOp::Mul, Value::String(s), Value::Number(_)) => {
            let times = right
                .as_integer()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    Signal::error(ErrorKind::ValueError, "文字列の繰り返し回数は 0 以上の整数です")
                })?;
            Ok(Value::from(s.repeat(times)))
        }

        _ => Err(mismatch(op, left, right)),
    }
}

fn integer_operand(op: BinaryOp, v: &Value) -> Result<i64, Signal> {
    v.as_integer().ok_or_else(|| {
        Signal::type_error(format!(
            "整数モードの {} には整数が必要です ({})",
            op.symbol(),
            v
        ))
    })
}

fn integer_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Signal> {
    let (a, b) = (integer_operand(op, left)?, integer_operand(op, right)?);
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(Signal::error(
                    ErrorKind::DivisionError,
                    "整数除算でゼロ除算が発生しました",
                ));
            }
            a.checked_div(b)
        }
        _ => return Err(mismatch(op, left, right)),
    };
    result
        .map(Value::from)
        .ok_or_else(|| Signal::value_error("整数演算がオーバーフローしました"))
}

/// `%` is defined on integers only; the result has the sign of the
/// dividend.
fn remainder(left: &Value, right: &Value) -> Result<Value, Signal> {
    let a = integer_operand(BinaryOp::Rem, left)?;
    let b = integer_operand(BinaryOp::Rem, right)?;
    if b == 0 {
        return Err(Signal::error(ErrorKind::DivisionError, "ゼロで割った余りは求められません"));
    }
    Ok(Value::from(a.wrapping_rem(b)))
}

// ═══════════════════════════════════════════════════════════════════════
// Comparison
// ═══════════════════════════════════════════════════════════════════════

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Signal> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        _ => return Err(mismatch(op, left, right)),
    };
    // NaN compares false with everything
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn kind(result: Result<Value, Signal>) -> Option<ErrorKind> {
        result.err().and_then(|s| s.as_error().map(|e| e.kind))
    }

    #[test]
    fn test_float_division_follows_ieee() {
        let v = apply(BinaryOp::Div, &num(1.0), &num(0.0), false).ok();
        assert_eq!(v.and_then(|v| v.as_number()), Some(f64::INFINITY));
    }

    #[test]
    fn test_integer_mode_division() {
        assert_eq!(apply(BinaryOp::Div, &num(7.0), &num(2.0), true).ok(), Some(num(3.0)));
        assert_eq!(
            kind(apply(BinaryOp::Div, &num(1.0), &num(0.0), true)),
            Some(ErrorKind::DivisionError)
        );
        assert_eq!(
            kind(apply(BinaryOp::Add, &num(1.5), &num(1.0), true)),
            Some(ErrorKind::TypeError)
        );
    }

    #[test]
    fn test_remainder_requires_integers() {
        assert_eq!(apply(BinaryOp::Rem, &num(-7.0), &num(3.0), false).ok(), Some(num(-1.0)));
        assert_eq!(
            kind(apply(BinaryOp::Rem, &num(1.5), &num(1.0), false)),
            Some(ErrorKind::TypeError)
        );
        assert_eq!(
            kind(apply(BinaryOp::Rem, &num(1.0), &num(0.0), false)),
            Some(ErrorKind::DivisionError)
        );
    }

    #[test]
    fn test_mixed_types_are_type_errors() {
        assert_eq!(
            kind(apply(BinaryOp::Add, &num(1.0), &Value::string("a"), false)),
            Some(ErrorKind::TypeError)
        );
        assert_eq!(
            kind(apply(BinaryOp::Lt, &num(1.0), &Value::Null, false)),
            Some(ErrorKind::TypeError)
        );
    }

    #[test]
    fn test_concatenation_makes_new_values() {
        let a = Value::array(vec![num(1.0)]);
        let b = Value::array(vec![num(2.0)]);
        let joined = apply(BinaryOp::Add, &a, &b, false).ok();
        assert_eq!(joined, Some(Value::array(vec![num(1.0), num(2.0)])));
        assert_eq!(a, Value::array(vec![num(1.0)]));
        assert_eq!(
            apply(BinaryOp::Add, &Value::string("あ"), &Value::string("い"), false).ok(),
            Some(Value::string("あい"))
        );
    }

    #[test]
    fn test_string_comparison_is_bytewise() {
        assert_eq!(
            apply(BinaryOp::Lt, &Value::string("a"), &Value::string("b"), false).ok(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            apply(BinaryOp::Ge, &num(f64::NAN), &num(1.0), false).ok(),
            Some(Value::Bool(false))
        );
    }
}
