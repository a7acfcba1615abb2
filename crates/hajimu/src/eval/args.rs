//! Argument checking shared by builtins and methods

use crate::error::ErrorKind;
use crate::value::{ArrayRef, Value};

use super::Signal;

/// Argument `i`, or `無` when absent.
pub(crate) fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&Value::Null)
}

fn wrong_type(func: &str, want: &str, got: &Value) -> Signal {
    Signal::type_error(format!(
        "{} には{}が必要です ({} が渡されました)",
        func,
        want,
        got.type_name()
    ))
}

/// A number argument.
pub(crate) fn number(func: &str, v: &Value) -> Result<f64, Signal> {
    v.as_number().ok_or_else(|| wrong_type(func, "数値", v))
}

/// An integral number argument.
pub(crate) fn integer(func: &str, v: &Value) -> Result<i64, Signal> {
    match v {
        Value::Number(_) => v
            .as_integer()
            .ok_or_else(|| wrong_type(func, "整数", v)),
        _ => Err(wrong_type(func, "整数", v)),
    }
}

/// A non-negative integer argument (a count or a position).
pub(crate) fn count(func: &str, v: &Value) -> Result<usize, Signal> {
    let n = integer(func, v)?;
    usize::try_from(n).map_err(|_| {
        Signal::error(
            ErrorKind::ValueError,
            format!("{} には 0 以上の整数が必要です ({})", func, n),
        )
    })
}

/// A string argument.
pub(crate) fn string<'a>(func: &str, v: &'a Value) -> Result<&'a str, Signal> {
    v.as_str().ok_or_else(|| wrong_type(func, "文字列", v))
}

/// An array argument.
pub(crate) fn array<'a>(func: &str, v: &'a Value) -> Result<&'a ArrayRef, Signal> {
    match v {
        Value::Array(items) => Ok(items),
        _ => Err(wrong_type(func, "配列", v)),
    }
}

/// A callable argument.
pub(crate) fn callable<'a>(func: &str, v: &'a Value) -> Result<&'a Value, Signal> {
    if v.is_callable() {
        Ok(v)
    } else {
        Err(wrong_type(func, "関数", v))
    }
}

/// Resolve a possibly negative index against `len`.
pub(crate) fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let i = if i < 0 { len as i64 + i } else { i };
    usize::try_from(i).ok().filter(|&i| i < len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }

    #[test]
    fn test_integer_rejects_fraction() {
        assert!(integer("f", &Value::Number(1.5)).is_err());
        assert_eq!(integer("f", &Value::Number(-2.0)).ok(), Some(-2));
        assert!(count("f", &Value::Number(-2.0)).is_err());
    }
}
