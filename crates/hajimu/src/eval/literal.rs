//! Array, map and interpolated string literals

use indexmap::IndexMap;

use crate::ast::{Expr, InterpPart};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::value::{format_number, Value};

use super::{Evaluate, Interpreter, Signal};

pub(super) fn eval_array(
    interp: &mut Interpreter,
    env: &Environment,
    items: &[Expr],
) -> Result<Value, Signal> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        values.push(item.eval(interp, env)?);
    }
    Ok(Value::array(values))
}

/// Later duplicate keys overwrite earlier ones but keep the first position.
pub(super) fn eval_map(
    interp: &mut Interpreter,
    env: &Environment,
    entries: &[(Expr, Expr)],
) -> Result<Value, Signal> {
    let mut map = IndexMap::with_capacity(entries.len());
    for (key, value) in entries {
        let k = key.eval(interp, env)?;
        let k = map_key(&k).ok_or_else(|| {
            interp.raise(
                ErrorKind::TypeError,
                format!("辞書のキーには文字列か数値が必要です ({})", k.type_name()),
                key.span,
            )
        })?;
        let v = value.eval(interp, env)?;
        map.insert(k, v);
    }
    Ok(Value::map(map))
}

/// Key under which `key` is stored in a map.
pub(crate) fn map_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.to_string()),
        Value::Number(n) => Some(format_number(*n)),
        _ => None,
    }
}

/// `#{…}` parts are evaluated in the literal's own scope.
pub(super) fn eval_interpolated(
    interp: &mut Interpreter,
    env: &Environment,
    parts: &[InterpPart],
) -> Result<Value, Signal> {
    let mut out = String::new();
    for part in parts {
        match part {
            InterpPart::Text(text) => out.push_str(text),
            InterpPart::Expr(expr) => out.push_str(&expr.eval(interp, env)?.to_string()),
        }
    }
    Ok(Value::from(out))
}
