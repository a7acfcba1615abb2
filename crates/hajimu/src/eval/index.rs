//! Indexing: `xs[i]`, `m["key"]`, `s[i]`

use crate::ast::Expr;
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::Value;

use super::args::resolve_index;
use super::literal::map_key;
use super::{Evaluate, Interpreter, Signal};

pub(super) fn eval_index(
    interp: &mut Interpreter,
    env: &Environment,
    target: &Expr,
    index: &Expr,
    span: Span,
) -> Result<Value, Signal> {
    let container = target.eval(interp, env)?;
    let key = index.eval(interp, env)?;
    get_index(interp, &container, &key, span)
}

/// Read `container[key]`.
pub(crate) fn get_index(
    interp: &Interpreter,
    container: &Value,
    key: &Value,
    span: Span,
) -> Result<Value, Signal> {
    match container {
        Value::Array(items) => {
            let items = items.read();
            let i = position(interp, key, items.len(), span)?;
            Ok(items[i].clone())
        }
        Value::Map(entries) => {
            let key = key_of(interp, key, span)?;
            Ok(entries.read().get(&key).cloned().unwrap_or(Value::Null))
        }
        Value::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let i = position(interp, key, chars.len(), span)?;
            Ok(Value::string(chars[i].to_string()))
        }
        Value::Instance(instance) => {
            let name = key_of(interp, key, span)?;
            instance.get(&name).ok_or_else(|| {
                interp.raise(
                    ErrorKind::AttributeError,
                    format!("{} にフィールド {} はありません", instance.class.name, name),
                    span,
                )
            })
        }
        other => Err(interp.raise(
            ErrorKind::TypeError,
            format!("{} は添字で参照できません", other.type_name()),
            span,
        )),
    }
}

/// Write `container[key] = value`. Arrays only accept existing positions.
pub(crate) fn set_index(
    interp: &Interpreter,
    container: &Value,
    key: &Value,
    value: Value,
    span: Span,
) -> Result<(), Signal> {
    match container {
        Value::Array(items) => {
            let mut items = items.write();
            let i = position(interp, key, items.len(), span)?;
            items[i] = value;
            Ok(())
        }
        Value::Map(entries) => {
            let key = key_of(interp, key, span)?;
            entries.write().insert(key, value);
            Ok(())
        }
        Value::Instance(instance) => {
            let name = key_of(interp, key, span)?;
            instance.set(name, value);
            Ok(())
        }
        other => Err(interp.raise(
            ErrorKind::TypeError,
            format!("{} の要素には代入できません", other.type_name()),
            span,
        )),
    }
}

fn position(interp: &Interpreter, key: &Value, len: usize, span: Span) -> Result<usize, Signal> {
    let Some(i) = key.as_integer() else {
        return Err(interp.raise(
            ErrorKind::TypeError,
            format!("添字には整数が必要です ({})", key.type_name()),
            span,
        ));
    };
    resolve_index(i, len).ok_or_else(|| {
        interp.raise(
            ErrorKind::IndexError,
            format!("添字 {} は範囲外です (長さ {})", i, len),
            span,
        )
    })
}

fn key_of(interp: &Interpreter, key: &Value, span: Span) -> Result<String, Signal> {
    map_key(key).ok_or_else(|| {
        interp.raise(
            ErrorKind::TypeError,
            format!("辞書のキーには文字列か数値が必要です ({})", key.type_name()),
            span,
        )
    })
}
