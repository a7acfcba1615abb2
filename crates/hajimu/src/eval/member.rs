//! Member access: `x の name` / `x.name`
//!
//! Instances expose their fields, then their class's methods. Maps expose
//! their keys, then the map methods; a missing key reads as `無`. Errors
//! expose their kind, message, stack, cause and thrown value. Every other
//! value exposes its builtin properties and methods.

use std::sync::Arc;

use crate::ast::Expr;
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::{BoundMethod, ErrorValue, StackFrame, Value};

use super::{methods, Evaluate, Interpreter, Signal};

pub(super) fn eval_member(
    interp: &mut Interpreter,
    env: &Environment,
    target: &Expr,
    name: &str,
    span: Span,
) -> Result<Value, Signal> {
    let receiver = target.eval(interp, env)?;
    get_member(interp, &receiver, name, span)
}

/// Read `name` from `receiver`, failing with `AttributeError`.
pub(crate) fn get_member(
    interp: &Interpreter,
    receiver: &Value,
    name: &str,
    span: Span,
) -> Result<Value, Signal> {
    if let Some(value) = find_member(receiver, name) {
        return Ok(value);
    }
    if let Value::Map(_) = receiver {
        return Ok(Value::Null);
    }
    Err(interp.raise(
        ErrorKind::AttributeError,
        format!("{} にメンバー {} はありません", describe(receiver), name),
        span,
    ))
}

/// Look `name` up on `receiver` without raising.
pub(crate) fn find_member(receiver: &Value, name: &str) -> Option<Value> {
    match receiver {
        Value::Instance(instance) => instance.get(name).or_else(|| {
            instance.class.find_method(name).map(|method| {
                Value::BoundMethod(Arc::new(BoundMethod {
                    receiver: receiver.clone(),
                    method: Value::Function(method),
                }))
            })
        }),
        Value::Map(entries) => {
            let found = entries.read().get(name).cloned();
            found.or_else(|| builtin_member(receiver, name))
        }
        Value::Error(error) => error_property(error, name),
        Value::Class(class) => match name {
            "名前" | "name" => Some(Value::string(&class.name)),
            "親" | "parent" => Some(class.parent.clone().map_or(Value::Null, Value::Class)),
            _ => None,
        },
        _ => builtin_member(receiver, name),
    }
}

fn builtin_member(receiver: &Value, name: &str) -> Option<Value> {
    methods::property(receiver, name)
        .or_else(|| methods::method(receiver, name).map(Value::Builtin))
}

fn describe(receiver: &Value) -> String {
    match receiver {
        Value::Instance(instance) => format!("{} のインスタンス", instance.class.name),
        Value::Class(class) => format!("型 {}", class.name),
        other => other.type_name().to_string(),
    }
}

fn error_property(error: &ErrorValue, name: &str) -> Option<Value> {
    match name {
        "種類" | "kind" => Some(Value::string(error.kind.name())),
        "メッセージ" | "message" => Some(Value::string(&error.message)),
        "スタック" | "stack" => Some(Value::array(
            error.stack.iter().map(frame_value).collect(),
        )),
        "原因" | "cause" => Some(error.cause.clone().unwrap_or(Value::Null)),
        "値" | "value" => Some(error.payload.clone().unwrap_or(Value::Null)),
        _ => None,
    }
}

fn frame_value(frame: &StackFrame) -> Value {
    let (line, column) = match frame.at {
        Some(at) => (Value::Number(at.line.into()), Value::Number(at.col.into())),
        None => (Value::Null, Value::Null),
    };
    Value::map_from([
        ("関数", Value::string(&frame.function)),
        ("行", line),
        ("列", column),
    ])
}

/// Write `name` on `receiver`: an instance field or a map entry.
pub(crate) fn set_member(
    interp: &Interpreter,
    receiver: &Value,
    name: &str,
    value: Value,
    span: Span,
) -> Result<(), Signal> {
    match receiver {
        Value::Instance(instance) => {
            instance.set(name, value);
            Ok(())
        }
        Value::Map(entries) => {
            entries.write().insert(name.to_string(), value);
            Ok(())
        }
        other => Err(interp.raise(
            ErrorKind::AttributeError,
            format!("{} のメンバー {} には代入できません", describe(other), name),
            span,
        )),
    }
}
