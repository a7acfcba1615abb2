//! Loops
//!
//! Every iteration runs its body in a fresh child scope holding the loop
//! variable, so closures created in different iterations see different
//! bindings. Loops evaluate to `無`.

use crate::ast::{Block, Expr};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::value::Value;

use super::{stmt, Evaluate, Interpreter, Signal};

/// What the loop should do after one pass of its body.
enum Flow {
    Next,
    Stop,
}

fn run_body(
    interp: &mut Interpreter,
    scope: &Environment,
    body: &Block,
) -> Result<Flow, Signal> {
    match stmt::exec_stmts(interp, &body.stmts, scope) {
        Ok(_) | Err(Signal::Continue) => Ok(Flow::Next),
        Err(Signal::Break) => Ok(Flow::Stop),
        Err(other) => Err(other),
    }
}

/// `繰り返す cond の間`. A bare `繰り返す` parses with a `真` condition.
pub(super) fn eval_while(
    interp: &mut Interpreter,
    env: &Environment,
    cond: &Expr,
    body: &Block,
) -> Result<Value, Signal> {
    loop {
        interp.check_interrupt(body.span)?;
        if !cond.eval(interp, env)?.is_truthy() {
            break;
        }
        if let Flow::Stop = run_body(interp, &env.child(), body)? {
            break;
        }
    }
    Ok(Value::Null)
}

/// `繰り返す x を xs から`: array elements (a snapshot taken at loop
/// start), map keys, or string characters.
pub(super) fn eval_for_each(
    interp: &mut Interpreter,
    env: &Environment,
    var: &str,
    iterable: &Expr,
    body: &Block,
) -> Result<Value, Signal> {
    let items: Vec<Value> = match iterable.eval(interp, env)? {
        Value::Array(items) => items.read().clone(),
        Value::Map(entries) => entries.read().keys().map(Value::string).collect(),
        Value::String(text) => text.chars().map(|c| Value::string(c.to_string())).collect(),
        other => {
            return Err(interp.raise(
                ErrorKind::TypeError,
                format!("{} は繰り返しに使えません", other.type_name()),
                iterable.span,
            ))
        }
    };

    for item in items {
        interp.check_interrupt(body.span)?;
        let scope = env.child();
        scope.define(var, item);
        if let Flow::Stop = run_body(interp, &scope, body)? {
            break;
        }
    }
    Ok(Value::Null)
}

/// `繰り返す i を a から b まで`, inclusive of both ends.
pub(super) fn eval_for_range(
    interp: &mut Interpreter,
    env: &Environment,
    var: &str,
    start: &Expr,
    end: &Expr,
    body: &Block,
) -> Result<Value, Signal> {
    let from = bound(interp, env, start)?;
    let to = bound(interp, env, end)?;

    let mut i = from;
    while i <= to {
        interp.check_interrupt(body.span)?;
        let scope = env.child();
        scope.define(var, Value::Number(i));
        if let Flow::Stop = run_body(interp, &scope, body)? {
            break;
        }
        i += 1.0;
    }
    Ok(Value::Null)
}

fn bound(interp: &mut Interpreter, env: &Environment, expr: &Expr) -> Result<f64, Signal> {
    match expr.eval(interp, env)? {
        Value::Number(n) if n.is_finite() => Ok(n),
        other => Err(interp.raise(
            ErrorKind::TypeError,
            format!("範囲の端には有限の数値が必要です ({})", other),
            expr.span,
        )),
    }
}
