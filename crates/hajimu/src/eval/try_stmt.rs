//! `投げる` and `試す … 捕まえる … 最後に`

use std::sync::Arc;

use crate::ast::{Block, CatchClause, Expr};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::{ErrorValue, Value};

use super::{stmt, Evaluate, Interpreter, Signal};

/// Raise `expr`. Errors keep the position they were first raised at;
/// any other value is wrapped in a `UserError` carrying it.
pub(super) fn eval_throw(
    interp: &mut Interpreter,
    env: &Environment,
    expr: &Expr,
    span: Span,
) -> Signal {
    let value = match expr.eval(interp, env) {
        Ok(value) => value,
        Err(signal) => return signal,
    };
    let error = match value {
        Value::Error(e) => e,
        other => Arc::new(ErrorValue::new(ErrorKind::UserError, other.to_string()).with_payload(other)),
    };
    interp.locate(Signal::Error(error), span)
}

/// Run `body`; hand an escaping error to the first matching handler; run
/// `finally` on every exit path. A signal from `finally` replaces the
/// outgoing one.
pub(super) fn eval_try(
    interp: &mut Interpreter,
    env: &Environment,
    body: &Block,
    catches: &[CatchClause],
    finally: Option<&Block>,
) -> Result<Value, Signal> {
    let outcome = match body.eval(interp, env) {
        Err(Signal::Error(error)) => handle(interp, env, error, catches),
        other => other,
    };
    match finally {
        Some(block) => block.eval(interp, env).and(outcome),
        None => outcome,
    }
}

fn handle(
    interp: &mut Interpreter,
    env: &Environment,
    error: Arc<ErrorValue>,
    catches: &[CatchClause],
) -> Result<Value, Signal> {
    let clause = catches.iter().find(|clause| {
        clause
            .filter
            .as_deref()
            .map_or(true, |filter| error.matches(filter))
    });
    let Some(clause) = clause else {
        return Err(Signal::Error(error));
    };

    let scope = env.child();
    if let Some(name) = &clause.binding {
        scope.define(name.clone(), Value::Error(Arc::clone(&error)));
    }
    match stmt::exec_stmts(interp, &clause.body.stmts, &scope) {
        Err(Signal::Error(raised)) if raised.cause.is_none() && !Arc::ptr_eq(&raised, &error) => {
            let chained = (*raised).clone().with_cause(Value::Error(error));
            Err(Signal::Error(Arc::new(chained)))
        }
        other => other,
    }
}
