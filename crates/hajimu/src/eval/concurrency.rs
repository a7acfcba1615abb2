//! `待つ`, `非同期` and `排他`

use std::sync::Arc;
use std::time::Duration;

use crate::ast::{Block, Expr};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::runtime::Outcome;
use crate::span::Span;
use crate::value::Value;

use super::{settle, Evaluate, Interpreter, Signal};

/// `待つ p`: a promise yields its value or raises its error, a thread is
/// joined, anything else is already a value.
pub(super) fn eval_await(
    interp: &mut Interpreter,
    env: &Environment,
    operand: &Expr,
    span: Span,
) -> Result<Value, Signal> {
    let value = operand.eval(interp, env)?;
    await_value(interp, value, None, span)
}

/// Wait for `value`, giving up with `TimeoutError` after `timeout`. The
/// task keeps running after a timeout.
pub(crate) fn await_value(
    interp: &Interpreter,
    value: Value,
    timeout: Option<Duration>,
    span: Span,
) -> Result<Value, Signal> {
    let outcome: Outcome = match value {
        Value::Promise(promise) => match promise.wait(timeout) {
            Some(outcome) => outcome,
            None => {
                return Err(interp.raise(
                    ErrorKind::TimeoutError,
                    format!(
                        "{} ミリ秒以内に完了しませんでした",
                        timeout.map_or(0, |t| t.as_millis())
                    ),
                    span,
                ))
            }
        },
        Value::Thread(thread) => thread.join(),
        other => Ok(other),
    };
    outcome.map_err(Signal::Error)
}

/// `非同期 … 終わり`: run the block on the pool in a forked interpreter.
pub(super) fn eval_async(
    interp: &mut Interpreter,
    env: &Environment,
    body: &Arc<Block>,
) -> Result<Value, Signal> {
    let mut task = interp.fork();
    let scope = env.clone();
    let body = Arc::clone(body);
    tracing::trace!(span = %body.span, "spawning async block");
    let promise = interp
        .shared
        .scheduler
        .spawn(move || settle(body.eval(&mut task, &scope)));
    Ok(Value::Promise(promise))
}

/// `排他 lock … 終わり`: acquire, run the body, release on every exit.
/// A mutex or semaphore is acquired whole; a readers-writer lock is
/// write-locked.
pub(super) fn eval_with_lock(
    interp: &mut Interpreter,
    env: &Environment,
    lock: &Expr,
    body: &Block,
    span: Span,
) -> Result<Value, Signal> {
    let lock_span = lock.span;
    let lock = lock.eval(interp, env)?;
    let release: Box<dyn Fn() -> Result<(), Signal>> = match &lock {
        Value::Mutex(mutex) => {
            mutex.lock().map_err(|e| interp.locate(e.into(), span))?;
            let mutex = Arc::clone(mutex);
            Box::new(move || mutex.unlock().map_err(Signal::from))
        }
        Value::RwLock(rw) => {
            rw.write_lock();
            let rw = Arc::clone(rw);
            Box::new(move || rw.write_unlock().map_err(Signal::from))
        }
        Value::Semaphore(sem) => {
            sem.acquire();
            let sem = Arc::clone(sem);
            Box::new(move || {
                sem.release();
                Ok(())
            })
        }
        other => {
            return Err(interp.raise(
                ErrorKind::TypeError,
                format!("{} は 排他 に使えません", other.type_name()),
                lock_span,
            ))
        }
    };

    let result = body.eval(interp, env);
    let released = release().map_err(|e| interp.locate(e, span));
    match (result, released) {
        (Err(signal), _) => Err(signal),
        (Ok(_), Err(signal)) => Err(signal),
        (Ok(value), Ok(())) => Ok(value),
    }
}
