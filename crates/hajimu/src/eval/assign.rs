//! Assignment to names, elements and members
//!
//! The target's container and key are evaluated before the right-hand
//! side. A compound assignment reads the current value once.

use crate::ast::{BinaryOp, Expr, ExprKind};
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::Value;

use super::{binary, index, member, Evaluate, Interpreter, Signal};

pub(super) fn eval_assign(
    interp: &mut Interpreter,
    env: &Environment,
    target: &Expr,
    op: Option<BinaryOp>,
    value: &Expr,
    span: Span,
) -> Result<Value, Signal> {
    match &target.kind {
        ExprKind::Ident(name) => {
            let current = match op {
                Some(_) => Some(env.get(name).map_err(|e| interp.locate(e.into(), span))?),
                None => None,
            };
            let new = combine(interp, env, op, current, value, span)?;
            env.assign(name, new.clone())
                .map_err(|e| interp.locate(e.into(), span))?;
            Ok(new)
        }

        ExprKind::Index {
            target: container,
            index: key,
        } => {
            let container = container.eval(interp, env)?;
            let key = key.eval(interp, env)?;
            let current = match op {
                Some(_) => Some(index::get_index(interp, &container, &key, span)?),
                None => None,
            };
            let new = combine(interp, env, op, current, value, span)?;
            index::set_index(interp, &container, &key, new.clone(), span)?;
            Ok(new)
        }

        ExprKind::Member {
            target: receiver,
            name,
        } => {
            let receiver = receiver.eval(interp, env)?;
            let current = match op {
                Some(_) => Some(member::get_member(interp, &receiver, name, span)?),
                None => None,
            };
            let new = combine(interp, env, op, current, value, span)?;
            member::set_member(interp, &receiver, name, new.clone(), span)?;
            Ok(new)
        }

        _ => Err(interp.raise(ErrorKind::TypeError, "この式には代入できません", target.span)),
    }
}

fn combine(
    interp: &mut Interpreter,
    env: &Environment,
    op: Option<BinaryOp>,
    current: Option<Value>,
    value: &Expr,
    span: Span,
) -> Result<Value, Signal> {
    let rhs = value.eval(interp, env)?;
    match (op, current) {
        (Some(op), Some(current)) => binary::apply(op, &current, &rhs, interp.integer_mode)
            .map_err(|e| interp.locate(e, span)),
        _ => Ok(rhs),
    }
}
