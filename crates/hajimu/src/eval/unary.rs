//! Prefix operators

use crate::ast::{Expr, UnaryOp};
use crate::environment::Environment;
use crate::span::Span;
use crate::value::Value;

use super::{Evaluate, Interpreter, Signal};

pub(super) fn eval_unary(
    interp: &mut Interpreter,
    env: &Environment,
    op: UnaryOp,
    operand: &Expr,
    span: Span,
) -> Result<Value, Signal> {
    let value = operand.eval(interp, env)?;
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(interp.locate(
                Signal::type_error(format!("{} の符号は反転できません", other.type_name())),
                span,
            )),
        },
    }
}
