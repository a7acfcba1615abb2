//! Function calls
//!
//! Arguments are evaluated left to right before the callee runs. A user
//! function gets a fresh scope whose parent is the scope it was created
//! in, never the caller's.

use std::mem;
use std::sync::Arc;

use crate::ast::Expr;
use crate::environment::{BindingMode, Environment};
use crate::error::ErrorKind;
use crate::span::Span;
use crate::value::{Closure, Value};

use super::{class, member, stmt, CallFrame, Evaluate, Interpreter, Signal};

pub(super) fn eval_call(
    interp: &mut Interpreter,
    env: &Environment,
    callee: &Expr,
    args: &[Expr],
    span: Span,
) -> Result<Value, Signal> {
    let func = callee.eval(interp, env)?;
    let args = eval_args(interp, env, args)?;
    interp.call_at(&func, args, span)
}

fn eval_args(
    interp: &mut Interpreter,
    env: &Environment,
    args: &[Expr],
) -> Result<Vec<Value>, Signal> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(arg.eval(interp, env)?);
    }
    Ok(values)
}

/// `x に y を 動詞する`: the verb names a function, optionally with a
/// trailing `する`; failing that, a method of the first argument.
pub(super) fn eval_particle(
    interp: &mut Interpreter,
    env: &Environment,
    verb: &str,
    args: &[Expr],
    span: Span,
) -> Result<Value, Signal> {
    let values = eval_args(interp, env, args)?;
    let stem = verb.strip_suffix("する").filter(|s| !s.is_empty());

    let function = env
        .lookup(verb)
        .filter(Value::is_callable)
        .or_else(|| stem.and_then(|s| env.lookup(s)).filter(Value::is_callable));
    if let Some(function) = function {
        return interp.call_at(&function, values, span);
    }

    let Some((receiver, rest)) = values.split_first() else {
        return Err(interp.raise(
            ErrorKind::NameError,
            format!("未定義の動詞です: {}", verb),
            span,
        ));
    };
    for name in [Some(verb), stem].into_iter().flatten() {
        if let Some(method) = member::find_member(receiver, name) {
            return interp.call_at(&method, rest.to_vec(), span);
        }
    }
    Err(interp.raise(
        ErrorKind::NameError,
        format!("未定義の動詞です: {} ({} に対して)", verb, receiver.type_name()),
        span,
    ))
}

impl Interpreter {
    /// Call `callee` with `args`; errors without a position get `span`.
    pub(crate) fn call_at(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, Signal> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, None, args, span),

            Value::Builtin(builtin) => {
                if !builtin.accepts(args.len()) {
                    return Err(self.arity_error(
                        &builtin.name,
                        builtin.min_args,
                        builtin.max_args,
                        args.len(),
                        span,
                    ));
                }
                (builtin.func)(self, &args).map_err(|e| self.locate(e, span))
            }

            Value::Native(native) => {
                if !native.accepts(args.len()) {
                    return Err(self.arity_error(
                        &native.name,
                        native.min_args,
                        native.max_args,
                        args.len(),
                        span,
                    ));
                }
                crate::plugin::call_native(self, native, &args).map_err(|e| self.locate(e, span))
            }

            Value::Class(class) => class::instantiate(self, class, args, span),

            Value::BoundMethod(bound) => match &bound.method {
                Value::Function(closure) => {
                    self.call_closure(closure, Some(bound.receiver.clone()), args, span)
                }
                method => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(bound.receiver.clone());
                    full.extend(args);
                    self.call_at(method, full, span)
                }
            },

            other => Err(self.raise(
                ErrorKind::TypeError,
                format!("{} は呼び出せません", other.type_name()),
                span,
            )),
        }
    }

    fn arity_error(
        &self,
        name: &str,
        min: usize,
        max: Option<usize>,
        got: usize,
        span: Span,
    ) -> Signal {
        let expected = match max {
            Some(max) if max == min => format!("{}", min),
            Some(max) => format!("{}〜{}", min, max),
            None => format!("{} 以上", min),
        };
        self.raise(
            ErrorKind::ArityError,
            format!("{} の引数は {} 個です ({} 個渡されました)", name, expected, got),
            span,
        )
    }

    /// Run a user function. `this` is bound as `自分` for methods.
    pub(crate) fn call_closure(
        &mut self,
        closure: &Arc<Closure>,
        this: Option<Value>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, Signal> {
        let def = &closure.def;
        let variadic = def.is_variadic();
        let positional = def.params.len() - usize::from(variadic);
        if args.len() < def.required_params() || (!variadic && args.len() > positional) {
            let max = (!variadic).then_some(positional);
            return Err(self.arity_error(
                closure.name(),
                def.required_params(),
                max,
                args.len(),
                span,
            ));
        }
        if self.depth >= self.shared.ctx.max_call_depth {
            return Err(self.raise(
                ErrorKind::StackOverflow,
                format!("呼び出しの深さが上限 {} を超えました", self.shared.ctx.max_call_depth),
                span,
            ));
        }

        self.frames.push(CallFrame {
            function: closure.name().to_string(),
            call_site: span,
            caller_source: self.source.clone(),
        });
        self.depth += 1;
        let caller_source = mem::replace(&mut self.source, closure.origin.clone());
        let caller_mode = mem::replace(&mut self.integer_mode, false);

        let env = closure.env.child();
        if let Some(this) = this {
            env.define_with_mode(class::SELF, this, BindingMode::Immutable);
        }
        let result = bind_params(self, closure, &env, args)
            .and_then(|()| stmt::exec_stmts(self, &def.body.stmts, &env));

        self.integer_mode = caller_mode;
        self.source = caller_source;
        self.depth -= 1;
        self.frames.pop();

        match result {
            Ok(_) => Ok(Value::Null),
            Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Break | Signal::Continue) => Ok(Value::Null),
            Err(error) => Err(error),
        }
    }
}

/// Bind arguments to parameters. Missing arguments take their default,
/// evaluated in the new scope so earlier parameters are visible.
fn bind_params(
    interp: &mut Interpreter,
    closure: &Closure,
    env: &Environment,
    args: Vec<Value>,
) -> Result<(), Signal> {
    let mut args = args.into_iter();
    for param in &closure.def.params {
        let value = if param.variadic {
            Value::array(args.by_ref().collect())
        } else if let Some(arg) = args.next() {
            arg
        } else if let Some(default) = &param.default {
            default.eval(interp, env)?
        } else {
            Value::Null
        };
        env.define(param.name.clone(), value);
    }
    Ok(())
}
