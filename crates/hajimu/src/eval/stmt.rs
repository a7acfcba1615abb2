//! Statement evaluation
//!
//! Statements evaluate to `無` except expression statements, whose value
//! becomes the value of the enclosing block. The REPL prints it.

use crate::ast::{Block, Program, Stmt, StmtKind};
use crate::environment::{BindingMode, Environment};
use crate::value::Value;

use super::{class, concurrency, import, loops, try_stmt, Evaluate, Interpreter, Signal};

impl Evaluate for Stmt {
    fn eval(&self, interp: &mut Interpreter, env: &Environment) -> Result<Value, Signal> {
        interp.check_interrupt(self.span)?;
        if interp.context().trace {
            tracing::trace!(span = %self.span, "statement");
        }

        match &self.kind {
            StmtKind::Expr(expr) => expr.eval(interp, env),

            StmtKind::VarDecl {
                name,
                mutable,
                init,
                ..
            } => {
                let value = match init {
                    Some(expr) => expr.eval(interp, env)?,
                    None => Value::Null,
                };
                let mode = if *mutable {
                    BindingMode::Mutable
                } else {
                    BindingMode::Immutable
                };
                env.define_with_mode(name.clone(), value, mode);
                Ok(Value::Null)
            }

            StmtKind::FunctionDecl { def, .. } => {
                if let Some(name) = &def.name {
                    env.define(name.clone(), interp.closure(def, env));
                }
                Ok(Value::Null)
            }

            StmtKind::ClassDecl { def, .. } => {
                let class = class::declare(interp, env, def, self.span)?;
                env.define(def.name.clone(), class);
                Ok(Value::Null)
            }

            StmtKind::If {
                branches,
                else_block,
            } => {
                for (cond, body) in branches {
                    if cond.eval(interp, env)?.is_truthy() {
                        return body.eval(interp, env);
                    }
                }
                match else_block {
                    Some(body) => body.eval(interp, env),
                    None => Ok(Value::Null),
                }
            }

            StmtKind::While { cond, body } => loops::eval_while(interp, env, cond, body),
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => loops::eval_for_each(interp, env, var, iterable, body),
            StmtKind::ForRange {
                var,
                start,
                end,
                body,
            } => loops::eval_for_range(interp, env, var, start, end, body),

            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => expr.eval(interp, env)?,
                    None => Value::Null,
                };
                Err(Signal::Return(value))
            }
            StmtKind::Break => Err(Signal::Break),
            StmtKind::Continue => Err(Signal::Continue),

            StmtKind::Throw(expr) => Err(try_stmt::eval_throw(interp, env, expr, self.span)),
            StmtKind::Try {
                body,
                catches,
                finally,
            } => try_stmt::eval_try(interp, env, body, catches, finally.as_ref()),

            StmtKind::Block(block) => block.eval(interp, env),

            StmtKind::Import { path, alias } => {
                import::eval_import(interp, env, path, alias.as_deref(), self.span)
            }

            StmtKind::WithLock { lock, body } => {
                concurrency::eval_with_lock(interp, env, lock, body, self.span)
            }
        }
    }
}

/// A block runs in its own child scope.
impl Evaluate for Block {
    fn eval(&self, interp: &mut Interpreter, env: &Environment) -> Result<Value, Signal> {
        exec_stmts(interp, &self.stmts, &env.child())
    }
}

/// Run statements in `env` itself; the value is the last statement's.
pub(crate) fn exec_stmts(
    interp: &mut Interpreter,
    stmts: &[Stmt],
    env: &Environment,
) -> Result<Value, Signal> {
    let mut last = Value::Null;
    for stmt in stmts {
        last = stmt.eval(interp, env)?;
    }
    Ok(last)
}

/// Run a whole program in `env`. Top-level functions are bound before
/// the first statement runs, and a top-level `返す` ends the program with
/// its value.
pub(crate) fn exec_program(
    interp: &mut Interpreter,
    program: &Program,
    env: &Environment,
) -> Result<Value, Signal> {
    hoist(interp, program, env);
    match exec_stmts(interp, &program.body, env) {
        Err(Signal::Return(value)) => Ok(value),
        other => other,
    }
}

fn hoist(interp: &Interpreter, program: &Program, env: &Environment) {
    for (name, symbol) in program.symbols.iter() {
        if let StmtKind::FunctionDecl { def, .. } = &program.body[symbol.index].kind {
            env.define(name.to_string(), interp.closure(def, env));
        }
    }
}

/// Names a module makes visible to importers, in declaration order.
pub(crate) fn exported_names(program: &Program) -> Vec<&str> {
    program
        .body
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StmtKind::VarDecl {
                name,
                exported: true,
                ..
            } => Some(name.as_str()),
            StmtKind::FunctionDecl {
                def,
                exported: true,
            } => def.name.as_deref(),
            StmtKind::ClassDecl {
                def,
                exported: true,
            } => Some(def.name.as_str()),
            _ => None,
        })
        .collect()
}
