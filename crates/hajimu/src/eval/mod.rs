//! Tree-walking evaluation
//!
//! Every AST node implements [`Evaluate`]. Evaluation threads an
//! [`Interpreter`] (per-thread call state) and an [`Environment`] (the
//! lexical scope) through the tree; non-local exits travel as
//! `Err(Signal)`.
//!
//! Interpreters spawned for tasks share one [`Shared`] block: the
//! configuration, the prelude, the scheduler, the module cache and the
//! output sink.

pub mod control;

pub(crate) mod args;
mod assign;
mod binary;
mod call;
mod class;
mod concurrency;
mod import;
mod index;
mod literal;
mod loops;
mod member;
mod methods;
mod stmt;
mod try_stmt;
mod unary;

use std::io::Write;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ast::{Expr, ExprKind, Program};
use crate::context::EvalContext;
use crate::diagnostic::SourceMap;
use crate::environment::Environment;
use crate::error::{ErrorKind, HajimuError, LexError, ParseError, UncaughtError};
use crate::runtime::{with_large_stack, Scheduler};
use crate::span::Span;
use crate::value::{Closure, StackFrame, Value};

pub use control::{settle, Signal};
pub(crate) use concurrency::await_value;
pub(crate) use methods::{method as builtin_method, sort_values};

/// Trait for evaluating AST nodes to values.
///
/// This is the core abstraction for the tree-walking interpreter.
pub trait Evaluate {
    /// Evaluate this node in `env`.
    fn eval(&self, interp: &mut Interpreter, env: &Environment) -> Result<Value, Signal>;
}

/// Frames kept in an error's stack trace, innermost first.
const MAX_TRACE_FRAMES: usize = 64;

// ═══════════════════════════════════════════════════════════════════════
// Shared State
// ═══════════════════════════════════════════════════════════════════════

/// State shared by every interpreter of one program.
pub struct Shared {
    ctx: EvalContext,
    prelude: Environment,
    scheduler: Scheduler,
    modules: import::ModuleCache,
    output: Mutex<Box<dyn Write + Send>>,
}

impl Shared {
    /// Evaluation settings.
    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Task scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Write one line to the output sink.
    pub fn print_line(&self, text: &str) {
        let mut out = self.output.lock();
        if let Err(e) = writeln!(out, "{}", text).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "could not write program output");
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("ctx", &self.ctx)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// An output sink that collects what a program prints.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Interpreter
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct CallFrame {
    function: String,
    call_site: Span,
    caller_source: Option<Arc<SourceMap>>,
}

/// Per-thread evaluation state.
pub struct Interpreter {
    shared: Arc<Shared>,
    globals: Environment,
    depth: usize,
    frames: Vec<CallFrame>,
    source: Option<Arc<SourceMap>>,
    integer_mode: bool,
    root: &'static str,
    /// Modules this thread is in the middle of loading
    loading: Vec<PathBuf>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter with default settings printing to stdout.
    pub fn new() -> Self {
        Self::with_context(EvalContext::default())
    }

    /// An interpreter with `ctx`, printing to stdout.
    pub fn with_context(ctx: EvalContext) -> Self {
        Self::with_output(ctx, std::io::stdout())
    }

    /// An interpreter with `ctx`, printing to `output`.
    pub fn with_output(ctx: EvalContext, output: impl Write + Send + 'static) -> Self {
        let prelude = Environment::with_prelude();
        let globals = prelude.child();
        let shared = Arc::new(Shared {
            scheduler: Scheduler::new(ctx.worker_threads),
            ctx,
            prelude,
            modules: import::ModuleCache::default(),
            output: Mutex::new(Box::new(output)),
        });
        Self {
            shared,
            globals,
            depth: 0,
            frames: Vec::new(),
            source: None,
            integer_mode: false,
            root: "<メイン>",
            loading: Vec::new(),
        }
    }

    /// A fresh interpreter for a task, sharing this one's program state.
    pub fn fork(&self) -> Interpreter {
        Self {
            shared: Arc::clone(&self.shared),
            globals: self.globals.clone(),
            depth: 0,
            frames: Vec::new(),
            source: self.source.clone(),
            integer_mode: false,
            root: "<タスク>",
            loading: Vec::new(),
        }
    }

    /// Evaluation settings.
    pub fn context(&self) -> &EvalContext {
        &self.shared.ctx
    }

    /// State shared with forked interpreters.
    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// The program's global scope.
    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Source file currently executing.
    pub fn source(&self) -> Option<&Arc<SourceMap>> {
        self.source.as_ref()
    }

    /// Current call depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Write one line to the program's output.
    pub fn print_line(&self, text: &str) {
        self.shared.print_line(text);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Entry Points
    // ═══════════════════════════════════════════════════════════════════

    /// Parse and run `src` in the global scope, reported as `name`.
    pub fn run_source(&mut self, name: &str, src: &str) -> Result<Value, HajimuError> {
        let program = crate::parser::parse(src).map_err(parse_failure)?;
        let map = Arc::new(SourceMap::new(name, src));
        self.run_program(&program, Some(map))
    }

    /// Run a parsed program in the global scope. Runs on a runtime thread
    /// when called from a host thread, so recursion hits the call depth
    /// limit before the native stack.
    pub fn run_program(
        &mut self,
        program: &Program,
        source: Option<Arc<SourceMap>>,
    ) -> Result<Value, HajimuError> {
        with_large_stack(|| {
            let previous = mem::replace(&mut self.source, source);
            let globals = self.globals.clone();
            let result = stmt::exec_program(self, program, &globals);
            self.source = previous;
            result.map_err(uncaught)
        })?
    }

    /// Run a source file or HJPB program.
    pub fn run_file(&mut self, path: &Path) -> Result<Value, HajimuError> {
        let bytes = std::fs::read(path)?;
        let name = path.display().to_string();
        if crate::bytecode::is_container(&bytes) {
            let program = crate::bytecode::decode_program(&bytes)?;
            return self.run_program(&program, Some(Arc::new(SourceMap::new(name, ""))));
        }
        let src = decode_source(bytes)?;
        self.run_source(&name, &src)
    }

    /// Parse and evaluate a single expression in the global scope.
    pub fn eval_expression(&mut self, src: &str) -> Result<Value, HajimuError> {
        let expr = crate::parser::parse_expression(src).map_err(parse_failure)?;
        let map = Arc::new(SourceMap::new("<式>", src));
        with_large_stack(|| {
            let previous = mem::replace(&mut self.source, Some(map));
            let globals = self.globals.clone();
            let result = expr.eval(self, &globals);
            self.source = previous;
            result.or_else(|signal| {
                signal
                    .into_outcome()
                    .map_err(|e| HajimuError::from(UncaughtError(e)))
            })
        })?
    }

    /// Call a callable value with `args`.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Signal> {
        self.call_at(callee, args, Span::default())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Record `span`, the current file and the stack on an error that has
    /// no position yet. Other signals pass through.
    pub fn locate(&self, signal: Signal, span: Span) -> Signal {
        match signal {
            Signal::Error(e) if !e.is_located() => {
                let mut e = (*e).clone();
                e.span = Some(span);
                e.origin = self.source.clone();
                e.stack = self.stack_trace(span);
                Signal::Error(Arc::new(e))
            }
            other => other,
        }
    }

    /// Raise a located error.
    pub fn raise(&self, kind: ErrorKind, message: impl Into<String>, span: Span) -> Signal {
        self.locate(Signal::error(kind, message), span)
    }

    fn stack_trace(&self, span: Span) -> Vec<StackFrame> {
        let mut trace = Vec::new();
        let mut at = span;
        let mut source = self.source.clone();
        for frame in self.frames.iter().rev().take(MAX_TRACE_FRAMES) {
            trace.push(stack_frame(&frame.function, at, source.as_deref()));
            at = frame.call_site;
            source = frame.caller_source.clone();
        }
        if trace.len() < MAX_TRACE_FRAMES {
            trace.push(stack_frame(self.root, at, source.as_deref()));
        }
        trace
    }

    /// Fail with `CancelledError` once the host asked evaluation to stop.
    pub(crate) fn check_interrupt(&self, span: Span) -> Result<(), Signal> {
        if self.shared.ctx.is_interrupted() {
            return Err(self.raise(ErrorKind::CancelledError, "実行が中断されました", span));
        }
        Ok(())
    }

    /// Make a closure over `env` from a function definition.
    pub(crate) fn closure(&self, def: &Arc<crate::ast::FunctionDef>, env: &Environment) -> Value {
        Value::Function(Arc::new(Closure::new(
            Arc::clone(def),
            env.clone(),
            self.source.clone(),
        )))
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("depth", &self.depth)
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

fn stack_frame(function: &str, span: Span, source: Option<&SourceMap>) -> StackFrame {
    StackFrame {
        function: function.to_string(),
        span: Some(span),
        // Compiled programs carry spans but no text
        at: source
            .filter(|s| !s.source().is_empty())
            .map(|s| s.line_col(span.start)),
    }
}

fn parse_failure(e: ParseError) -> HajimuError {
    match e {
        ParseError::Lex(e) => HajimuError::Lex(e),
        e => HajimuError::Parse(e),
    }
}

fn uncaught(signal: Signal) -> HajimuError {
    let error = match signal {
        Signal::Error(e) => e,
        _ => Arc::new(crate::value::ErrorValue::new(
            ErrorKind::ValueError,
            "ループの外で 抜ける / 次へ が実行されました",
        )),
    };
    UncaughtError(error).into()
}

/// Decode source bytes, reporting the first invalid byte.
pub fn decode_source(bytes: Vec<u8>) -> Result<String, HajimuError> {
    String::from_utf8(bytes).map_err(|e| {
        HajimuError::Lex(LexError::InvalidUtf8 {
            offset: e.utf8_error().valid_up_to(),
        })
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Main Expression Dispatcher
// ═══════════════════════════════════════════════════════════════════════

impl Evaluate for Expr {
    fn eval(&self, interp: &mut Interpreter, env: &Environment) -> Result<Value, Signal> {
        let span = self.span;
        match &self.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::string(s)),
            ExprKind::Interpolated(parts) => literal::eval_interpolated(interp, env, parts),
            ExprKind::Array(items) => literal::eval_array(interp, env, items),
            ExprKind::Map(entries) => literal::eval_map(interp, env, entries),

            ExprKind::Ident(name) => env
                .get(name)
                .map_err(|e| interp.locate(e.into(), span)),
            ExprKind::SelfRef => env.lookup(class::SELF).ok_or_else(|| {
                interp.raise(ErrorKind::NameError, "自分 はメソッドの外では使えません", span)
            }),

            ExprKind::Binary { op, lhs, rhs } => binary::eval_binary(interp, env, *op, lhs, rhs, span),
            ExprKind::Logical { op, lhs, rhs } => binary::eval_logical(interp, env, *op, lhs, rhs),
            ExprKind::Unary { op, operand } => unary::eval_unary(interp, env, *op, operand, span),

            ExprKind::Index { target, index } => index::eval_index(interp, env, target, index, span),
            ExprKind::Member { target, name } => member::eval_member(interp, env, target, name, span),

            ExprKind::Call { callee, args } => call::eval_call(interp, env, callee, args, span),
            ExprKind::Particle { verb, args } => call::eval_particle(interp, env, verb, args, span),
            ExprKind::Function(def) => Ok(interp.closure(def, env)),

            ExprKind::Assign { target, op, value } => {
                assign::eval_assign(interp, env, target, *op, value, span)
            }

            ExprKind::Await(operand) => concurrency::eval_await(interp, env, operand, span),
            ExprKind::Async(body) => concurrency::eval_async(interp, env, body),

            ExprKind::AsInteger(inner) => {
                let previous = mem::replace(&mut interp.integer_mode, true);
                let result = inner.eval(interp, env);
                interp.integer_mode = previous;
                result
            }
        }
    }
}

#[cfg(test)]
mod tests;
