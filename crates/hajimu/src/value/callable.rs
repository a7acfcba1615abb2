//! Callable value types: closures, builtins, plugin functions, bound methods

use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::ast::FunctionDef;
use crate::diagnostic::SourceMap;
use crate::environment::Environment;
use crate::eval::{Interpreter, Signal};
use crate::plugin::abi::{EntryFn, FreeFn};

/// Type alias for builtin function pointers to reduce complexity
pub type BuiltinFnPtr =
    Arc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, Signal> + Send + Sync>;

/// A user-defined function together with the scope it was created in.
pub struct Closure {
    /// Parameters and body
    pub def: Arc<FunctionDef>,

    /// Captured defining environment
    pub env: Environment,

    /// Source file the body came from, for error positions
    pub origin: Option<Arc<SourceMap>>,
}

impl Closure {
    /// Create a closure over `env`.
    pub fn new(def: Arc<FunctionDef>, env: Environment, origin: Option<Arc<SourceMap>>) -> Self {
        Self { def, env, origin }
    }

    /// Name used in stack traces.
    pub fn name(&self) -> &str {
        self.def.display_name()
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.name())
    }
}

/// A built-in host function.
#[derive(Clone)]
pub struct BuiltinFn {
    /// Function name (for display and arity errors)
    pub name: Arc<str>,

    /// Fewest accepted arguments
    pub min_args: usize,

    /// Most accepted arguments; `None` for variadic
    pub max_args: Option<usize>,

    /// The actual function pointer
    pub func: BuiltinFnPtr,
}

impl BuiltinFn {
    /// Create a builtin accepting `min..=max` arguments.
    pub fn new<F>(name: &str, min_args: usize, max_args: Option<usize>, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> Result<Value, Signal> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            min_args,
            max_args,
            func: Arc::new(func),
        }
    }

    /// Create a builtin taking exactly `arity` arguments.
    pub fn fixed<F>(name: &str, arity: usize, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> Result<Value, Signal> + Send + Sync + 'static,
    {
        Self::new(name, arity, Some(arity), func)
    }

    /// Whether `n` arguments satisfy the arity bounds.
    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min_args && self.max_args.map_or(true, |max| n <= max)
    }
}

impl fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFn({})", self.name)
    }
}

/// A function exported by a native plugin.
pub struct NativeFn {
    /// Entry name
    pub name: String,

    /// Name of the plugin that provides it
    pub plugin: String,

    /// Fewest accepted arguments
    pub min_args: usize,

    /// Most accepted arguments; `None` for variadic
    pub max_args: Option<usize>,

    pub(crate) entry: EntryFn,

    /// Plugin hook freeing returned values
    pub(crate) release: Option<FreeFn>,

    /// Keeps the shared object mapped while the function is reachable
    pub(crate) _library: Option<Arc<libloading::Library>>,
}

impl NativeFn {
    /// Whether `n` arguments satisfy the arity bounds.
    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min_args && self.max_args.map_or(true, |max| n <= max)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({}::{})", self.plugin, self.name)
    }
}

/// A method or builtin method paired with the value it was looked up on.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    /// `自分` for user methods, first argument for builtin methods
    pub receiver: Value,

    /// The function to call
    pub method: Value,
}
