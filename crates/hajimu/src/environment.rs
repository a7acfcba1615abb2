//! Runtime environment managing variable and function bindings
//!
//! An [`Environment`] is a handle to one lexical scope. Scopes form a chain
//! through their parent pointers; lookup and assignment walk outward,
//! definition always writes the innermost scope. Handles are cheap to clone
//! and a closure keeps its defining scope (and every ancestor) alive for as
//! long as the closure itself is reachable.

mod prelude;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::EnvironmentError;
use crate::value::{BuiltinFn, Value};

/// A single variable or function binding.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The bound value
    pub value: Value,

    /// Whether assignment may replace the value
    pub mode: BindingMode,
}

/// Binding mode for declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// `定数 x = …`, parameters of builtins, hoisted declarations
    Immutable,

    /// `変数 x = …`, function parameters, loop variables
    Mutable,
}

struct Scope {
    vars: RwLock<IndexMap<String, Binding>>,
    parent: Option<Environment>,
}

/// Handle to a lexical scope.
#[derive(Clone)]
pub struct Environment {
    scope: Arc<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create a new empty root scope.
    pub fn new() -> Self {
        Self {
            scope: Arc::new(Scope {
                vars: RwLock::new(IndexMap::new()),
                parent: None,
            }),
        }
    }

    /// Create a scope nested inside this one.
    pub fn child(&self) -> Self {
        Self {
            scope: Arc::new(Scope {
                vars: RwLock::new(IndexMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// The enclosing scope.
    pub fn parent(&self) -> Option<&Environment> {
        self.scope.parent.as_ref()
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.scope, &other.scope)
    }

    /// Number of scopes from this one to the root, inclusive.
    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self), |env| env.parent()).count()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Binding Definition
    // ═══════════════════════════════════════════════════════════════════

    /// Define (or redefine) a mutable binding in this scope.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.define_with_mode(name, value, BindingMode::Mutable);
    }

    /// Define a binding with explicit mutability in this scope.
    pub fn define_with_mode(&self, name: impl Into<String>, value: Value, mode: BindingMode) {
        self.scope
            .vars
            .write()
            .insert(name.into(), Binding { value, mode });
    }

    /// Register a built-in function.
    pub fn define_builtin(&self, builtin: BuiltinFn) {
        let name = builtin.name.to_string();
        self.define_with_mode(name, Value::Builtin(builtin), BindingMode::Immutable);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Binding Lookup
    // ═══════════════════════════════════════════════════════════════════

    /// Look a name up, walking outward.
    pub fn get(&self, name: &str) -> Result<Value, EnvironmentError> {
        self.lookup(name)
            .ok_or_else(|| EnvironmentError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Look a name up, walking outward; `None` if unbound.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(binding) = env.scope.vars.read().get(name) {
                return Some(binding.value.clone());
            }
            env = env.parent()?;
        }
    }

    /// Check if a binding exists in any enclosing scope.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Check if a binding exists in this scope only.
    pub fn contains_local(&self, name: &str) -> bool {
        self.scope.vars.read().contains_key(name)
    }

    /// Read a binding of this scope only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.scope.vars.read().get(name).map(|b| b.value.clone())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Assignment (Mutation)
    // ═══════════════════════════════════════════════════════════════════

    /// Assign a new value to the nearest binding of `name`.
    ///
    /// # Errors
    ///
    /// - `UndefinedVariable` if no scope binds the name
    /// - `ImmutableBinding` if the nearest binding is immutable
    pub fn assign(&self, name: &str, value: Value) -> Result<(), EnvironmentError> {
        let mut env = self;
        loop {
            {
                let mut vars = env.scope.vars.write();
                if let Some(binding) = vars.get_mut(name) {
                    if binding.mode == BindingMode::Immutable {
                        return Err(EnvironmentError::ImmutableBinding {
                            name: name.to_string(),
                        });
                    }
                    binding.value = value;
                    return Ok(());
                }
            }
            env = env
                .parent()
                .ok_or_else(|| EnvironmentError::UndefinedVariable {
                    name: name.to_string(),
                })?;
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Iteration and Inspection
    // ═══════════════════════════════════════════════════════════════════

    /// Names bound in this scope, in definition order.
    pub fn local_names(&self) -> Vec<String> {
        self.scope.vars.read().keys().cloned().collect()
    }

    /// Names visible from this scope (for completion), innermost first.
    pub fn all_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut env = Some(self);
        while let Some(e) = env {
            for name in e.scope.vars.read().keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            env = e.parent();
        }
        names
    }

    /// Number of bindings in this scope.
    pub fn len(&self) -> usize {
        self.scope.vars.read().len()
    }

    /// Whether this scope has no bindings.
    pub fn is_empty(&self) -> bool {
        self.scope.vars.read().is_empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.local_names())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define("x", Value::Number(1.0));
        assert_eq!(env.get("x"), Ok(Value::Number(1.0)));
        assert!(matches!(
            env.get("y"),
            Err(EnvironmentError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_child_sees_parent_and_shadows() {
        let root = Environment::new();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        assert_eq!(child.lookup("x"), Some(Value::Number(1.0)));

        child.define("x", Value::Number(10.0));
        assert_eq!(child.lookup("x"), Some(Value::Number(10.0)));
        assert_eq!(root.lookup("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let root = Environment::new();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        child.assign("x", Value::Number(2.0)).expect("assign failed");
        assert_eq!(root.lookup("x"), Some(Value::Number(2.0)));
        assert!(!child.contains_local("x"));
    }

    #[test]
    fn test_assign_immutable_fails() {
        let env = Environment::new();
        env.define_with_mode("定数値", Value::Number(1.0), BindingMode::Immutable);
        assert_eq!(
            env.assign("定数値", Value::Number(2.0)),
            Err(EnvironmentError::ImmutableBinding {
                name: "定数値".to_string()
            })
        );
    }

    #[test]
    fn test_assign_undefined_fails() {
        let env = Environment::new().child();
        assert!(matches!(
            env.assign("x", Value::Null),
            Err(EnvironmentError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_captured_scope_outlives_creator() {
        let captured = {
            let scope = Environment::new().child();
            scope.define("n", Value::Number(5.0));
            scope.clone()
        };
        captured.assign("n", Value::Number(6.0)).expect("assign failed");
        assert_eq!(captured.lookup("n"), Some(Value::Number(6.0)));
    }
}
