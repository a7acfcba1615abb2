//! Compound value types: classes, instances, errors

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{Closure, Value};
use crate::ast::FieldDef;
use crate::diagnostic::SourceMap;
use crate::environment::Environment;
use crate::error::ErrorKind;
use crate::span::{LineCol, Span};

/// Name of the method run when an instance is constructed.
pub const INITIALIZER: &str = "初期化";

/// A user-defined type.
pub struct Class {
    /// The class name
    pub name: String,

    /// Parent class after `継承`
    pub parent: Option<Arc<Class>>,

    /// Declared fields with their default expressions
    pub fields: Vec<FieldDef>,

    /// Methods declared directly on this class
    pub methods: IndexMap<String, Arc<Closure>>,

    /// Scope the class was declared in; field defaults evaluate here
    pub env: Environment,

    /// Source file of the declaration
    pub origin: Option<Arc<SourceMap>>,
}

impl Class {
    /// Find a method on this class or the nearest ancestor declaring it.
    pub fn find_method(&self, name: &str) -> Option<Arc<Closure>> {
        self.lineage()
            .find_map(|class| class.methods.get(name).cloned())
    }

    /// This class followed by its ancestors, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &Class> {
        std::iter::successors(Some(self), |class| class.parent.as_deref())
    }

    /// Whether this class is `name` or inherits from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage().any(|class| class.name == name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An object created from a [`Class`].
pub struct Instance {
    /// The instance's class
    pub class: Arc<Class>,

    /// Field storage, shared by every holder of the instance
    pub fields: RwLock<IndexMap<String, Value>>,
}

impl Instance {
    /// Create an instance with the given initial fields.
    pub fn new(class: Arc<Class>, fields: IndexMap<String, Value>) -> Self {
        Self {
            class,
            fields: RwLock::new(fields),
        }
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Write a field, creating it if needed.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.fields.write().insert(name.into(), value);
    }
}

/// One entry of an error's `.スタック`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    /// Function that was executing
    pub function: String,

    /// Location inside that function
    pub span: Option<Span>,

    /// Line and column of `span`, when the source is known
    pub at: Option<LineCol>,
}

/// The payload of [`Value::Error`].
#[derive(Clone)]
pub struct ErrorValue {
    /// Error kind
    pub kind: ErrorKind,

    /// Human-readable message
    pub message: String,

    /// Error that caused this one
    pub cause: Option<Value>,

    /// Where the error was raised
    pub span: Option<Span>,

    /// Source file containing `span`
    pub origin: Option<Arc<SourceMap>>,

    /// Call stack at the raise point, innermost first
    pub stack: Vec<StackFrame>,

    /// The thrown value when a non-error was thrown
    pub payload: Option<Value>,
}

impl ErrorValue {
    /// Create an unlocated error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            span: None,
            origin: None,
            stack: Vec::new(),
            payload: None,
        }
    }

    /// Attach a cause.
    pub fn with_cause(mut self, cause: Value) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Attach the thrown value.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether a source position has been recorded.
    pub fn is_located(&self) -> bool {
        self.span.is_some()
    }

    /// Whether a `捕まえる e が filter` clause accepts this error. `filter`
    /// names an error kind, a class in the payload's lineage, or `エラー`
    /// for any error.
    pub fn matches(&self, filter: &str) -> bool {
        if filter == "エラー" || filter == "Error" || filter == self.kind.name() {
            return true;
        }
        match &self.payload {
            Some(Value::Instance(instance)) => instance.class.is_a(filter),
            _ => false,
        }
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorValue")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("span", &self.span)
            .field("cause", &self.cause)
            .finish()
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
