//! Runtime values
//!
//! Scalars are stored inline. Every composite sits behind an `Arc`, so
//! cloning a [`Value`] aliases rather than copies: a mutation through one
//! binding is observed by every holder, on every thread. Arrays, maps and
//! instance fields guard their storage with a `parking_lot` lock for memory
//! safety only; programs that share them across tasks synchronise through
//! the language's own mutexes and channels.
//!
//! Reference cycles (an instance storing itself in a field, an array that
//! contains itself) are never collected.

mod callable;
mod compound;
mod display;
mod hashable;
mod impls;

pub use callable::{BoundMethod, BuiltinFn, BuiltinFnPtr, Closure, NativeFn};
pub use compound::{Class, ErrorValue, Instance, StackFrame, INITIALIZER};
pub use display::format_number;
pub use hashable::HashableValue;

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::runtime;

/// Shared, mutable array storage.
pub type ArrayRef = Arc<RwLock<Vec<Value>>>;

/// Shared, mutable, insertion-ordered map storage.
pub type MapRef = Arc<RwLock<IndexMap<String, Value>>>;

/// A Hajimu runtime value.
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Scalars
    // ═══════════════════════════════════════════════════════════════════
    /// `無`
    Null,

    /// `真` / `偽`
    Bool(bool),

    /// IEEE-754 double; integers are numbers with no fractional part
    Number(f64),

    /// Immutable UTF-8 text
    String(Arc<str>),

    // ═══════════════════════════════════════════════════════════════════
    // Shared Composites
    // ═══════════════════════════════════════════════════════════════════
    /// Ordered sequence
    Array(ArrayRef),

    /// String-keyed map, iterated in insertion order
    Map(MapRef),

    // ═══════════════════════════════════════════════════════════════════
    // Callables and Types
    // ═══════════════════════════════════════════════════════════════════
    /// User function with its captured environment
    Function(Arc<Closure>),

    /// Host function
    Builtin(BuiltinFn),

    /// Function exported by a native plugin
    Native(Arc<NativeFn>),

    /// User-defined type
    Class(Arc<Class>),

    /// Object created from a class
    Instance(Arc<Instance>),

    /// Method already bound to its receiver
    BoundMethod(Arc<BoundMethod>),

    // ═══════════════════════════════════════════════════════════════════
    // Concurrency
    // ═══════════════════════════════════════════════════════════════════
    /// Result of an asynchronous task
    Promise(Arc<runtime::Promise>),

    /// MPMC FIFO queue
    Channel(Arc<runtime::Channel>),

    /// Non-reentrant mutual exclusion lock
    Mutex(Arc<runtime::Mutex>),

    /// Readers-writer lock with FIFO hand-off
    RwLock(Arc<runtime::RwLock>),

    /// Counting semaphore
    Semaphore(Arc<runtime::Semaphore>),

    /// Shared integer counter
    Atomic(Arc<runtime::AtomicCounter>),

    /// OS thread running a function
    Thread(Arc<runtime::ThreadHandle>),

    /// Counter that can be waited on until it reaches zero
    WaitGroup(Arc<runtime::WaitGroup>),

    // ═══════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════
    /// A raised or constructed error
    Error(Arc<ErrorValue>),
}
