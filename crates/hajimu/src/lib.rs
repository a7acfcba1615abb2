//! # Hajimu
//!
//! An interpreter for Hajimu, a programming language whose keywords are
//! Japanese.
//!
//! ```text
//! 関数 挨拶(名前)
//!     表示("こんにちは、#{名前}")
//! 終わり
//! 挨拶("世界")
//! ```
//!
//! ## Architecture
//!
//! - **Lexer** ([`lexer`]): UTF-8 source to tokens, with line/column positions
//! - **Parser** ([`parser`]): tokens to the [`ast`], one statement per line
//! - **Evaluator** ([`eval`]): tree-walking interpreter with signals for
//!   `返す`, `抜ける`, `次へ` and raised errors
//! - **Runtime** ([`runtime`]): worker pool, promises, channels and locks
//!   shared by every task of a program
//! - **Bytecode** ([`bytecode`]): the HJPB container for compiled programs
//!   and plugin manifests
//! - **Plugins** ([`plugin`]): native functions behind a C ABI
//!
//! ## Quick start
//!
//! ```no_run
//! use hajimu::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.run_source("<例>", "表示(1 + 2)").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod bytecode;
pub mod context;
pub mod diagnostic;
pub mod environment;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod plugin;
pub mod runtime;
pub mod span;
pub mod value;

// Re-export main types
pub use context::EvalContext;
pub use diagnostic::SourceMap;
pub use environment::{BindingMode, Environment};
pub use error::{ErrorKind, HajimuError, Result};
pub use eval::{Evaluate, Interpreter, OutputBuffer, Signal};
pub use span::{LineCol, Span};
pub use value::{BuiltinFn, ErrorValue, HashableValue, Value};

/// Hajimu version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
