//! Abstract syntax tree
//!
//! Nodes are plain data with byte [`Span`]s. Function and class definitions
//! sit behind `Arc` so closures and class values can share them with the tree
//! without copying, and so evaluator threads can read them concurrently.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::span::Span;

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements in source order
    pub body: Vec<Stmt>,
    /// Hoisted top-level function and class declarations
    pub symbols: SymbolTable,
}

impl Program {
    /// Build a program, computing its symbol table from `body`.
    pub fn new(body: Vec<Stmt>) -> Self {
        let symbols = SymbolTable::collect(&body);
        Self { body, symbols }
    }
}

/// What a hoisted symbol declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `関数 name(...)`
    Function,
    /// `型 Name`
    Class,
}

/// One hoisted top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Declaration kind
    pub kind: SymbolKind,
    /// Index of the declaring statement in `Program::body`
    pub index: usize,
    /// Span of the declaration
    pub span: Span,
}

/// Top-level declarations visible before their statement runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolTable {
    entries: IndexMap<String, Symbol>,
}

impl SymbolTable {
    /// Scan top-level statements for function and class declarations.
    pub fn collect(body: &[Stmt]) -> Self {
        let mut entries = IndexMap::new();
        for (index, stmt) in body.iter().enumerate() {
            let (name, kind) = match &stmt.kind {
                StmtKind::FunctionDecl { def, .. } => match &def.name {
                    Some(name) => (name.clone(), SymbolKind::Function),
                    None => continue,
                },
                StmtKind::ClassDecl { def, .. } => (def.name.clone(), SymbolKind::Class),
                _ => continue,
            };
            entries.insert(
                name,
                Symbol {
                    kind,
                    index,
                    span: stmt.span,
                },
            );
        }
        Self { entries }
    }

    /// Look up a hoisted name.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    /// Iterate declarations in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of hoisted declarations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was hoisted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A sequence of statements forming a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Statements in order
    pub stmts: Vec<Stmt>,
    /// Span of the whole block
    pub span: Span,
}

/// A statement with its span.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What the statement does
    pub kind: StmtKind,
    /// Source range
    pub span: Span,
}

impl Stmt {
    /// Create a statement.
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for effect
    Expr(Expr),
    /// `変数 x = …` / `定数 x = …`
    VarDecl {
        /// Bound name
        name: String,
        /// `変数` (true) or `定数` (false)
        mutable: bool,
        /// Marked `公開`
        exported: bool,
        /// Initialiser; `無` when absent
        init: Option<Expr>,
    },
    /// `関数 name(...) … 終わり`
    FunctionDecl {
        /// The function
        def: Arc<FunctionDef>,
        /// Marked `公開`
        exported: bool,
    },
    /// `型 Name … 終わり`
    ClassDecl {
        /// The class
        def: Arc<ClassDef>,
        /// Marked `公開`
        exported: bool,
    },
    /// `もし … それ以外もし … それ以外 … 終わり`
    If {
        /// Condition/body pairs tried in order
        branches: Vec<(Expr, Block)>,
        /// Body when no condition holds
        else_block: Option<Block>,
    },
    /// `繰り返す cond の間 … 終わり`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Block,
    },
    /// `繰り返す x を xs から … 終わり`
    ForEach {
        /// Loop variable
        var: String,
        /// Array, map (keys) or string (characters)
        iterable: Expr,
        /// Loop body
        body: Block,
    },
    /// `繰り返す i を a から b まで … 終わり` (inclusive)
    ForRange {
        /// Loop variable
        var: String,
        /// First value
        start: Expr,
        /// Last value
        end: Expr,
        /// Loop body
        body: Block,
    },
    /// `返す expr`
    Return(Option<Expr>),
    /// `抜ける`
    Break,
    /// `次へ`
    Continue,
    /// `投げる expr`
    Throw(Expr),
    /// `試す … 捕まえる … 最後に … 終わり`
    Try {
        /// Protected body
        body: Block,
        /// Handlers tried in order
        catches: Vec<CatchClause>,
        /// Runs on every exit path
        finally: Option<Block>,
    },
    /// `{ … }` nested scope
    Block(Block),
    /// `取り込む "path" として name`
    Import {
        /// Module or plugin name as written
        path: String,
        /// Namespace binding
        alias: Option<String>,
    },
    /// `排他 lock … 終わり`: acquire, run, release in a finally
    WithLock {
        /// Mutex, RwLock (write side) or Semaphore
        lock: Expr,
        /// Guarded body
        body: Block,
    },
}

/// One `捕まえる` handler.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Name bound to the caught error
    pub binding: Option<String>,
    /// Error kind or class name the handler accepts
    pub filter: Option<String>,
    /// Handler body
    pub body: Block,
    /// Span of the clause
    pub span: Span,
}

/// An expression with its span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What the expression computes
    pub kind: ExprKind,
    /// Source range
    pub span: Span,
}

impl Expr {
    /// Create an expression.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this expression can appear left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Member { .. }
        )
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `無`
    Null,
    /// `真` / `偽`
    Bool(bool),
    /// Numeric literal
    Number(f64),
    /// String literal without interpolation
    Str(String),
    /// String literal with `#{…}` parts
    Interpolated(Vec<InterpPart>),
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `{キー: 値, "k": v}`
    Map(Vec<(Expr, Expr)>),
    /// Variable reference
    Ident(String),
    /// `自分`
    SelfRef,
    /// Arithmetic or comparison
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Short-circuit `かつ` / `または`
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// `-x`, `!x`
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `xs[i]`
    Index {
        /// Indexed value
        target: Box<Expr>,
        /// Index or key
        index: Box<Expr>,
    },
    /// `x.name` / `x の name`
    Member {
        /// Receiver
        target: Box<Expr>,
        /// Member name
        name: String,
    },
    /// `f(a, b)`
    Call {
        /// Called value
        callee: Box<Expr>,
        /// Arguments, evaluated left to right
        args: Vec<Expr>,
    },
    /// `x に y を 動詞する` / `x を 動詞する`
    Particle {
        /// Verb as written
        verb: String,
        /// Target and object, in that order
        args: Vec<Expr>,
    },
    /// `関数(a, b) … 終わり`
    Function(Arc<FunctionDef>),
    /// `target = value`, `target += value`, …
    Assign {
        /// Identifier, index or member
        target: Box<Expr>,
        /// Operator of a compound assignment
        op: Option<BinaryOp>,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `待つ p`
    Await(Box<Expr>),
    /// `非同期 … 終わり`: runs the block on the pool, yields a promise
    Async(Arc<Block>),
    /// `expr を 整数で`: integer-mode evaluation
    AsInteger(Box<Expr>),
}

/// A piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    /// Literal text
    Text(String),
    /// Expression evaluated in the literal's scope
    Expr(Expr),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinaryOp {
    /// Operator spelling for messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// `かつ` / `&&`
    And,
    /// `または` / `||`
    Or,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x` / `否 x`
    Not,
}

/// A function literal or declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Declared name; `None` for literals
    pub name: Option<String>,
    /// Parameters in order
    pub params: Vec<Param>,
    /// Function body
    pub body: Block,
    /// Span of the whole definition
    pub span: Span,
}

impl FunctionDef {
    /// Name for stack traces.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<無名関数>")
    }

    /// Whether the last parameter collects surplus arguments.
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// Number of parameters without defaults (excluding a variadic one).
    pub fn required_params(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.variadic && p.default.is_none())
            .count()
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Default evaluated in the defining scope when the argument is absent
    pub default: Option<Expr>,
    /// `...rest`
    pub variadic: bool,
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Parent class name after `継承`
    pub parent: Option<String>,
    /// Field declarations with optional defaults
    pub fields: Vec<FieldDef>,
    /// Methods; `初期化` is the initialiser
    pub methods: Vec<Arc<FunctionDef>>,
    /// Span of the declaration
    pub span: Span,
}

/// A field declared in a class body.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Default value expression
    pub default: Option<Expr>,
}
