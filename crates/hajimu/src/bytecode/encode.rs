//! HJPB writer

use indexmap::IndexSet;

use super::tags::*;
use super::{Manifest, FLAG_MANIFEST, MAGIC, VERSION_MAJOR, VERSION_MINOR};
use crate::ast::{
    BinaryOp, Block, CatchClause, ClassDef, Expr, ExprKind, FunctionDef, InterpPart, LogicalOp,
    Program, Stmt, StmtKind, UnaryOp,
};
use crate::span::Span;

/// Encode a program.
pub fn encode_program(program: &Program) -> Vec<u8> {
    let mut w = Writer::default();
    w.node(PROGRAM, Span::default());
    w.list(&program.body, Writer::stmt);
    w.finish(0)
}

/// Encode a plugin manifest.
pub fn encode_manifest(manifest: &Manifest) -> Vec<u8> {
    let mut w = Writer::default();
    w.node(MANIFEST, Span::default());
    for field in [
        &manifest.name,
        &manifest.version,
        &manifest.author,
        &manifest.description,
        &manifest.library,
    ] {
        w.string(field);
    }
    w.list(&manifest.entries, |w, entry| {
        w.string(&entry.name);
        w.u32(entry.min_args);
        w.i32(entry.max_args.map_or(-1, |max| max as i32));
    });
    w.finish(FLAG_MANIFEST)
}

#[derive(Default)]
struct Writer {
    pool: IndexSet<String>,
    body: Vec<u8>,
}

impl Writer {
    fn finish(self, flags: u32) -> Vec<u8> {
        let pool_len: usize = self.pool.iter().map(|s| 4 + s.len()).sum();
        let mut out = Vec::with_capacity(super::HEADER_LEN + 4 + pool_len + self.body.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
        out.extend_from_slice(&VERSION_MINOR.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&(self.pool.len() as u32).to_le_bytes());
        for s in &self.pool {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        out.extend_from_slice(&self.body);
        out
    }

    // ═══════════════════════════════════════════════════════════════════
    // Primitives
    // ═══════════════════════════════════════════════════════════════════

    fn u8(&mut self, v: u8) {
        self.body.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.body.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    fn bool(&mut self, v: bool) {
        self.u8(u8::from(v));
    }

    fn string(&mut self, s: &str) {
        let index = match self.pool.get_index_of(s) {
            Some(i) => i,
            None => self.pool.insert_full(s.to_string()).0,
        };
        self.u32(index as u32);
    }

    fn node(&mut self, tag: u8, span: Span) {
        self.u8(tag);
        self.u32(span.start);
        self.u32(span.end);
    }

    fn list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        self.u32(items.len() as u32);
        for item in items {
            each(self, item);
        }
    }

    fn option<T>(&mut self, item: Option<&T>, each: impl FnOnce(&mut Self, &T)) {
        match item {
            Some(item) => {
                self.u8(1);
                each(self, item);
            }
            None => self.u8(0),
        }
    }

    fn opt_string(&mut self, s: Option<&String>) {
        self.option(s, |w, s| w.string(s));
    }

    // ═══════════════════════════════════════════════════════════════════
    // Nodes
    // ═══════════════════════════════════════════════════════════════════

    fn block(&mut self, block: &Block) {
        self.node(BLOCK, block.span);
        self.list(&block.stmts, Self::stmt);
    }

    fn function(&mut self, def: &FunctionDef) {
        self.node(FUNCTION_DEF, def.span);
        self.opt_string(def.name.as_ref());
        self.list(&def.params, |w, p| {
            w.string(&p.name);
            w.bool(p.variadic);
            w.option(p.default.as_ref(), Self::expr);
        });
        self.block(&def.body);
    }

    fn class(&mut self, def: &ClassDef) {
        self.node(CLASS_DEF, def.span);
        self.string(&def.name);
        self.opt_string(def.parent.as_ref());
        self.list(&def.fields, |w, f| {
            w.string(&f.name);
            w.option(f.default.as_ref(), Self::expr);
        });
        self.list(&def.methods, |w, m| w.function(m));
    }

    fn catch(&mut self, clause: &CatchClause) {
        self.node(CATCH, clause.span);
        self.opt_string(clause.binding.as_ref());
        self.opt_string(clause.filter.as_ref());
        self.block(&clause.body);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.node(STMT_EXPR, span);
                self.expr(e);
            }
            StmtKind::VarDecl {
                name,
                mutable,
                exported,
                init,
            } => {
                self.node(STMT_VAR, span);
                self.string(name);
                self.bool(*mutable);
                self.bool(*exported);
                self.option(init.as_ref(), Self::expr);
            }
            StmtKind::FunctionDecl { def, exported } => {
                self.node(STMT_FUNCTION, span);
                self.bool(*exported);
                self.function(def);
            }
            StmtKind::ClassDecl { def, exported } => {
                self.node(STMT_CLASS, span);
                self.bool(*exported);
                self.class(def);
            }
            StmtKind::If {
                branches,
                else_block,
            } => {
                self.node(STMT_IF, span);
                self.list(branches, |w, (cond, body)| {
                    w.expr(cond);
                    w.block(body);
                });
                self.option(else_block.as_ref(), Self::block);
            }
            StmtKind::While { cond, body } => {
                self.node(STMT_WHILE, span);
                self.expr(cond);
                self.block(body);
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.node(STMT_FOR_EACH, span);
                self.string(var);
                self.expr(iterable);
                self.block(body);
            }
            StmtKind::ForRange {
                var,
                start,
                end,
                body,
            } => {
                self.node(STMT_FOR_RANGE, span);
                self.string(var);
                self.expr(start);
                self.expr(end);
                self.block(body);
            }
            StmtKind::Return(value) => {
                self.node(STMT_RETURN, span);
                self.option(value.as_ref(), Self::expr);
            }
            StmtKind::Break => self.node(STMT_BREAK, span),
            StmtKind::Continue => self.node(STMT_CONTINUE, span),
            StmtKind::Throw(e) => {
                self.node(STMT_THROW, span);
                self.expr(e);
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.node(STMT_TRY, span);
                self.block(body);
                self.list(catches, Self::catch);
                self.option(finally.as_ref(), Self::block);
            }
            StmtKind::Block(block) => {
                self.node(STMT_BLOCK, span);
                self.block(block);
            }
            StmtKind::Import { path, alias } => {
                self.node(STMT_IMPORT, span);
                self.string(path);
                self.opt_string(alias.as_ref());
            }
            StmtKind::WithLock { lock, body } => {
                self.node(STMT_WITH_LOCK, span);
                self.expr(lock);
                self.block(body);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Null => self.node(EXPR_NULL, span),
            ExprKind::Bool(b) => {
                self.node(EXPR_BOOL, span);
                self.bool(*b);
            }
            ExprKind::Number(n) => {
                self.node(EXPR_NUMBER, span);
                self.f64(*n);
            }
            ExprKind::Str(s) => {
                self.node(EXPR_STR, span);
                self.string(s);
            }
            ExprKind::Interpolated(parts) => {
                self.node(EXPR_INTERPOLATED, span);
                self.list(parts, |w, part| match part {
                    InterpPart::Text(text) => {
                        w.u8(PART_TEXT);
                        w.string(text);
                    }
                    InterpPart::Expr(e) => {
                        w.u8(PART_EXPR);
                        w.expr(e);
                    }
                });
            }
            ExprKind::Array(items) => {
                self.node(EXPR_ARRAY, span);
                self.list(items, Self::expr);
            }
            ExprKind::Map(entries) => {
                self.node(EXPR_MAP, span);
                self.list(entries, |w, (k, v)| {
                    w.expr(k);
                    w.expr(v);
                });
            }
            ExprKind::Ident(name) => {
                self.node(EXPR_IDENT, span);
                self.string(name);
            }
            ExprKind::SelfRef => self.node(EXPR_SELF, span),
            ExprKind::Binary { op, lhs, rhs } => {
                self.node(EXPR_BINARY, span);
                self.u8(binary_code(*op));
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Logical { op, lhs, rhs } => {
                self.node(EXPR_LOGICAL, span);
                self.u8(match op {
                    LogicalOp::And => 0,
                    LogicalOp::Or => 1,
                });
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Unary { op, operand } => {
                self.node(EXPR_UNARY, span);
                self.u8(match op {
                    UnaryOp::Neg => 0,
                    UnaryOp::Not => 1,
                });
                self.expr(operand);
            }
            ExprKind::Index { target, index } => {
                self.node(EXPR_INDEX, span);
                self.expr(target);
                self.expr(index);
            }
            ExprKind::Member { target, name } => {
                self.node(EXPR_MEMBER, span);
                self.expr(target);
                self.string(name);
            }
            ExprKind::Call { callee, args } => {
                self.node(EXPR_CALL, span);
                self.expr(callee);
                self.list(args, Self::expr);
            }
            ExprKind::Particle { verb, args } => {
                self.node(EXPR_PARTICLE, span);
                self.string(verb);
                self.list(args, Self::expr);
            }
            ExprKind::Function(def) => {
                self.node(EXPR_FUNCTION, span);
                self.function(def);
            }
            ExprKind::Assign { target, op, value } => {
                self.node(EXPR_ASSIGN, span);
                self.option(op.as_ref(), |w, op| w.u8(binary_code(*op)));
                self.expr(target);
                self.expr(value);
            }
            ExprKind::Await(e) => {
                self.node(EXPR_AWAIT, span);
                self.expr(e);
            }
            ExprKind::Async(body) => {
                self.node(EXPR_ASYNC, span);
                self.block(body);
            }
            ExprKind::AsInteger(e) => {
                self.node(EXPR_AS_INTEGER, span);
                self.expr(e);
            }
        }
    }
}

pub(super) fn binary_code(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => 0,
        BinaryOp::Sub => 1,
        BinaryOp::Mul => 2,
        BinaryOp::Div => 3,
        BinaryOp::Rem => 4,
        BinaryOp::Eq => 5,
        BinaryOp::Ne => 6,
        BinaryOp::Lt => 7,
        BinaryOp::Le => 8,
        BinaryOp::Gt => 9,
        BinaryOp::Ge => 10,
    }
}
