//! HJPB reader

use std::sync::Arc;

use super::tags::*;
use super::{read_header, Manifest, ManifestEntry, FLAG_MANIFEST, HEADER_LEN};
use crate::ast::{
    BinaryOp, Block, CatchClause, ClassDef, Expr, ExprKind, FieldDef, FunctionDef, InterpPart,
    LogicalOp, Param, Program, Stmt, StmtKind, UnaryOp,
};
use crate::error::BytecodeError;
use crate::span::Span;

type Result<T> = std::result::Result<T, BytecodeError>;

/// Decode a program container.
pub fn decode_program(bytes: &[u8]) -> Result<Program> {
    let mut r = Reader::open(bytes)?;
    if r.flags & FLAG_MANIFEST != 0 {
        return Err(BytecodeError::WrongPayload {
            expected: "program",
        });
    }
    r.expect_node("program", PROGRAM)?;
    let body = r.list(Reader::stmt)?;
    r.finish()?;
    Ok(Program::new(body))
}

/// Decode a plugin manifest container.
pub fn decode_manifest(bytes: &[u8]) -> Result<Manifest> {
    let mut r = Reader::open(bytes)?;
    if r.flags & FLAG_MANIFEST == 0 {
        return Err(BytecodeError::WrongPayload {
            expected: "manifest",
        });
    }
    r.expect_node("manifest", MANIFEST)?;
    let manifest = Manifest {
        name: r.string()?,
        version: r.string()?,
        author: r.string()?,
        description: r.string()?,
        library: r.string()?,
        entries: r.list(|r| {
            let name = r.string()?;
            let min_args = r.u32()?;
            let max = r.i32()?;
            Ok(ManifestEntry {
                name,
                min_args,
                max_args: u32::try_from(max).ok(),
            })
        })?,
    };
    r.finish()?;
    Ok(manifest)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    flags: u32,
    pool: Vec<Option<String>>,
}

impl<'a> Reader<'a> {
    fn open(bytes: &'a [u8]) -> Result<Self> {
        let flags = read_header(bytes)?;
        let mut r = Reader {
            bytes,
            pos: HEADER_LEN,
            flags,
            pool: Vec::new(),
        };
        let count = r.u32()?;
        // Each entry needs at least its length prefix.
        if (count as usize).saturating_mul(4) > bytes.len() - r.pos {
            return Err(BytecodeError::Truncated(bytes.len()));
        }
        for _ in 0..count {
            let len = r.u32()? as usize;
            let raw = r.take(len)?;
            r.pool.push(std::str::from_utf8(raw).ok().map(str::to_string));
        }
        Ok(r)
    }

    fn finish(&self) -> Result<()> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            n => Err(BytecodeError::TrailingBytes(n)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Primitives
    // ═══════════════════════════════════════════════════════════════════

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(BytecodeError::Truncated(self.bytes.len()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32> {
        self.array().map(i32::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64> {
        self.array().map(|b| f64::from_bits(u64::from_le_bytes(b)))
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn string(&mut self) -> Result<String> {
        let index = self.u32()?;
        match self.pool.get(index as usize) {
            Some(Some(s)) => Ok(s.clone()),
            Some(None) => Err(BytecodeError::InvalidUtf8(index)),
            None => Err(BytecodeError::BadStringIndex(index)),
        }
    }

    fn list<T>(&mut self, mut each: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.u32()? as usize;
        // Every element takes at least one byte.
        if count > self.bytes.len() - self.pos {
            return Err(BytecodeError::Truncated(self.bytes.len()));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(each(self)?);
        }
        Ok(items)
    }

    fn option<T>(&mut self, each: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        match self.u8()? {
            0 => Ok(None),
            _ => each(self).map(Some),
        }
    }

    fn opt_string(&mut self) -> Result<Option<String>> {
        self.option(Self::string)
    }

    /// Read a node header, returning its tag, span and offset.
    fn node(&mut self) -> Result<(u8, Span, usize)> {
        let offset = self.pos;
        let tag = self.u8()?;
        let start = self.u32()?;
        let end = self.u32()?;
        Ok((tag, Span::new(start, end), offset))
    }

    fn expect_node(&mut self, context: &'static str, want: u8) -> Result<Span> {
        let (tag, span, offset) = self.node()?;
        if tag != want {
            return Err(BytecodeError::BadTag {
                context,
                tag,
                offset,
            });
        }
        Ok(span)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Nodes
    // ═══════════════════════════════════════════════════════════════════

    fn block(&mut self) -> Result<Block> {
        let span = self.expect_node("block", BLOCK)?;
        let stmts = self.list(Self::stmt)?;
        Ok(Block { stmts, span })
    }

    fn function(&mut self) -> Result<FunctionDef> {
        let span = self.expect_node("function", FUNCTION_DEF)?;
        let name = self.opt_string()?;
        let params = self.list(|r| {
            Ok(Param {
                name: r.string()?,
                variadic: r.bool()?,
                default: r.option(Self::expr)?,
            })
        })?;
        let body = self.block()?;
        Ok(FunctionDef {
            name,
            params,
            body,
            span,
        })
    }

    fn class(&mut self) -> Result<ClassDef> {
        let span = self.expect_node("class", CLASS_DEF)?;
        let name = self.string()?;
        let parent = self.opt_string()?;
        let fields = self.list(|r| {
            Ok(FieldDef {
                name: r.string()?,
                default: r.option(Self::expr)?,
            })
        })?;
        let methods = self.list(|r| r.function().map(Arc::new))?;
        Ok(ClassDef {
            name,
            parent,
            fields,
            methods,
            span,
        })
    }

    fn catch(&mut self) -> Result<CatchClause> {
        let span = self.expect_node("catch", CATCH)?;
        Ok(CatchClause {
            binding: self.opt_string()?,
            filter: self.opt_string()?,
            body: self.block()?,
            span,
        })
    }

    fn stmt(&mut self) -> Result<Stmt> {
        let (tag, span, offset) = self.node()?;
        let kind = match tag {
            STMT_EXPR => StmtKind::Expr(self.expr()?),
            STMT_VAR => StmtKind::VarDecl {
                name: self.string()?,
                mutable: self.bool()?,
                exported: self.bool()?,
                init: self.option(Self::expr)?,
            },
            STMT_FUNCTION => {
                let exported = self.bool()?;
                StmtKind::FunctionDecl {
                    def: Arc::new(self.function()?),
                    exported,
                }
            }
            STMT_CLASS => {
                let exported = self.bool()?;
                StmtKind::ClassDecl {
                    def: Arc::new(self.class()?),
                    exported,
                }
            }
            STMT_IF => StmtKind::If {
                branches: self.list(|r| Ok((r.expr()?, r.block()?)))?,
                else_block: self.option(Self::block)?,
            },
            STMT_WHILE => StmtKind::While {
                cond: self.expr()?,
                body: self.block()?,
            },
            STMT_FOR_EACH => StmtKind::ForEach {
                var: self.string()?,
                iterable: self.expr()?,
                body: self.block()?,
            },
            STMT_FOR_RANGE => StmtKind::ForRange {
                var: self.string()?,
                start: self.expr()?,
                end: self.expr()?,
                body: self.block()?,
            },
            STMT_RETURN => StmtKind::Return(self.option(Self::expr)?),
            STMT_BREAK => StmtKind::Break,
            STMT_CONTINUE => StmtKind::Continue,
            STMT_THROW => StmtKind::Throw(self.expr()?),
            STMT_TRY => StmtKind::Try {
                body: self.block()?,
                catches: self.list(Self::catch)?,
                finally: self.option(Self::block)?,
            },
            STMT_BLOCK => StmtKind::Block(self.block()?),
            STMT_IMPORT => StmtKind::Import {
                path: self.string()?,
                alias: self.opt_string()?,
            },
            STMT_WITH_LOCK => StmtKind::WithLock {
                lock: self.expr()?,
                body: self.block()?,
            },
            tag => {
                return Err(BytecodeError::BadTag {
                    context: "statement",
                    tag,
                    offset,
                })
            }
        };
        Ok(Stmt::new(kind, span))
    }

    fn boxed(&mut self) -> Result<Box<Expr>> {
        self.expr().map(Box::new)
    }

    fn op_code(&mut self, context: &'static str, max: u8) -> Result<u8> {
        let offset = self.pos;
        let code = self.u8()?;
        if code > max {
            return Err(BytecodeError::BadTag {
                context,
                tag: code,
                offset,
            });
        }
        Ok(code)
    }

    fn binary_op(&mut self) -> Result<BinaryOp> {
        Ok(match self.op_code("operator", 10)? {
            0 => BinaryOp::Add,
            1 => BinaryOp::Sub,
            2 => BinaryOp::Mul,
            3 => BinaryOp::Div,
            4 => BinaryOp::Rem,
            5 => BinaryOp::Eq,
            6 => BinaryOp::Ne,
            7 => BinaryOp::Lt,
            8 => BinaryOp::Le,
            9 => BinaryOp::Gt,
            _ => BinaryOp::Ge,
        })
    }

    fn expr(&mut self) -> Result<Expr> {
        let (tag, span, offset) = self.node()?;
        let kind = match tag {
            EXPR_NULL => ExprKind::Null,
            EXPR_BOOL => ExprKind::Bool(self.bool()?),
            EXPR_NUMBER => ExprKind::Number(self.f64()?),
            EXPR_STR => ExprKind::Str(self.string()?),
            EXPR_INTERPOLATED => ExprKind::Interpolated(self.list(|r| {
                let offset = r.pos;
                match r.u8()? {
                    PART_TEXT => Ok(InterpPart::Text(r.string()?)),
                    PART_EXPR => Ok(InterpPart::Expr(r.expr()?)),
                    tag => Err(BytecodeError::BadTag {
                        context: "interpolation",
                        tag,
                        offset,
                    }),
                }
            })?),
            EXPR_ARRAY => ExprKind::Array(self.list(Self::expr)?),
            EXPR_MAP => ExprKind::Map(self.list(|r| Ok((r.expr()?, r.expr()?)))?),
            EXPR_IDENT => ExprKind::Ident(self.string()?),
            EXPR_SELF => ExprKind::SelfRef,
            EXPR_BINARY => ExprKind::Binary {
                op: self.binary_op()?,
                lhs: self.boxed()?,
                rhs: self.boxed()?,
            },
            EXPR_LOGICAL => ExprKind::Logical {
                op: match self.op_code("logical operator", 1)? {
                    0 => LogicalOp::And,
                    _ => LogicalOp::Or,
                },
                lhs: self.boxed()?,
                rhs: self.boxed()?,
            },
            EXPR_UNARY => ExprKind::Unary {
                op: match self.op_code("unary operator", 1)? {
                    0 => UnaryOp::Neg,
                    _ => UnaryOp::Not,
                },
                operand: self.boxed()?,
            },
            EXPR_INDEX => ExprKind::Index {
                target: self.boxed()?,
                index: self.boxed()?,
            },
            EXPR_MEMBER => ExprKind::Member {
                target: self.boxed()?,
                name: self.string()?,
            },
            EXPR_CALL => ExprKind::Call {
                callee: self.boxed()?,
                args: self.list(Self::expr)?,
            },
            EXPR_PARTICLE => ExprKind::Particle {
                verb: self.string()?,
                args: self.list(Self::expr)?,
            },
            EXPR_FUNCTION => ExprKind::Function(Arc::new(self.function()?)),
            EXPR_ASSIGN => ExprKind::Assign {
                op: self.option(Self::binary_op)?,
                target: self.boxed()?,
                value: self.boxed()?,
            },
            EXPR_AWAIT => ExprKind::Await(self.boxed()?),
            EXPR_ASYNC => ExprKind::Async(Arc::new(self.block()?)),
            EXPR_AS_INTEGER => ExprKind::AsInteger(self.boxed()?),
            tag => {
                return Err(BytecodeError::BadTag {
                    context: "expression",
                    tag,
                    offset,
                })
            }
        };
        Ok(Expr::new(kind, span))
    }
}
