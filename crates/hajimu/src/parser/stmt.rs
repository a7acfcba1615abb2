//! Statement productions

use std::sync::Arc;

use super::Parser;
use crate::ast::{Block, CatchClause, ClassDef, Expr, ExprKind, FieldDef, Stmt, StmtKind};
use crate::error::ParseError;
use crate::lexer::{Keyword, Op, StrSegment, TokenKind};
use crate::span::Span;

/// Keywords that close an `if` branch.
const IF_TERMINATORS: &[Keyword] = &[Keyword::ElseIf, Keyword::Else, Keyword::End];

/// Keywords that close a `try` section.
const TRY_TERMINATORS: &[Keyword] = &[Keyword::Catch, Keyword::Finally, Keyword::End];

impl Parser {
    /// Parse one statement.
    pub fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek().span;

        let kind = match self.peek().kind {
            TokenKind::Keyword(Keyword::Export) => {
                self.advance();
                return self.parse_declaration(start, true);
            }
            TokenKind::Keyword(Keyword::Var | Keyword::Const | Keyword::Class) => {
                return self.parse_declaration(start, false);
            }
            TokenKind::Keyword(Keyword::Function)
                if matches!(self.peek_at(1).kind, TokenKind::Ident(_)) =>
            {
                return self.parse_declaration(start, false);
            }
            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                self.parse_if()?
            }
            TokenKind::Keyword(Keyword::Loop) => {
                self.advance();
                self.loop_depth += 1;
                let result = self.parse_loop();
                self.loop_depth -= 1;
                result?
            }
            TokenKind::Keyword(Keyword::Try) => {
                self.advance();
                self.parse_try()?
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr()?))
                }
            }
            TokenKind::Keyword(kw @ (Keyword::Break | Keyword::Continue)) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(self.invalid(
                        format!("`{}` outside of a loop", kw.as_str()),
                        start,
                    ));
                }
                if kw == Keyword::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance();
                StmtKind::Throw(self.parse_expr()?)
            }
            TokenKind::Keyword(Keyword::Import) => {
                self.advance();
                self.parse_import()?
            }
            TokenKind::Keyword(Keyword::WithLock) => {
                self.advance();
                let lock = self.parse_expr()?;
                let body = self.parse_closed_body()?;
                StmtKind::WithLock { lock, body }
            }
            TokenKind::Op(Op::LBrace) if !self.starts_map_literal() => {
                let (block, _) = self.parse_body(&[])?;
                StmtKind::Block(block)
            }
            _ => StmtKind::Expr(self.parse_expr()?),
        };

        self.end_statement()?;
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    /// Whether the `{` at the cursor opens a map literal rather than a
    /// block: `{` key `:` where the key is a name, string or number.
    fn starts_map_literal(&self) -> bool {
        matches!(
            self.peek_at(1).kind,
            TokenKind::Ident(_) | TokenKind::Str(_) | TokenKind::Number(_)
        ) && self.peek_at(2).kind == TokenKind::Op(Op::Colon)
    }

    /// `変数`, `定数`, `関数 name`, `型`, optionally after `公開`.
    fn parse_declaration(&mut self, start: Span, exported: bool) -> Result<Stmt, ParseError> {
        let kind = match self.peek().kind {
            TokenKind::Keyword(kw @ (Keyword::Var | Keyword::Const)) => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                let init = if self.eat_op(Op::Assign) {
                    self.skip_newlines();
                    Some(self.parse_expr()?)
                } else if kw == Keyword::Const {
                    return Err(self.expected("`=`"));
                } else {
                    None
                };
                StmtKind::VarDecl {
                    name,
                    mutable: kw == Keyword::Var,
                    exported,
                    init,
                }
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                let def = self.parse_function_rest(Some(name), start)?;
                StmtKind::FunctionDecl {
                    def: Arc::new(def),
                    exported,
                }
            }
            TokenKind::Keyword(Keyword::Class) => {
                self.advance();
                let def = self.parse_class(start)?;
                StmtKind::ClassDecl {
                    def: Arc::new(def),
                    exported,
                }
            }
            _ => return Err(self.expected("declaration after `公開`")),
        };

        self.end_statement()?;
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        let mut branches = Vec::new();
        let mut else_block = None;

        let cond = self.parse_condition()?;
        let (body, mut braced) = self.parse_body(IF_TERMINATORS)?;
        branches.push((cond, body));

        loop {
            self.skip_newlines_before(IF_TERMINATORS);
            let else_if = if self.eat_kw(Keyword::ElseIf) {
                true
            } else if self.check_kw(Keyword::Else) {
                self.advance();
                self.eat_kw(Keyword::If)
            } else {
                break;
            };

            if else_if {
                let cond = self.parse_condition()?;
                let (body, b) = self.parse_body(IF_TERMINATORS)?;
                braced = b;
                branches.push((cond, body));
            } else {
                let (body, b) = self.parse_body(&[Keyword::End])?;
                braced = b;
                else_block = Some(body);
                break;
            }
        }

        if !braced {
            self.expect_kw(Keyword::End)?;
        }
        Ok(StmtKind::If {
            branches,
            else_block,
        })
    }

    /// A condition followed by an optional `なら`.
    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_expr()?;
        self.eat_kw(Keyword::Then);
        Ok(cond)
    }

    fn parse_loop(&mut self) -> Result<StmtKind, ParseError> {
        // `繰り返す x を …` iterates; anything else is a condition
        if matches!(self.peek().kind, TokenKind::Ident(_))
            && self.peek_at(1).kind == TokenKind::Keyword(Keyword::Wo)
        {
            let (var, _) = self.expect_ident()?;
            self.advance();
            let first = self.parse_or()?;
            self.expect_kw(Keyword::From)?;

            if self.at_body_start() {
                let body = self.parse_closed_body()?;
                return Ok(StmtKind::ForEach {
                    var,
                    iterable: first,
                    body,
                });
            }

            let end = self.parse_or()?;
            self.expect_kw(Keyword::To)?;
            let body = self.parse_closed_body()?;
            return Ok(StmtKind::ForRange {
                var,
                start: first,
                end,
                body,
            });
        }

        if self.at_body_start() {
            let span = self.peek().span;
            let body = self.parse_closed_body()?;
            return Ok(StmtKind::While {
                cond: Expr::new(ExprKind::Bool(true), Span::point(span.start)),
                body,
            });
        }

        let cond = self.parse_expr()?;
        if !self.eat_kw(Keyword::While) {
            if self.check_kw(Keyword::No) && self.peek_at(1).kind == TokenKind::Keyword(Keyword::During)
            {
                self.advance();
                self.advance();
            } else {
                return Err(self.expected("`の間`"));
            }
        }
        let body = self.parse_closed_body()?;
        Ok(StmtKind::While { cond, body })
    }

    fn parse_try(&mut self) -> Result<StmtKind, ParseError> {
        let (body, mut braced) = self.parse_body(TRY_TERMINATORS)?;
        let mut catches = Vec::new();
        let mut finally = None;

        loop {
            self.skip_newlines_before(TRY_TERMINATORS);
            let start = self.peek().span;
            if !self.eat_kw(Keyword::Catch) {
                break;
            }

            let binding = match self.peek().kind {
                TokenKind::Ident(_) => Some(self.expect_ident()?.0),
                _ => None,
            };
            let filter = if self.eat_kw(Keyword::Ga) {
                Some(self.expect_ident()?.0)
            } else {
                None
            };
            let (body, b) = self.parse_body(TRY_TERMINATORS)?;
            braced = b;
            catches.push(CatchClause {
                binding,
                filter,
                body,
                span: self.span_from(start),
            });
        }

        self.skip_newlines_before(&[Keyword::Finally]);
        if self.eat_kw(Keyword::Finally) {
            let (block, b) = self.parse_body(&[Keyword::End])?;
            braced = b;
            finally = Some(block);
        }

        if catches.is_empty() && finally.is_none() {
            return Err(self.expected("`捕まえる` or `最後に`"));
        }
        if !braced {
            self.expect_kw(Keyword::End)?;
        }
        Ok(StmtKind::Try {
            body,
            catches,
            finally,
        })
    }

    fn parse_import(&mut self) -> Result<StmtKind, ParseError> {
        let path = match self.peek().kind.clone() {
            TokenKind::Str(segments) => {
                let span = self.advance().span;
                match segments.as_slice() {
                    [] => String::new(),
                    [StrSegment::Text(text)] => text.clone(),
                    _ => return Err(self.invalid("import path cannot be interpolated", span)),
                }
            }
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            _ => return Err(self.expected("module path")),
        };

        let alias = if self.eat_kw(Keyword::As) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        Ok(StmtKind::Import { path, alias })
    }

    /// `型 Name (継承 Parent)? … 終わり`
    fn parse_class(&mut self, start: Span) -> Result<ClassDef, ParseError> {
        let (name, _) = self.expect_ident()?;
        let parent = if self.eat_kw(Keyword::Extends) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };

        self.eat_op(Op::Colon);
        let braced = self.eat_brace_open();
        let close = |p: &Parser| {
            if braced {
                p.check_op(Op::RBrace)
            } else {
                p.check_kw(Keyword::End)
            }
        };

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            self.skip_separators();
            if close(self) {
                self.advance();
                break;
            }
            if self.at_eof() {
                return Err(self.expected(if braced { "`}`" } else { "`終わり`" }));
            }

            let member_start = self.peek().span;
            match self.peek().kind {
                TokenKind::Keyword(Keyword::Var | Keyword::Const) => {
                    self.advance();
                    let (field, _) = self.expect_ident()?;
                    let default = if self.eat_op(Op::Assign) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    fields.push(FieldDef {
                        name: field,
                        default,
                    });
                }
                TokenKind::Keyword(Keyword::Function) => {
                    self.advance();
                    let (method, _) = self.expect_ident()?;
                    let def = self.parse_function_rest(Some(method), member_start)?;
                    methods.push(Arc::new(def));
                }
                _ => return Err(self.expected("field or method")),
            }
            self.end_statement()?;
        }

        Ok(ClassDef {
            name,
            parent,
            fields,
            methods,
            span: self.span_from(start),
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Blocks
    // ═══════════════════════════════════════════════════════════════════

    /// Parse a block body. A braced body is consumed whole; a keyword body
    /// stops before one of `terminators`, which the caller consumes.
    /// Returns whether the body was braced.
    pub(super) fn parse_body(&mut self, terminators: &[Keyword]) -> Result<(Block, bool), ParseError> {
        self.eat_op(Op::Colon);
        let start = self.peek().span;

        if self.eat_brace_open() {
            let open = self.prev_span();
            let mut stmts = Vec::new();
            loop {
                self.skip_separators();
                if self.eat_op(Op::RBrace) {
                    break;
                }
                if self.at_eof() {
                    return Err(self.expected("`}`"));
                }
                stmts.push(self.parse_stmt()?);
            }
            let span = self.span_from(open);
            return Ok((Block { stmts, span }, true));
        }

        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if let TokenKind::Keyword(kw) = self.peek().kind {
                if terminators.contains(&kw) {
                    break;
                }
            }
            if self.at_eof() {
                let expected = if terminators.contains(&Keyword::End) || terminators.is_empty() {
                    Keyword::End
                } else {
                    terminators[0]
                };
                return Err(self.expected(&format!("`{}`", expected.as_str())));
            }
            stmts.push(self.parse_stmt()?);
        }
        let span = if stmts.is_empty() {
            Span::point(start.start)
        } else {
            self.span_from(start)
        };
        Ok((Block { stmts, span }, false))
    }

    /// A body closed by `終わり` unless braced.
    fn parse_closed_body(&mut self) -> Result<Block, ParseError> {
        let (block, braced) = self.parse_body(&[Keyword::End])?;
        if !braced {
            self.expect_kw(Keyword::End)?;
        }
        Ok(block)
    }

    /// Consume `{`, possibly on the next line.
    fn eat_brace_open(&mut self) -> bool {
        let mut n = 0;
        while self.peek_at(n).kind == TokenKind::Newline {
            n += 1;
        }
        if self.peek_at(n).kind == TokenKind::Op(Op::LBrace) {
            self.pos += n + 1;
            true
        } else {
            false
        }
    }

    /// Whether a loop header is complete and its body begins here.
    fn at_body_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Op(Op::LBrace | Op::Colon | Op::Semicolon)
        )
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Op(Op::Semicolon | Op::RBrace)
                | TokenKind::Keyword(
                    Keyword::End
                        | Keyword::Else
                        | Keyword::ElseIf
                        | Keyword::Catch
                        | Keyword::Finally
                )
        )
    }

    /// A statement must be followed by a separator, a closing brace or a
    /// block keyword.
    fn end_statement(&self) -> Result<(), ParseError> {
        if self.at_statement_end() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }
}
