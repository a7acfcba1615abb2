//! Expression productions

use std::sync::Arc;

use super::Parser;
use crate::ast::{BinaryOp, Expr, ExprKind, FunctionDef, InterpPart, LogicalOp, Param, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{Keyword, Op, StrSegment, TokenKind};
use crate::span::Span;

impl Parser {
    /// Parse an expression at the lowest precedence.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_particle()?;

        let op = match self.peek().kind {
            TokenKind::Op(Op::Assign) => None,
            TokenKind::Op(Op::PlusAssign) => Some(BinaryOp::Add),
            TokenKind::Op(Op::MinusAssign) => Some(BinaryOp::Sub),
            TokenKind::Op(Op::StarAssign) => Some(BinaryOp::Mul),
            TokenKind::Op(Op::SlashAssign) => Some(BinaryOp::Div),
            TokenKind::Op(Op::PercentAssign) => Some(BinaryOp::Rem),
            _ => return Ok(target),
        };

        if !target.is_assignable() {
            return Err(self.invalid("invalid assignment target", target.span));
        }
        self.advance();
        self.skip_newlines();
        let value = self.parse_assignment()?;
        let span = target.span.to(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    /// `A に B を 動詞`, `A を 動詞`, `A を 整数で`, `A を 待つ`.
    fn parse_particle(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_or()?;

        loop {
            if self.eat_kw(Keyword::Ni) {
                let object = self.parse_or()?;
                self.expect_kw(Keyword::Wo)?;
                let (verb, verb_span) = self.expect_ident()?;
                let span = expr.span.to(verb_span);
                expr = Expr::new(
                    ExprKind::Particle {
                        verb,
                        args: vec![expr, object],
                    },
                    span,
                );
                continue;
            }

            if self.check_kw(Keyword::Wo) {
                let next = self.peek_at(1).kind.clone();
                match next {
                    TokenKind::Keyword(Keyword::AsInteger) => {
                        self.advance();
                        let end = self.advance().span;
                        let span = expr.span.to(end);
                        expr = Expr::new(ExprKind::AsInteger(Box::new(expr)), span);
                    }
                    TokenKind::Keyword(Keyword::Await) => {
                        self.advance();
                        let end = self.advance().span;
                        let span = expr.span.to(end);
                        expr = Expr::new(ExprKind::Await(Box::new(expr)), span);
                    }
                    TokenKind::Ident(verb) => {
                        self.advance();
                        let end = self.advance().span;
                        let span = expr.span.to(end);
                        expr = Expr::new(
                            ExprKind::Particle {
                                verb,
                                args: vec![expr],
                            },
                            span,
                        );
                    }
                    _ => return Ok(expr),
                }
                continue;
            }

            return Ok(expr);
        }
    }

    pub(super) fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.check_kw(Keyword::Or) || self.check_op(Op::OrOr) {
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_and()?;
            lhs = logical(LogicalOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.check_kw(Keyword::And) || self.check_op(Op::AndAnd) {
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_equality()?;
            lhs = logical(LogicalOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::EqEq) => BinaryOp::Eq,
                TokenKind::Op(Op::NotEq) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::Lt) => BinaryOp::Lt,
                TokenKind::Op(Op::Le) => BinaryOp::Le,
                TokenKind::Op(Op::Gt) => BinaryOp::Gt,
                TokenKind::Op(Op::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::Plus) => BinaryOp::Add,
                TokenKind::Op(Op::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::Star) => BinaryOp::Mul,
                TokenKind::Op(Op::Slash) => BinaryOp::Div,
                TokenKind::Op(Op::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek().span;
        let op = match self.peek().kind {
            TokenKind::Op(Op::Minus) => Some(UnaryOp::Neg),
            TokenKind::Op(Op::Bang) | TokenKind::Keyword(Keyword::Not) => Some(UnaryOp::Not),
            TokenKind::Keyword(Keyword::Await) => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.to(operand.span);
                return Ok(Expr::new(ExprKind::Await(Box::new(operand)), span));
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.to(operand.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek().kind {
                TokenKind::Op(Op::LParen) => {
                    self.advance();
                    let args = self.parse_list(Op::RParen, Self::parse_expr)?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::Op(Op::LBracket) => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect_op(Op::RBracket)?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Op(Op::Dot) => {
                    self.advance();
                    let (name, name_span) = self.expect_member_name()?;
                    let span = expr.span.to(name_span);
                    expr = member(expr, name, span);
                }
                TokenKind::Keyword(Keyword::No) => {
                    // `x の 間` belongs to a while header, not a member access
                    if self.peek_at(1).kind == TokenKind::Keyword(Keyword::During) {
                        return Ok(expr);
                    }
                    self.advance();
                    let (name, name_span) = self.expect_member_name()?;
                    let span = expr.span.to(name_span);
                    expr = member(expr, name, span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        let span = tok.span;

        let kind = match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            TokenKind::Str(segments) => {
                self.advance();
                self.string_literal(segments)?
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Ident(name)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::Keyword(Keyword::SelfValue) => {
                self.advance();
                ExprKind::SelfRef
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                let def = self.parse_function_rest(None, span)?;
                return Ok(Expr::new(ExprKind::Function(Arc::new(def)), self.span_from(span)));
            }
            TokenKind::Keyword(Keyword::Async) => {
                self.advance();
                let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
                let parsed = self.parse_body(&[Keyword::End]);
                self.loop_depth = outer_loops;
                let (body, braced) = parsed?;
                if !braced {
                    self.expect_kw(Keyword::End)?;
                }
                return Ok(Expr::new(ExprKind::Async(Arc::new(body)), self.span_from(span)));
            }
            TokenKind::Op(Op::LParen) => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect_op(Op::RParen)?;
                return Ok(Expr::new(inner.kind, self.span_from(span)));
            }
            TokenKind::Op(Op::LBracket) => {
                self.advance();
                let items = self.parse_list(Op::RBracket, Self::parse_expr)?;
                ExprKind::Array(items)
            }
            TokenKind::Op(Op::LBrace) => {
                self.advance();
                let entries = self.parse_list(Op::RBrace, Self::parse_map_entry)?;
                ExprKind::Map(entries)
            }
            _ => return Err(self.unexpected()),
        };

        Ok(Expr::new(kind, self.span_from(span)))
    }

    fn parse_map_entry(&mut self) -> Result<(Expr, Expr), ParseError> {
        let key = match self.peek().kind.clone() {
            TokenKind::Ident(name) if self.peek_at(1).kind == TokenKind::Op(Op::Colon) => {
                let tok = self.advance();
                Expr::new(ExprKind::Str(name), tok.span)
            }
            _ => self.parse_expr()?,
        };
        self.expect_op(Op::Colon)?;
        self.skip_newlines();
        let value = self.parse_expr()?;
        Ok((key, value))
    }

    /// Comma-separated items up to `close`; newlines and a trailing comma
    /// are allowed.
    pub(super) fn parse_list<T>(
        &mut self,
        close: Op,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat_op(close) {
                return Ok(items);
            }
            items.push(item(self)?);
            self.skip_newlines();
            if self.eat_op(Op::Comma) {
                continue;
            }
            self.expect_op(close)?;
            return Ok(items);
        }
    }

    fn string_literal(&mut self, segments: Vec<StrSegment>) -> Result<ExprKind, ParseError> {
        if let [StrSegment::Text(text)] = segments.as_slice() {
            return Ok(ExprKind::Str(text.clone()));
        }

        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                StrSegment::Text(text) => parts.push(InterpPart::Text(text)),
                StrSegment::Expr { source, offset, at } => {
                    let mut sub = Parser::for_fragment(&source, offset, at)?;
                    sub.skip_newlines();
                    if sub.at_eof() {
                        return Err(sub.invalid("empty interpolation", Span::point(offset)));
                    }
                    let expr = sub.parse_expr()?;
                    sub.skip_newlines();
                    sub.expect_eof()?;
                    parts.push(InterpPart::Expr(expr));
                }
            }
        }
        Ok(ExprKind::Interpolated(parts))
    }

    /// Parameters and body after `関数` (and the name, for declarations).
    pub(super) fn parse_function_rest(
        &mut self,
        name: Option<String>,
        start: Span,
    ) -> Result<FunctionDef, ParseError> {
        self.expect_op(Op::LParen)?;
        let params = self.parse_list(Op::RParen, Self::parse_param)?;

        if let Some(pos) = params.iter().position(|p| p.variadic) {
            if pos + 1 != params.len() {
                return Err(self.invalid("variadic parameter must be last", self.prev_span()));
            }
        }
        for (i, p) in params.iter().enumerate() {
            if params[..i].iter().any(|q| q.name == p.name) {
                return Err(self.invalid(
                    format!("duplicate parameter `{}`", p.name),
                    self.prev_span(),
                ));
            }
        }

        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        let parsed = self.parse_body(&[Keyword::End]);
        self.loop_depth = outer_loops;
        let (body, braced) = parsed?;
        if !braced {
            self.expect_kw(Keyword::End)?;
        }
        Ok(FunctionDef {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let variadic = self.eat_op(Op::Ellipsis);
        let (name, _) = self.expect_ident()?;
        let default = if !variadic && self.eat_op(Op::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Param {
            name,
            default,
            variadic,
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn member(target: Expr, name: String, span: Span) -> Expr {
    Expr::new(
        ExprKind::Member {
            target: Box::new(target),
            name,
        },
        span,
    )
}
