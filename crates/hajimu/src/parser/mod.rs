//! Recursive-descent parser
//!
//! Precedence, lowest to highest:
//!
//! ```text
//! assignment   = particle ( ("=" | "+=" | …) assignment )?
//! particle     = or ( "に" or "を" verb | "を" verb | "を" "整数で" )*
//! or           = and ( ("または" | "||") and )*
//! and          = equality ( ("かつ" | "&&") equality )*
//! equality     = comparison ( ("==" | "!=") comparison )*
//! comparison   = additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive     = multiplicative ( ("+" | "-") multiplicative )*
//! multiplicative = unary ( ("*" | "/" | "%") unary )*
//! unary        = ("-" | "!" | "否" | "待つ") unary | postfix
//! postfix      = primary ( call | index | "." name | "の" name )*
//! ```
//!
//! Blocks are either keyword-delimited (closed by `終わり`) or braced. The
//! first error aborts the parse; there is no recovery.

mod expr;
mod stmt;

use crate::ast::{Expr, Program};
use crate::error::ParseError;
use crate::lexer::{Keyword, Lexer, Op, Token, TokenKind};
use crate::span::{LineCol, Span};

/// Parse a whole source file.
pub fn parse(src: &str) -> Result<Program, ParseError> {
    Parser::new(src)?.parse_program()
}

/// Parse a single expression (used for `-e` and interpolation).
pub fn parse_expression(src: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(src)?;
    parser.skip_newlines();
    let expr = parser.parse_expr()?;
    parser.skip_separators();
    parser.expect_eof()?;
    Ok(expr)
}

/// Parser state over a pre-lexed token buffer.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Enclosing loops within the current function body
    loop_depth: usize,
}

impl Parser {
    /// Lex `src` and prepare to parse it.
    pub fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Self::from_tokens(Lexer::new(src).tokenize()?))
    }

    /// Parse a source fragment positioned inside a larger file.
    pub fn for_fragment(src: &str, base: u32, at: LineCol) -> Result<Self, ParseError> {
        Ok(Self::from_tokens(
            Lexer::with_origin(src, base, at).tokenize()?,
        ))
    }

    /// Parse from an existing token list. Trivia is dropped.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let tokens: Vec<Token> = tokens.into_iter().filter(|t| !t.kind.is_trivia()).collect();
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
        }
    }

    /// Parse statements until end of input.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.at_eof() {
                break;
            }
            body.push(self.parse_stmt()?);
        }
        Ok(Program::new(body))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Token Cursor
    // ═══════════════════════════════════════════════════════════════════

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(kw)
    }

    fn check_op(&self, op: Op) -> bool {
        self.peek().kind == TokenKind::Op(op)
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: Op) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: Keyword) -> Result<Token, ParseError> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("`{}`", kw.as_str())))
        }
    }

    fn expect_op(&mut self, op: Op) -> Result<Token, ParseError> {
        if self.check_op(op) {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("`{}`", op.as_str())))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let tok = self.advance();
                Ok((name, tok.span))
            }
            _ => Err(self.expected("identifier")),
        }
    }

    /// A member name after `.` or `の`. Keywords are plain names here, so
    /// `e.スタック[0].関数` reads the frame's `関数` field.
    fn expect_member_name(&mut self) -> Result<(String, Span), ParseError> {
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            _ => return Err(self.expected("member name")),
        };
        let tok = self.advance();
        Ok((name, tok.span))
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Op(Op::Semicolon)
        ) {
            self.advance();
        }
    }

    /// Skip newlines only if one of `kws` follows them.
    fn skip_newlines_before(&mut self, kws: &[Keyword]) {
        let mut n = 0;
        while self.peek_at(n).kind == TokenKind::Newline {
            n += 1;
        }
        if let TokenKind::Keyword(kw) = self.peek_at(n).kind {
            if kws.contains(&kw) {
                self.pos += n;
            }
        }
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            return self.peek().span;
        }
        self.tokens[self.pos - 1].span
    }

    fn span_from(&self, start: Span) -> Span {
        start.to(self.prev_span())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════

    fn expected(&self, what: &str) -> ParseError {
        let tok = self.peek();
        ParseError::ExpectedToken {
            expected: what.to_string(),
            found: tok.kind.to_string(),
            at: tok.start,
            span: tok.span,
        }
    }

    fn unexpected(&self) -> ParseError {
        let tok = self.peek();
        ParseError::Unexpected {
            found: tok.kind.to_string(),
            at: tok.start,
            span: tok.span,
        }
    }

    fn invalid(&self, message: impl Into<String>, span: Span) -> ParseError {
        let at = self
            .tokens
            .iter()
            .find(|t| t.span.start >= span.start)
            .map(|t| t.start)
            .unwrap_or(self.peek().start);
        ParseError::InvalidSyntax {
            message: message.into(),
            at,
            span,
        }
    }
}
