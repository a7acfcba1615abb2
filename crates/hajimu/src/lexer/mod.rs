//! Lexer for UTF-8 Hajimu source
//!
//! The lexer walks the source one character at a time, using a UTF-8 length
//! table to step over multi-byte sequences so that columns count characters
//! rather than bytes. It yields a finite sequence of [`Token`]s that always
//! ends with [`TokenKind::Eof`].
//!
//! In lossless mode whitespace and comments are emitted as trivia tokens, so
//! concatenating every token's lexeme reproduces the source exactly.

mod token;

pub use token::{Keyword, Op, StrSegment, Token, TokenKind};

use crate::error::LexError;
use crate::span::{LineCol, Span};

/// Byte length of a UTF-8 sequence indexed by the high nibble of its first
/// byte. Continuation bytes map to 0 and never start a character in valid
/// input.
const UTF8_LEN: [u8; 16] = [1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 2, 2, 3, 4];

const BOM: char = '\u{FEFF}';

/// Validate raw source bytes as UTF-8.
pub fn decode_source(bytes: &[u8]) -> Result<&str, LexError> {
    std::str::from_utf8(bytes).map_err(|e| LexError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })
}

/// Whether `c` may start an identifier.
pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || is_japanese_ident_char(c)
}

/// Whether `c` may continue an identifier.
pub fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Non-ASCII printable code points are identifier characters, except the
/// full-width space and the punctuation the lexer gives its own meaning.
fn is_japanese_ident_char(c: char) -> bool {
    !c.is_ascii()
        && !c.is_whitespace()
        && !c.is_control()
        && c != BOM
        && !matches!(c, '「' | '」' | '、' | '。' | '（' | '）' | '：')
}

fn is_inline_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\u{3000}' | BOM)
}

/// Streaming tokenizer over a source buffer.
pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    base: u32,
    line: u32,
    col: u32,
    lossless: bool,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over a whole file.
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            base: 0,
            line: 1,
            col: 1,
            lossless: false,
            finished: false,
        }
    }

    /// Create a lexer over a fragment that starts at `base` bytes and
    /// position `at` within its file (used for interpolated expressions).
    pub fn with_origin(src: &'src str, base: u32, at: LineCol) -> Self {
        Self {
            src,
            pos: 0,
            base,
            line: at.line,
            col: at.col,
            lossless: false,
            finished: false,
        }
    }

    /// Emit whitespace and comment tokens too.
    pub fn lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    /// Consume the lexer and collect every token up to and including EOF.
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Character Cursor
    // ═══════════════════════════════════════════════════════════════════

    fn peek(&self) -> Option<char> {
        self.char_at(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        let mut at = self.pos;
        for _ in 0..n {
            let first = *self.src.as_bytes().get(at)?;
            at += UTF8_LEN[(first >> 4) as usize].max(1) as usize;
        }
        self.char_at(at)
    }

    fn char_at(&self, at: usize) -> Option<char> {
        let first = *self.src.as_bytes().get(at)?;
        let len = UTF8_LEN[(first >> 4) as usize].max(1) as usize;
        self.src.get(at..at + len)?.chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn here(&self) -> LineCol {
        LineCol::new(self.line, self.col)
    }

    fn offset(&self) -> u32 {
        self.base + self.pos as u32
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.base + start as u32, self.offset())
    }

    fn make(&self, kind: TokenKind, start: usize, start_at: LineCol) -> Token {
        Token {
            kind,
            span: self.span_from(start),
            start: start_at,
            end: self.here(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Token Dispatch
    // ═══════════════════════════════════════════════════════════════════

    /// Produce the next token. Returns EOF forever once input is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let start = self.pos;
            let start_at = self.here();

            let Some(c) = self.peek() else {
                return Ok(self.make(TokenKind::Eof, start, start_at));
            };

            if is_inline_space(c) && !(c == '\r' && self.peek_nth(1) == Some('\n')) {
                while let Some(c) = self.peek() {
                    if !is_inline_space(c) || (c == '\r' && self.peek_nth(1) == Some('\n')) {
                        break;
                    }
                    self.advance();
                }
                if self.lossless {
                    return Ok(self.make(TokenKind::Whitespace, start, start_at));
                }
                continue;
            }

            if c == '\n' || c == '\r' {
                self.advance();
                if c == '\r' {
                    self.advance();
                }
                return Ok(self.make(TokenKind::Newline, start, start_at));
            }

            if c == '#' || (c == '/' && self.peek_nth(1) == Some('/')) {
                while let Some(c) = self.peek() {
                    if c == '\n' || (c == '\r' && self.peek_nth(1) == Some('\n')) {
                        break;
                    }
                    self.advance();
                }
                if self.lossless {
                    return Ok(self.make(TokenKind::Comment, start, start_at));
                }
                continue;
            }

            if c == '/' && self.peek_nth(1) == Some('*') {
                self.advance();
                self.advance();
                while let Some(c) = self.advance() {
                    if c == '*' && self.eat('/') {
                        break;
                    }
                }
                if self.lossless {
                    return Ok(self.make(TokenKind::Comment, start, start_at));
                }
                continue;
            }

            if c == '"' || c == '「' {
                return self.lex_string(start, start_at);
            }

            if c.is_ascii_digit() {
                return self.lex_number(start, start_at);
            }

            if is_ident_start(c) {
                while self.peek().is_some_and(is_ident_continue) {
                    self.advance();
                }
                let text = &self.src[start..self.pos];
                let kind = match Keyword::lookup(text) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Ident(text.to_string()),
                };
                return Ok(self.make(kind, start, start_at));
            }

            if let Some(op) = Op::from_wide(c) {
                self.advance();
                return Ok(self.make(TokenKind::Op(op), start, start_at));
            }

            let rest = &self.src[self.pos..];
            if let Some((spelling, op)) = Op::ASCII.iter().find(|(s, _)| rest.starts_with(s)) {
                for _ in 0..spelling.len() {
                    self.advance();
                }
                return Ok(self.make(TokenKind::Op(*op), start, start_at));
            }

            self.advance();
            return Err(LexError::UnexpectedChar {
                ch: c,
                at: start_at,
                span: self.span_from(start),
            });
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Numbers
    // ═══════════════════════════════════════════════════════════════════

    fn lex_number(&mut self, start: usize, start_at: LineCol) -> Result<Token, LexError> {
        let invalid = |lexer: &mut Self| {
            while lexer.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                lexer.advance();
            }
            LexError::InvalidNumber {
                text: lexer.src[start..lexer.pos].to_string(),
                at: start_at,
                span: lexer.span_from(start),
            }
        };

        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let src = self.src;
            let digits = &src[digits_start..self.pos];
            if digits.is_empty() || self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(self));
            }
            let value = u64::from_str_radix(digits, 16).map_err(|_| invalid(self))?;
            return Ok(self.make(TokenKind::Number(value as f64), start, start_at));
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(invalid(self));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(invalid(self));
        }

        let src = self.src;
        let text = &src[start..self.pos];
        let value: f64 = text.parse().map_err(|_| invalid(self))?;
        Ok(self.make(TokenKind::Number(value), start, start_at))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Strings
    // ═══════════════════════════════════════════════════════════════════

    fn lex_string(&mut self, start: usize, start_at: LineCol) -> Result<Token, LexError> {
        let open = self.advance().unwrap_or('"');
        let close = if open == '「' { '」' } else { '"' };
        let mut segments = Vec::new();
        let mut text = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::UnterminatedString {
                    at: start_at,
                    span: self.span_from(start),
                });
            };

            if c == close {
                self.advance();
                break;
            }

            if c == '\\' {
                text.push(self.lex_escape()?);
                continue;
            }

            if c == '#' && self.peek_nth(1) == Some('{') {
                self.advance();
                self.advance();
                if !text.is_empty() {
                    segments.push(StrSegment::Text(std::mem::take(&mut text)));
                }
                segments.push(self.lex_interpolation(start, start_at)?);
                continue;
            }

            self.advance();
            text.push(c);
        }

        if !text.is_empty() || segments.is_empty() {
            segments.push(StrSegment::Text(text));
        }
        Ok(self.make(TokenKind::Str(segments), start, start_at))
    }

    fn lex_escape(&mut self) -> Result<char, LexError> {
        let esc_start = self.pos;
        let esc_at = self.here();
        self.advance();

        let bad = |lexer: &Self| LexError::InvalidEscape {
            sequence: lexer.src[esc_start..lexer.pos].to_string(),
            at: esc_at,
            span: lexer.span_from(esc_start),
        };

        let Some(c) = self.advance() else {
            return Err(bad(self));
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '"' | '\\' | '\'' | '#' | '「' | '」' => c,
            'u' => {
                let mut hex = String::new();
                if self.eat('{') {
                    while let Some(h) = self.peek() {
                        if h == '}' {
                            break;
                        }
                        if !h.is_ascii_hexdigit() || hex.len() >= 6 {
                            self.advance();
                            return Err(bad(self));
                        }
                        hex.push(h);
                        self.advance();
                    }
                    if !self.eat('}') || hex.is_empty() {
                        return Err(bad(self));
                    }
                } else {
                    for _ in 0..4 {
                        match self.peek() {
                            Some(h) if h.is_ascii_hexdigit() => {
                                hex.push(h);
                                self.advance();
                            }
                            _ => return Err(bad(self)),
                        }
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| bad(self))?
            }
            _ => return Err(bad(self)),
        };
        Ok(decoded)
    }

    fn lex_interpolation(&mut self, start: usize, start_at: LineCol) -> Result<StrSegment, LexError> {
        let expr_start = self.pos;
        let expr_at = self.here();
        let mut depth = 1usize;

        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::UnterminatedString {
                    at: start_at,
                    span: self.span_from(start),
                });
            };
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                '"' | '「' => {
                    let close = if c == '「' { '」' } else { '"' };
                    self.advance();
                    while let Some(inner) = self.peek() {
                        if inner == '\\' {
                            self.advance();
                        } else if inner == close {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => {}
            }
            self.advance();
        }

        let source = self.src[expr_start..self.pos].to_string();
        self.advance();
        Ok(StrSegment::Expr {
            source,
            offset: self.base + expr_start as u32,
            at: expr_at,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(tok) if tok.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            _ => {}
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .expect("lex failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("変数 合計 = 0"),
            vec![
                TokenKind::Keyword(Keyword::Var),
                TokenKind::Ident("合計".to_string()),
                TokenKind::Op(Op::Assign),
                TokenKind::Number(0.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keyword_inside_identifier_is_identifier() {
        assert_eq!(
            kinds("返す値"),
            vec![TokenKind::Ident("返す値".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("3.5")[0], TokenKind::Number(3.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("0xff")[0], TokenKind::Number(255.0));
        assert_eq!(kinds("2.5E-1")[0], TokenKind::Number(0.25));
    }

    #[test]
    fn test_number_followed_by_dot_method() {
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Op(Op::Dot),
                TokenKind::Ident("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(matches!(
            Lexer::new("0x").tokenize(),
            Err(LexError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Lexer::new("12abc").tokenize(),
            Err(LexError::InvalidNumber { text, .. }) if text == "12abc"
        ));
        assert!(matches!(
            Lexer::new("1e+").tokenize(),
            Err(LexError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\n\t\"\\あ""#)[0],
            TokenKind::Str(vec![StrSegment::Text("a\n\t\"\\あ".to_string())])
        );
    }

    #[test]
    fn test_japanese_quotes() {
        assert_eq!(
            kinds("「こんにちは」")[0],
            TokenKind::Str(vec![StrSegment::Text("こんにちは".to_string())])
        );
    }

    #[test]
    fn test_interpolation_segments() {
        let toks = Lexer::new("\"値は#{x + 1}です\"").tokenize().unwrap();
        match &toks[0].kind {
            TokenKind::Str(segs) => {
                assert_eq!(segs.len(), 3);
                assert_eq!(segs[0], StrSegment::Text("値は".to_string()));
                match &segs[1] {
                    StrSegment::Expr { source, offset, at } => {
                        assert_eq!(source, "x + 1");
                        assert_eq!(*offset, ("\"値は#{".len()) as u32);
                        assert_eq!(at.col, 6);
                    }
                    other => panic!("expected expr segment, got {:?}", other),
                }
                assert_eq!(segs[2], StrSegment::Text("です".to_string()));
            }
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            Lexer::new("\"abc").tokenize(),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn test_invalid_escape() {
        assert!(matches!(
            Lexer::new(r#""\q""#).tokenize(),
            Err(LexError::InvalidEscape { sequence, .. }) if sequence == "\\q"
        ));
    }

    #[test]
    fn test_columns_count_characters() {
        let toks = Lexer::new("変数 あいう = 1").tokenize().unwrap();
        assert_eq!(toks[1].start, LineCol::new(1, 4));
        assert_eq!(toks[1].end, LineCol::new(1, 7));
        assert_eq!(toks[2].start, LineCol::new(1, 8));
        assert_eq!(toks[2].span.start as usize, "変数 あいう ".len());
    }

    #[test]
    fn test_crlf_is_one_newline() {
        let toks = Lexer::new("a\r\nb").tokenize().unwrap();
        assert_eq!(toks[1].kind, TokenKind::Newline);
        assert_eq!(toks[1].span.len(), 2);
        assert_eq!(toks[2].start, LineCol::new(2, 1));
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("x // note\n/* block */ y # tail"),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::Newline,
                TokenKind::Ident("y".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_wide_punctuation() {
        assert_eq!(
            kinds("表示（1、2）。"),
            vec![
                TokenKind::Ident("表示".to_string()),
                TokenKind::Op(Op::LParen),
                TokenKind::Number(1.0),
                TokenKind::Op(Op::Comma),
                TokenKind::Number(2.0),
                TokenKind::Op(Op::RParen),
                TokenKind::Op(Op::Semicolon),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lossless_round_trip() {
        let src = "\u{FEFF}変数 x = 「あ#{1}」 // c\r\n/* b */\t表示(x)。\n";
        let toks = Lexer::new(src).lossless(true).tokenize().unwrap();
        let rebuilt: String = toks.iter().map(|t| t.lexeme(src)).collect();
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn test_iterator_stops_after_eof() {
        let mut lexer = Lexer::new("x");
        assert!(lexer.next().is_some());
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Eof, .. }))));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(
            decode_source(b"ab\xff"),
            Err(LexError::InvalidUtf8 { offset: 2 })
        );
    }
}
