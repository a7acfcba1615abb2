//! Token definitions

use std::fmt;

use crate::span::{LineCol, Span};

/// Reserved words. Matched against completed identifiers only, so a keyword
/// embedded in a longer identifier (`返す値`) stays an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `変数` mutable binding
    Var,
    /// `定数` immutable binding
    Const,
    /// `関数` function declaration or literal
    Function,
    /// `返す` return
    Return,
    /// `もし` if
    If,
    /// `なら` optional then-marker
    Then,
    /// `それ以外` else
    Else,
    /// `それ以外もし` else-if
    ElseIf,
    /// `終わり` block terminator
    End,
    /// `繰り返す` loop header
    Loop,
    /// `の間` while-marker
    While,
    /// `間` while-marker after a separate `の`
    During,
    /// `から` from
    From,
    /// `まで` to (inclusive)
    To,
    /// `抜ける` break
    Break,
    /// `次へ` continue
    Continue,
    /// `型` class declaration
    Class,
    /// `継承` extends
    Extends,
    /// `自分` self
    SelfValue,
    /// `真` true
    True,
    /// `偽` false
    False,
    /// `無` null
    Null,
    /// `試す` try
    Try,
    /// `捕まえる` catch
    Catch,
    /// `最後に` finally
    Finally,
    /// `投げる` throw
    Throw,
    /// `取り込む` import
    Import,
    /// `として` alias
    As,
    /// `公開` export marker
    Export,
    /// `かつ` logical and
    And,
    /// `または` logical or
    Or,
    /// `否` logical not
    Not,
    /// `に` particle (target)
    Ni,
    /// `を` particle (object)
    Wo,
    /// `の` particle (member access)
    No,
    /// `が` particle (catch filter)
    Ga,
    /// `非同期` async block
    Async,
    /// `待つ` await
    Await,
    /// `排他` with-lock
    WithLock,
    /// `整数で` integer-mode evaluation
    AsInteger,
}

impl Keyword {
    /// Every keyword with its spelling.
    pub const TABLE: &'static [(&'static str, Keyword)] = &[
        ("変数", Keyword::Var),
        ("定数", Keyword::Const),
        ("関数", Keyword::Function),
        ("返す", Keyword::Return),
        ("もし", Keyword::If),
        ("なら", Keyword::Then),
        ("それ以外", Keyword::Else),
        ("それ以外もし", Keyword::ElseIf),
        ("終わり", Keyword::End),
        ("繰り返す", Keyword::Loop),
        ("の間", Keyword::While),
        ("間", Keyword::During),
        ("から", Keyword::From),
        ("まで", Keyword::To),
        ("抜ける", Keyword::Break),
        ("次へ", Keyword::Continue),
        ("型", Keyword::Class),
        ("継承", Keyword::Extends),
        ("自分", Keyword::SelfValue),
        ("真", Keyword::True),
        ("偽", Keyword::False),
        ("無", Keyword::Null),
        ("試す", Keyword::Try),
        ("捕まえる", Keyword::Catch),
        ("最後に", Keyword::Finally),
        ("投げる", Keyword::Throw),
        ("取り込む", Keyword::Import),
        ("として", Keyword::As),
        ("公開", Keyword::Export),
        ("かつ", Keyword::And),
        ("または", Keyword::Or),
        ("否", Keyword::Not),
        ("に", Keyword::Ni),
        ("を", Keyword::Wo),
        ("の", Keyword::No),
        ("が", Keyword::Ga),
        ("非同期", Keyword::Async),
        ("待つ", Keyword::Await),
        ("排他", Keyword::WithLock),
        ("整数で", Keyword::AsInteger),
    ];

    /// Look up a completed identifier in the keyword table.
    pub fn lookup(ident: &str) -> Option<Keyword> {
        Self::TABLE
            .iter()
            .find(|(spelling, _)| *spelling == ident)
            .map(|(_, kw)| *kw)
    }

    /// The keyword's source spelling.
    pub fn as_str(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, kw)| kw == self)
            .map(|(spelling, _)| *spelling)
            .unwrap_or("?")
    }
}

/// Operators and punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `-=`
    MinusAssign,
    /// `*=`
    StarAssign,
    /// `/=`
    SlashAssign,
    /// `%=`
    PercentAssign,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `(` or `（`
    LParen,
    /// `)` or `）`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,` or `、`
    Comma,
    /// `.`
    Dot,
    /// `:` or `：`
    Colon,
    /// `;` or `。`
    Semicolon,
    /// `...`
    Ellipsis,
}

impl Op {
    /// ASCII operators ordered so that longer spellings come first
    /// (longest match).
    pub const ASCII: &'static [(&'static str, Op)] = &[
        ("...", Op::Ellipsis),
        ("==", Op::EqEq),
        ("!=", Op::NotEq),
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("+=", Op::PlusAssign),
        ("-=", Op::MinusAssign),
        ("*=", Op::StarAssign),
        ("/=", Op::SlashAssign),
        ("%=", Op::PercentAssign),
        ("&&", Op::AndAnd),
        ("||", Op::OrOr),
        ("+", Op::Plus),
        ("-", Op::Minus),
        ("*", Op::Star),
        ("/", Op::Slash),
        ("%", Op::Percent),
        ("<", Op::Lt),
        (">", Op::Gt),
        ("=", Op::Assign),
        ("!", Op::Bang),
        ("(", Op::LParen),
        (")", Op::RParen),
        ("[", Op::LBracket),
        ("]", Op::RBracket),
        ("{", Op::LBrace),
        ("}", Op::RBrace),
        (",", Op::Comma),
        (".", Op::Dot),
        (":", Op::Colon),
        (";", Op::Semicolon),
    ];

    /// Full-width punctuation accepted as its ASCII counterpart.
    pub fn from_wide(c: char) -> Option<Op> {
        match c {
            '（' => Some(Op::LParen),
            '）' => Some(Op::RParen),
            '、' => Some(Op::Comma),
            '：' => Some(Op::Colon),
            '。' => Some(Op::Semicolon),
            _ => None,
        }
    }

    /// The operator's canonical ASCII spelling.
    pub fn as_str(&self) -> &'static str {
        Self::ASCII
            .iter()
            .find(|(_, op)| op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }
}

/// A piece of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StrSegment {
    /// Literal text with escapes already decoded
    Text(String),
    /// An interpolated `#{…}` expression, kept as source for the parser
    Expr {
        /// Expression source text
        source: String,
        /// Byte offset of `source` within the file
        offset: u32,
        /// Line/column of `source` within the file
        at: LineCol,
    },
}

/// What a token is.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A reserved word
    Keyword(Keyword),
    /// An identifier
    Ident(String),
    /// A numeric literal
    Number(f64),
    /// A string literal, split into text and interpolation segments
    Str(Vec<StrSegment>),
    /// Operator or punctuation
    Op(Op),
    /// Statement-separating line break
    Newline,
    /// Whitespace run (lossless mode only)
    Whitespace,
    /// Comment (lossless mode only)
    Comment,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Whether this token is trivia the parser never sees.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(kw) => write!(f, "keyword `{}`", kw.as_str()),
            TokenKind::Ident(name) => write!(f, "identifier `{}`", name),
            TokenKind::Number(n) => write!(f, "number `{}`", n),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::Op(op) => write!(f, "`{}`", op.as_str()),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Whitespace => write!(f, "whitespace"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its byte span and line/column range.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind and payload
    pub kind: TokenKind,
    /// Byte range in the source
    pub span: Span,
    /// Position of the first character
    pub start: LineCol,
    /// Position just past the last character
    pub end: LineCol,
}

impl Token {
    /// The byte offset at which the token starts.
    pub fn offset(&self) -> u32 {
        self.span.start
    }

    /// The token's text in `source`.
    pub fn lexeme<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.range()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(Keyword::lookup("変数"), Some(Keyword::Var));
        assert_eq!(Keyword::lookup("それ以外もし"), Some(Keyword::ElseIf));
        assert_eq!(Keyword::lookup("変数名"), None);
        assert_eq!(Keyword::Return.as_str(), "返す");
    }

    #[test]
    fn test_ascii_operators_longest_first() {
        for (i, (a, _)) in Op::ASCII.iter().enumerate() {
            for (b, _) in &Op::ASCII[i + 1..] {
                assert!(
                    !(b.len() > a.len() && b.starts_with(a)),
                    "`{}` shadows `{}`",
                    a,
                    b
                );
            }
        }
    }
}
