//! Error types for every Hajimu layer

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::span::{LineCol, Span};
use crate::value::ErrorValue;

/// The language-level error kinds exposed through `e.種類` / `e.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed source text
    LexError,
    /// Token sequence does not match the grammar
    ParseError,
    /// Unknown identifier
    NameError,
    /// Operation applied to the wrong kind of value
    TypeError,
    /// Wrong number of arguments
    ArityError,
    /// Array index out of range
    IndexError,
    /// Unknown member on an instance or value
    AttributeError,
    /// Right type, wrong value
    ValueError,
    /// Integer division or modulo by zero
    DivisionError,
    /// File system or stream failure
    IOError,
    /// Module could not be resolved or executed
    ImportError,
    /// Native plugin failure
    PluginError,
    /// An await ran past its deadline
    TimeoutError,
    /// A task observed its cancellation request
    CancelledError,
    /// Call depth limit exceeded
    StackOverflow,
    /// Raised by `投げる` with a non-error value
    UserError,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 16] = [
        ErrorKind::LexError,
        ErrorKind::ParseError,
        ErrorKind::NameError,
        ErrorKind::TypeError,
        ErrorKind::ArityError,
        ErrorKind::IndexError,
        ErrorKind::AttributeError,
        ErrorKind::ValueError,
        ErrorKind::DivisionError,
        ErrorKind::IOError,
        ErrorKind::ImportError,
        ErrorKind::PluginError,
        ErrorKind::TimeoutError,
        ErrorKind::CancelledError,
        ErrorKind::StackOverflow,
        ErrorKind::UserError,
    ];

    /// The kind's name as seen by programs.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::LexError => "LexError",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::NameError => "NameError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ArityError => "ArityError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::DivisionError => "DivisionError",
            ErrorKind::IOError => "IOError",
            ErrorKind::ImportError => "ImportError",
            ErrorKind::PluginError => "PluginError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::CancelledError => "CancelledError",
            ErrorKind::StackOverflow => "StackOverflow",
            ErrorKind::UserError => "UserError",
        }
    }

    /// Look a kind up by name.
    pub fn from_name(name: &str) -> Option<ErrorKind> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while turning source bytes into tokens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// Source is not valid UTF-8
    #[error("invalid UTF-8 at byte {offset}")]
    InvalidUtf8 {
        /// Byte offset of the first invalid byte
        offset: usize,
    },

    /// A string literal reached end of line or input
    #[error("unterminated string literal at {at}")]
    UnterminatedString {
        /// Position of the opening quote
        at: LineCol,
        /// Span from the quote to where lexing stopped
        span: Span,
    },

    /// Unknown or malformed backslash escape
    #[error("invalid escape sequence `{sequence}` at {at}")]
    InvalidEscape {
        /// The escape as written
        sequence: String,
        /// Position of the backslash
        at: LineCol,
        /// Span of the escape
        span: Span,
    },

    /// Malformed numeric literal
    #[error("invalid number literal `{text}` at {at}")]
    InvalidNumber {
        /// The literal as written
        text: String,
        /// Position of the first digit
        at: LineCol,
        /// Span of the literal
        span: Span,
    },

    /// A character that starts no token
    #[error("unexpected character `{ch}` at {at}")]
    UnexpectedChar {
        /// The offending character
        ch: char,
        /// Its position
        at: LineCol,
        /// Its span
        span: Span,
    },
}

impl LexError {
    /// Byte span of the error, if known.
    pub fn span(&self) -> Span {
        match self {
            LexError::InvalidUtf8 { offset } => Span::point(*offset as u32),
            LexError::UnterminatedString { span, .. }
            | LexError::InvalidEscape { span, .. }
            | LexError::InvalidNumber { span, .. }
            | LexError::UnexpectedChar { span, .. } => *span,
        }
    }
}

/// Errors raised by the parser. The first error aborts the parse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A token that cannot start or continue the current production
    #[error("unexpected {found} at {at}")]
    Unexpected {
        /// Description of the token found
        found: String,
        /// Its position
        at: LineCol,
        /// Its span
        span: Span,
    },

    /// A specific token was required
    #[error("expected {expected}, found {found} at {at}")]
    ExpectedToken {
        /// What the parser wanted
        expected: String,
        /// Description of the token found
        found: String,
        /// Its position
        at: LineCol,
        /// Its span
        span: Span,
    },

    /// Tokens form a structurally invalid construct
    #[error("invalid syntax at {at}: {message}")]
    InvalidSyntax {
        /// What is wrong
        message: String,
        /// Position of the construct
        at: LineCol,
        /// Its span
        span: Span,
    },

    /// Lexing failed before parsing could begin
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    /// Byte span of the offending construct.
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unexpected { span, .. }
            | ParseError::ExpectedToken { span, .. }
            | ParseError::InvalidSyntax { span, .. } => *span,
            ParseError::Lex(e) => e.span(),
        }
    }

    /// The error kind programs observe when parsing fails at runtime
    /// (e.g. inside an import).
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::Lex(_) => ErrorKind::LexError,
            _ => ErrorKind::ParseError,
        }
    }
}

/// Errors from environment operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    /// No binding with this name in any enclosing scope
    #[error("undefined variable `{name}`")]
    UndefinedVariable {
        /// The name looked up
        name: String,
    },

    /// Assignment to a `定数` binding
    #[error("cannot assign twice to immutable binding `{name}`")]
    ImmutableBinding {
        /// The binding's name
        name: String,
    },
}

/// Errors from the HJPB container codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    /// The first four bytes are not `HJPB`
    #[error("bad magic: not an HJPB container")]
    BadMagic,

    /// Major version newer than this reader
    #[error("unsupported HJPB version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found
        major: u16,
        /// Minor version found
        minor: u16,
    },

    /// Flags this reader does not understand
    #[error("unsupported HJPB flags {0:#010x}")]
    UnsupportedFlags(u32),

    /// Input ended inside a structure
    #[error("truncated HJPB input at byte {0}")]
    Truncated(usize),

    /// Unknown node tag
    #[error("unknown {context} tag {tag} at byte {offset}")]
    BadTag {
        /// Which tag family was being decoded
        context: &'static str,
        /// The tag byte
        tag: u8,
        /// Where it was found
        offset: usize,
    },

    /// String-pool index out of range
    #[error("string pool index {0} out of range")]
    BadStringIndex(u32),

    /// String-pool entry is not UTF-8
    #[error("string pool entry {0} is not valid UTF-8")]
    InvalidUtf8(u32),

    /// Payload kind does not match what the caller asked for
    #[error("expected {expected} payload")]
    WrongPayload {
        /// The payload kind expected
        expected: &'static str,
    },

    /// Bytes left over after the payload
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Errors from loading or calling native plugins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// No file matched the plugin name
    #[error("plugin not found: {0}")]
    NotFound(String),

    /// The dynamic linker refused the library
    #[error("failed to load plugin {path}: {message}")]
    LoadFailed {
        /// Path handed to the linker
        path: String,
        /// Linker message
        message: String,
    },

    /// `hajimu_plugin_init` is missing
    #[error("plugin {0} does not export hajimu_plugin_init")]
    MissingInit(String),

    /// `PluginInfo` is null or malformed
    #[error("plugin {path} returned invalid info: {message}")]
    InvalidInfo {
        /// Plugin path
        path: String,
        /// What was wrong
        message: String,
    },

    /// A manifest entry has no matching native function
    #[error("plugin {plugin} does not provide `{entry}` declared by its manifest")]
    MissingEntry {
        /// Plugin name
        plugin: String,
        /// Entry name
        entry: String,
    },

    /// A native function returned an error value
    #[error("{function}: {message}")]
    CallFailed {
        /// Entry name
        function: String,
        /// Message reported by the plugin
        message: String,
    },

    /// A value cannot cross the C boundary
    #[error("cannot pass {0} to a native plugin")]
    Unconvertible(String),

    /// Manifest container could not be decoded
    #[error(transparent)]
    Manifest(#[from] BytecodeError),
}

/// Misuse of a concurrency primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The calling thread already holds the mutex
    #[error("ミューテックスはこのスレッドが既にロックしています")]
    Relock,

    /// Unlock of a lock nobody holds
    #[error("{0}はロックされていません")]
    NotHeld(&'static str),

    /// Unlock from a thread that does not own the lock
    #[error("ミューテックスは別のスレッドが保持しています")]
    NotOwner,

    /// Send on a closed channel
    #[error("閉じたチャネルには送信できません")]
    ChannelClosed,

    /// A wait group counter dropped below zero
    #[error("待機グループのカウンタが負になりました")]
    NegativeCounter,

    /// Thread creation failed
    #[error("スレッドを作成できません: {0}")]
    Spawn(String),
}

/// An error value that reached the top level without being caught.
#[derive(Debug, Clone)]
pub struct UncaughtError(pub Arc<ErrorValue>);

impl fmt::Display for UncaughtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.kind, self.0.message)
    }
}

impl std::error::Error for UncaughtError {}

/// Main error type for Hajimu operations
#[derive(Error, Debug)]
pub enum HajimuError {
    /// Lexing failed
    #[error("LexError: {0}")]
    Lex(#[from] LexError),

    /// Parsing failed
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),

    /// The program raised an error nobody caught
    #[error("{0}")]
    Runtime(#[from] UncaughtError),

    /// HJPB container problem
    #[error("bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    /// Native plugin problem
    #[error("PluginError: {0}")]
    Plugin(#[from] PluginError),

    /// File I/O failed
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

impl HajimuError {
    /// Process exit code for this error: 2 for lex/parse/decode failures,
    /// 1 for everything that happened while running.
    pub fn exit_code(&self) -> i32 {
        match self {
            HajimuError::Lex(_) | HajimuError::Parse(_) | HajimuError::Bytecode(_) => 2,
            HajimuError::Runtime(_) | HajimuError::Plugin(_) | HajimuError::Io(_) => 1,
        }
    }

    /// Source span associated with the error, when there is one.
    pub fn span(&self) -> Option<Span> {
        match self {
            HajimuError::Lex(e) => Some(e.span()),
            HajimuError::Parse(e) => Some(e.span()),
            HajimuError::Runtime(e) => e.0.span,
            _ => None,
        }
    }
}

/// Result type alias for Hajimu operations
pub type Result<T> = std::result::Result<T, HajimuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("NoSuchError"), None);
    }

    #[test]
    fn test_exit_codes() {
        let lex = HajimuError::from(LexError::InvalidUtf8 { offset: 0 });
        assert_eq!(lex.exit_code(), 2);
        let io = HajimuError::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.exit_code(), 1);
    }
}
