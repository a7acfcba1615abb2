//! Source positions
//!
//! AST nodes carry byte-offset [`Span`]s only, which keeps them compact and
//! lets the HJPB container store them verbatim. Line/column information is
//! recovered on demand through [`crate::diagnostic::SourceMap`]. Tokens carry
//! both forms.

use std::fmt;
use std::ops::Range;

/// A half-open byte range `[start, end)` into a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the first byte
    pub start: u32,
    /// Byte offset one past the last byte
    pub end: u32,
}

impl Span {
    /// Create a span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `offset`.
    pub fn point(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift the span by `delta` bytes (used for interpolated segments).
    pub fn offset(self, delta: u32) -> Span {
        Span {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Byte length of the span.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Whether the span is zero-width.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The span as a `usize` range for slicing source text.
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A 1-based line/column pair. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineCol {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number in characters (1-indexed)
    pub col: u32,
}

impl LineCol {
    /// Create a new position.
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl Default for LineCol {
    fn default() -> Self {
        Self { line: 1, col: 1 }
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_covers_both() {
        let a = Span::new(4, 8);
        let b = Span::new(1, 5);
        assert_eq!(a.to(b), Span::new(1, 8));
    }

    #[test]
    fn test_span_offset_and_range() {
        let s = Span::new(2, 5).offset(10);
        assert_eq!(s.range(), 12..15);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert!(Span::point(3).is_empty());
    }
}
