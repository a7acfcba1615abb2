//! Source maps and caret excerpts for error reports
//!
//! ```text
//! DivisionError: 整数除算でゼロ除算が発生しました
//!   --> main.jp:3:5
//!    |
//!  3 | 表示(10 / 0 を 整数で)
//!    |      ^^^^^^
//! ```

use std::fmt;
use std::sync::Arc;

use crate::span::{LineCol, Span};

/// A named source buffer with a line index.
pub struct SourceMap {
    name: String,
    source: Arc<str>,
    line_starts: Vec<u32>,
}

impl SourceMap {
    /// Index `source`, reported under `name`.
    pub fn new(name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        let source: Arc<str> = source.into();
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// File name used in reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The indexed source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Line and column (1-based, columns in characters) of a byte offset.
    /// Offsets past the end clamp to the end of input.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let offset = offset.min(self.source.len() as u32);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line] as usize;
        let end = floor_char_boundary(&self.source, offset as usize);
        let col = self.source[start..end].chars().count() as u32 + 1;
        LineCol::new(line as u32 + 1, col)
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text(&self, line: u32) -> &str {
        let Some(&start) = self.line_starts.get(line.saturating_sub(1) as usize) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line as usize)
            .map_or(self.source.len(), |&next| next as usize);
        self.source[start as usize..end].trim_end_matches(['\n', '\r'])
    }

    /// Render `headline` followed by the location and a caret excerpt.
    pub fn render(&self, span: Span, headline: &str) -> String {
        let at = self.line_col(span.start);
        let text = self.line_text(at.line);
        let gutter = at.line.to_string().len();

        let prefix: usize = text
            .chars()
            .take(at.col as usize - 1)
            .map(cell_width)
            .sum();
        let on_line = text.chars().skip(at.col as usize - 1);
        let span_chars = self.source[span.range()]
            .chars()
            .take_while(|c| *c != '\n')
            .count();
        let carets: usize = on_line.take(span_chars).map(cell_width).sum::<usize>().max(1);

        format!(
            "{headline}\n{pad}--> {name}:{at}\n{pad} |\n{line:>gutter$} | {text}\n{pad} | {space}{carets}",
            pad = " ".repeat(gutter),
            name = self.name,
            line = at.line,
            space = " ".repeat(prefix),
            carets = "^".repeat(carets),
        )
    }
}

impl fmt::Debug for SourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceMap")
            .field("name", &self.name)
            .field("lines", &self.line_starts.len())
            .finish()
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Terminal cells occupied by `c`: two for East Asian wide characters.
fn cell_width(c: char) -> usize {
    match c as u32 {
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1F64F
        | 0x20000..=0x3FFFD => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_line_col_counts_characters() {
        let map = SourceMap::new("t.jp", "変数 x = 1\n表示(x)");
        assert_eq!(map.line_col(0), LineCol::new(1, 1));
        // "変数 " is 7 bytes, 3 characters
        assert_eq!(map.line_col(7), LineCol::new(1, 4));
        let second = "変数 x = 1\n".len() as u32;
        assert_eq!(map.line_col(second), LineCol::new(2, 1));
    }

    #[test]
    fn test_line_text_strips_crlf() {
        let map = SourceMap::new("t.jp", "a\r\nb");
        assert_eq!(map.line_text(1), "a");
        assert_eq!(map.line_text(2), "b");
        assert_eq!(map.line_text(9), "");
    }

    #[test]
    fn test_render_caret_under_span() {
        let map = SourceMap::new("main.jp", "x = 1 / y");
        let out = map.render(Span::new(8, 9), "NameError: y");
        assert_eq!(
            out,
            "NameError: y\n --> main.jp:1:9\n  |\n1 | x = 1 / y\n  |         ^"
        );
    }

    #[test]
    fn test_render_wide_characters_take_two_cells() {
        let map = SourceMap::new("main.jp", "表示(値)");
        let start = "表示(".len() as u32;
        let out = map.render(Span::new(start, start + "値".len() as u32), "E");
        assert!(out.ends_with("|      ^^"), "{}", out);
    }
}
