//! Positions inside a document or an embedded expression

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based line and column, plus the byte offset they correspond to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    /// Byte offset from the start of the text
    pub offset: usize,
}

impl SourceLocation {
    pub const fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// Location of byte `offset` in `source`. Offsets past the end clamp to it.
    pub fn at_offset(source: &str, offset: usize) -> Self {
        positions(source)
            .find(|location| location.offset >= offset)
            .unwrap_or_else(|| end_of(source))
    }

    /// Location of a line/column pair reported by another parser. Pairs that
    /// fall outside `source` map to its end.
    pub fn at_line_col(source: &str, line: usize, column: usize) -> Self {
        positions(source)
            .find(|location| location.line == line && location.column == column)
            .unwrap_or_else(|| Self::new(line, column, source.len()))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Location of every character start, in order
fn positions(source: &str) -> impl Iterator<Item = SourceLocation> + '_ {
    source.char_indices().scan((1, 1), |(line, column), (offset, ch)| {
        let location = SourceLocation::new(*line, *column, offset);
        if ch == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
        Some(location)
    })
}

fn end_of(source: &str) -> SourceLocation {
    let line = source.matches('\n').count() + 1;
    let last_line = source.rsplit('\n').next().unwrap_or_default();
    SourceLocation::new(line, last_line.chars().count() + 1, source.len())
}
