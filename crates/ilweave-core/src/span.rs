//! Source locations attached to syntax nodes, instructions and diagnostics.
//!
//! A [`Span`] is the debug tag the lowering engine threads from the typed tree
//! through to emitted instructions, so the rendered program can be mapped back
//! onto the original source.

use std::fmt;

/// A region of source text: a start position plus a byte length.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a span from a line, column and length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// A zero-length span at a position.
    #[inline]
    pub fn point(line: u32, col: u32) -> Self {
        Self { line, col, len: 0 }
    }

    /// Whether this is the default "no location" span.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.line == 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Column one past the last byte, for single-line spans.
    #[inline]
    pub fn end_col(&self) -> u32 {
        self.col + self.len
    }

    /// Whether `other` starts inside this span on the same line.
    pub fn contains(&self, other: Span) -> bool {
        self.line == other.line && other.col >= self.col && other.end_col() <= self.end_col()
    }

    /// Smallest span starting at `self` that also covers `other`.
    ///
    /// Multi-line spans are approximated by summing the lengths.
    pub fn to(self, other: Span) -> Span {
        if self.line != other.line {
            return Span::new(self.line, self.col, self.len + other.len);
        }
        let start = self.col.min(other.col);
        let end = self.end_col().max(other.end_col());
        Span::new(self.line, start, end - start)
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}+{}", self.line, self.col, self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
