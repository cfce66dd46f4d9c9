//! Source location tracking

use std::fmt;

/// Source position (line and column, both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
}

impl Position {
    /// Create a new position
    #[inline]
    pub fn new(
        line: usize,
        column: usize,
    ) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
