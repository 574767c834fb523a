//! Source location tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line and column of a token in the source text (both 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in characters)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Location reached after consuming `text` from this location
    pub fn advance(self, text: &str) -> Self {
        let mut next = self;
        for ch in text.chars() {
            if ch == '\n' {
                next.line += 1;
                next.column = 1;
            } else {
                next.column += 1;
            }
        }
        next
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_counts_newlines() {
        let start = SourceLocation::default();
        assert_eq!(start.advance("abc"), SourceLocation::new(1, 4));
        assert_eq!(start.advance("/* a\n b */"), SourceLocation::new(2, 6));
        assert_eq!(start.advance("\n\n"), SourceLocation::new(3, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceLocation::new(12, 3).to_string(), "12:3");
    }
}
