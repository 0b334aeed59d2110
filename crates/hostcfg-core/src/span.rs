//! Source positions inside configuration file text
//!
//! Every element and attribute parsed from a configuration file carries a
//! span so diagnostics can report the exact file location.

use serde::{Deserialize, Serialize};

/// A region of configuration file text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// A placeholder span for synthesized nodes
    pub fn dummy() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}
