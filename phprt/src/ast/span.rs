//! Source location tracking

use serde::{Deserialize, Serialize};

/// A position in the source file: 1-based line and column.
///
/// The file name lives on the [`Program`](super::Program); nodes only carry line and column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A node with its source position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    #[serde(default)]
    pub pos: Position,
}

impl<T> Spanned<T> {
    pub fn new(node: T, pos: Position) -> Self {
        Self { node, pos }
    }

    /// Wrap a node without a meaningful position (synthesized nodes, tests)
    pub fn bare(node: T) -> Self {
        Self {
            node,
            pos: Position::default(),
        }
    }
}
