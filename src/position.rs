//! Source positions attached to tokens, AST nodes, and errors.

use std::fmt;

/// A position in a source resource: resource name, row, and column.
///
/// Rows and columns are 1-based; position `0:0` denotes an internal or
/// unknown location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    resource: String,
    row: u32,
    col: u32,
}

impl Position {
    pub fn new(resource: impl Into<String>, row: u32, col: u32) -> Self {
        Position {
            resource: resource.into(),
            row,
            col,
        }
    }

    /// An internal position, used for generated code and builtin modules.
    pub fn internal() -> Self {
        Position::new("internal", 0, 0)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn col(&self) -> u32 {
        self.col
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::internal()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.resource, self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        let p = Position::new("test.eg", 3, 14);
        assert_eq!(format!("{}", p), "test.eg:3:14");
    }

    #[test]
    fn test_internal_position() {
        let p = Position::internal();
        assert_eq!(p.resource(), "internal");
        assert_eq!(p.row(), 0);
    }
}
