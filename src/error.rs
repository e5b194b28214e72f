//! Compile-time error taxonomy.
//!
//! Every error raised by the pipeline carries a source position. Runtime
//! exceptions are not errors in this sense: they are ordinary terms delivered
//! through the exception thunk of the reducer.

use thiserror::Error;

use crate::position::Position;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("{0}: io error: {1}")]
    Io(Position, String),

    #[error("{0}: lexical error: {1}")]
    Lexical(Position, String),

    #[error("{0}: syntactical error: {1}")]
    Syntactical(Position, String),

    #[error("{0}: identification error: {1}")]
    Identification(Position, String),

    #[error("{0}: semantical error: {1}")]
    Semantical(Position, String),

    #[error("{0}: internal error: {1}")]
    Internal(Position, String),
}

impl Error {
    pub fn position(&self) -> &Position {
        match self {
            Error::Io(p, _)
            | Error::Lexical(p, _)
            | Error::Syntactical(p, _)
            | Error::Identification(p, _)
            | Error::Semantical(p, _)
            | Error::Internal(p, _) => p,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Io(_, m)
            | Error::Lexical(_, m)
            | Error::Syntactical(_, m)
            | Error::Identification(_, m)
            | Error::Semantical(_, m)
            | Error::Internal(_, m) => m,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::Identification(Position::new("m.eg", 2, 7), "undeclared 'foo'".to_string());
        assert_eq!(format!("{}", e), "m.eg:2:7: identification error: undeclared 'foo'");
    }
}
