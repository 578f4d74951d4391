//! Error taxonomy for query compilation and execution.

use thiserror::Error;

use crate::span::Pos;

/// Any failure between receiving a query string and draining its results.
///
/// Analysis-time inconsistencies (`Unbalanced`, `Underrun`) are detected
/// before any operator runs; the remaining variants surface during
/// execution and abort the current pull.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed query source.
    #[error("parse error at offset {}: expected {expected}", .at.offset())]
    Parse { at: Pos, expected: String },

    /// Alternation branches (or a closure/transform body) disagree on
    /// stack shape.
    #[error("unbalanced stack effects: {0}")]
    Unbalanced(String),

    /// An operator would pop or read below the bottom of the stack.
    #[error("stack underrun: {0}")]
    Underrun(String),

    /// An operator was driven with a slot of the wrong variant.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Integer division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The DWARF provider failed; wraps the provider diagnostic.
    #[error("dwarf error: {0}")]
    Dwarf(String),

    /// A predicate reported *fail* (as opposed to a plain *no*).
    #[error("predicate failure: {0}")]
    PredicateFailure(String),
}

impl QueryError {
    /// Helper for the common parse-error shape.
    pub fn parse(at: Pos, expected: impl Into<String>) -> Self {
        QueryError::Parse {
            at,
            expected: expected.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_name_themselves() {
        // The driver greps for these words; keep them lowercase.
        let e = QueryError::Unbalanced("alternation".into());
        assert!(e.to_string().contains("unbalanced"));
        let e = QueryError::Underrun("drop on empty stack".into());
        assert!(e.to_string().contains("underrun"));
    }

    #[test]
    fn parse_error_carries_position() {
        let e = QueryError::parse(Pos::new(7), "closing parenthesis");
        assert_eq!(
            e.to_string(),
            "parse error at offset 7: expected closing parenthesis"
        );
    }
}
