//! Error types.
//!
//! Only true API misuse surfaces as [`ReactiveError`]. Syntax and evaluation
//! failures are recoverable: binders catch them per binding and route them
//! through [`crate::diagnostics`].

use thiserror::Error;

/// Misuse of the reactive API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A signal-only operation was given something that is not a signal.
    #[error("{0} requires a reactive source")]
    InvalidArgument(&'static str),

    /// Attempted to write a computed signal.
    #[error("computed signals are read-only")]
    ComputedIsReadOnly,

    /// Attempted to write a signal created with `Signal::read_only`.
    #[error("cannot set the value of a read-only signal")]
    ReadOnly,
}

/// A parse failure, carrying the character offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at character {offset}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// A failure raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    /// Invalid regular expression or JSON text encountered at runtime.
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// An error raised by a host-provided function.
    #[error("{0}")]
    Thrown(String),

    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown(message.into())
    }
}

/// Umbrella error for callers that mix parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_binding_logs() {
        let err = ReactiveError::InvalidArgument("observe");
        assert_eq!(err.to_string(), "observe requires a reactive source");

        let err = SyntaxError::new("Expected expression", 3);
        assert_eq!(err.to_string(), "Expected expression at character 3");

        let err: Error = EvalError::type_error("x is not a function").into();
        assert_eq!(err.to_string(), "TypeError: x is not a function");
    }
}
