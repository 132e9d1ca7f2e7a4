//! Core error types.

use thiserror::Error;

/// Errors raised while parsing or evaluating a cost template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// The template text is empty.
    #[error("Template is empty")]
    Empty,

    /// The template text exceeds the length limit.
    #[error("Template is {len} bytes, limit is {max}")]
    TooLong {
        /// Length of the template text.
        len: usize,
        /// Allowed length.
        max: usize,
    },

    /// Unexpected character in the expression.
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset in the expression.
        pos: usize,
    },

    /// The expression ended early or has trailing tokens.
    #[error("Malformed expression: {0}")]
    Syntax(String),

    /// Reference to a variable that is not provided.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Call to a function that is not supported.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// The expression evaluated to NaN or infinity.
    #[error("Template did not evaluate to a finite number")]
    NotNumeric,
}
