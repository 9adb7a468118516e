//! Error types and handling for the exprc crate.
//!
//! This module defines the error types used throughout the crate for expression parsing,
//! compilation and evaluation. Errors that originate in the expression text carry the
//! 0-based byte offset of the offending token; the end of input is reported as the length
//! of the text.

use alloc::string::String;
use core::fmt;

/// Result type used throughout the crate.
///
/// This is a convenience type alias that uses the `ExprError` type for the error variant.
pub type Result<T> = core::result::Result<T, ExprError>;

/// Misuse of the variable binding protocol or of a disposed expression.
///
/// State errors are not tied to a position in the expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// `update`, `increment` or `decrement` was called on a variable that is not bound
    /// to a live compiled expression.
    Unbound,
    /// The variable is already bound to a live compiled expression.
    AlreadyBound,
    /// The compiled expression has been closed.
    Disposed,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Unbound => write!(f, "variable is not bound to an expression"),
            StateError::AlreadyBound => write!(f, "variable is already bound to an expression"),
            StateError::Disposed => write!(f, "expression has been disposed"),
        }
    }
}

/// Error type for expression parsing, compilation and evaluation.
///
/// This enum represents all possible errors that can occur while tokenizing, parsing,
/// binding and evaluating an expression. Parse-time variants carry a `position`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    /// Error during lexical analysis (tokenization).
    ///
    /// Raised for characters outside the expression alphabet and for malformed
    /// number literals such as `1e` or `2e+`.
    Lexical { position: usize, message: String },

    /// Error during syntax analysis.
    ///
    /// This occurs when the parser encounters an unexpected token, a missing closing
    /// parenthesis, trailing input after a complete expression, or input that exceeds
    /// the configured maximum length.
    Syntax { position: usize, message: String },

    /// An identifier that is neither a caller binding nor a built-in.
    UnknownSymbol { position: usize, name: String },

    /// A function was called with the wrong number of arguments.
    ///
    /// The position is the offset of the call's opening parenthesis.
    ArityMismatch {
        /// Offset of the `(` of the call
        position: usize,
        /// Name of the function that was called
        name: String,
        /// Declared arity of the function
        expected: usize,
        /// Number of arguments found at the call site
        found: usize,
    },

    /// The expression nests deeper than the configured limit.
    RecursionLimit { position: usize, limit: usize },

    /// A binding could not be registered (empty, malformed, too long or duplicate name).
    InvalidBinding { name: String, reason: &'static str },

    /// A host function was declared with more parameters than supported.
    InvalidArity { arity: usize, max: usize },

    /// Misuse of a variable or of a disposed expression.
    State(StateError),

    /// A host function reported a failure during evaluation.
    Evaluation { name: String, message: String },

    /// Error when capacity is exceeded for a heapless container.
    ///
    /// The string indicates which container exceeded its capacity.
    CapacityExceeded(&'static str),

    /// Error when a name is too long for the heapless string buffer.
    StringTooLong,

    /// General-purpose error for any other error conditions.
    Other(String),
}

impl ExprError {
    /// Byte offset in the expression text, for errors that originate there.
    pub fn position(&self) -> Option<usize> {
        match self {
            ExprError::Lexical { position, .. }
            | ExprError::Syntax { position, .. }
            | ExprError::UnknownSymbol { position, .. }
            | ExprError::ArityMismatch { position, .. }
            | ExprError::RecursionLimit { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Whether this error was raised while parsing the expression text.
    pub fn is_parse_error(&self) -> bool {
        self.position().is_some()
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::Lexical { position, message } => {
                write!(f, "Lexical error at position {}: {}", position, message)
            }
            ExprError::Syntax { position, message } => {
                write!(f, "Syntax error at position {}: {}", position, message)
            }
            ExprError::UnknownSymbol { position, name } => {
                write!(f, "Unknown symbol '{}' at position {}", name, position)
            }
            ExprError::ArityMismatch {
                position,
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Invalid call to '{}' at position {}: expected {} arguments, found {}",
                    name, position, expected, found
                )
            }
            ExprError::RecursionLimit { position, limit } => {
                write!(
                    f,
                    "Recursion limit exceeded at position {}: nesting deeper than {}",
                    position, limit
                )
            }
            ExprError::InvalidBinding { name, reason } => {
                write!(f, "Invalid binding '{}': {}", name, reason)
            }
            ExprError::InvalidArity { arity, max } => {
                write!(f, "Invalid function arity {}: at most {} arguments are supported", arity, max)
            }
            ExprError::State(err) => write!(f, "State error: {}", err),
            ExprError::Evaluation { name, message } => {
                write!(f, "Evaluation of '{}' failed: {}", name, message)
            }
            ExprError::CapacityExceeded(container_type) => {
                write!(f, "Capacity exceeded for {}", container_type)
            }
            ExprError::StringTooLong => write!(f, "String too long for heapless buffer"),
            ExprError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl core::error::Error for ExprError {}

impl From<StateError> for ExprError {
    fn from(err: StateError) -> ExprError {
        ExprError::State(err)
    }
}

impl From<String> for ExprError {
    fn from(err: String) -> ExprError {
        ExprError::Other(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_position_is_reported_for_parse_errors_only() {
        let syntax = ExprError::Syntax {
            position: 4,
            message: "unexpected end of input".to_string(),
        };
        assert_eq!(syntax.position(), Some(4));
        assert!(syntax.is_parse_error());

        let arity = ExprError::ArityMismatch {
            position: 1,
            name: "f".to_string(),
            expected: 3,
            found: 2,
        };
        assert_eq!(arity.position(), Some(1));

        let state = ExprError::from(StateError::Unbound);
        assert_eq!(state.position(), None);
        assert!(!state.is_parse_error());
    }

    #[test]
    fn test_display_messages() {
        let err = ExprError::UnknownSymbol {
            position: 2,
            name: "y".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown symbol 'y' at position 2");

        let err = ExprError::ArityMismatch {
            position: 1,
            name: "f".to_string(),
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Invalid call to 'f' at position 1: expected 3 arguments, found 2"
        );

        let err = ExprError::State(StateError::AlreadyBound);
        assert_eq!(
            err.to_string(),
            "State error: variable is already bound to an expression"
        );
    }
}
