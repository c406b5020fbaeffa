//! Runtime diagnostics for the interpreter

use crate::ast::Position;
use crate::config::{E_DEPRECATED, E_ERROR, E_NOTICE, E_PARSE, E_WARNING};
use std::fmt;

/// Diagnostic raised during evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct PhpError {
    pub level: ErrorLevel,
    pub message: String,
    /// Where the error was raised, filled in by the evaluator when known
    pub pos: Option<Position>,
}

/// Error classes of the guest language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Notice,
    Warning,
    /// Fatal error: aborts the script
    Error,
    Parse,
    Deprecated,
}

impl ErrorLevel {
    /// Bit of the `error_reporting` mask this level is gated by
    pub fn mask(self) -> i64 {
        match self {
            ErrorLevel::Notice => E_NOTICE,
            ErrorLevel::Warning => E_WARNING,
            ErrorLevel::Error => E_ERROR,
            ErrorLevel::Parse => E_PARSE,
            ErrorLevel::Deprecated => E_DEPRECATED,
        }
    }

    /// Whether an error of this level stops evaluation
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorLevel::Error | ErrorLevel::Parse)
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorLevel::Notice => "Notice",
            ErrorLevel::Warning => "Warning",
            ErrorLevel::Error => "Fatal error",
            ErrorLevel::Parse => "Parse error",
            ErrorLevel::Deprecated => "Deprecated",
        }
    }
}

impl PhpError {
    pub fn new(level: ErrorLevel, message: impl Into<String>) -> Self {
        PhpError {
            level,
            message: message.into(),
            pos: None,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(ErrorLevel::Notice, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ErrorLevel::Warning, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorLevel::Error, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorLevel::Parse, message)
    }

    pub fn deprecated(message: impl Into<String>) -> Self {
        Self::new(ErrorLevel::Deprecated, message)
    }

    /// `Uncaught Error: ...`
    pub fn uncaught(message: impl fmt::Display) -> Self {
        Self::fatal(format!("Uncaught Error: {message}"))
    }

    /// `Uncaught TypeError: ...`
    pub fn type_error(message: impl fmt::Display) -> Self {
        Self::fatal(format!("Uncaught TypeError: {message}"))
    }

    /// `Uncaught ArgumentCountError: ...`
    pub fn argument_count(message: impl fmt::Display) -> Self {
        Self::fatal(format!("Uncaught ArgumentCountError: {message}"))
    }

    pub fn division_by_zero() -> Self {
        Self::fatal("Uncaught DivisionByZeroError: Division by zero")
    }

    pub fn modulo_by_zero() -> Self {
        Self::fatal("Uncaught DivisionByZeroError: Modulo by zero")
    }

    pub fn negative_shift() -> Self {
        Self::fatal("Uncaught ArithmeticError: Bit shift by negative number")
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::warning(format!("Undefined variable ${name}"))
    }

    pub fn undefined_function(name: &str) -> Self {
        Self::uncaught(format!("Call to undefined function {name}()"))
    }

    pub fn undefined_constant(name: &str) -> Self {
        Self::uncaught(format!("Undefined constant \"{name}\""))
    }

    pub fn class_not_found(name: &str) -> Self {
        Self::uncaught(format!("Class \"{name}\" not found"))
    }

    pub fn unsupported_operands(left: &str, op: impl fmt::Display, right: &str) -> Self {
        Self::type_error(format!("Unsupported operand types: {left} {op} {right}"))
    }

    pub fn stack_overflow(depth: usize) -> Self {
        Self::fatal(format!(
            "Maximum function nesting level of '{depth}' reached, aborting!"
        ))
    }

    /// Attach a position unless one is already recorded
    pub fn at(mut self, pos: Position) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.level.is_fatal()
    }
}

impl fmt::Display for PhpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level.label(), self.message)
    }
}

impl std::error::Error for PhpError {}

/// Result type for value-level operations
pub type InterpResult<T> = Result<T, PhpError>;

/// Receiver for non-fatal diagnostics raised while a computation keeps going
pub trait ErrorSink {
    fn emit(&mut self, err: PhpError);
}

impl ErrorSink for Vec<PhpError> {
    fn emit(&mut self, err: PhpError) {
        self.push(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Diagnostic construction ----

    #[test]
    fn test_display_prefixes() {
        assert_eq!(PhpError::notice("n").to_string(), "Notice: n");
        assert_eq!(PhpError::warning("w").to_string(), "Warning: w");
        assert_eq!(PhpError::fatal("f").to_string(), "Fatal error: f");
        assert_eq!(PhpError::parse("p").to_string(), "Parse error: p");
        assert_eq!(PhpError::deprecated("d").to_string(), "Deprecated: d");
    }

    #[test]
    fn test_undefined_variable() {
        let err = PhpError::undefined_variable("foo");
        assert_eq!(err.level, ErrorLevel::Warning);
        assert_eq!(err.message, "Undefined variable $foo");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_uncaught_errors_are_fatal() {
        let err = PhpError::undefined_function("nope");
        assert!(err.is_fatal());
        assert_eq!(err.message, "Uncaught Error: Call to undefined function nope()");
        assert_eq!(
            PhpError::division_by_zero().message,
            "Uncaught DivisionByZeroError: Division by zero"
        );
    }

    #[test]
    fn test_at_keeps_first_position() {
        let err = PhpError::warning("w")
            .at(Position::new(3, 1))
            .at(Position::new(9, 9));
        assert_eq!(err.pos, Some(Position::new(3, 1)));
    }

    #[test]
    fn test_masks() {
        assert_eq!(ErrorLevel::Error.mask(), 1);
        assert_eq!(ErrorLevel::Warning.mask(), 2);
        assert_eq!(ErrorLevel::Parse.mask(), 4);
        assert_eq!(ErrorLevel::Notice.mask(), 8);
        assert_eq!(ErrorLevel::Deprecated.mask(), 8192);
    }
}
