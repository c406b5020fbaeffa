//! Host-side errors and diagnostic reporting

use crate::interp::PhpError;
use std::path::Path;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors raised while preparing a run, before any script code executes
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("AST decode error at line {line}, column {column}: {message}")]
    Ast {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl LoadError {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn ast(err: serde_json::Error) -> Self {
        Self::Ast {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Io { message, .. } => message,
            Self::Ast { message, .. } => message,
            Self::Config { message } => message,
        }
    }
}

/// Byte offset of a 1-based line/column in `source`
fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            return offset + column.saturating_sub(1).min(text.len());
        }
        offset += text.len();
    }
    source.len()
}

/// Report a fatal script error with ariadne, pointing at the script source when it is known
pub fn report_fatal(filename: &str, source: &str, error: &PhpError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let start = error
        .pos
        .map(|pos| offset_of(source, pos.line, pos.column))
        .unwrap_or(0);
    let end = (start + 1).min(source.len()).max(start);

    let report = Report::build(ReportKind::Error, (filename, start..end))
        .with_message(error.level.label())
        .with_label(
            Label::new((filename, start..end))
                .with_message(&error.message)
                .with_color(Color::Red),
        )
        .finish();
    if report.eprint((filename, Source::from(source))).is_err() {
        eprintln!("{error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_of() {
        let src = "<?php\necho 1;\necho 2;\n";
        assert_eq!(offset_of(src, 1, 1), 0);
        assert_eq!(offset_of(src, 2, 1), 6);
        assert_eq!(offset_of(src, 3, 6), 19);
        assert_eq!(offset_of(src, 99, 1), src.len());
    }

    #[test]
    fn test_config_error_message() {
        let err = LoadError::config("bad key");
        assert_eq!(err.to_string(), "Config error: bad key");
        assert_eq!(err.message(), "bad key");
    }

    #[test]
    fn test_ast_error_carries_location() {
        let err = serde_json::from_str::<crate::ast::Program>("{ \"stmts\": [ 1 ] }").unwrap_err();
        let err = LoadError::ast(err);
        assert!(matches!(err, LoadError::Ast { line: 1, .. }));
    }
}
