//! phprt Runtime Library
//!
//! Tree-walking evaluator for a PHP-compatible scripting language. Scripts arrive as a
//! JSON-encoded AST produced by an external parser.

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;

pub use ast::{Position, Program};
pub use config::Config;
pub use error::{LoadError, Result};
pub use interp::{Interpreter, PhpError, RunOutcome, Value};
