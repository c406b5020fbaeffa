//! Tree-walking runtime for PHP-compatible scripts
//!
//! Values, the coercion and comparison engines, scopes, objects, output buffering and the
//! evaluator that ties them together. Natives are registered into the root scope through
//! the [`native`] contract.

pub mod arith;
pub mod array;
mod call;
pub mod compare;
pub mod convert;
pub mod env;
mod error;
mod eval;
mod expr;
pub mod native;
pub mod object;
pub mod output;
mod request;
pub mod signal;
mod slot;
mod value;

pub use array::{Array, ArrayKey};
pub use env::{EnvRef, Environment};
pub use error::{ErrorLevel, ErrorSink, InterpResult, PhpError};
pub use eval::{Interpreter, RunOutcome};
pub use object::{ExecutionContext, ObjectRef};
pub use output::Output;
pub use request::Request;
pub use signal::ControlSignal;
pub use slot::Slot;
pub use value::{Value, ValueKind};

use crate::ast::Program;
use crate::config::Config;

/// Run a program against a fresh interpreter with an empty request, capturing its output
pub fn execute(program: &Program, config: Config) -> RunOutcome {
    let mut interp = Interpreter::new(config, &Request::empty(&program.file));
    interp.run(program)
}
