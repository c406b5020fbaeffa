//! Native functions and the argument-validation contract

mod arrays;
mod output;
mod runtime;
mod variables;

pub use variables::{print_r, var_dump, var_export};

use super::convert::{Numeric, parse_numeric, to_bool, to_str};
use super::env::{EnvRef, Environment};
use super::error::{InterpResult, PhpError};
use super::eval::Interpreter;
use super::value::Value;

/// Native function type: receives the interpreter, the calling scope and validated-by-callee
/// arguments
pub type NativeFn = fn(&mut Interpreter, &EnvRef, &[Value]) -> InterpResult<Value>;

/// Register every native function into the root environment
pub fn register_natives(env: &mut Environment) {
    variables::register(env);
    arrays::register(env);
    output::register(env);
    runtime::register(env);
}

#[derive(Debug, Clone)]
struct ParamSpec {
    name: &'static str,
    /// `|`-separated accepted types: `int`, `float`, `string`, `bool`, `array`, `object`,
    /// `null`, `mixed`
    types: &'static str,
    default: Option<Value>,
}

/// Builder describing a native function's parameters.
///
/// `validate` checks arity, applies the coercive typing of internal functions and fills in
/// defaults, so natives can index the returned vector directly.
#[derive(Debug, Clone)]
pub struct ArgValidator {
    function: &'static str,
    params: Vec<ParamSpec>,
    variadic: Option<ParamSpec>,
}

fn arguments(n: usize) -> &'static str {
    if n == 1 { "argument" } else { "arguments" }
}

impl ArgValidator {
    pub fn new(function: &'static str) -> Self {
        ArgValidator {
            function,
            params: Vec::new(),
            variadic: None,
        }
    }

    /// Required parameter
    pub fn param(mut self, name: &'static str, types: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            types,
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, types: &'static str, default: Value) -> Self {
        self.params.push(ParamSpec {
            name,
            types,
            default: Some(default),
        });
        self
    }

    /// Trailing parameter collecting the remaining arguments
    pub fn variadic(mut self, name: &'static str, types: &'static str) -> Self {
        self.variadic = Some(ParamSpec {
            name,
            types,
            default: None,
        });
        self
    }

    fn required(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn validate(&self, args: &[Value]) -> InterpResult<Vec<Value>> {
        let required = self.required();
        let max = self.params.len();
        let fixed = required == max && self.variadic.is_none();

        if args.len() < required {
            let bound = if fixed { "exactly" } else { "at least" };
            return Err(PhpError::argument_count(format!(
                "{}() expects {bound} {required} {}, {} given",
                self.function,
                arguments(required),
                args.len()
            )));
        }
        if self.variadic.is_none() && args.len() > max {
            let bound = if fixed { "exactly" } else { "at most" };
            return Err(PhpError::argument_count(format!(
                "{}() expects {bound} {max} {}, {} given",
                self.function,
                arguments(max),
                args.len()
            )));
        }

        let mut out = Vec::with_capacity(args.len().max(max));
        for (i, spec) in self.params.iter().enumerate() {
            match args.get(i) {
                Some(arg) => out.push(self.check(i, spec, arg)?),
                None => out.push(spec.default.clone().unwrap_or_default()),
            }
        }
        if let Some(spec) = &self.variadic {
            for (i, arg) in args.iter().enumerate().skip(max) {
                out.push(self.check(i, spec, arg)?);
            }
        }
        Ok(out)
    }

    fn check(&self, index: usize, spec: &ParamSpec, arg: &Value) -> InterpResult<Value> {
        coerce_arg(arg, spec.types).ok_or_else(|| {
            PhpError::type_error(format!(
                "{}(): Argument #{} (${}) must be of type {}, {} given",
                self.function,
                index + 1,
                spec.name,
                spec.types,
                arg.type_name()
            ))
        })
    }
}

fn matches_exactly(value: &Value, ty: &str) -> bool {
    matches!(
        (ty, value),
        ("mixed", _)
            | ("null", Value::Null | Value::Void)
            | ("bool", Value::Bool(_))
            | ("int", Value::Int(_))
            | ("float", Value::Float(_))
            | ("string", Value::Str(_))
            | ("array", Value::Array(_))
            | ("object", Value::Object(_))
    )
}

/// Coercive scalar conversion used for internal function parameters
fn coerce_scalar(value: &Value, ty: &str) -> Option<Value> {
    match (ty, value) {
        (_, Value::Array(_) | Value::Object(_)) => None,
        ("int", Value::Float(x)) if x.is_finite() && x.fract() == 0.0 => {
            Some(Value::Int(*x as i64))
        }
        ("int", Value::Bool(b)) => Some(Value::Int(i64::from(*b))),
        ("int", Value::Null | Value::Void) => Some(Value::Int(0)),
        ("int", Value::Str(s)) => match parse_numeric(s) {
            Numeric::Whole(n) => match n.to_value() {
                Value::Float(x) if x.fract() != 0.0 || !x.is_finite() => None,
                Value::Float(x) => Some(Value::Int(x as i64)),
                other => Some(other),
            },
            _ => None,
        },
        ("float", Value::Int(n)) => Some(Value::Float(*n as f64)),
        ("float", Value::Bool(b)) => Some(Value::Float(f64::from(u8::from(*b)))),
        ("float", Value::Null | Value::Void) => Some(Value::Float(0.0)),
        ("float", Value::Str(s)) => parse_numeric(s)
            .whole()
            .map(|n| Value::Float(n.as_f64())),
        ("string", other) => to_str(other).ok().map(Value::Str),
        ("bool", other) => Some(Value::Bool(to_bool(other))),
        _ => None,
    }
}

fn coerce_arg(value: &Value, types: &str) -> Option<Value> {
    if types.split('|').any(|ty| matches_exactly(value, ty)) {
        return Some(value.clone());
    }
    types.split('|').find_map(|ty| coerce_scalar(value, ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Arity ----

    #[test]
    fn test_exact_arity_messages() {
        let v = ArgValidator::new("strlen").param("string", "string");
        assert_eq!(
            v.validate(&[]).unwrap_err().message,
            "Uncaught ArgumentCountError: strlen() expects exactly 1 argument, 0 given"
        );
        assert_eq!(
            v.validate(&[Value::str("a"), Value::str("b")]).unwrap_err().message,
            "Uncaught ArgumentCountError: strlen() expects exactly 1 argument, 2 given"
        );
    }

    #[test]
    fn test_optional_and_variadic_arity() {
        let v = ArgValidator::new("print_r")
            .param("value", "mixed")
            .optional("return", "bool", Value::Bool(false));
        assert_eq!(
            v.validate(&[Value::Int(1)]).unwrap(),
            vec![Value::Int(1), Value::Bool(false)]
        );
        assert_eq!(
            v.validate(&[Value::Int(1), Value::Int(1), Value::Int(1)])
                .unwrap_err()
                .message,
            "Uncaught ArgumentCountError: print_r() expects at most 2 arguments, 3 given"
        );

        let dump = ArgValidator::new("var_dump")
            .param("value", "mixed")
            .variadic("values", "mixed");
        assert_eq!(dump.validate(&vec![Value::Null; 4]).unwrap().len(), 4);
        assert_eq!(
            dump.validate(&[]).unwrap_err().message,
            "Uncaught ArgumentCountError: var_dump() expects at least 1 argument, 0 given"
        );
    }

    // ---- Types ----

    #[test]
    fn test_coercive_scalars() {
        let v = ArgValidator::new("f").param("n", "int");
        assert_eq!(v.validate(&[Value::str("42")]).unwrap(), vec![Value::Int(42)]);
        assert_eq!(v.validate(&[Value::Float(3.0)]).unwrap(), vec![Value::Int(3)]);
        assert_eq!(v.validate(&[Value::Bool(true)]).unwrap(), vec![Value::Int(1)]);
        let err = v.validate(&[Value::str("abc")]).unwrap_err();
        assert_eq!(
            err.message,
            "Uncaught TypeError: f(): Argument #1 ($n) must be of type int, string given"
        );

        let s = ArgValidator::new("g").param("s", "string");
        assert_eq!(s.validate(&[Value::Int(7)]).unwrap(), vec![Value::str("7")]);
        assert!(s.validate(&[Value::Array(Default::default())]).is_err());
    }

    #[test]
    fn test_union_prefers_exact_match() {
        let v = ArgValidator::new("f").param("v", "array|string");
        assert_eq!(v.validate(&[Value::str("x")]).unwrap(), vec![Value::str("x")]);
        assert_eq!(v.validate(&[Value::Int(5)]).unwrap(), vec![Value::str("5")]);
    }
}
