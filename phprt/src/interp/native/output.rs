//! Output control natives

use super::ArgValidator;
use crate::interp::env::{EnvRef, Environment};
use crate::interp::error::{InterpResult, PhpError};
use crate::interp::eval::Interpreter;
use crate::interp::value::Value;

pub(super) fn register(env: &mut Environment) {
    env.register_native("ob_start", native_ob_start);
    env.register_native("ob_get_clean", native_ob_get_clean);
    env.register_native("ob_get_contents", native_ob_get_contents);
    env.register_native("ob_get_flush", native_ob_get_flush);
    env.register_native("ob_get_level", native_ob_get_level);
    env.register_native("ob_get_length", native_ob_get_length);
    env.register_native("ob_end_clean", native_ob_end_clean);
    env.register_native("ob_end_flush", native_ob_end_flush);
    env.register_native("ob_clean", native_ob_clean);
    env.register_native("ob_flush", native_ob_flush);
    env.register_native("flush", native_flush);
}

fn no_args(name: &'static str, args: &[Value]) -> InterpResult<()> {
    ArgValidator::new(name).validate(args).map(|_| ())
}

/// Report a failed buffer operation and return `false`
fn failed(interp: &mut Interpreter, message: &str) -> InterpResult<Value> {
    interp.print_error(&PhpError::notice(message));
    Ok(Value::Bool(false))
}

fn native_ob_start(interp: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    no_args("ob_start", args)?;
    interp.output.start();
    tracing::trace!(level = interp.output.level(), "output buffer started");
    Ok(Value::Bool(true))
}

fn native_ob_get_clean(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_get_clean", args)?;
    Ok(interp
        .output
        .end_clean()
        .map_or(Value::Bool(false), Value::Str))
}

fn native_ob_get_contents(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_get_contents", args)?;
    Ok(interp
        .output
        .contents()
        .map_or(Value::Bool(false), |bytes| Value::Str(bytes.to_vec())))
}

fn native_ob_get_flush(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_get_flush", args)?;
    match interp.output.end_flush() {
        Some(bytes) => Ok(Value::Str(bytes)),
        None => failed(
            interp,
            "ob_get_flush(): Failed to delete and flush buffer. No buffer to delete or flush",
        ),
    }
}

fn native_ob_get_level(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_get_level", args)?;
    Ok(Value::Int(interp.output.level() as i64))
}

fn native_ob_get_length(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_get_length", args)?;
    Ok(interp
        .output
        .contents()
        .map_or(Value::Bool(false), |bytes| Value::Int(bytes.len() as i64)))
}

fn native_ob_end_clean(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_end_clean", args)?;
    match interp.output.end_clean() {
        Some(_) => Ok(Value::Bool(true)),
        None => failed(interp, "ob_end_clean(): Failed to delete buffer. No buffer to delete"),
    }
}

fn native_ob_end_flush(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    no_args("ob_end_flush", args)?;
    match interp.output.end_flush() {
        Some(_) => Ok(Value::Bool(true)),
        None => failed(
            interp,
            "ob_end_flush(): Failed to delete and flush buffer. No buffer to delete or flush",
        ),
    }
}

fn native_ob_clean(interp: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    no_args("ob_clean", args)?;
    if interp.output.clean() {
        Ok(Value::Bool(true))
    } else {
        failed(interp, "ob_clean(): Failed to delete buffer. No buffer to delete")
    }
}

fn native_ob_flush(interp: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    no_args("ob_flush", args)?;
    if interp.output.flush_top() {
        Ok(Value::Bool(true))
    } else {
        failed(interp, "ob_flush(): Failed to flush buffer. No buffer to flush")
    }
}

fn native_flush(interp: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    no_args("flush", args)?;
    interp.output.flush_stream();
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> (Interpreter, EnvRef) {
        let interp = Interpreter::default();
        let env = interp.global_env().clone();
        (interp, env)
    }

    fn text(interp: &mut Interpreter) -> String {
        String::from_utf8(interp.output.take_captured()).unwrap()
    }

    // ---- Buffer stack ----

    #[test]
    fn test_get_clean_returns_and_drops_buffer() {
        let (mut interp, env) = interp();
        native_ob_start(&mut interp, &env, &[]).unwrap();
        interp.print(b"hi");
        assert_eq!(native_ob_get_level(&mut interp, &env, &[]).unwrap(), Value::Int(1));
        assert_eq!(
            native_ob_get_clean(&mut interp, &env, &[]).unwrap(),
            Value::str("hi")
        );
        assert_eq!(native_ob_get_level(&mut interp, &env, &[]).unwrap(), Value::Int(0));
        assert_eq!(text(&mut interp), "");
    }

    #[test]
    fn test_nested_buffers_flush_downwards() {
        let (mut interp, env) = interp();
        native_ob_start(&mut interp, &env, &[]).unwrap();
        interp.print(b"a");
        native_ob_start(&mut interp, &env, &[]).unwrap();
        interp.print(b"b");
        assert_eq!(native_ob_get_length(&mut interp, &env, &[]).unwrap(), Value::Int(1));
        assert_eq!(
            native_ob_end_flush(&mut interp, &env, &[]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            native_ob_get_contents(&mut interp, &env, &[]).unwrap(),
            Value::str("ab")
        );
        assert_eq!(text(&mut interp), "");
        assert_eq!(
            native_ob_get_flush(&mut interp, &env, &[]).unwrap(),
            Value::str("ab")
        );
        assert_eq!(text(&mut interp), "ab");
    }

    #[test]
    fn test_clean_and_flush_keep_the_level() {
        let (mut interp, env) = interp();
        native_ob_start(&mut interp, &env, &[]).unwrap();
        interp.print(b"x");
        native_ob_clean(&mut interp, &env, &[]).unwrap();
        assert_eq!(
            native_ob_get_contents(&mut interp, &env, &[]).unwrap(),
            Value::str("")
        );
        interp.print(b"y");
        native_ob_flush(&mut interp, &env, &[]).unwrap();
        assert_eq!(native_ob_get_level(&mut interp, &env, &[]).unwrap(), Value::Int(1));
        assert_eq!(text(&mut interp), "y");
    }

    #[test]
    fn test_open_buffers_flushed_at_shutdown() {
        let (mut interp, env) = interp();
        native_ob_start(&mut interp, &env, &[]).unwrap();
        native_ob_start(&mut interp, &env, &[]).unwrap();
        interp.print(b"inner");
        interp.output.flush_all();
        assert_eq!(interp.output.level(), 0);
        assert_eq!(text(&mut interp), "inner");
    }

    // ---- Failures ----

    #[test]
    fn test_no_buffer_reports_notice() {
        let (mut interp, env) = interp();
        assert_eq!(
            native_ob_end_clean(&mut interp, &env, &[]).unwrap(),
            Value::Bool(false)
        );
        assert!(text(&mut interp)
            .contains("Notice: ob_end_clean(): Failed to delete buffer. No buffer to delete"));

        assert_eq!(
            native_ob_get_clean(&mut interp, &env, &[]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            native_ob_get_contents(&mut interp, &env, &[]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(text(&mut interp), "");
    }

    #[test]
    fn test_rejects_arguments() {
        let (mut interp, env) = interp();
        let err = native_ob_start(&mut interp, &env, &[Value::Int(1)]).unwrap_err();
        assert_eq!(
            err.message,
            "Uncaught ArgumentCountError: ob_start() expects exactly 0 arguments, 1 given"
        );
    }
}
