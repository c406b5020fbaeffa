//! Array natives

use super::ArgValidator;
use crate::interp::array::{Array, ArrayKey};
use crate::interp::compare::{identical, loose_equals};
use crate::interp::convert::to_bool;
use crate::interp::env::{EnvRef, Environment};
use crate::interp::error::{InterpResult, PhpError};
use crate::interp::eval::Interpreter;
use crate::interp::value::Value;

const COUNT_RECURSIVE: i64 = 1;

pub(super) fn register(env: &mut Environment) {
    env.register_native("array_key_exists", native_array_key_exists);
    env.register_native("key_exists", native_array_key_exists);
    env.register_native("count", native_count);
    env.register_native("sizeof", native_count);
    env.register_native("array_keys", native_array_keys);
    env.register_native("array_values", native_array_values);
    env.register_native("in_array", native_in_array);
    env.register_native("array_key_first", native_array_key_first);
    env.register_native("array_key_last", native_array_key_last);
}

/// Borrow an argument already validated as `array`
fn array_arg<'a>(function: &str, value: &'a Value) -> InterpResult<&'a Array> {
    value.as_array().ok_or_else(|| {
        PhpError::type_error(format!(
            "{function}(): Argument must be of type array, {} given",
            value.type_name()
        ))
    })
}

fn native_array_key_exists(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("array_key_exists")
        .param("key", "string|int|float|bool|null")
        .param("array", "array")
        .validate(args)?;
    let key = ArrayKey::from_value(&args[0])?;
    Ok(Value::Bool(array_arg("array_key_exists", &args[1])?.contains_key(&key)))
}

fn count_recursive(arr: &Array) -> i64 {
    arr.values()
        .map(|v| match &*v {
            Value::Array(inner) => 1 + count_recursive(inner),
            _ => 1,
        })
        .sum()
}

fn native_count(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("count")
        .param("value", "mixed")
        .optional("mode", "int", Value::Int(0))
        .validate(args)?;
    let Value::Array(arr) = &args[0] else {
        return Err(PhpError::type_error(format!(
            "count(): Argument #1 ($value) must be of type Countable|array, {} given",
            args[0].type_name()
        )));
    };
    let n = if args[1].as_int() == Some(COUNT_RECURSIVE) {
        count_recursive(arr)
    } else {
        arr.len() as i64
    };
    Ok(Value::Int(n))
}

fn native_array_keys(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let filtered = args.len() > 1;
    let args = ArgValidator::new("array_keys")
        .param("array", "array")
        .optional("filter_value", "mixed", Value::Null)
        .optional("strict", "bool", Value::Bool(false))
        .validate(args)?;
    let strict = to_bool(&args[2]);
    let keys = array_arg("array_keys", &args[0])?
        .iter()
        .filter(|(_, v)| {
            !filtered
                || if strict {
                    identical(v, &args[1])
                } else {
                    loose_equals(v, &args[1])
                }
        })
        .map(|(k, _)| k.to_value());
    Ok(Value::Array(Array::from_values(keys)))
}

fn native_array_values(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("array_values")
        .param("array", "array")
        .validate(args)?;
    Ok(Value::Array(Array::from_values(
        array_arg("array_values", &args[0])?.values().map(|v| v.clone()),
    )))
}

fn native_in_array(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("in_array")
        .param("needle", "mixed")
        .param("haystack", "array")
        .optional("strict", "bool", Value::Bool(false))
        .validate(args)?;
    let strict = to_bool(&args[2]);
    let found = array_arg("in_array", &args[1])?.values().any(|v| {
        if strict {
            identical(&v, &args[0])
        } else {
            loose_equals(&v, &args[0])
        }
    });
    Ok(Value::Bool(found))
}

fn native_array_key_first(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("array_key_first")
        .param("array", "array")
        .validate(args)?;
    Ok(array_arg("array_key_first", &args[0])?
        .first_key()
        .map_or(Value::Null, ArrayKey::to_value))
}

fn native_array_key_last(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("array_key_last")
        .param("array", "array")
        .validate(args)?;
    Ok(array_arg("array_key_last", &args[0])?
        .last_key()
        .map_or(Value::Null, ArrayKey::to_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_recursive() {
        let inner = Array::from_values(vec![Value::Int(1), Value::Int(2)]);
        let outer = Array::from_values(vec![Value::Array(inner), Value::Int(3)]);
        assert_eq!(count_recursive(&outer), 4);
    }
}
