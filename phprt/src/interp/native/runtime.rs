//! Runtime natives: error reporting, ini settings, constants, functions and classes

use super::ArgValidator;
use crate::config::IniLevel;
use crate::interp::convert::{to_bool, to_string_lossy};
use crate::interp::env::{EnvRef, Environment};
use crate::interp::error::{InterpResult, PhpError};
use crate::interp::eval::Interpreter;
use crate::interp::value::Value;

pub(super) fn register(env: &mut Environment) {
    env.register_native("error_reporting", native_error_reporting);
    env.register_native("ini_get", native_ini_get);
    env.register_native("ini_set", native_ini_set);
    env.register_native("define", native_define);
    env.register_native("defined", native_defined);
    env.register_native("constant", native_constant);
    env.register_native("function_exists", native_function_exists);
    env.register_native("get_class", native_get_class);
    env.register_native("class_exists", native_class_exists);
    env.register_native("interface_exists", native_interface_exists);
    env.register_native("method_exists", native_method_exists);
    env.register_native("property_exists", native_property_exists);
    env.register_native("strlen", native_strlen);
}

fn text(value: &Value) -> InterpResult<String> {
    to_string_lossy(value)
}

// ---- Error reporting and ini ----

fn native_error_reporting(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("error_reporting")
        .optional("error_level", "int|null", Value::Null)
        .validate(args)?;
    let old = interp.config.error_reporting;
    if let Value::Int(level) = args[0] {
        interp.config.error_reporting = level;
    }
    Ok(Value::Int(old))
}

fn native_ini_get(interp: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("ini_get")
        .param("option", "string")
        .validate(args)?;
    Ok(interp
        .config
        .get(&text(&args[0])?)
        .map_or(Value::Bool(false), |v| Value::Str(v.into_bytes())))
}

fn native_ini_set(interp: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("ini_set")
        .param("option", "string")
        .param("value", "string|int|float|bool|null")
        .validate(args)?;
    let name = text(&args[0])?;
    let value = text(&args[1])?;
    match interp.config.set(&name, &value, IniLevel::User) {
        Ok(old) => Ok(Value::Str(old.into_bytes())),
        Err(e) => {
            tracing::debug!(option = %name, error = %e, "ini_set rejected");
            Ok(Value::Bool(false))
        }
    }
}

// ---- Constants and functions ----

fn native_define(interp: &mut Interpreter, env: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("define")
        .param("constant_name", "string")
        .param("value", "mixed")
        .optional("case_insensitive", "bool", Value::Bool(false))
        .validate(args)?;
    if to_bool(&args[2]) {
        interp.print_error(&PhpError::warning(
            "define(): Argument #3 ($case_insensitive) is ignored since declaration of \
             case-insensitive constants is no longer supported",
        ));
    }
    let name = text(&args[0])?;
    let declared = env.borrow_mut().declare_constant(&name, args[1].clone());
    match declared {
        Ok(()) => Ok(Value::Bool(true)),
        Err(warning) => {
            interp.print_error(&warning);
            Ok(Value::Bool(false))
        }
    }
}

fn native_defined(_: &mut Interpreter, env: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("defined")
        .param("constant_name", "string")
        .validate(args)?;
    Ok(Value::Bool(env.borrow().constant_defined(&text(&args[0])?)))
}

fn native_constant(_: &mut Interpreter, env: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("constant")
        .param("name", "string")
        .validate(args)?;
    env.borrow().lookup_constant(&text(&args[0])?)
}

fn native_function_exists(
    _: &mut Interpreter,
    env: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("function_exists")
        .param("function", "string")
        .validate(args)?;
    Ok(Value::Bool(env.borrow().function_exists(&text(&args[0])?)))
}

// ---- Classes ----

fn native_get_class(_: &mut Interpreter, env: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("get_class")
        .optional("object", "object", Value::Void)
        .validate(args)?;
    match &args[0] {
        Value::Object(obj) => Ok(Value::Str(obj.class_name().into_bytes())),
        _ => match &env.borrow().frame.class {
            Some(class) => Ok(Value::Str(class.name.clone().into_bytes())),
            None => Err(PhpError::uncaught(
                "get_class() without arguments must be called from within a class",
            )),
        },
    }
}

fn native_class_exists(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("class_exists")
        .param("class", "string")
        .optional("autoload", "bool", Value::Bool(true))
        .validate(args)?;
    Ok(Value::Bool(interp.ctx.get_class(&text(&args[0])?).is_some()))
}

fn native_interface_exists(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("interface_exists")
        .param("interface", "string")
        .optional("autoload", "bool", Value::Bool(true))
        .validate(args)?;
    Ok(Value::Bool(
        interp.ctx.get_interface(&text(&args[0])?).is_some(),
    ))
}

fn native_method_exists(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("method_exists")
        .param("object_or_class", "object|string")
        .param("method", "string")
        .validate(args)?;
    let class = match &args[0] {
        Value::Object(obj) => Some(obj.class()),
        other => interp.ctx.get_class(&text(other)?),
    };
    let Some(class) = class else {
        return Ok(Value::Bool(false));
    };
    let method = text(&args[1])?;
    let found = interp
        .ctx
        .class_chain(&class)?
        .iter()
        .any(|c| c.method(&method).is_some());
    Ok(Value::Bool(found))
}

fn native_property_exists(
    interp: &mut Interpreter,
    _: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("property_exists")
        .param("object_or_class", "object|string")
        .param("property", "string")
        .validate(args)?;
    let property = text(&args[1])?;
    let class = match &args[0] {
        Value::Object(obj) => {
            if obj.has_property(&property) {
                return Ok(Value::Bool(true));
            }
            Some(obj.class())
        }
        other => interp.ctx.get_class(&text(other)?),
    };
    let Some(class) = class else {
        return Ok(Value::Bool(false));
    };
    let declared = interp
        .ctx
        .class_chain(&class)?
        .iter()
        .any(|c| c.properties.iter().any(|p| p.name == property));
    Ok(Value::Bool(declared))
}

// ---- Strings ----

fn native_strlen(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("strlen")
        .param("string", "string")
        .validate(args)?;
    let len = args[0].as_bytes().map_or(0, <[u8]>::len);
    Ok(Value::Int(len as i64))
}
