//! Variable handling: dumps, type inspection and scalar conversion

use super::ArgValidator;
use crate::ast::Visibility;
use crate::interp::array::{Array, ArrayKey};
use crate::interp::convert::{format_float, is_numeric_str, to_bool, to_float, to_int, to_str};
use crate::interp::env::{EnvRef, Environment};
use crate::interp::error::{InterpResult, PhpError};
use crate::interp::eval::Interpreter;
use crate::interp::object::PropertyView;
use crate::interp::value::Value;

pub(super) fn register(env: &mut Environment) {
    env.register_native("var_dump", native_var_dump);
    env.register_native("print_r", native_print_r);
    env.register_native("var_export", native_var_export);
    env.register_native("gettype", native_gettype);
    env.register_native("get_debug_type", native_get_debug_type);
    env.register_native("intval", native_intval);
    env.register_native("floatval", native_floatval);
    env.register_native("doubleval", native_floatval);
    env.register_native("strval", native_strval);
    env.register_native("boolval", native_boolval);
    env.register_native("is_array", native_is_array);
    env.register_native("is_bool", native_is_bool);
    env.register_native("is_float", native_is_float);
    env.register_native("is_double", native_is_float);
    env.register_native("is_int", native_is_int);
    env.register_native("is_integer", native_is_int);
    env.register_native("is_long", native_is_int);
    env.register_native("is_null", native_is_null);
    env.register_native("is_numeric", native_is_numeric);
    env.register_native("is_object", native_is_object);
    env.register_native("is_scalar", native_is_scalar);
    env.register_native("is_string", native_is_string);
}

// ============ Dump formats ============

fn spaces(out: &mut Vec<u8>, n: usize) {
    out.extend(std::iter::repeat_n(b' ', n));
}

fn dump_key(out: &mut Vec<u8>, key: &ArrayKey) {
    match key {
        ArrayKey::Int(n) => out.extend_from_slice(format!("[{n}]=>\n").as_bytes()),
        ArrayKey::Str(s) => {
            out.extend_from_slice(b"[\"");
            out.extend_from_slice(s);
            out.extend_from_slice(b"\"]=>\n");
        }
    }
}

fn dump_property_name(out: &mut Vec<u8>, prop: &PropertyView) {
    let name = match prop.visibility {
        Visibility::Public => format!("[\"{}\"]=>\n", prop.name),
        Visibility::Protected => format!("[\"{}\":protected]=>\n", prop.name),
        Visibility::Private => format!("[\"{}\":\"{}\":private]=>\n", prop.name, prop.class),
    };
    out.extend_from_slice(name.as_bytes());
}

fn var_dump_at(out: &mut Vec<u8>, value: &Value, level: usize, seen: &mut Vec<usize>) {
    if level > 1 {
        spaces(out, level - 1);
    }
    match value {
        Value::Void | Value::Null => out.extend_from_slice(b"NULL\n"),
        Value::Bool(b) => out.extend_from_slice(format!("bool({b})\n").as_bytes()),
        Value::Int(n) => out.extend_from_slice(format!("int({n})\n").as_bytes()),
        Value::Float(x) => {
            out.extend_from_slice(format!("float({})\n", format_float(*x)).as_bytes())
        }
        Value::Str(s) => {
            out.extend_from_slice(format!("string({}) \"", s.len()).as_bytes());
            out.extend_from_slice(s);
            out.extend_from_slice(b"\"\n");
        }
        Value::Array(arr) => {
            out.extend_from_slice(format!("array({}) {{\n", arr.len()).as_bytes());
            for (key, item) in arr.iter() {
                spaces(out, level + 1);
                dump_key(out, key);
                var_dump_at(out, &item, level + 2, seen);
            }
            if level > 1 {
                spaces(out, level - 1);
            }
            out.extend_from_slice(b"}\n");
        }
        Value::Object(obj) => {
            if seen.contains(&obj.id()) {
                out.extend_from_slice(b"*RECURSION*\n");
                return;
            }
            let props = obj.property_views();
            out.extend_from_slice(
                format!("object({})#{} ({}) {{\n", obj.class_name(), obj.id(), props.len())
                    .as_bytes(),
            );
            seen.push(obj.id());
            for prop in &props {
                spaces(out, level + 1);
                dump_property_name(out, prop);
                var_dump_at(out, &prop.value, level + 2, seen);
            }
            seen.pop();
            if level > 1 {
                spaces(out, level - 1);
            }
            out.extend_from_slice(b"}\n");
        }
    }
}

/// `var_dump` text for one value
pub fn var_dump(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    var_dump_at(&mut out, value, 1, &mut Vec::new());
    out
}

fn print_r_at(out: &mut Vec<u8>, value: &Value, indent: usize, seen: &mut Vec<usize>) {
    match value {
        Value::Array(arr) => {
            out.extend_from_slice(b"Array\n");
            spaces(out, indent);
            out.extend_from_slice(b"(\n");
            for (key, item) in arr.iter() {
                spaces(out, indent + 4);
                out.push(b'[');
                out.extend_from_slice(&key_bytes(key));
                out.extend_from_slice(b"] => ");
                print_r_at(out, &item, indent + 8, seen);
                out.push(b'\n');
            }
            spaces(out, indent);
            out.extend_from_slice(b")\n");
        }
        Value::Object(obj) => {
            out.extend_from_slice(format!("{} Object\n", obj.class_name()).as_bytes());
            if seen.contains(&obj.id()) {
                out.extend_from_slice(b" *RECURSION*");
                return;
            }
            spaces(out, indent);
            out.extend_from_slice(b"(\n");
            seen.push(obj.id());
            for prop in obj.property_views() {
                spaces(out, indent + 4);
                let name = match prop.visibility {
                    Visibility::Public => format!("[{}] => ", prop.name),
                    Visibility::Protected => format!("[{}:protected] => ", prop.name),
                    Visibility::Private => format!("[{}:{}:private] => ", prop.name, prop.class),
                };
                out.extend_from_slice(name.as_bytes());
                print_r_at(out, &prop.value, indent + 8, seen);
                out.push(b'\n');
            }
            seen.pop();
            spaces(out, indent);
            out.extend_from_slice(b")\n");
        }
        Value::Float(x) => out.extend_from_slice(format_float(*x).as_bytes()),
        other => out.extend(to_str(other).unwrap_or_default()),
    }
}

fn key_bytes(key: &ArrayKey) -> Vec<u8> {
    match key {
        ArrayKey::Int(n) => n.to_string().into_bytes(),
        ArrayKey::Str(s) => s.clone(),
    }
}

/// `print_r` text for one value
pub fn print_r(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    print_r_at(&mut out, value, 0, &mut Vec::new());
    out
}

fn export_str(out: &mut Vec<u8>, s: &[u8]) {
    out.push(b'\'');
    for &b in s {
        if b == b'\'' || b == b'\\' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out.push(b'\'');
}

fn export_float(x: f64) -> String {
    let text = format_float(x);
    if x.is_finite() && !text.contains(['.', 'E', 'e']) {
        format!("{text}.0")
    } else {
        text
    }
}

fn var_export_at(
    out: &mut Vec<u8>,
    value: &Value,
    level: usize,
    seen: &mut Vec<usize>,
) -> InterpResult<()> {
    match value {
        Value::Void | Value::Null => out.extend_from_slice(b"NULL"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::Float(x) => out.extend_from_slice(export_float(*x).as_bytes()),
        Value::Str(s) => export_str(out, s),
        Value::Array(arr) => {
            if level > 1 {
                out.push(b'\n');
                spaces(out, level - 1);
            }
            out.extend_from_slice(b"array (\n");
            for (key, item) in arr.iter() {
                spaces(out, level + 1);
                match key {
                    ArrayKey::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
                    ArrayKey::Str(s) => export_str(out, s),
                }
                out.extend_from_slice(b" => ");
                var_export_at(out, &item, level + 2, seen)?;
                out.extend_from_slice(b",\n");
            }
            if level > 1 {
                spaces(out, level - 1);
            }
            out.push(b')');
        }
        Value::Object(obj) => {
            if seen.contains(&obj.id()) {
                return Err(PhpError::warning("var_export does not handle circular references"));
            }
            if level > 1 {
                out.push(b'\n');
                spaces(out, level - 1);
            }
            out.extend_from_slice(
                format!("\\{}::__set_state(array(\n", obj.class_name()).as_bytes(),
            );
            seen.push(obj.id());
            for prop in obj.property_views() {
                spaces(out, level + 2);
                export_str(out, prop.name.as_bytes());
                out.extend_from_slice(b" => ");
                var_export_at(out, &prop.value, level + 2, seen)?;
                out.extend_from_slice(b",\n");
            }
            seen.pop();
            if level > 1 {
                spaces(out, level - 1);
            }
            out.extend_from_slice(b"))");
        }
    }
    Ok(())
}

/// `var_export` text for one value; circular object graphs are rejected with a warning
pub fn var_export(value: &Value) -> InterpResult<Vec<u8>> {
    let mut out = Vec::new();
    var_export_at(&mut out, value, 1, &mut Vec::new())?;
    Ok(out)
}

// ============ Natives ============

fn native_var_dump(interp: &mut Interpreter, _env: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("var_dump")
        .param("value", "mixed")
        .variadic("values", "mixed")
        .validate(args)?;
    for arg in &args {
        interp.print(&var_dump(arg));
    }
    Ok(Value::Null)
}

fn native_print_r(interp: &mut Interpreter, _env: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("print_r")
        .param("value", "mixed")
        .optional("return", "bool", Value::Bool(false))
        .validate(args)?;
    let text = print_r(&args[0]);
    if to_bool(&args[1]) {
        return Ok(Value::Str(text));
    }
    interp.print(&text);
    Ok(Value::Bool(true))
}

fn native_var_export(
    interp: &mut Interpreter,
    _env: &EnvRef,
    args: &[Value],
) -> InterpResult<Value> {
    let args = ArgValidator::new("var_export")
        .param("value", "mixed")
        .optional("return", "bool", Value::Bool(false))
        .validate(args)?;
    let text = match var_export(&args[0]) {
        Ok(text) => text,
        Err(warning) => {
            interp.print_error(&warning);
            b"NULL".to_vec()
        }
    };
    if to_bool(&args[1]) {
        return Ok(Value::Str(text));
    }
    interp.print(&text);
    Ok(Value::Null)
}

fn single(name: &'static str, args: &[Value]) -> InterpResult<Value> {
    let mut args = ArgValidator::new(name).param("value", "mixed").validate(args)?;
    Ok(args.swap_remove(0))
}

fn native_gettype(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let value = single("gettype", args)?;
    Ok(Value::str(value.gettype()))
}

fn native_get_debug_type(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let value = single("get_debug_type", args)?;
    Ok(Value::Str(value.type_name().into_bytes()))
}

/// Parse an integer in `base`, accepting the longest valid prefix like `strtol`
fn parse_int_base(text: &[u8], base: u32) -> i64 {
    let text = text.trim_ascii_start();
    let (negative, mut digits) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut base = base;
    let lower: Vec<u8> = digits.iter().take(2).map(u8::to_ascii_lowercase).collect();
    let prefix = |p: &[u8]| lower.as_slice() == p;
    if (base == 16 || base == 0) && prefix(b"0x") {
        digits = &digits[2..];
        base = 16;
    } else if (base == 8 || base == 0) && prefix(b"0o") {
        digits = &digits[2..];
        base = 8;
    } else if (base == 2 || base == 0) && prefix(b"0b") {
        digits = &digits[2..];
        base = 2;
    } else if base == 0 {
        base = if digits.first() == Some(&b'0') { 8 } else { 10 };
    }

    let mut n: i64 = 0;
    for &b in digits {
        let Some(d) = (b as char).to_digit(base) else {
            break;
        };
        n = match n.checked_mul(i64::from(base)).and_then(|n| n.checked_add(i64::from(d))) {
            Some(n) => n,
            None => return if negative { i64::MIN } else { i64::MAX },
        };
    }
    if negative { -n } else { n }
}

fn native_intval(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let args = ArgValidator::new("intval")
        .param("value", "mixed")
        .optional("base", "int", Value::Int(10))
        .validate(args)?;
    let base = args[1].as_int().unwrap_or(10);
    match &args[0] {
        Value::Str(s) if base != 10 => {
            if base != 0 && !(2..=36).contains(&base) {
                return Err(PhpError::uncaught(
                    "intval(): Argument #2 ($base) must be between 2 and 36 (inclusive), or 0",
                ));
            }
            Ok(Value::Int(parse_int_base(s, base as u32)))
        }
        other => Ok(Value::Int(to_int(other, true)?)),
    }
}

fn native_floatval(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let value = single("floatval", args)?;
    Ok(Value::Float(to_float(&value, true)?))
}

fn native_strval(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let value = single("strval", args)?;
    Ok(Value::Str(to_str(&value)?))
}

fn native_boolval(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    let value = single("boolval", args)?;
    Ok(Value::Bool(to_bool(&value)))
}

fn native_is_array(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(single("is_array", args)?, Value::Array(_))))
}

fn native_is_bool(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(single("is_bool", args)?, Value::Bool(_))))
}

fn native_is_float(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(single("is_float", args)?, Value::Float(_))))
}

fn native_is_int(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(single("is_int", args)?, Value::Int(_))))
}

fn native_is_null(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(single("is_null", args)?.is_null()))
}

fn native_is_numeric(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(match single("is_numeric", args)? {
        Value::Int(_) | Value::Float(_) => true,
        Value::Str(s) => is_numeric_str(&s),
        _ => false,
    }))
}

fn native_is_object(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(single("is_object", args)?, Value::Object(_))))
}

fn native_is_scalar(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(
        single("is_scalar", args)?,
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
    )))
}

fn native_is_string(_: &mut Interpreter, _: &EnvRef, args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Bool(matches!(single("is_string", args)?, Value::Str(_))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Value {
        let mut inner = Array::new();
        inner.insert(ArrayKey::from("y"), Value::Int(1));
        let mut outer = Array::new();
        outer.insert(ArrayKey::Int(0), Value::Float(1.5));
        outer.insert(ArrayKey::from("x"), Value::Array(inner));
        outer.insert(ArrayKey::from("s"), Value::str("it's"));
        outer.insert(ArrayKey::Int(1), Value::Bool(true));
        Value::Array(outer)
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    // ---- Dump formats ----

    #[test]
    fn test_var_dump_scalars() {
        assert_eq!(text(var_dump(&Value::Int(1))), "int(1)\n");
        assert_eq!(text(var_dump(&Value::Float(2.0))), "float(2)\n");
        assert_eq!(text(var_dump(&Value::Float(-0.5))), "float(-0.5)\n");
        assert_eq!(text(var_dump(&Value::str("abc"))), "string(3) \"abc\"\n");
        assert_eq!(text(var_dump(&Value::Bool(false))), "bool(false)\n");
        assert_eq!(text(var_dump(&Value::Void)), "NULL\n");
    }

    #[test]
    fn test_var_dump_nested_snapshot() {
        insta::assert_snapshot!(text(var_dump(&nested())), @r#"
        array(4) {
          [0]=>
          float(1.5)
          ["x"]=>
          array(1) {
            ["y"]=>
            int(1)
          }
          ["s"]=>
          string(4) "it's"
          [1]=>
          bool(true)
        }
        "#);
    }

    #[test]
    fn test_print_r_nested_snapshot() {
        insta::assert_snapshot!(text(print_r(&nested())), @r"
        Array
        (
            [0] => 1.5
            [x] => Array
                (
                    [y] => 1
                )

            [s] => it's
            [1] => 1
        )
        ");
    }

    #[test]
    fn test_var_export_nested() {
        // the line introducing a nested array ends with "=> "
        assert_eq!(
            text(var_export(&nested()).unwrap()),
            concat!(
                "array (\n  0 => 1.5,\n  'x' => \n  array (\n    'y' => 1,\n  ),\n",
                "  's' => 'it\\'s',\n  1 => true,\n)"
            )
        );
    }

    #[test]
    fn test_var_export_scalars() {
        assert_eq!(text(var_export(&Value::Float(1.0)).unwrap()), "1.0");
        assert_eq!(text(var_export(&Value::Float(0.1)).unwrap()), "0.1");
        assert_eq!(text(var_export(&Value::Float(f64::INFINITY)).unwrap()), "INF");
        assert_eq!(text(var_export(&Value::str("a\\b")).unwrap()), "'a\\\\b'");
        assert_eq!(text(var_export(&Value::Bool(true)).unwrap()), "true");
        assert_eq!(text(print_r(&Value::Bool(true))), "1");
    }

    // ---- intval ----

    #[test]
    fn test_parse_int_base() {
        assert_eq!(parse_int_base(b"ff", 16), 255);
        assert_eq!(parse_int_base(b"0x1A", 16), 26);
        assert_eq!(parse_int_base(b"0x1A", 0), 26);
        assert_eq!(parse_int_base(b"012", 0), 10);
        assert_eq!(parse_int_base(b"0b11", 0), 3);
        assert_eq!(parse_int_base(b"-101zz", 2), -5);
        assert_eq!(parse_int_base(b"42", 0), 42);
    }
}
