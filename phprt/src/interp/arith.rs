//! Arithmetic, bitwise and string operators, increment and decrement

use super::convert::{Number, Numeric, float_to_int, parse_numeric, to_str};
use super::error::{ErrorSink, InterpResult, PhpError};
use super::value::Value;
use crate::ast::{BinOp, UnOp};

/// Convert an arithmetic operand. Leading-numeric strings warn, non-numeric strings and
/// aggregates are type errors.
fn operand(
    value: &Value,
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    sink: &mut dyn ErrorSink,
) -> InterpResult<Number> {
    match value {
        Value::Void | Value::Null => Ok(Number::Int(0)),
        Value::Bool(b) => Ok(Number::Int(i64::from(*b))),
        Value::Int(n) => Ok(Number::Int(*n)),
        Value::Float(x) => Ok(Number::Float(*x)),
        Value::Str(s) => match parse_numeric(s) {
            Numeric::Whole(n) => Ok(n),
            Numeric::Leading(n) => {
                sink.emit(PhpError::warning("A non-numeric value encountered"));
                Ok(n)
            }
            Numeric::None => Err(unsupported(lhs, op, rhs)),
        },
        Value::Array(_) | Value::Object(_) => Err(unsupported(lhs, op, rhs)),
    }
}

fn unsupported(lhs: &Value, op: BinOp, rhs: &Value) -> PhpError {
    PhpError::unsupported_operands(&lhs.type_name(), op, &rhs.type_name())
}

fn int_operand(
    value: &Value,
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    sink: &mut dyn ErrorSink,
) -> InterpResult<i64> {
    Ok(match operand(value, op, lhs, rhs, sink)? {
        Number::Int(n) => n,
        Number::Float(x) => float_to_int(x),
    })
}

/// String conversion for `.`, warning on arrays
pub fn concat_operand(value: &Value, sink: &mut dyn ErrorSink) -> InterpResult<Vec<u8>> {
    if let Value::Array(_) = value {
        sink.emit(PhpError::warning("Array to string conversion"));
    }
    to_str(value)
}

/// Evaluate `lhs op rhs` for arithmetic, bitwise and concatenation operators
pub fn calculate(
    lhs: &Value,
    op: BinOp,
    rhs: &Value,
    sink: &mut dyn ErrorSink,
) -> InterpResult<Value> {
    match op {
        BinOp::Concat => {
            let mut s = concat_operand(lhs, sink)?;
            s.extend(concat_operand(rhs, sink)?);
            Ok(Value::Str(s))
        }
        BinOp::Add => {
            if let (Value::Array(a), Value::Array(b)) = (lhs, rhs) {
                return Ok(Value::Array(a.union(b)));
            }
            let a = operand(lhs, op, lhs, rhs, sink)?;
            let b = operand(rhs, op, lhs, rhs, sink)?;
            Ok(int_or_float(a, b, i64::checked_add, |x, y| x + y))
        }
        BinOp::Sub => {
            let a = operand(lhs, op, lhs, rhs, sink)?;
            let b = operand(rhs, op, lhs, rhs, sink)?;
            Ok(int_or_float(a, b, i64::checked_sub, |x, y| x - y))
        }
        BinOp::Mul => {
            let a = operand(lhs, op, lhs, rhs, sink)?;
            let b = operand(rhs, op, lhs, rhs, sink)?;
            Ok(int_or_float(a, b, i64::checked_mul, |x, y| x * y))
        }
        BinOp::Div => {
            let a = operand(lhs, op, lhs, rhs, sink)?;
            let b = operand(rhs, op, lhs, rhs, sink)?;
            if b.as_f64() == 0.0 {
                return Err(PhpError::division_by_zero());
            }
            if let (Number::Int(x), Number::Int(y)) = (a, b) {
                if x.checked_rem(y) == Some(0) {
                    if let Some(q) = x.checked_div(y) {
                        return Ok(Value::Int(q));
                    }
                }
            }
            Ok(Value::Float(a.as_f64() / b.as_f64()))
        }
        BinOp::Mod => {
            let a = int_operand(lhs, op, lhs, rhs, sink)?;
            let b = int_operand(rhs, op, lhs, rhs, sink)?;
            if b == 0 {
                return Err(PhpError::modulo_by_zero());
            }
            Ok(Value::Int(a.wrapping_rem(b)))
        }
        BinOp::Pow => {
            let a = operand(lhs, op, lhs, rhs, sink)?;
            let b = operand(rhs, op, lhs, rhs, sink)?;
            if let (Number::Int(x), Number::Int(y)) = (a, b) {
                if let Ok(exp) = u32::try_from(y) {
                    if let Some(p) = x.checked_pow(exp) {
                        return Ok(Value::Int(p));
                    }
                }
            }
            Ok(Value::Float(a.as_f64().powf(b.as_f64())))
        }
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
                return Ok(Value::Str(bytewise(a, b, op)));
            }
            let a = int_operand(lhs, op, lhs, rhs, sink)?;
            let b = int_operand(rhs, op, lhs, rhs, sink)?;
            Ok(Value::Int(match op {
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                _ => a ^ b,
            }))
        }
        BinOp::Shl | BinOp::Shr => {
            let a = int_operand(lhs, op, lhs, rhs, sink)?;
            let b = int_operand(rhs, op, lhs, rhs, sink)?;
            if b < 0 {
                return Err(PhpError::negative_shift());
            }
            Ok(Value::Int(match (op, b >= 64) {
                (BinOp::Shl, true) => 0,
                (BinOp::Shl, false) => a << b,
                (_, true) => {
                    if a < 0 {
                        -1
                    } else {
                        0
                    }
                }
                (_, false) => a >> b,
            }))
        }
        _ => Err(PhpError::fatal(format!("Operator {op} is not arithmetic"))),
    }
}

/// Integer result when both operands are ints and the checked operation fits, float otherwise
fn int_or_float(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        if let Some(r) = int_op(x, y) {
            return Value::Int(r);
        }
    }
    Value::Float(float_op(a.as_f64(), b.as_f64()))
}

/// `&`, `|`, `^` on two strings work byte by byte
fn bytewise(a: &[u8], b: &[u8], op: BinOp) -> Vec<u8> {
    match op {
        BinOp::BitAnd => a.iter().zip(b).map(|(x, y)| x & y).collect(),
        BinOp::BitXor => a.iter().zip(b).map(|(x, y)| x ^ y).collect(),
        _ => {
            let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
            long.iter()
                .enumerate()
                .map(|(i, x)| x | short.get(i).copied().unwrap_or(0))
                .collect()
        }
    }
}

/// Unary operators
pub fn unary(op: UnOp, value: &Value, sink: &mut dyn ErrorSink) -> InterpResult<Value> {
    match op {
        UnOp::Not => Ok(Value::Bool(!super::convert::to_bool(value))),
        UnOp::Neg => calculate(value, BinOp::Mul, &Value::Int(-1), sink),
        UnOp::Plus => calculate(value, BinOp::Mul, &Value::Int(1), sink),
        UnOp::BitNot => match value {
            Value::Int(n) => Ok(Value::Int(!n)),
            Value::Float(x) => Ok(Value::Int(!float_to_int(*x))),
            Value::Str(s) => Ok(Value::Str(s.iter().map(|b| !b).collect())),
            other => Err(PhpError::type_error(format!(
                "Cannot perform bitwise not on {}",
                other.type_name()
            ))),
        },
    }
}

/// `++`
pub fn increment(value: &Value) -> InterpResult<Value> {
    match value {
        Value::Void | Value::Null => Ok(Value::Int(1)),
        Value::Bool(_) => Ok(value.clone()),
        Value::Int(n) => Ok(n
            .checked_add(1)
            .map_or(Value::Float(*n as f64 + 1.0), Value::Int)),
        Value::Float(x) => Ok(Value::Float(x + 1.0)),
        Value::Str(s) if s.is_empty() => Ok(Value::str("1")),
        Value::Str(s) => match parse_numeric(s) {
            Numeric::Whole(n) => increment(&n.to_value()),
            _ => Ok(Value::Str(increment_string(s))),
        },
        Value::Array(_) | Value::Object(_) => Err(PhpError::type_error(format!(
            "Cannot increment {}",
            value.type_name()
        ))),
    }
}

/// `--`
pub fn decrement(value: &Value) -> InterpResult<Value> {
    match value {
        Value::Void | Value::Null => Ok(Value::Null),
        Value::Bool(_) => Ok(value.clone()),
        Value::Int(n) => Ok(n
            .checked_sub(1)
            .map_or(Value::Float(*n as f64 - 1.0), Value::Int)),
        Value::Float(x) => Ok(Value::Float(x - 1.0)),
        Value::Str(s) if s.is_empty() => Ok(Value::Int(-1)),
        Value::Str(s) => match parse_numeric(s) {
            Numeric::Whole(n) => decrement(&n.to_value()),
            _ => Ok(value.clone()),
        },
        Value::Array(_) | Value::Object(_) => Err(PhpError::type_error(format!(
            "Cannot decrement {}",
            value.type_name()
        ))),
    }
}

#[derive(Clone, Copy)]
enum CharClass {
    Lower,
    Upper,
    Digit,
}

/// Perl-style string increment: `a` → `b`, `Az` → `Ba`, `zz` → `aaa`, `a9` → `b0`
fn increment_string(s: &[u8]) -> Vec<u8> {
    let mut out = s.to_vec();
    let mut last = CharClass::Digit;
    let mut carry = false;
    for i in (0..out.len()).rev() {
        let ch = out[i];
        let (class, first, end) = match ch {
            b'a'..=b'z' => (CharClass::Lower, b'a', b'z'),
            b'A'..=b'Z' => (CharClass::Upper, b'A', b'Z'),
            b'0'..=b'9' => (CharClass::Digit, b'0', b'9'),
            _ => {
                carry = false;
                break;
            }
        };
        last = class;
        if ch == end {
            out[i] = first;
            carry = true;
        } else {
            out[i] = ch + 1;
            carry = false;
            break;
        }
    }
    if carry {
        let prefix = match last {
            CharClass::Lower => b'a',
            CharClass::Upper => b'A',
            CharClass::Digit => b'1',
        };
        out.insert(0, prefix);
    }
    out
}
