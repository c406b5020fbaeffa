//! Type juggling: conversions between value kinds

use super::array::{Array, ArrayKey};
use super::error::{InterpResult, PhpError};
use super::value::Value;

/// A parsed number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_value(self) -> Value {
        match self {
            Number::Int(n) => Value::Int(n),
            Number::Float(x) => Value::Float(x),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    /// Integer value; floats parsed from strings saturate at the i64 range
    fn saturating_int(self) -> i64 {
        match self {
            Number::Int(n) => n,
            Number::Float(x) if x.is_nan() => 0,
            Number::Float(x) => x as i64,
        }
    }
}

/// How much of a string is a number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    /// The whole string (ignoring surrounding whitespace) is a number
    Whole(Number),
    /// Only a prefix is a number: `"12 apples"`
    Leading(Number),
    None,
}

impl Numeric {
    pub fn whole(self) -> Option<Number> {
        match self {
            Numeric::Whole(n) => Some(n),
            _ => None,
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Classify a string as a numeric string
pub fn parse_numeric(bytes: &[u8]) -> Numeric {
    let mut i = 0;
    while i < bytes.len() && is_space(bytes[i]) {
        i += 1;
    }
    let start = i;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    let mut is_float = false;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            is_float = true;
            i = j;
        }
    }
    if digits == 0 {
        return Numeric::None;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            is_float = true;
            i = j;
        }
    }
    let end = i;
    while i < bytes.len() && is_space(bytes[i]) {
        i += 1;
    }

    // The matched range is ASCII only
    let text = String::from_utf8_lossy(&bytes[start..end]);
    let number = if is_float {
        Number::Float(text.parse().unwrap_or(0.0))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Number::Int(n),
            Err(_) => Number::Float(text.parse().unwrap_or(0.0)),
        }
    };
    if i == bytes.len() {
        Numeric::Whole(number)
    } else {
        Numeric::Leading(number)
    }
}

pub fn is_numeric_str(bytes: &[u8]) -> bool {
    matches!(parse_numeric(bytes), Numeric::Whole(_))
}

/// Float to int the way casts do it: truncation, and 0 when out of range or not finite
pub fn float_to_int(x: f64) -> i64 {
    if !x.is_finite() || x >= 9.223_372_036_854_775_808e18 || x < -9.223_372_036_854_775_808e18 {
        0
    } else {
        x as i64
    }
}

/// String form of a float: shortest round-trip digits, exponent form outside 1e-4..1e15
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NAN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let sci = format!("{x:e}");
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if x != 0.0 && !(-4..15).contains(&exp) {
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{mantissa}.0")
        };
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{}", exp.abs())
    } else {
        format!("{x}")
    }
}

fn object_conversion(value: &Value, target: &str) -> PhpError {
    PhpError::uncaught(format!(
        "Object of class {} could not be converted to {target}",
        value.type_name()
    ))
}

/// BoolVal
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Void | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(x) => *x != 0.0,
        Value::Str(s) => !(s.is_empty() || s.as_slice() == b"0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// IntVal. With `leading_numeric` a numeric prefix is accepted (`"12abc"` is 12), otherwise
/// only whole numeric strings convert and everything else is 0.
pub fn to_int(value: &Value, leading_numeric: bool) -> InterpResult<i64> {
    Ok(match value {
        Value::Void | Value::Null => 0,
        Value::Bool(b) => i64::from(*b),
        Value::Int(n) => *n,
        Value::Float(x) => float_to_int(*x),
        Value::Str(s) => match parse_numeric(s) {
            Numeric::Whole(n) => n.saturating_int(),
            Numeric::Leading(n) if leading_numeric => n.saturating_int(),
            _ => 0,
        },
        Value::Array(a) => i64::from(!a.is_empty()),
        Value::Object(_) => return Err(object_conversion(value, "int")),
    })
}

/// FloatVal
pub fn to_float(value: &Value, leading_numeric: bool) -> InterpResult<f64> {
    Ok(match value {
        Value::Void | Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        Value::Str(s) => match parse_numeric(s) {
            Numeric::Whole(n) => n.as_f64(),
            Numeric::Leading(n) if leading_numeric => n.as_f64(),
            _ => 0.0,
        },
        Value::Array(a) => f64::from(u8::from(!a.is_empty())),
        Value::Object(_) => return Err(object_conversion(value, "float")),
    })
}

/// Number for a string or scalar, without diagnostics
pub fn to_number(value: &Value, leading_numeric: bool) -> InterpResult<Number> {
    match value {
        Value::Float(x) => Ok(Number::Float(*x)),
        Value::Str(s) => Ok(match parse_numeric(s) {
            Numeric::Whole(n) => n,
            Numeric::Leading(n) if leading_numeric => n,
            _ => Number::Int(0),
        }),
        other => to_int(other, leading_numeric).map(Number::Int),
    }
}

/// StrVal
pub fn to_str(value: &Value) -> InterpResult<Vec<u8>> {
    Ok(match value {
        Value::Void | Value::Null => Vec::new(),
        Value::Bool(true) => b"1".to_vec(),
        Value::Bool(false) => Vec::new(),
        Value::Int(n) => n.to_string().into_bytes(),
        Value::Float(x) => format_float(*x).into_bytes(),
        Value::Str(s) => s.clone(),
        Value::Array(_) => b"Array".to_vec(),
        Value::Object(_) => return Err(object_conversion(value, "string")),
    })
}

/// StrVal rendered lossily as UTF-8 text
pub fn to_string_lossy(value: &Value) -> InterpResult<String> {
    to_str(value).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// ArrayVal
pub fn to_array(value: &Value) -> Array {
    match value {
        Value::Void | Value::Null => Array::new(),
        Value::Array(a) => a.clone(),
        Value::Object(obj) => obj
            .properties()
            .into_iter()
            .map(|(name, v)| (ArrayKey::from(name.as_str()), v))
            .collect(),
        scalar => Array::from_values(vec![scalar.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Numeric strings ----

    #[test]
    fn test_parse_numeric_whole() {
        assert_eq!(parse_numeric(b"42"), Numeric::Whole(Number::Int(42)));
        assert_eq!(parse_numeric(b"  -7 "), Numeric::Whole(Number::Int(-7)));
        assert_eq!(parse_numeric(b"+3"), Numeric::Whole(Number::Int(3)));
        assert_eq!(parse_numeric(b"1e1"), Numeric::Whole(Number::Float(10.0)));
        assert_eq!(parse_numeric(b".5"), Numeric::Whole(Number::Float(0.5)));
        assert_eq!(parse_numeric(b"1."), Numeric::Whole(Number::Float(1.0)));
        assert_eq!(
            parse_numeric(b"9223372036854775808"),
            Numeric::Whole(Number::Float(9.223_372_036_854_775_808e18))
        );
    }

    #[test]
    fn test_parse_numeric_leading_and_none() {
        assert_eq!(parse_numeric(b"12abc"), Numeric::Leading(Number::Int(12)));
        assert_eq!(parse_numeric(b"01a"), Numeric::Leading(Number::Int(1)));
        assert_eq!(parse_numeric(b"1e"), Numeric::Leading(Number::Int(1)));
        assert_eq!(parse_numeric(b"abc"), Numeric::None);
        assert_eq!(parse_numeric(b""), Numeric::None);
        assert_eq!(parse_numeric(b" "), Numeric::None);
        assert_eq!(parse_numeric(b"."), Numeric::None);
        assert_eq!(parse_numeric(b"-"), Numeric::None);
    }

    // ---- Casts ----

    #[test]
    fn test_bool_val() {
        let falsy = [
            Value::Int(0),
            Value::Float(0.0),
            Value::str(""),
            Value::str("0"),
            Value::Null,
            Value::Array(Array::new()),
        ];
        for v in &falsy {
            assert!(!to_bool(v), "{v} should be false");
        }
        let truthy = [
            Value::Int(-1),
            Value::Float(0.1),
            Value::str("0.0"),
            Value::str(" "),
            Value::Array(Array::from_values(vec![Value::Null])),
        ];
        for v in &truthy {
            assert!(to_bool(v), "{v} should be true");
        }
    }

    #[test]
    fn test_int_val() {
        assert_eq!(to_int(&Value::Float(-3.9), true).unwrap(), -3);
        assert_eq!(to_int(&Value::Float(f64::NAN), true).unwrap(), 0);
        assert_eq!(to_int(&Value::Float(1e30), true).unwrap(), 0);
        assert_eq!(to_int(&Value::str("12abc"), true).unwrap(), 12);
        assert_eq!(to_int(&Value::str("12abc"), false).unwrap(), 0);
        assert_eq!(to_int(&Value::str("1e3"), false).unwrap(), 1000);
        assert_eq!(to_int(&Value::str("0x1A"), true).unwrap(), 0);
        assert_eq!(to_int(&Value::str("1e100"), true).unwrap(), i64::MAX);
        assert_eq!(to_int(&Value::Bool(true), true).unwrap(), 1);
    }

    #[test]
    fn test_int_str_round_trip() {
        for n in [0, 1, -1, 42, i64::MAX, i64::MIN, 1_000_000_007] {
            let s = to_str(&Value::Int(n)).unwrap();
            assert_eq!(to_int(&Value::Str(s), false).unwrap(), n);
        }
    }

    #[test]
    fn test_float_val() {
        assert_eq!(to_float(&Value::str("1.5xyz"), true).unwrap(), 1.5);
        assert_eq!(to_float(&Value::str("1.5xyz"), false).unwrap(), 0.0);
        assert_eq!(to_float(&Value::Int(3), true).unwrap(), 3.0);
    }

    #[test]
    fn test_str_val() {
        assert_eq!(to_str(&Value::Bool(true)).unwrap(), b"1");
        assert_eq!(to_str(&Value::Bool(false)).unwrap(), b"");
        assert_eq!(to_str(&Value::Null).unwrap(), b"");
        assert_eq!(to_str(&Value::Array(Array::new())).unwrap(), b"Array");
        assert_eq!(to_str(&Value::Float(1.0)).unwrap(), b"1");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(-0.0), "-0");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e14), "100000000000000");
        assert_eq!(format_float(1e15), "1.0E+15");
        assert_eq!(format_float(1.5e-7), "1.5E-7");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(f64::NAN), "NAN");
    }

    #[test]
    fn test_array_val() {
        assert!(to_array(&Value::Null).is_empty());
        let a = to_array(&Value::Int(5));
        assert_eq!(a.get(&ArrayKey::Int(0)).as_deref(), Some(&Value::Int(5)));
    }
}
