//! Runtime values for the interpreter

use super::array::Array;
use super::object::ObjectRef;
use std::fmt;

/// Runtime value
///
/// `Clone` is the guest language's assignment copy: arrays are copied deeply, objects are
/// shared handles.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Produced by statements and functions without a usable result
    Void,
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Byte string
    Str(Vec<u8>),
    Array(Array),
    Object(ObjectRef),
}

/// Kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Void,
    Null,
    Bool,
    Int,
    Float,
    Str,
    Array,
    Object,
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.as_bytes().to_vec())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// `null` and "no value" both read as null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Void)
    }

    /// Type name as used in type declarations and error messages (`get_debug_type`)
    pub fn type_name(&self) -> String {
        match self {
            Value::Void => "void".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(obj) => obj.class_name(),
        }
    }

    /// Type name reported by `gettype()`
    pub fn gettype(&self) -> &'static str {
        match self {
            Value::Void | Value::Null => "NULL",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Short type name used in operand and offset diagnostics
    pub fn operand_name(&self) -> &'static str {
        match self {
            Value::Void | Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

/// Debug-oriented rendering; script output goes through the string conversion instead.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", super::convert::format_float(*x)),
            Value::Str(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, (k, v)) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} => {}", *v)?;
                }
                write!(f, "]")
            }
            Value::Object(o) => write!(f, "object({})#{}", o.class_name(), o.id()),
        }
    }
}

/// Identity comparison (`===`)
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        super::compare::identical(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.gettype(), "NULL");
        assert_eq!(Value::Float(1.0).gettype(), "double");
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::str("x").type_name(), "string");
        assert_eq!(Value::Array(Array::new()).operand_name(), "array");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Float(0.5)), "0.5");
        assert_eq!(format!("{}", Value::str("a")), "\"a\"");
        let arr = Array::from_values(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(format!("{}", Value::Array(arr)), "[0 => 1, 1 => 2]");
    }

    #[test]
    fn test_clone_copies_arrays() {
        let original = Value::Array(Array::from_values(vec![Value::Int(1)]));
        let mut copy = original.clone();
        if let Value::Array(a) = &mut copy {
            a.push(Value::Int(2)).unwrap();
        }
        assert_eq!(original.as_array().map(Array::len), Some(1));
        assert_eq!(copy.as_array().map(Array::len), Some(2));
    }
}
