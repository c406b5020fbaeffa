//! Loose and strict comparison

use super::array::Array;
use super::convert::{Number, format_float, parse_numeric, to_array, to_bool};
use super::value::Value;
use std::cmp::Ordering;

/// Relational primitive operators. `>` and `>=` are expressed by swapping the operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Less,
    LessEq,
    Spaceship,
}

fn number_of(value: &Value) -> Number {
    match value {
        Value::Float(x) => Number::Float(*x),
        Value::Int(n) => Number::Int(*n),
        _ => Number::Int(0),
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn number_text(n: Number) -> Vec<u8> {
    match n {
        Number::Int(i) => i.to_string().into_bytes(),
        Number::Float(x) => format_float(x).into_bytes(),
    }
}

/// Number against string: numerically when the string is numeric, otherwise as strings
fn compare_number_str(n: Number, s: &[u8]) -> Option<Ordering> {
    match parse_numeric(s).whole() {
        Some(m) => compare_numbers(n, m),
        None => Some(number_text(n).as_slice().cmp(s)),
    }
}

fn compare_strings(a: &[u8], b: &[u8]) -> Option<Ordering> {
    match (parse_numeric(a).whole(), parse_numeric(b).whole()) {
        (Some(x), Some(y)) => compare_numbers(x, y),
        _ => Some(a.cmp(b)),
    }
}

fn compare_arrays(a: &Array, b: &Array) -> Option<Ordering> {
    if a.len() != b.len() {
        return Some(a.len().cmp(&b.len()));
    }
    for (key, left) in a.iter() {
        let right = b.get(key)?;
        match compare(&left, &right) {
            Some(Ordering::Equal) => continue,
            other => return other,
        }
    }
    Some(Ordering::Equal)
}

/// Loose ordering of two values. `None` means the values are uncomparable: every relation
/// is false and `<=>` yields 1.
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    use Value::*;
    match (lhs, rhs) {
        (Void | Null, Void | Null) => Some(Ordering::Equal),
        (Bool(a), _) => Some(a.cmp(&to_bool(rhs))),
        (_, Bool(b)) => Some(to_bool(lhs).cmp(b)),

        (Void | Null, Str(s)) => Some(b"".as_slice().cmp(s)),
        (Str(s), Void | Null) => Some(s.as_slice().cmp(b"")),
        (Void | Null, Array(b)) => compare_arrays(&super::array::Array::new(), b),
        (Array(a), Void | Null) => compare_arrays(a, &super::array::Array::new()),
        (Void | Null, Object(_)) => Some(Ordering::Less),
        (Object(_), Void | Null) => Some(Ordering::Greater),
        (Void | Null, _) => Some(false.cmp(&to_bool(rhs))),
        (_, Void | Null) => Some(to_bool(lhs).cmp(&false)),

        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Int(_) | Float(_), Int(_) | Float(_)) => compare_numbers(number_of(lhs), number_of(rhs)),
        (Int(_) | Float(_), Str(s)) => compare_number_str(number_of(lhs), s),
        (Str(s), Int(_) | Float(_)) => {
            compare_number_str(number_of(rhs), s).map(Ordering::reverse)
        }
        (Str(a), Str(b)) => compare_strings(a, b),

        (Array(a), Array(b)) => compare_arrays(a, b),
        (Array(_), _) => Some(Ordering::Greater),
        (_, Array(_)) => Some(Ordering::Less),

        (Object(a), Object(b)) => {
            if a.ptr_eq(b) {
                Some(Ordering::Equal)
            } else if a.class_name().eq_ignore_ascii_case(&b.class_name()) {
                compare_arrays(&to_array(lhs), &to_array(rhs))
            } else {
                None
            }
        }
        (Object(_), _) => Some(Ordering::Greater),
        (_, Object(_)) => Some(Ordering::Less),
    }
}

/// `compareRelation(lhs, op, rhs)`: `Bool` for `<` and `<=`, `Int` for `<=>`
pub fn compare_relation(lhs: &Value, op: Relation, rhs: &Value) -> Value {
    let ord = compare(lhs, rhs);
    match op {
        Relation::Less => Value::Bool(ord == Some(Ordering::Less)),
        Relation::LessEq => Value::Bool(matches!(ord, Some(Ordering::Less | Ordering::Equal))),
        Relation::Spaceship => Value::Int(match ord {
            Some(Ordering::Less) => -1,
            Some(Ordering::Equal) => 0,
            _ => 1,
        }),
    }
}

/// `==`
pub fn loose_equals(lhs: &Value, rhs: &Value) -> bool {
    compare(lhs, rhs) == Some(Ordering::Equal)
}

/// `===`
pub fn identical(lhs: &Value, rhs: &Value) -> bool {
    use Value::*;
    match (lhs, rhs) {
        (Void | Null, Void | Null) => true,
        (Bool(a), Bool(b)) => a == b,
        (Int(a), Int(b)) => a == b,
        (Float(a), Float(b)) => a == b,
        (Str(a), Str(b)) => a == b,
        (Array(a), Array(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && identical(&va, &vb))
        }
        (Object(a), Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::array::ArrayKey;

    fn list(values: Vec<Value>) -> Value {
        Value::Array(Array::from_values(values))
    }

    fn spaceship(a: &Value, b: &Value) -> i64 {
        compare_relation(a, Relation::Spaceship, b).as_int().unwrap()
    }

    // ---- Arrays ----

    #[test]
    fn test_array_spaceship_by_size() {
        let empty = list(vec![]);
        let one = list(vec![Value::str("a")]);
        assert_eq!(spaceship(&empty, &one), -1);
        assert_eq!(spaceship(&one, &empty), 1);
        assert_eq!(spaceship(&empty, &empty), 0);
    }

    #[test]
    fn test_array_missing_key_is_uncomparable() {
        let a: Array = vec![(ArrayKey::from("a"), Value::Int(1))].into_iter().collect();
        let b: Array = vec![(ArrayKey::from("b"), Value::Int(1))].into_iter().collect();
        let (a, b) = (Value::Array(a), Value::Array(b));
        assert_eq!(compare(&a, &b), None);
        assert_eq!(compare_relation(&a, Relation::Less, &b), Value::Bool(false));
        assert_eq!(compare_relation(&b, Relation::Less, &a), Value::Bool(false));
        assert!(!loose_equals(&a, &b));
    }

    #[test]
    fn test_array_loose_equality_ignores_order() {
        let a: Array = vec![
            (ArrayKey::from("x"), Value::Int(1)),
            (ArrayKey::from("y"), Value::str("2")),
        ]
        .into_iter()
        .collect();
        let b: Array = vec![
            (ArrayKey::from("y"), Value::Int(2)),
            (ArrayKey::from("x"), Value::Int(1)),
        ]
        .into_iter()
        .collect();
        let (a, b) = (Value::Array(a), Value::Array(b));
        assert!(loose_equals(&a, &b));
        assert!(!identical(&a, &b));
    }

    #[test]
    fn test_array_greater_than_scalars() {
        let arr = list(vec![]);
        assert_eq!(spaceship(&arr, &Value::Int(100)), 1);
        assert_eq!(spaceship(&Value::str("zzz"), &arr), -1);
    }

    // ---- Strings and numbers ----

    #[test]
    fn test_numeric_strings() {
        assert!(loose_equals(&Value::str("10"), &Value::str("1e1")));
        assert!(!loose_equals(&Value::str("1"), &Value::str("01a")));
        assert!(loose_equals(&Value::str(" 1"), &Value::Int(1)));
        assert!(loose_equals(&Value::str("1.0"), &Value::str("01")));
    }

    #[test]
    fn test_number_vs_non_numeric_string() {
        assert!(!loose_equals(&Value::Int(0), &Value::str("abc")));
        assert!(!loose_equals(&Value::Int(0), &Value::str("")));
        // "1" < "abc" byte-wise
        assert_eq!(spaceship(&Value::Int(1), &Value::str("abc")), -1);
        assert_eq!(spaceship(&Value::str("abc"), &Value::Int(1)), 1);
    }

    #[test]
    fn test_string_lexical() {
        assert_eq!(spaceship(&Value::str("abc"), &Value::str("abd")), -1);
        assert_eq!(spaceship(&Value::str("ab"), &Value::str("abc")), -1);
        assert_eq!(spaceship(&Value::str("b"), &Value::str("abc")), 1);
    }

    // ---- Bool and null ----

    #[test]
    fn test_bool_coerces_other_side() {
        assert!(loose_equals(&Value::Bool(true), &Value::str("abc")));
        assert!(loose_equals(&Value::Bool(false), &list(vec![])));
        assert!(loose_equals(&Value::str("0"), &Value::Bool(false)));
    }

    #[test]
    fn test_null_comparisons() {
        assert!(loose_equals(&Value::Null, &Value::Int(0)));
        assert!(loose_equals(&Value::Null, &Value::str("")));
        assert!(!loose_equals(&Value::Null, &Value::str("0")));
        assert!(loose_equals(&Value::Null, &list(vec![])));
        assert_eq!(
            compare_relation(&Value::Null, Relation::Less, &Value::Int(-1)),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_nan_is_uncomparable() {
        let nan = Value::Float(f64::NAN);
        assert!(!loose_equals(&nan, &nan));
        assert_eq!(spaceship(&nan, &Value::Int(0)), 1);
    }

    #[test]
    fn test_antisymmetry() {
        let samples = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::Int(7),
            Value::Float(2.5),
            Value::str(""),
            Value::str("7"),
            Value::str("abc"),
            Value::str("1e1"),
            list(vec![]),
            list(vec![Value::Int(1)]),
        ];
        for x in &samples {
            for y in &samples {
                assert_eq!(
                    spaceship(x, y),
                    -spaceship(y, x),
                    "{x} <=> {y} is not antisymmetric"
                );
            }
        }
    }

    // ---- Identity ----

    #[test]
    fn test_identity() {
        assert!(identical(&Value::Int(1), &Value::Int(1)));
        assert!(!identical(&Value::Int(1), &Value::Float(1.0)));
        assert!(!identical(&Value::str("1"), &Value::Int(1)));
        assert!(identical(
            &list(vec![Value::Int(1), Value::str("a")]),
            &list(vec![Value::Int(1), Value::str("a")])
        ));
        assert!(!identical(
            &list(vec![Value::Int(1)]),
            &list(vec![Value::str("1")])
        ));
    }
}
