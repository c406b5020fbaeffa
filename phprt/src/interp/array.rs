//! Ordered map with PHP key normalization

use super::convert::float_to_int;
use super::error::{InterpResult, PhpError};
use super::slot::Slot;
use super::value::Value;
use indexmap::IndexMap;
use std::cell::{Ref, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Normalized array key: only integers and strings survive normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(Vec<u8>),
}

impl ArrayKey {
    /// Key for a string, turning canonical decimal integers into integer keys
    pub fn from_bytes(bytes: &[u8]) -> ArrayKey {
        match decimal_int(bytes) {
            Some(n) => ArrayKey::Int(n),
            None => ArrayKey::Str(bytes.to_vec()),
        }
    }

    /// Normalize a value used as an offset
    pub fn from_value(value: &Value) -> InterpResult<ArrayKey> {
        match value {
            Value::Int(n) => Ok(ArrayKey::Int(*n)),
            Value::Bool(b) => Ok(ArrayKey::Int(i64::from(*b))),
            Value::Float(x) => Ok(ArrayKey::Int(float_to_int(*x))),
            Value::Str(s) => Ok(ArrayKey::from_bytes(s)),
            Value::Null | Value::Void => Ok(ArrayKey::Str(Vec::new())),
            Value::Array(_) | Value::Object(_) => Err(PhpError::type_error(format!(
                "Illegal offset type {}",
                value.operand_name()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(n) => Value::Int(*n),
            ArrayKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(n: i64) -> Self {
        ArrayKey::Int(n)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(n) => write!(f, "{n}"),
            ArrayKey::Str(s) => write!(f, "{}", String::from_utf8_lossy(s)),
        }
    }
}

/// Parse a canonical decimal integer: optional `-`, no leading zeros, no `+`, fits in i64
fn decimal_int(bytes: &[u8]) -> Option<i64> {
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };
    match digits {
        [] => return None,
        [b'0'] => return if negative { None } else { Some(0) },
        [b'0', ..] => return None,
        _ => {}
    }
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut n: i64 = 0;
    for d in digits {
        let d = i64::from(d - b'0');
        n = n.checked_mul(10)?;
        n = if negative {
            n.checked_sub(d)?
        } else {
            n.checked_add(d)?
        };
    }
    Some(n)
}

/// Storage of one element
#[derive(Debug)]
enum Element {
    Value(Value),
    /// Bound by reference; the cell is shared with a variable
    Ref(Slot),
}

impl Element {
    fn borrow(&self) -> ElementRef<'_> {
        match self {
            Element::Value(v) => ElementRef::Value(v),
            Element::Ref(slot) => ElementRef::Ref(slot.borrow()),
        }
    }

    fn borrow_mut(&mut self) -> ElementMut<'_> {
        match self {
            Element::Value(v) => ElementMut::Value(v),
            Element::Ref(slot) => ElementMut::Ref(slot.borrow_mut()),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Element::Value(v) => v,
            Element::Ref(slot) if slot.is_shared() => slot.get(),
            Element::Ref(slot) => slot.replace(Value::Null),
        }
    }
}

impl Clone for Element {
    /// References survive the copy while someone else still holds them
    fn clone(&self) -> Self {
        match self {
            Element::Value(v) => Element::Value(v.clone()),
            Element::Ref(slot) if slot.is_shared() => Element::Ref(slot.clone()),
            Element::Ref(slot) => Element::Value(slot.get()),
        }
    }
}

/// Read access to an element, plain or behind a reference
pub enum ElementRef<'a> {
    Value(&'a Value),
    Ref(Ref<'a, Value>),
}

impl Deref for ElementRef<'_> {
    type Target = Value;

    fn deref(&self) -> &Value {
        match self {
            ElementRef::Value(v) => *v,
            ElementRef::Ref(r) => &**r,
        }
    }
}

/// Write access to an element; writes through a reference land in the shared cell
pub enum ElementMut<'a> {
    Value(&'a mut Value),
    Ref(RefMut<'a, Value>),
}

impl Deref for ElementMut<'_> {
    type Target = Value;

    fn deref(&self) -> &Value {
        match self {
            ElementMut::Value(v) => &**v,
            ElementMut::Ref(r) => &**r,
        }
    }
}

impl DerefMut for ElementMut<'_> {
    fn deref_mut(&mut self) -> &mut Value {
        match self {
            ElementMut::Value(v) => &mut **v,
            ElementMut::Ref(r) => &mut **r,
        }
    }
}

/// Ordered map keyed by [`ArrayKey`]
#[derive(Debug, Clone, Default)]
pub struct Array {
    entries: IndexMap<ArrayKey, Element>,
    /// Next auto key; `None` until first needed, then derived from the keys
    next_key: Option<i64>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// List-style array with keys `0..n`
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let entries: IndexMap<ArrayKey, Element> = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (ArrayKey::Int(i as i64), Element::Value(v)))
            .collect();
        Array {
            entries,
            next_key: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ArrayKey) -> Option<ElementRef<'_>> {
        self.entries.get(key).map(Element::borrow)
    }

    pub fn get_mut(&mut self, key: &ArrayKey) -> Option<ElementMut<'_>> {
        self.entries.get_mut(key).map(Element::borrow_mut)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite; an existing key keeps its position and a referenced element
    /// is written through
    pub fn insert(&mut self, key: ArrayKey, value: Value) {
        if let (ArrayKey::Int(n), Some(next)) = (&key, self.next_key) {
            if *n >= next {
                self.next_key = Some(n.saturating_add(1));
            }
        }
        match self.entries.get_mut(&key) {
            Some(Element::Ref(slot)) => {
                let old = slot.replace(value);
                drop(old);
            }
            _ => {
                let old = self.entries.insert(key, Element::Value(value));
                drop(old);
            }
        }
    }

    /// Turn the element at `key` into a reference and return its cell. A missing key is
    /// created holding null.
    pub fn element_slot(&mut self, key: ArrayKey) -> Slot {
        if !self.entries.contains_key(&key) {
            self.insert(key.clone(), Value::Null);
        }
        let element = self
            .entries
            .entry(key)
            .or_insert_with(|| Element::Value(Value::Null));
        let slot = match std::mem::replace(element, Element::Value(Value::Null)) {
            Element::Ref(slot) => slot,
            Element::Value(v) => Slot::new(v),
        };
        *element = Element::Ref(slot.clone());
        slot
    }

    /// The key `push` would use
    pub fn next_key(&mut self) -> i64 {
        match self.next_key {
            Some(n) => n,
            None => {
                let n = self
                    .entries
                    .keys()
                    .filter_map(|k| match k {
                        ArrayKey::Int(n) => Some(*n),
                        ArrayKey::Str(_) => None,
                    })
                    .max()
                    .map_or(0, |max| max.saturating_add(1));
                self.next_key = Some(n);
                n
            }
        }
    }

    /// Append under the next auto key
    pub fn push(&mut self, value: Value) -> InterpResult<ArrayKey> {
        let key = ArrayKey::Int(self.next_key());
        if self.entries.contains_key(&key) {
            return Err(PhpError::warning(
                "Cannot add element to the array as the next element is already occupied",
            ));
        }
        self.insert(key.clone(), value);
        Ok(key)
    }

    /// Remove a key, keeping the order of the rest. The auto key never goes back down.
    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        self.next_key();
        self.entries.shift_remove(key).map(Element::into_value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.entries.values().map(Element::borrow)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, ElementRef<'_>)> {
        self.entries.iter().map(|(k, e)| (k, e.borrow()))
    }

    pub fn first_key(&self) -> Option<&ArrayKey> {
        self.entries.keys().next()
    }

    pub fn last_key(&self) -> Option<&ArrayKey> {
        self.entries.keys().next_back()
    }

    /// `$a + $b`: keys of `self` win, missing keys are appended from `other`
    pub fn union(&self, other: &Array) -> Array {
        let mut result = self.clone();
        for (k, v) in other.iter() {
            if !result.contains_key(k) {
                result.insert(k.clone(), v.clone());
            }
        }
        result
    }
}

impl FromIterator<(ArrayKey, Value)> for Array {
    fn from_iter<I: IntoIterator<Item = (ArrayKey, Value)>>(iter: I) -> Self {
        let mut array = Array::new();
        for (k, v) in iter {
            array.insert(k, v);
        }
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: Value) -> ArrayKey {
        ArrayKey::from_value(&v).unwrap()
    }

    // ---- Key normalization ----

    #[test]
    fn test_key_normalization() {
        assert_eq!(key(Value::Bool(true)), ArrayKey::Int(1));
        assert_eq!(key(Value::Bool(false)), ArrayKey::Int(0));
        assert_eq!(key(Value::Float(8.7)), ArrayKey::Int(8));
        assert_eq!(key(Value::Float(-1.9)), ArrayKey::Int(-1));
        assert_eq!(key(Value::str("8")), ArrayKey::Int(8));
        assert_eq!(key(Value::str("-12")), ArrayKey::Int(-12));
        assert_eq!(key(Value::Null), ArrayKey::Str(Vec::new()));
    }

    #[test]
    fn test_non_canonical_strings_stay_strings() {
        for s in ["08", "+8", "-0", "1.5", " 1", "1 ", "", "9223372036854775808"] {
            assert_eq!(key(Value::str(s)), ArrayKey::Str(s.as_bytes().to_vec()), "{s:?}");
        }
        assert_eq!(key(Value::str("0")), ArrayKey::Int(0));
        assert_eq!(
            key(Value::str("-9223372036854775808")),
            ArrayKey::Int(i64::MIN)
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            Value::Bool(true),
            Value::Float(3.99),
            Value::str("42"),
            Value::str("042"),
            Value::Null,
            Value::Int(-5),
        ];
        for v in samples {
            let once = key(v);
            let twice = key(once.to_value());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_illegal_offset() {
        let err = ArrayKey::from_value(&Value::Array(Array::new())).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message.contains("Illegal offset type array"));
    }

    // ---- Ordering and auto keys ----

    #[test]
    fn test_overwrite_keeps_position() {
        let mut a = Array::new();
        a.insert("x".into(), Value::Int(1));
        a.insert("y".into(), Value::Int(2));
        a.insert("x".into(), Value::Int(3));
        let keys: Vec<String> = a.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["x", "y"]);
        assert_eq!(a.get(&"x".into()).as_deref(), Some(&Value::Int(3)));
    }

    #[test]
    fn test_push_monotonic() {
        let mut a = Array::new();
        for i in 0..4 {
            assert_eq!(a.push(Value::Int(i)).unwrap(), ArrayKey::Int(i));
        }
        a.insert(ArrayKey::Int(10), Value::Null);
        assert_eq!(a.push(Value::Null).unwrap(), ArrayKey::Int(11));
        a.insert(ArrayKey::Int(5), Value::Null);
        assert_eq!(a.push(Value::Null).unwrap(), ArrayKey::Int(12));
    }

    #[test]
    fn test_next_key_derived_lazily() {
        let mut a: Array = vec![
            (ArrayKey::Int(3), Value::Null),
            (ArrayKey::from("k"), Value::Null),
            (ArrayKey::Int(7), Value::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(a.next_key(), 8);

        let mut negative: Array = vec![(ArrayKey::Int(-5), Value::Null)].into_iter().collect();
        assert_eq!(negative.next_key(), -4);

        assert_eq!(Array::new().next_key(), 0);
    }

    #[test]
    fn test_remove_does_not_reuse_keys() {
        let mut a = Array::from_values(vec![Value::Int(1), Value::Int(2)]);
        a.remove(&ArrayKey::Int(1));
        assert_eq!(a.push(Value::Int(3)).unwrap(), ArrayKey::Int(2));
    }

    #[test]
    fn test_push_after_max_key_fails() {
        let mut a = Array::new();
        a.insert(ArrayKey::Int(i64::MAX), Value::Null);
        assert!(a.push(Value::Null).is_err());
    }

    // ---- References ----

    #[test]
    fn test_element_slot_writes_through() {
        let mut a = Array::from_values(vec![Value::Int(1), Value::Int(2)]);
        let slot = a.element_slot(ArrayKey::Int(0));
        slot.set(Value::Int(5));
        assert_eq!(a.get(&ArrayKey::Int(0)).as_deref(), Some(&Value::Int(5)));
        a.insert(ArrayKey::Int(0), Value::Int(9));
        assert_eq!(slot.get(), Value::Int(9));
        assert!(a.element_slot(ArrayKey::Int(0)).ptr_eq(&slot));
    }

    #[test]
    fn test_element_slot_creates_missing_key() {
        let mut a = Array::new();
        let slot = a.element_slot(ArrayKey::Int(4));
        assert_eq!(slot.get(), Value::Null);
        assert_eq!(a.push(Value::Null).unwrap(), ArrayKey::Int(5));
    }

    #[test]
    fn test_copy_keeps_only_live_references() {
        let mut a = Array::from_values(vec![Value::Int(1)]);
        let slot = a.element_slot(ArrayKey::Int(0));
        let shared = a.clone();
        slot.set(Value::Int(2));
        assert_eq!(shared.get(&ArrayKey::Int(0)).as_deref(), Some(&Value::Int(2)));

        drop(slot);
        drop(shared);
        let mut copy = a.clone();
        copy.insert(ArrayKey::Int(0), Value::Int(3));
        assert_eq!(a.get(&ArrayKey::Int(0)).as_deref(), Some(&Value::Int(2)));
        assert_eq!(a.remove(&ArrayKey::Int(0)), Some(Value::Int(2)));
    }

    #[test]
    fn test_union_keeps_left() {
        let left = Array::from_values(vec![Value::Int(1)]);
        let right = Array::from_values(vec![Value::Int(9), Value::Int(2)]);
        let u = left.union(&right);
        assert_eq!(u.len(), 2);
        assert_eq!(u.get(&ArrayKey::Int(0)).as_deref(), Some(&Value::Int(1)));
        assert_eq!(u.get(&ArrayKey::Int(1)).as_deref(), Some(&Value::Int(2)));
    }
}
