//! Shared value cells used for variable storage and references

use super::value::Value;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A mutable cell holding one value.
///
/// Cloning a `Slot` clones the handle: both handles then alias the same cell, which is how
/// `global`, `&$param` and `$a = &$b` bindings are made.
#[derive(Debug, Clone, Default)]
pub struct Slot(Rc<RefCell<Value>>);

impl Slot {
    pub fn new(value: Value) -> Self {
        Slot(Rc::new(RefCell::new(value)))
    }

    /// Copy of the current value
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Replace the value, returning the previous one
    pub fn replace(&self, value: Value) -> Value {
        self.0.replace(value)
    }

    pub fn set(&self, value: Value) {
        self.replace(value);
    }

    /// Mutate the value in place
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn borrow(&self) -> Ref<'_, Value> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Value> {
        self.0.borrow_mut()
    }

    /// Another handle to this cell exists
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.0) > 1
    }

    /// Whether two handles alias the same cell
    pub fn ptr_eq(&self, other: &Slot) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliasing() {
        let a = Slot::new(Value::Int(1));
        let b = a.clone();
        b.set(Value::Int(2));
        assert_eq!(a.get(), Value::Int(2));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Slot::new(Value::Int(2))));
        assert!(a.is_shared());
        drop(b);
        assert!(!a.is_shared());
    }

    #[test]
    fn test_with_mut() {
        let s = Slot::new(Value::str("ab"));
        s.with_mut(|v| {
            if let Value::Str(bytes) = v {
                bytes.push(b'c');
            }
        });
        assert_eq!(s.get(), Value::str("abc"));
        assert_eq!(s.replace(Value::Null), Value::str("abc"));
    }
}
