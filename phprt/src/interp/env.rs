//! Environment for variable bindings

use super::error::{InterpResult, PhpError};
use super::native::NativeFn;
use super::object::ObjectRef;
use super::slot::Slot;
use super::value::Value;
use crate::ast::{ClassDecl, FnDecl};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Shared reference to an environment
pub type EnvRef = Rc<RefCell<Environment>>;

/// Something that can be called by name
#[derive(Clone)]
pub enum Callable {
    Native(NativeFn),
    User(Rc<FnDecl>),
}

/// What is executing in a scope: feeds `$this`, `parent::` and the magic constants
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Declared name of the running function or method
    pub function: Option<String>,
    /// Class declaring the running method
    pub class: Option<Rc<ClassDecl>>,
    pub this: Option<ObjectRef>,
}

/// A scope holding variable slots.
///
/// The root scope also owns constants, user functions and native functions; nested scopes
/// reach them through the parent chain.
pub struct Environment {
    parent: Option<EnvRef>,
    /// Declaration order decides the order objects are released at scope teardown
    variables: IndexMap<String, Slot>,
    /// Superglobals, consulted before ordinary variables
    predefined: HashMap<String, Slot>,
    /// Names imported with `global`
    globals: HashSet<String>,
    constants: HashMap<String, Value>,
    functions: HashMap<String, Rc<FnDecl>>,
    natives: HashMap<String, NativeFn>,
    pub frame: Frame,
}

impl Environment {
    /// Create a new root environment
    pub fn new() -> Self {
        Environment {
            parent: None,
            variables: IndexMap::new(),
            predefined: HashMap::new(),
            globals: HashSet::new(),
            constants: HashMap::new(),
            functions: HashMap::new(),
            natives: HashMap::new(),
            frame: Frame::default(),
        }
    }

    /// Create a new environment with a parent
    pub fn with_parent(parent: EnvRef) -> Self {
        Environment {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Wrap in Rc<RefCell<>>
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The root environment, or `None` when this is the root
    fn root(&self) -> Option<EnvRef> {
        let mut current = Rc::clone(self.parent.as_ref()?);
        loop {
            let next = current.borrow().parent.clone();
            match next {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
    }

    /// Run `f` against the root environment (which may be `self`)
    fn with_root<R>(&self, f: impl FnOnce(&Environment) -> R) -> R {
        match self.root() {
            Some(root) => f(&root.borrow()),
            None => f(self),
        }
    }

    fn with_root_mut<R>(&mut self, f: impl FnOnce(&mut Environment) -> R) -> R {
        match self.root() {
            Some(root) => f(&mut root.borrow_mut()),
            None => f(self),
        }
    }

    fn redirects_to_root(&self, name: &str) -> bool {
        !self.is_root() && self.globals.contains(name)
    }

    // ---- Variables ----

    pub fn define_predefined(&mut self, name: &str, value: Value) {
        self.predefined.insert(name.to_string(), Slot::new(value));
    }

    fn find_predefined(&self, name: &str) -> Option<Slot> {
        if let Some(slot) = self.predefined.get(name) {
            return Some(slot.clone());
        }
        self.parent
            .as_ref()
            .and_then(|p| p.borrow().find_predefined(name))
    }

    /// `lookupVariable`: predefined variables, then a `global` redirect, then locals.
    ///
    /// An undeclared name yields the "Undefined variable" warning; callers report it and
    /// continue with null.
    pub fn lookup_variable(&self, name: &str) -> InterpResult<Slot> {
        if let Some(slot) = self.find_predefined(name) {
            return Ok(slot);
        }
        if self.redirects_to_root(name) {
            return self.with_root(|root| root.lookup_variable(name));
        }
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| PhpError::undefined_variable(name))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.lookup_variable(name).is_ok()
    }

    /// Slot a write to `name` lands in, created holding null when missing
    pub fn slot_for_write(&mut self, name: &str) -> Slot {
        if let Some(slot) = self.find_predefined(name) {
            return slot;
        }
        if self.redirects_to_root(name) {
            return self.with_root_mut(|root| root.slot_for_write(name));
        }
        self.variables.entry(name.to_string()).or_default().clone()
    }

    /// `declareVariable`: store into the existing slot so references see the change, or
    /// bind a fresh slot
    pub fn declare_variable(&mut self, name: &str, value: Value) {
        let old = self.slot_for_write(name).replace(value);
        drop(old);
    }

    /// `declareVariableByRef`: bind `name` to an existing slot.
    ///
    /// Rebinding a `global`-imported name breaks the link to the root variable.
    pub fn declare_variable_by_ref(&mut self, name: &str, slot: Slot) {
        if let Some(existing) = self.predefined.get_mut(name) {
            *existing = slot;
            return;
        }
        self.globals.remove(name);
        self.variables.insert(name.to_string(), slot);
    }

    /// Remove the binding for `name` in this scope. Other aliases of the slot keep the value.
    pub fn unset_variable(&mut self, name: &str) -> Option<Slot> {
        if self.globals.remove(name) && !self.is_root() {
            return None;
        }
        self.variables.shift_remove(name)
    }

    /// `addGlobalVariable`: reads and writes of `name` go to the root scope from now on
    pub fn add_global_variable(&mut self, name: &str) {
        if self.is_root() {
            return;
        }
        self.variables.shift_remove(name);
        self.globals.insert(name.to_string());
        let root = self.root();
        if let Some(root) = root {
            root.borrow_mut().slot_for_write(name);
        }
    }

    /// Local variable names in insertion-independent order
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.keys().cloned().collect();
        names.sort();
        names
    }

    // ---- Constants ----

    /// Declare a constant in the root scope. Redefinition is a warning and keeps the first value.
    pub fn declare_constant(&mut self, name: &str, value: Value) -> InterpResult<()> {
        self.with_root_mut(|root| {
            if root.constants.contains_key(name) || special_constant(name).is_some() {
                return Err(PhpError::warning(format!("Constant {name} already defined")));
            }
            tracing::trace!(name, "constant declared");
            root.constants.insert(name.to_string(), value);
            Ok(())
        })
    }

    pub fn lookup_constant(&self, name: &str) -> InterpResult<Value> {
        if let Some(value) = special_constant(name) {
            return Ok(value);
        }
        self.with_root(|root| root.constants.get(name).cloned())
            .ok_or_else(|| PhpError::undefined_constant(name))
    }

    pub fn constant_defined(&self, name: &str) -> bool {
        self.lookup_constant(name).is_ok()
    }

    // ---- Functions ----

    /// Register a native function under a case-insensitive name
    pub fn register_native(&mut self, name: &str, f: NativeFn) {
        self.with_root_mut(|root| {
            root.natives.insert(name.to_ascii_lowercase(), f);
        });
    }

    pub fn define_user_function(&mut self, decl: FnDecl) -> InterpResult<()> {
        let key = decl.name.to_ascii_lowercase();
        self.with_root_mut(|root| {
            if root.natives.contains_key(&key) || root.functions.contains_key(&key) {
                return Err(PhpError::fatal(format!("Cannot redeclare {}()", decl.name)));
            }
            tracing::debug!(name = %decl.name, "function registered");
            root.functions.insert(key, Rc::new(decl));
            Ok(())
        })
    }

    /// Resolve a function by case-insensitive name; natives win over user functions
    pub fn lookup_function(&self, name: &str) -> Option<Callable> {
        let key = name.to_ascii_lowercase();
        self.with_root(|root| {
            if let Some(f) = root.natives.get(&key) {
                return Some(Callable::Native(*f));
            }
            root.functions.get(&key).cloned().map(Callable::User)
        })
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.lookup_function(name).is_some()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// `true`, `false` and `null` resolve case-insensitively
fn special_constant(name: &str) -> Option<Value> {
    if name.eq_ignore_ascii_case("true") {
        Some(Value::Bool(true))
    } else if name.eq_ignore_ascii_case("false") {
        Some(Value::Bool(false))
    } else if name.eq_ignore_ascii_case("null") {
        Some(Value::Null)
    } else {
        None
    }
}

/// Create a child environment from a parent reference
pub fn child_env(parent: &EnvRef) -> EnvRef {
    Environment::with_parent(Rc::clone(parent)).into_ref()
}
