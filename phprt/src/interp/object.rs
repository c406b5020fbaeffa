//! Objects, class registry and the execution context that owns them

use super::error::{InterpResult, PhpError};
use super::value::Value;
use crate::ast::{ClassDecl, InterfaceDecl, MethodDecl, Visibility};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

/// Objects whose last handle was dropped and whose destructor has not run yet, in release order
pub type DestructQueue = Rc<RefCell<VecDeque<ObjectRef>>>;

/// Instance state
pub struct ObjectData {
    pub class: Rc<ClassDecl>,
    pub properties: IndexMap<String, Value>,
    pub id: usize,
    /// `__destruct` already ran (or the object was released without one)
    pub destructed: bool,
    /// Declared protected/private properties with their declaring class
    hidden: HashMap<String, (Visibility, String)>,
    has_destructor: bool,
    queue: Weak<RefCell<VecDeque<ObjectRef>>>,
}

/// Shared handle to an object. Assigning an object copies the handle, never the instance.
///
/// When the last handle is dropped and the class has a destructor, the instance is pushed
/// onto the context's [`DestructQueue`] so the interpreter can run `__destruct`.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
    pub fn class(&self) -> Rc<ClassDecl> {
        Rc::clone(&self.0.borrow().class)
    }

    pub fn class_name(&self) -> String {
        self.0.borrow().class.name.clone()
    }

    pub fn id(&self) -> usize {
        self.0.borrow().id
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.0.borrow().properties.get(name).cloned()
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.0.borrow().properties.contains_key(name)
    }

    pub fn set_property(&self, name: &str, value: Value) {
        let old = self
            .0
            .borrow_mut()
            .properties
            .insert(name.to_string(), value);
        drop(old);
    }

    pub fn remove_property(&self, name: &str) -> Option<Value> {
        let old = self.0.borrow_mut().properties.shift_remove(name);
        old
    }

    pub fn with_property<R>(&self, name: &str, f: impl FnOnce(&Value) -> R) -> Option<R> {
        self.0.borrow().properties.get(name).map(f)
    }

    /// Mutate one property in place, creating it as null first if missing
    pub fn with_property_mut<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut data = self.0.borrow_mut();
        let slot = data.properties.entry(name.to_string()).or_default();
        f(slot)
    }

    /// All properties in declaration order
    pub fn properties(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Properties visible from outside the class: declared public ones and dynamic ones
    pub fn public_properties(&self) -> Vec<(String, Value)> {
        let data = self.0.borrow();
        data.properties
            .iter()
            .filter(|(k, _)| !data.hidden.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Every property with its visibility, for the dump functions
    pub fn property_views(&self) -> Vec<PropertyView> {
        let data = self.0.borrow();
        data.properties
            .iter()
            .map(|(name, value)| {
                let (visibility, class) = match data.hidden.get(name) {
                    Some((vis, class)) => (*vis, class.clone()),
                    None => (Visibility::Public, data.class.name.clone()),
                };
                PropertyView {
                    name: name.clone(),
                    value: value.clone(),
                    visibility,
                    class,
                }
            })
            .collect()
    }

    pub fn is_destructed(&self) -> bool {
        self.0.borrow().destructed
    }

    pub fn mark_destructed(&self) {
        self.0.borrow_mut().destructed = true;
    }

    pub fn has_destructor(&self) -> bool {
        self.0.borrow().has_destructor
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => write!(f, "ObjectRef({}#{})", data.class.name, data.id),
            Err(_) => write!(f, "ObjectRef(<borrowed>)"),
        }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let queue = match self.0.try_borrow() {
            Ok(data) if data.has_destructor && !data.destructed => data.queue.upgrade(),
            _ => None,
        };
        if let Some(queue) = queue {
            if let Ok(mut pending) = queue.try_borrow_mut() {
                pending.push_back(ObjectRef(Rc::clone(&self.0)));
            }
        }
    }
}

/// Snapshot of one property as the dump functions see it
#[derive(Debug, Clone)]
pub struct PropertyView {
    pub name: String,
    pub value: Value,
    pub visibility: Visibility,
    /// Declaring class, meaningful for private properties
    pub class: String,
}

/// A method found on a class or one of its ancestors
#[derive(Debug, Clone)]
pub struct MethodRef {
    /// Class that declares the method
    pub class: Rc<ClassDecl>,
    index: usize,
}

impl MethodRef {
    pub fn decl(&self) -> &MethodDecl {
        &self.class.methods[self.index]
    }
}

/// Per-run state shared by every scope: the class/interface registries and live objects
pub struct ExecutionContext {
    classes: HashMap<String, Rc<ClassDecl>>,
    interfaces: HashMap<String, Rc<InterfaceDecl>>,
    objects: Vec<Weak<RefCell<ObjectData>>>,
    next_object_id: usize,
    queue: DestructQueue,
}

/// Upper bound on inheritance depth, guards against `A extends B, B extends A`
const MAX_CLASS_DEPTH: usize = 256;

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext {
            classes: HashMap::new(),
            interfaces: HashMap::new(),
            objects: Vec::new(),
            next_object_id: 1,
            queue: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn add_class(&mut self, class: ClassDecl) -> InterpResult<Rc<ClassDecl>> {
        let key = class.name.to_ascii_lowercase();
        if self.classes.contains_key(&key) || self.interfaces.contains_key(&key) {
            return Err(PhpError::fatal(format!(
                "Cannot declare class {}, because the name is already in use",
                class.name
            )));
        }
        let class = Rc::new(class);
        self.classes.insert(key, Rc::clone(&class));
        Ok(class)
    }

    pub fn get_class(&self, name: &str) -> Option<Rc<ClassDecl>> {
        self.classes.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn add_interface(&mut self, interface: InterfaceDecl) -> InterpResult<()> {
        let key = interface.name.to_ascii_lowercase();
        if self.classes.contains_key(&key) || self.interfaces.contains_key(&key) {
            return Err(PhpError::fatal(format!(
                "Cannot declare interface {}, because the name is already in use",
                interface.name
            )));
        }
        self.interfaces.insert(key, Rc::new(interface));
        Ok(())
    }

    pub fn get_interface(&self, name: &str) -> Option<Rc<InterfaceDecl>> {
        self.interfaces.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn parent_of(&self, class: &ClassDecl) -> InterpResult<Option<Rc<ClassDecl>>> {
        match &class.parent {
            None => Ok(None),
            Some(name) => self
                .get_class(name)
                .map(Some)
                .ok_or_else(|| PhpError::class_not_found(name)),
        }
    }

    /// The class and its ancestors, most distant ancestor first
    pub fn class_chain(&self, class: &Rc<ClassDecl>) -> InterpResult<Vec<Rc<ClassDecl>>> {
        let mut chain = vec![Rc::clone(class)];
        let mut current = Rc::clone(class);
        while let Some(parent) = self.parent_of(&current)? {
            if chain.len() >= MAX_CLASS_DEPTH {
                return Err(PhpError::fatal(format!(
                    "Class {} has a circular inheritance chain",
                    class.name
                )));
            }
            chain.push(Rc::clone(&parent));
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Look a method up on the class, then its ancestors
    pub fn find_method(&self, class: &Rc<ClassDecl>, name: &str) -> Option<MethodRef> {
        let mut current = Some(Rc::clone(class));
        let mut depth = 0;
        while let Some(c) = current {
            if let Some(index) = c.methods.iter().position(|m| m.name.eq_ignore_ascii_case(name)) {
                if c.methods[index].body.is_some() {
                    return Some(MethodRef { class: c, index });
                }
            }
            depth += 1;
            if depth > MAX_CLASS_DEPTH {
                return None;
            }
            current = c.parent.as_deref().and_then(|p| self.get_class(p));
        }
        None
    }

    /// Whether `class` is `name`, extends it or implements it
    pub fn instance_of(&self, class: &Rc<ClassDecl>, name: &str) -> bool {
        let Ok(chain) = self.class_chain(class) else {
            return false;
        };
        chain.iter().any(|c| {
            c.name.eq_ignore_ascii_case(name)
                || c.interfaces.iter().any(|i| self.interface_extends(i, name, 0))
        })
    }

    fn interface_extends(&self, interface: &str, name: &str, depth: usize) -> bool {
        if interface.eq_ignore_ascii_case(name) {
            return true;
        }
        if depth > MAX_CLASS_DEPTH {
            return false;
        }
        self.get_interface(interface).is_some_and(|i| {
            i.parents
                .iter()
                .any(|p| self.interface_extends(p, name, depth + 1))
        })
    }

    /// Abstract methods (`Declaring::method`) an interface requires, including inherited ones
    fn interface_methods(
        &self,
        name: &str,
        out: &mut Vec<(String, String)>,
        depth: usize,
    ) -> InterpResult<()> {
        let interface = self
            .get_interface(name)
            .ok_or_else(|| PhpError::uncaught(format!("Interface \"{name}\" not found")))?;
        if depth > MAX_CLASS_DEPTH {
            return Ok(());
        }
        for parent in &interface.parents {
            self.interface_methods(parent, out, depth + 1)?;
        }
        for m in &interface.methods {
            out.push((interface.name.clone(), m.name.clone()));
        }
        Ok(())
    }

    /// Check that the parent and interfaces exist and that a concrete class implements every
    /// abstract method it inherits
    pub fn validate_class(&self, class: &Rc<ClassDecl>) -> InterpResult<()> {
        let chain = self.class_chain(class)?;
        let mut required: Vec<(String, String)> = Vec::new();
        for c in &chain {
            for interface in &c.interfaces {
                self.interface_methods(interface, &mut required, 0)?;
            }
            for m in c.methods.iter().filter(|m| m.body.is_none()) {
                required.push((c.name.clone(), m.name.clone()));
            }
        }
        if class.is_abstract {
            return Ok(());
        }

        let mut seen = HashSet::new();
        let missing: Vec<String> = required
            .into_iter()
            .filter(|(_, method)| self.find_method(class, method).is_none())
            .filter(|(_, method)| seen.insert(method.to_ascii_lowercase()))
            .map(|(owner, method)| format!("{owner}::{method}"))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let noun = if missing.len() == 1 { "method" } else { "methods" };
        Err(PhpError::fatal(format!(
            "Class {} contains {} abstract {noun} and must therefore be declared abstract or \
             implement the remaining methods ({})",
            class.name,
            missing.len(),
            missing.join(", ")
        )))
    }

    /// Allocate an instance with already-initialized properties
    pub fn instantiate(
        &mut self,
        class: Rc<ClassDecl>,
        properties: IndexMap<String, Value>,
    ) -> InterpResult<ObjectRef> {
        let chain = self.class_chain(&class)?;
        let mut hidden = HashMap::new();
        for c in &chain {
            for p in &c.properties {
                if p.visibility == Visibility::Public {
                    hidden.remove(&p.name);
                } else {
                    hidden.insert(p.name.clone(), (p.visibility, c.name.clone()));
                }
            }
        }
        let has_destructor = self.find_method(&class, "__destruct").is_some();

        let id = self.next_object_id;
        self.next_object_id += 1;
        let data = ObjectData {
            class,
            properties,
            id,
            destructed: false,
            hidden,
            has_destructor,
            queue: Rc::downgrade(&self.queue),
        };
        let object = ObjectRef(Rc::new(RefCell::new(data)));

        if self.objects.len() >= 256 && self.objects.len().is_power_of_two() {
            self.objects.retain(|w| w.strong_count() > 0);
        }
        self.objects.push(Rc::downgrade(&object.0));
        tracing::trace!(class = %object.class_name(), id, "object allocated");
        Ok(object)
    }

    /// Next object waiting for its destructor
    pub fn pop_pending(&self) -> Option<ObjectRef> {
        self.queue.borrow_mut().pop_front()
    }

    /// Every object still alive whose destructor has not run, in creation order
    pub fn live_objects(&self) -> Vec<ObjectRef> {
        self.objects
            .iter()
            .filter_map(Weak::upgrade)
            .map(ObjectRef)
            .filter(|o| o.has_destructor() && !o.is_destructed())
            .collect()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.values().map(|c| c.name.clone()).collect()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Position, PropertyDecl};

    fn method(name: &str, body: bool) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            visibility: Visibility::Public,
            is_abstract: !body,
            params: vec![],
            return_type: None,
            body: if body { Some(vec![]) } else { None },
            pos: Position::default(),
        }
    }

    fn class(name: &str, parent: Option<&str>, methods: Vec<MethodDecl>) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            interfaces: vec![],
            is_abstract: false,
            properties: vec![],
            methods,
            pos: Position::default(),
        }
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        let mut ctx = ExecutionContext::new();
        ctx.add_class(class("Foo", None, vec![])).unwrap();
        assert!(ctx.get_class("FOO").is_some());
        assert!(ctx.add_class(class("foo", None, vec![])).is_err());
    }

    #[test]
    fn test_class_chain_base_first() {
        let mut ctx = ExecutionContext::new();
        ctx.add_class(class("A", None, vec![])).unwrap();
        ctx.add_class(class("B", Some("A"), vec![])).unwrap();
        let c = ctx.add_class(class("C", Some("b"), vec![])).unwrap();
        let names: Vec<String> = ctx
            .class_chain(&c)
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(ctx.instance_of(&c, "a"));
    }

    #[test]
    fn test_missing_parent() {
        let mut ctx = ExecutionContext::new();
        let c = ctx.add_class(class("C", Some("Nope"), vec![])).unwrap();
        let err = ctx.class_chain(&c).unwrap_err();
        assert_eq!(err.message, "Uncaught Error: Class \"Nope\" not found");
    }

    #[test]
    fn test_find_method_walks_parents() {
        let mut ctx = ExecutionContext::new();
        ctx.add_class(class("A", None, vec![method("hello", true)])).unwrap();
        let b = ctx.add_class(class("B", Some("A"), vec![])).unwrap();
        let found = ctx.find_method(&b, "HELLO").unwrap();
        assert_eq!(found.class.name, "A");
        assert_eq!(found.decl().name, "hello");
        assert!(ctx.find_method(&b, "other").is_none());
    }

    #[test]
    fn test_validate_abstract_methods() {
        let mut ctx = ExecutionContext::new();
        ctx.add_interface(InterfaceDecl {
            name: "Shape".to_string(),
            parents: vec![],
            methods: vec![method("area", false)],
            pos: Position::default(),
        })
        .unwrap();
        let mut square = class("Square", None, vec![]);
        square.interfaces.push("Shape".to_string());
        let square = ctx.add_class(square).unwrap();
        let err = ctx.validate_class(&square).unwrap_err();
        assert_eq!(
            err.message,
            "Class Square contains 1 abstract method and must therefore be declared abstract \
             or implement the remaining methods (Shape::area)"
        );

        let mut circle = class("Circle", None, vec![method("area", true)]);
        circle.interfaces.push("shape".to_string());
        let circle = ctx.add_class(circle).unwrap();
        assert!(ctx.validate_class(&circle).is_ok());
        assert!(ctx.instance_of(&circle, "Shape"));

        let mut broken = class("Broken", None, vec![]);
        broken.interfaces.push("Missing".to_string());
        let broken = ctx.add_class(broken).unwrap();
        assert_eq!(
            ctx.validate_class(&broken).unwrap_err().message,
            "Uncaught Error: Interface \"Missing\" not found"
        );
    }

    #[test]
    fn test_last_handle_queues_destructor() {
        let mut ctx = ExecutionContext::new();
        let c = ctx
            .add_class(class("D", None, vec![method("__destruct", true)]))
            .unwrap();
        let obj = ctx.instantiate(c, IndexMap::new()).unwrap();
        let copy = obj.clone();
        drop(obj);
        assert!(ctx.pop_pending().is_none());
        drop(copy);
        let pending = ctx.pop_pending().unwrap();
        assert_eq!(pending.class_name(), "D");
        pending.mark_destructed();
        drop(pending);
        assert!(ctx.pop_pending().is_none());
    }

    #[test]
    fn test_pending_in_release_order() {
        let mut ctx = ExecutionContext::new();
        let c = ctx
            .add_class(class("D", None, vec![method("__destruct", true)]))
            .unwrap();
        let objects: Vec<ObjectRef> = (0..3)
            .map(|_| ctx.instantiate(c.clone(), IndexMap::new()).unwrap())
            .collect();
        let ids: Vec<usize> = objects.iter().map(ObjectRef::id).collect();
        drop(objects);
        let mut released = Vec::new();
        while let Some(pending) = ctx.pop_pending() {
            pending.mark_destructed();
            released.push(pending.id());
        }
        assert_eq!(released, ids);
    }

    #[test]
    fn test_public_properties_skip_hidden() {
        let mut ctx = ExecutionContext::new();
        let mut decl = class("P", None, vec![]);
        decl.properties = vec![
            PropertyDecl {
                name: "a".to_string(),
                visibility: Visibility::Public,
                ty: None,
                default: None,
            },
            PropertyDecl {
                name: "b".to_string(),
                visibility: Visibility::Private,
                ty: None,
                default: None,
            },
        ];
        let decl = ctx.add_class(decl).unwrap();
        let mut props = IndexMap::new();
        props.insert("a".to_string(), Value::Int(1));
        props.insert("b".to_string(), Value::Int(2));
        let obj = ctx.instantiate(decl, props).unwrap();
        obj.set_property("dynamic", Value::Int(3));
        let names: Vec<String> = obj.public_properties().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "dynamic"]);
        assert_eq!(obj.properties().len(), 3);
        let views = obj.property_views();
        assert_eq!(views[1].visibility, Visibility::Private);
        assert_eq!(views[1].class, "P");
        assert_eq!(views[2].visibility, Visibility::Public);
    }
}
