//! Function, method and constructor calls

use super::env::{Callable, EnvRef, Frame, child_env};
use super::error::{InterpResult, PhpError};
use super::eval::{Interpreter, STACK_GROW_SIZE, STACK_RED_ZONE};
use super::expr::LValue;
use super::object::{MethodRef, ObjectRef};
use super::signal::{ControlSignal, EvalResult, Unwind};
use super::slot::Slot;
use super::value::Value;
use crate::ast::{ClassDecl, Expr, Param, Spanned, Stmt, TypeHint};
use indexmap::IndexMap;
use std::rc::Rc;

/// Everything needed to run a user-defined body
struct Callee<'a> {
    /// Name used in diagnostics: `f` or `C::m`
    name: String,
    params: &'a [Param],
    return_type: Option<&'a TypeHint>,
    body: &'a [Spanned<Stmt>],
    frame: Frame,
}

/// Arguments evaluated in the caller's scope
struct PreparedArgs {
    slots: Vec<Slot>,
    /// By-reference arguments that are not plain variables; copied back after the call
    write_back: Vec<(LValue, Slot)>,
}

impl Interpreter {
    // ============ Functions ============

    pub(super) fn eval_call(
        &mut self,
        name: &str,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> EvalResult<Value> {
        let callable = env.borrow().lookup_function(name);
        match callable {
            None => Err(PhpError::undefined_function(name).into()),
            Some(Callable::Native(f)) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, env)?);
                }
                match f(self, env, &values) {
                    Ok(value) => Ok(value),
                    Err(err) if err.is_fatal() => Err(err.into()),
                    Err(err) => {
                        self.print_error(&err);
                        Ok(Value::Null)
                    }
                }
            }
            Some(Callable::User(decl)) => {
                let prepared = self.prepare_args(&decl.params, args, env)?;
                let callee = Callee {
                    name: decl.name.clone(),
                    params: &decl.params,
                    return_type: decl.return_type.as_ref(),
                    body: &decl.body,
                    frame: Frame {
                        function: Some(decl.name.clone()),
                        class: None,
                        this: None,
                    },
                };
                self.invoke_with(&callee, prepared)
            }
        }
    }

    /// Evaluate call arguments. By-reference parameters receive the caller's variable slot.
    fn prepare_args(
        &mut self,
        params: &[Param],
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> EvalResult<PreparedArgs> {
        let mut prepared = PreparedArgs {
            slots: Vec::with_capacity(args.len()),
            write_back: Vec::new(),
        };
        for (i, arg) in args.iter().enumerate() {
            let by_ref = params.get(i).is_some_and(|p| p.by_ref);
            if !by_ref {
                let value = self.eval(arg, env)?;
                prepared.slots.push(Slot::new(value));
                continue;
            }
            match &arg.node {
                Expr::Var(_) | Expr::VarVar(_) => {
                    let name = self.variable_name(arg, env)?;
                    let slot = env.borrow_mut().slot_for_write(&name);
                    prepared.slots.push(slot);
                }
                Expr::Subscript { .. } | Expr::Prop { .. } => {
                    let target = self.lvalue(arg, env)?;
                    if let Some(slot) = self.reference_slot(&target)? {
                        prepared.slots.push(slot);
                        continue;
                    }
                    // properties are not reference cells: pass a copy and store it back
                    let slot = Slot::new(self.read_lvalue(&target).unwrap_or_default());
                    prepared.write_back.push((target, slot.clone()));
                    prepared.slots.push(slot);
                }
                _ => {
                    self.print_error(&PhpError::notice(
                        "Only variables should be passed by reference",
                    ));
                    let value = self.eval(arg, env)?;
                    prepared.slots.push(Slot::new(value));
                }
            }
        }
        Ok(prepared)
    }

    fn invoke_with(&mut self, callee: &Callee<'_>, prepared: PreparedArgs) -> EvalResult<Value> {
        let result = self.invoke(callee, prepared.slots)?;
        for (target, slot) in prepared.write_back {
            self.write_lvalue(&target, slot.get())?;
        }
        Ok(result)
    }

    /// Run a user body in a fresh scope whose parent is the global scope
    fn invoke(&mut self, callee: &Callee<'_>, args: Vec<Slot>) -> EvalResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let limit = self.config.max_nesting_level;
            if self.recursion_depth >= limit {
                return Err(PhpError::stack_overflow(limit).into());
            }
            self.recursion_depth += 1;
            let result = self.invoke_inner(callee, args);
            self.recursion_depth -= 1;
            result
        })
    }

    fn invoke_inner(&mut self, callee: &Callee<'_>, args: Vec<Slot>) -> EvalResult<Value> {
        tracing::trace!(function = %callee.name, args = args.len(), "call");
        let func_env = child_env(&self.global_env);
        {
            let mut scope = func_env.borrow_mut();
            scope.frame = callee.frame.clone();
            if let Some(this) = &callee.frame.this {
                scope.declare_variable("this", Value::Object(this.clone()));
            }
        }
        self.bind_params(callee, args, &func_env)?;

        let value = match self.exec_block(callee.body, &func_env)? {
            ControlSignal::Return(value) => value,
            ControlSignal::Exit(code) => return Err(Unwind::Exit(code)),
            _ => Value::Void,
        };
        let checked = self.check_return(callee, value);

        // locals go away before their destructors are looked for
        drop(func_env);
        self.collect_garbage()?;

        match checked? {
            Value::Void => Ok(Value::Null),
            value => Ok(value),
        }
    }

    fn bind_params(
        &mut self,
        callee: &Callee<'_>,
        args: Vec<Slot>,
        env: &EnvRef,
    ) -> EvalResult<()> {
        let required = callee
            .params
            .iter()
            .rposition(|p| p.default.is_none())
            .map_or(0, |i| i + 1);
        if args.len() < required {
            let bound = if required == callee.params.len() {
                "exactly"
            } else {
                "at least"
            };
            return Err(PhpError::argument_count(format!(
                "Too few arguments to function {}(), {} passed and {bound} {required} expected",
                callee.name,
                args.len()
            ))
            .into());
        }

        let mut args = args.into_iter();
        for (i, param) in callee.params.iter().enumerate() {
            match args.next() {
                Some(slot) => {
                    let value = self.check_argument(callee, i, param, slot.get())?;
                    if param.by_ref {
                        slot.set(value);
                        env.borrow_mut().declare_variable_by_ref(&param.name, slot);
                    } else {
                        env.borrow_mut().declare_variable(&param.name, value);
                    }
                }
                None => {
                    let value = match &param.default {
                        Some(default) => self.eval(default, env)?,
                        None => Value::Null,
                    };
                    env.borrow_mut().declare_variable(&param.name, value);
                }
            }
        }
        Ok(())
    }

    fn check_argument(
        &self,
        callee: &Callee<'_>,
        index: usize,
        param: &Param,
        value: Value,
    ) -> InterpResult<Value> {
        let Some(hint) = &param.ty else {
            return Ok(value);
        };
        self.coerce(hint, value).map_err(|given| {
            PhpError::type_error(format!(
                "{}(): Argument #{} (${}) must be of type {hint}, {} given",
                callee.name,
                index + 1,
                param.name,
                given.type_name()
            ))
        })
    }

    fn check_return(&self, callee: &Callee<'_>, value: Value) -> InterpResult<Value> {
        let Some(hint) = callee.return_type else {
            return Ok(value);
        };
        if hint.names.len() == 1 && hint.names[0].eq_ignore_ascii_case("void") {
            return match value {
                Value::Void => Ok(value),
                _ => Err(PhpError::fatal("A void function must not return a value")),
            };
        }
        if let Value::Void = value {
            return Err(PhpError::type_error(format!(
                "{}(): Return value must be of type {hint}, none returned",
                callee.name
            )));
        }
        self.coerce(hint, value).map_err(|returned| {
            PhpError::type_error(format!(
                "{}(): Return value must be of type {hint}, {} returned",
                callee.name,
                returned.type_name()
            ))
        })
    }

    /// Match a value against a declared type. Exact matches win; an int is widened when the
    /// type accepts float. Strings are never converted. The rejected value comes back as `Err`.
    fn coerce(&self, hint: &TypeHint, value: Value) -> Result<Value, Value> {
        let names: Vec<String> = hint.names.iter().map(|n| n.to_ascii_lowercase()).collect();
        let accepts = |name: &str| names.iter().any(|n| n == name);

        if accepts("mixed") {
            return Ok(value);
        }
        if value.is_null() {
            return if hint.nullable || accepts("null") {
                Ok(Value::Null)
            } else {
                Err(value)
            };
        }
        let exact = names.iter().any(|name| match (name.as_str(), &value) {
            ("int", Value::Int(_))
            | ("float", Value::Float(_))
            | ("string", Value::Str(_))
            | ("bool", Value::Bool(_))
            | ("false", Value::Bool(false))
            | ("true", Value::Bool(true))
            | ("array" | "iterable", Value::Array(_))
            | ("object", Value::Object(_)) => true,
            (class, Value::Object(obj)) => self.ctx.instance_of(&obj.class(), class),
            _ => false,
        });
        if exact {
            return Ok(value);
        }
        match value {
            Value::Int(n) if accepts("float") => Ok(Value::Float(n as f64)),
            other => Err(other),
        }
    }

    // ============ Methods ============

    pub(super) fn eval_method_call(
        &mut self,
        object: &Spanned<Expr>,
        method: &str,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> EvalResult<Value> {
        let obj = match self.eval(object, env)? {
            Value::Object(obj) => obj,
            other => {
                return Err(PhpError::uncaught(format!(
                    "Call to a member function {method}() on {}",
                    other.operand_name()
                ))
                .into());
            }
        };
        let class = obj.class();
        let Some(found) = self.ctx.find_method(&class, method) else {
            return Err(PhpError::uncaught(format!(
                "Call to undefined method {}::{method}()",
                class.name
            ))
            .into());
        };
        let prepared = self.prepare_args(&found.decl().params, args, env)?;
        self.call_method(Some(&obj), &found, prepared)
    }

    /// `parent::method(...)`: the parent's implementation, bound to the current `$this`
    pub(super) fn eval_parent_call(
        &mut self,
        method: &str,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> EvalResult<Value> {
        let (class, this) = {
            let scope = env.borrow();
            (scope.frame.class.clone(), scope.frame.this.clone())
        };
        let Some(class) = class else {
            return Err(
                PhpError::uncaught("Cannot use \"parent\" when no class scope is active").into(),
            );
        };
        let Some(parent) = self.ctx.parent_of(&class)? else {
            return Err(PhpError::uncaught(
                "Cannot use \"parent\" when current class scope has no parent",
            )
            .into());
        };
        let Some(found) = self.ctx.find_method(&parent, method) else {
            return Err(PhpError::uncaught(format!(
                "Call to undefined method {}::{method}()",
                parent.name
            ))
            .into());
        };
        let prepared = self.prepare_args(&found.decl().params, args, env)?;
        self.call_method(this.as_ref(), &found, prepared)
    }

    /// Run a method body with `$this` bound. Also the entry point for destructors.
    pub(super) fn invoke_method(
        &mut self,
        this: Option<&ObjectRef>,
        method: &MethodRef,
        args: Vec<Slot>,
    ) -> EvalResult<Value> {
        let prepared = PreparedArgs {
            slots: args,
            write_back: Vec::new(),
        };
        self.call_method(this, method, prepared)
    }

    fn call_method(
        &mut self,
        this: Option<&ObjectRef>,
        method: &MethodRef,
        prepared: PreparedArgs,
    ) -> EvalResult<Value> {
        let decl = method.decl();
        let Some(body) = &decl.body else {
            return Err(PhpError::uncaught(format!(
                "Cannot call abstract method {}::{}()",
                method.class.name, decl.name
            ))
            .into());
        };
        let callee = Callee {
            name: format!("{}::{}", method.class.name, decl.name),
            params: &decl.params,
            return_type: decl.return_type.as_ref(),
            body,
            frame: Frame {
                function: Some(decl.name.clone()),
                class: Some(Rc::clone(&method.class)),
                this: this.cloned(),
            },
        };
        self.invoke_with(&callee, prepared)
    }

    // ============ Construction ============

    /// `new C(args)`: initialize declared properties base class first, then run `__construct`
    pub(super) fn eval_new(
        &mut self,
        class_name: &str,
        args: &[Spanned<Expr>],
        env: &EnvRef,
    ) -> EvalResult<Value> {
        let Some(class) = self.ctx.get_class(class_name) else {
            if let Some(interface) = self.ctx.get_interface(class_name) {
                return Err(PhpError::uncaught(format!(
                    "Cannot instantiate interface {}",
                    interface.name
                ))
                .into());
            }
            return Err(PhpError::class_not_found(class_name).into());
        };
        if class.is_abstract {
            return Err(PhpError::uncaught(format!(
                "Cannot instantiate abstract class {}",
                class.name
            ))
            .into());
        }

        let properties = self.initial_properties(&class, env)?;
        let object = self.ctx.instantiate(Rc::clone(&class), properties)?;
        tracing::debug!(class = %class.name, id = object.id(), "object constructed");

        match self.ctx.find_method(&class, "__construct") {
            Some(ctor) => {
                let prepared = self.prepare_args(&ctor.decl().params, args, env)?;
                self.call_method(Some(&object), &ctor, prepared)?;
            }
            None => {
                for arg in args {
                    self.eval(arg, env)?;
                }
            }
        }
        Ok(Value::Object(object))
    }

    fn initial_properties(
        &mut self,
        class: &Rc<ClassDecl>,
        env: &EnvRef,
    ) -> EvalResult<IndexMap<String, Value>> {
        let mut properties = IndexMap::new();
        for c in self.ctx.class_chain(class)? {
            for property in &c.properties {
                let value = match &property.default {
                    Some(default) => self.eval(default, env)?,
                    None => Value::Null,
                };
                properties.insert(property.name.clone(), value);
            }
        }
        Ok(properties)
    }
}
