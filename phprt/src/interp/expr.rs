//! Expression evaluation and assignment targets

use super::arith::{calculate, concat_operand, decrement, increment, unary};
use super::array::{Array, ArrayKey};
use super::compare::{Relation, compare_relation, identical, loose_equals};
use super::convert::{
    Number, Numeric, float_to_int, parse_numeric, to_array, to_bool, to_float, to_int, to_str,
    to_string_lossy,
};
use super::env::EnvRef;
use super::error::{ErrorSink, InterpResult, PhpError};
use super::eval::{Interpreter, STACK_GROW_SIZE, STACK_RED_ZONE, located};
use super::object::ObjectRef;
use super::signal::{EvalResult, Unwind};
use super::slot::Slot;
use super::value::Value;
use crate::ast::{BinOp, CastType, Expr, IncDecOp, MagicConst, Spanned};
use std::path::Path;

/// Storage an assignment lands in: a variable slot or an object property
#[derive(Debug, Clone)]
pub(super) enum Container {
    Slot(Slot),
    Prop(ObjectRef, String),
}

/// A resolved assignment target: a container plus the subscripts below it.
/// `None` segments are `[]` appends.
#[derive(Debug, Clone)]
pub(super) struct LValue {
    pub container: Container,
    pub path: Vec<Option<Value>>,
}

impl LValue {
    pub fn new(container: Container) -> Self {
        LValue {
            container,
            path: Vec::new(),
        }
    }

    /// The lvalue one subscript further down
    pub fn with_key(&self, key: Value) -> Self {
        let mut lv = self.clone();
        lv.path.push(Some(key));
        lv
    }
}

impl Interpreter {
    /// Evaluate an expression with automatic stack growth for deep recursion
    pub(super) fn eval(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> EvalResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let saved = self.current_pos;
            if expr.pos.line > 0 {
                self.current_pos = expr.pos;
            }
            let result = self.eval_inner(expr, env).map_err(|unwind| match unwind {
                Unwind::Error(e) => Unwind::Error(located(e, expr.pos)),
                exit => exit,
            });
            self.current_pos = saved;
            result
        })
    }

    fn eval_inner(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> EvalResult<Value> {
        match &expr.node {
            Expr::IntLit(n) => Ok(Value::Int(*n)),
            Expr::FloatLit(x) => Ok(Value::Float(*x)),
            Expr::StrLit(s) => Ok(Value::str(s)),

            Expr::ArrayLit(items) => {
                let mut arr = Array::new();
                for item in items {
                    let key = match &item.key {
                        Some(key) => Some(self.eval(key, env)?),
                        None => None,
                    };
                    let value = self.eval(&item.value, env)?;
                    match key {
                        Some(key) => arr.insert(ArrayKey::from_value(&key)?, value),
                        None => {
                            if let Err(warning) = arr.push(value) {
                                self.print_error(&warning);
                            }
                        }
                    }
                }
                Ok(Value::Array(arr))
            }

            Expr::Var(name) => Ok(self.read_variable(name, env)),
            Expr::VarVar(_) => {
                let name = self.variable_name(expr, env)?;
                Ok(self.read_variable(&name, env))
            }

            Expr::Subscript { index: None, .. } => {
                Err(PhpError::fatal("Cannot use [] for reading").into())
            }
            Expr::Subscript { .. } => self.read_subscripts(expr, env, false),

            Expr::Prop { base, name } => {
                let base = self.eval(base, env)?;
                Ok(self.fetch_prop(&base, name, false))
            }

            Expr::Const(name) => Ok(env.borrow().lookup_constant(name)?),
            Expr::Magic(magic) => Ok(self.magic_constant(*magic, expr, env)),

            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right, env),

            Expr::Unary { op, expr: operand } => {
                let value = self.eval(operand, env)?;
                Ok(unary(*op, &value, self)?)
            }

            Expr::IncDec { op, prefix, target } => {
                let undefined = self.undefined_variable(target, env);
                let lv = self.lvalue(target, env)?;
                let old = self.read_for_update(&lv, undefined);
                let new = match op {
                    IncDecOp::Inc => increment(&old)?,
                    IncDecOp::Dec => decrement(&old)?,
                };
                self.write_lvalue(&lv, new.clone())?;
                Ok(if *prefix { new } else { old })
            }

            Expr::Assign { target, value } => {
                let value = self.eval(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }

            Expr::AssignRef { target, source } => self.eval_assign_ref(target, source, env),

            Expr::CompoundAssign { target, op, value } => {
                let undefined = self.undefined_variable(target, env);
                let lv = self.lvalue(target, env)?;
                let rhs = self.eval(value, env)?;
                let old = self.read_for_update(&lv, undefined);
                let new = calculate(&old, *op, &rhs, self)?;
                self.write_lvalue(&lv, new.clone())?;
                Ok(new)
            }

            Expr::CoalesceAssign { target, value } => {
                let current = self.eval_quiet(target, env)?;
                if !current.is_null() {
                    return Ok(current);
                }
                let value = self.eval(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }

            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval(cond, env)?;
                if to_bool(&cond) {
                    match then_branch {
                        Some(then_branch) => self.eval(then_branch, env),
                        None => Ok(cond),
                    }
                } else {
                    self.eval(else_branch, env)
                }
            }

            Expr::Coalesce { left, right } => {
                let left = self.eval_quiet(left, env)?;
                if left.is_null() {
                    self.eval(right, env)
                } else {
                    Ok(left)
                }
            }

            Expr::Cast { ty, expr: operand } => {
                let value = self.eval(operand, env)?;
                Ok(match ty {
                    CastType::Int => Value::Int(to_int(&value, true)?),
                    CastType::Float => Value::Float(to_float(&value, true)?),
                    CastType::String => Value::Str(concat_operand(&value, self)?),
                    CastType::Bool => Value::Bool(to_bool(&value)),
                    CastType::Array => Value::Array(to_array(&value)),
                })
            }

            Expr::Call { name, args } => self.eval_call(name, args, env),
            Expr::MethodCall {
                object,
                method,
                args,
            } => self.eval_method_call(object, method, args, env),
            Expr::ParentCall { method, args } => self.eval_parent_call(method, args, env),
            Expr::New { class, args } => self.eval_new(class, args, env),

            Expr::Isset(exprs) => {
                for expr in exprs {
                    if self.eval_quiet(expr, env)?.is_null() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }

            Expr::Empty(operand) => Ok(Value::Bool(!to_bool(&self.eval_quiet(operand, env)?))),

            Expr::Exit(operand) => {
                let code = match operand {
                    None => 0,
                    Some(operand) => match self.eval(operand, env)? {
                        Value::Str(message) => {
                            self.print(&message);
                            0
                        }
                        other => to_int(&other, true)?,
                    },
                };
                tracing::debug!(code, "exit requested");
                Err(Unwind::Exit(code))
            }

            Expr::Print(operand) => {
                let value = self.eval(operand, env)?;
                self.write_value(&value)?;
                Ok(Value::Int(1))
            }

            Expr::Silence(operand) => {
                self.silence_depth += 1;
                let result = self.eval(operand, env);
                self.silence_depth -= 1;
                result
            }
        }
    }

    fn eval_binary(
        &mut self,
        left: &Spanned<Expr>,
        op: BinOp,
        right: &Spanned<Expr>,
        env: &EnvRef,
    ) -> EvalResult<Value> {
        // short-circuit operators evaluate the right side lazily
        match op {
            BinOp::And => {
                let result = to_bool(&self.eval(left, env)?) && to_bool(&self.eval(right, env)?);
                return Ok(Value::Bool(result));
            }
            BinOp::Or => {
                let result = to_bool(&self.eval(left, env)?) || to_bool(&self.eval(right, env)?);
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let lhs = self.eval(left, env)?;
        let rhs = self.eval(right, env)?;
        if op.is_arithmetic() {
            return Ok(calculate(&lhs, op, &rhs, self)?);
        }
        let strict = self.config.strict_comparison;
        Ok(match op {
            BinOp::Eq if strict => Value::Bool(identical(&lhs, &rhs)),
            BinOp::Ne if strict => Value::Bool(!identical(&lhs, &rhs)),
            BinOp::Eq => Value::Bool(loose_equals(&lhs, &rhs)),
            BinOp::Ne => Value::Bool(!loose_equals(&lhs, &rhs)),
            BinOp::Identical => Value::Bool(identical(&lhs, &rhs)),
            BinOp::NotIdentical => Value::Bool(!identical(&lhs, &rhs)),
            BinOp::Lt => compare_relation(&lhs, Relation::Less, &rhs),
            BinOp::Le => compare_relation(&lhs, Relation::LessEq, &rhs),
            BinOp::Gt => compare_relation(&rhs, Relation::Less, &lhs),
            BinOp::Ge => compare_relation(&rhs, Relation::LessEq, &lhs),
            BinOp::Spaceship => compare_relation(&lhs, Relation::Spaceship, &rhs),
            BinOp::Xor => Value::Bool(to_bool(&lhs) ^ to_bool(&rhs)),
            _ => return Err(PhpError::fatal(format!("Unsupported operator {op}")).into()),
        })
    }

    fn magic_constant(&self, magic: MagicConst, expr: &Spanned<Expr>, env: &EnvRef) -> Value {
        let scope = env.borrow();
        let frame = &scope.frame;
        match magic {
            MagicConst::Line => Value::Int(expr.pos.line as i64),
            MagicConst::File => Value::str(&self.file),
            MagicConst::Dir => {
                let dir = Path::new(&self.file)
                    .parent()
                    .map(|p| p.display().to_string())
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| ".".to_string());
                Value::str(&dir)
            }
            MagicConst::Function => Value::str(frame.function.as_deref().unwrap_or("")),
            MagicConst::Class => Value::str(frame.class.as_ref().map_or("", |c| c.name.as_str())),
            MagicConst::Method => match (&frame.class, &frame.function) {
                (Some(class), Some(function)) => Value::str(&format!("{}::{function}", class.name)),
                (None, Some(function)) => Value::str(function),
                _ => Value::str(""),
            },
        }
    }

    // ============ Variables ============

    /// Name of a `$name` or `$$expr` variable
    pub(super) fn variable_name(
        &mut self,
        expr: &Spanned<Expr>,
        env: &EnvRef,
    ) -> EvalResult<String> {
        match &expr.node {
            Expr::Var(name) => Ok(name.clone()),
            Expr::VarVar(inner) => {
                let name = self.eval(inner, env)?;
                Ok(to_string_lossy(&name)?)
            }
            _ => Err(PhpError::fatal("Cannot use temporary expression in write context").into()),
        }
    }

    /// Read a variable, warning and yielding null when it is not defined
    fn read_variable(&mut self, name: &str, env: &EnvRef) -> Value {
        let found = env.borrow().lookup_variable(name);
        match found {
            Ok(slot) => slot.get(),
            Err(warning) => {
                self.print_error(&warning);
                Value::Null
            }
        }
    }

    /// Name of a plain variable target that is not defined yet
    fn undefined_variable(&self, target: &Spanned<Expr>, env: &EnvRef) -> Option<String> {
        match &target.node {
            Expr::Var(name) if !env.borrow().has_variable(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Evaluate without lookup diagnostics: the `isset`/`empty`/`??` reading mode
    pub(super) fn eval_quiet(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> EvalResult<Value> {
        match &expr.node {
            Expr::Var(_) | Expr::VarVar(_) => {
                let name = self.variable_name(expr, env)?;
                let found = env.borrow().lookup_variable(&name);
                Ok(found.map(|slot| slot.get()).unwrap_or_default())
            }
            Expr::Subscript { index: Some(_), .. } => self.read_subscripts(expr, env, true),
            Expr::Prop { base, name } => {
                let base = self.eval_quiet(base, env)?;
                Ok(self.fetch_prop(&base, name, true))
            }
            _ => self.eval(expr, env),
        }
    }

    // ============ Reads ============

    /// `$a[i][j]...` as an rvalue. A variable or property at the root is indexed where it
    /// lives, so only the element read is copied.
    fn read_subscripts(
        &mut self,
        expr: &Spanned<Expr>,
        env: &EnvRef,
        quiet: bool,
    ) -> EvalResult<Value> {
        let mut root = expr;
        let mut index_exprs = Vec::new();
        while let Expr::Subscript {
            base,
            index: Some(index),
        } = &root.node
        {
            index_exprs.push(index);
            root = &**base;
        }
        index_exprs.reverse();

        enum Base {
            Slot(Slot),
            Prop(ObjectRef, String),
            Value(Value),
        }
        let base = match &root.node {
            Expr::Var(name) => match env.borrow().lookup_variable(name) {
                Ok(slot) => Some(Base::Slot(slot)),
                Err(_) => None,
            },
            Expr::Prop { base, name } => match self.eval_read(base, env, quiet)? {
                Value::Object(obj) if obj.has_property(name) => Some(Base::Prop(obj, name.clone())),
                other => Some(Base::Value(self.fetch_prop(&other, name, quiet))),
            },
            _ => None,
        };
        let base = match base {
            Some(base) => base,
            None => Base::Value(self.eval_read(root, env, quiet)?),
        };

        let mut indices = Vec::with_capacity(index_exprs.len());
        for index in index_exprs {
            indices.push(self.eval(index, env)?);
        }

        match base {
            Base::Slot(slot) => slot.with(|value| self.fetch_path(value, &indices, quiet)),
            Base::Prop(obj, name) => obj
                .with_property(&name, |value| self.fetch_path(value, &indices, quiet))
                .unwrap_or(Ok(Value::Null)),
            Base::Value(value) => self.fetch_path(&value, &indices, quiet),
        }
    }

    fn eval_read(&mut self, expr: &Spanned<Expr>, env: &EnvRef, quiet: bool) -> EvalResult<Value> {
        if quiet {
            self.eval_quiet(expr, env)
        } else {
            self.eval(expr, env)
        }
    }

    /// Apply `fetch_dim` once per index, descending into array elements in place
    fn fetch_path(&mut self, base: &Value, indices: &[Value], quiet: bool) -> EvalResult<Value> {
        let Some((index, rest)) = indices.split_first() else {
            return Ok(base.clone());
        };
        if rest.is_empty() {
            return self.fetch_dim(base, index, quiet);
        }
        if let Value::Array(arr) = base {
            if let Some(element) = arr.get(&ArrayKey::from_value(index)?) {
                return self.fetch_path(&element, rest, quiet);
            }
        }
        // a missing key or a string offset yields a small value to keep walking
        let next = self.fetch_dim(base, index, quiet)?;
        self.fetch_path(&next, rest, quiet)
    }

    /// `base[index]` as an rvalue
    pub(super) fn fetch_dim(
        &mut self,
        base: &Value,
        index: &Value,
        quiet: bool,
    ) -> EvalResult<Value> {
        match base {
            Value::Array(arr) => {
                let key = ArrayKey::from_value(index)?;
                match arr.get(&key) {
                    Some(value) => Ok(value.clone()),
                    None => {
                        if !quiet {
                            self.print_error(&PhpError::warning(format!(
                                "Undefined array key {}",
                                quoted_key(&key)
                            )));
                        }
                        Ok(Value::Null)
                    }
                }
            }
            Value::Str(s) => {
                let Some(offset) = string_offset(index) else {
                    if quiet {
                        return Ok(Value::Null);
                    }
                    return Err(offset_type_error(index).into());
                };
                match resolve_offset(s.len(), offset) {
                    Some(i) => Ok(Value::Str(vec![s[i]])),
                    None if quiet => Ok(Value::Null),
                    None => {
                        self.print_error(&PhpError::warning(format!(
                            "Uninitialized string offset {offset}"
                        )));
                        Ok(Value::str(""))
                    }
                }
            }
            Value::Object(obj) => Err(PhpError::uncaught(format!(
                "Cannot use object of type {} as array",
                obj.class_name()
            ))
            .into()),
            scalar => {
                if !quiet {
                    self.print_error(&PhpError::warning(format!(
                        "Trying to access array offset on value of type {}",
                        scalar.operand_name()
                    )));
                }
                Ok(Value::Null)
            }
        }
    }

    /// `base->name` as an rvalue
    pub(super) fn fetch_prop(&mut self, base: &Value, name: &str, quiet: bool) -> Value {
        match base {
            Value::Object(obj) => match obj.get_property(name) {
                Some(value) => value,
                None => {
                    if !quiet {
                        self.print_error(&PhpError::warning(format!(
                            "Undefined property: {}::${name}",
                            obj.class_name()
                        )));
                    }
                    Value::Null
                }
            },
            other => {
                if !quiet {
                    self.print_error(&PhpError::warning(format!(
                        "Attempt to read property \"{name}\" on {}",
                        other.operand_name()
                    )));
                }
                Value::Null
            }
        }
    }

    // ============ Writes ============

    /// Resolve an assignment target. Variables are created on demand; subscripts are
    /// evaluated now and applied when the write happens.
    pub(super) fn lvalue(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> EvalResult<LValue> {
        match &expr.node {
            Expr::Var(_) | Expr::VarVar(_) => {
                let name = self.variable_name(expr, env)?;
                let slot = env.borrow_mut().slot_for_write(&name);
                Ok(LValue::new(Container::Slot(slot)))
            }
            Expr::Subscript { base, index } => {
                let mut lv = self.lvalue(base, env)?;
                let index = match index {
                    Some(index) => Some(self.eval(index, env)?),
                    None => None,
                };
                lv.path.push(index);
                Ok(lv)
            }
            Expr::Prop { base, name } => match self.eval(base, env)? {
                Value::Object(obj) => Ok(LValue::new(Container::Prop(obj, name.clone()))),
                other => Err(PhpError::uncaught(format!(
                    "Attempt to assign property \"{name}\" on {}",
                    other.operand_name()
                ))
                .into()),
            },
            _ => Err(PhpError::fatal("Cannot use temporary expression in write context").into()),
        }
    }

    pub(super) fn assign(
        &mut self,
        target: &Spanned<Expr>,
        value: Value,
        env: &EnvRef,
    ) -> EvalResult<()> {
        let lv = self.lvalue(target, env)?;
        self.write_lvalue(&lv, value)
    }

    /// Store `value` at `lv`, auto-vivifying intermediate arrays
    pub(super) fn write_lvalue(&mut self, lv: &LValue, value: Value) -> EvalResult<()> {
        let mut warnings: Vec<PhpError> = Vec::new();
        // the container value is moved out while the path is walked, so no borrow is held
        let mut root = take_container(&lv.container);
        let result = write_path(&mut root, &lv.path, value, &mut warnings);
        let released = restore_container(&lv.container, root);
        drop(released);
        for warning in &warnings {
            self.print_error(warning);
        }
        let replaced = result?;
        drop(replaced);
        Ok(())
    }

    /// Current value at `lv`, or `None` when some step of the path does not exist
    pub(super) fn read_lvalue(&self, lv: &LValue) -> Option<Value> {
        match &lv.container {
            Container::Slot(slot) => slot.with(|root| read_path(root, &lv.path)),
            Container::Prop(obj, name) => read_path(&obj.get_property(name)?, &lv.path),
        }
    }

    /// Whether every step of `lv` exists, without copying anything
    pub(super) fn lvalue_exists(&self, lv: &LValue) -> bool {
        match &lv.container {
            Container::Slot(slot) => slot.with(|root| path_exists(root, &lv.path)),
            Container::Prop(obj, name) => obj
                .with_property(name, |root| path_exists(root, &lv.path))
                .unwrap_or(false),
        }
    }

    /// Old value for `++`, `--` and `op=`, warning the way a plain read would
    fn read_for_update(&mut self, lv: &LValue, undefined: Option<String>) -> Value {
        if let Some(name) = undefined {
            self.print_error(&PhpError::undefined_variable(&name));
            return Value::Null;
        }
        if let Some(value) = self.read_lvalue(lv) {
            return value;
        }
        let warning = match (lv.path.last(), &lv.container) {
            (Some(Some(key)), _) => ArrayKey::from_value(key)
                .ok()
                .map(|k| format!("Undefined array key {}", quoted_key(&k))),
            (None, Container::Prop(obj, name)) => {
                Some(format!("Undefined property: {}::${name}", obj.class_name()))
            }
            _ => None,
        };
        if let Some(message) = warning {
            self.print_error(&PhpError::warning(message));
        }
        Value::Null
    }

    /// Remove `container[key]`; strings reject it, other scalars ignore it
    pub(super) fn remove_element(
        &mut self,
        container: &LValue,
        key: &Value,
    ) -> EvalResult<Option<Value>> {
        if let Container::Prop(obj, name) = &container.container {
            if !obj.has_property(name) {
                return Ok(None);
            }
        }
        let mut root = take_container(&container.container);
        let result = remove_path(&mut root, &container.path, key);
        let released = restore_container(&container.container, root);
        drop(released);
        Ok(result?)
    }

    /// Cell a reference to `lv` shares. Array elements on the way are created and the last
    /// one becomes a reference; `None` when the target cannot hold one (a property or a
    /// string offset).
    pub(super) fn reference_slot(&mut self, lv: &LValue) -> EvalResult<Option<Slot>> {
        if lv.path.is_empty() {
            return Ok(match &lv.container {
                Container::Slot(slot) => Some(slot.clone()),
                Container::Prop(..) => None,
            });
        }
        let mut warnings: Vec<PhpError> = Vec::new();
        let mut root = take_container(&lv.container);
        let result = element_slot(&mut root, &lv.path, &mut warnings);
        let released = restore_container(&lv.container, root);
        drop(released);
        for warning in &warnings {
            self.print_error(warning);
        }
        Ok(result?)
    }

    /// Bind a target to an existing slot: variables alias it, other targets get a copy
    pub(super) fn bind_ref(
        &mut self,
        target: &Spanned<Expr>,
        slot: Slot,
        env: &EnvRef,
    ) -> EvalResult<()> {
        match &target.node {
            Expr::Var(_) | Expr::VarVar(_) => {
                let name = self.variable_name(target, env)?;
                env.borrow_mut().declare_variable_by_ref(&name, slot);
                Ok(())
            }
            _ => self.assign(target, slot.get(), env),
        }
    }

    /// `$a = &$b`. Variables and array elements alias; property sources are copied.
    fn eval_assign_ref(
        &mut self,
        target: &Spanned<Expr>,
        source: &Spanned<Expr>,
        env: &EnvRef,
    ) -> EvalResult<Value> {
        match &source.node {
            Expr::Var(_) | Expr::VarVar(_) => {
                let name = self.variable_name(source, env)?;
                let slot = env.borrow_mut().slot_for_write(&name);
                let value = slot.get();
                self.bind_ref(target, slot, env)?;
                Ok(value)
            }
            Expr::Subscript { .. } | Expr::Prop { .. } => {
                let lv = self.lvalue(source, env)?;
                match self.reference_slot(&lv)? {
                    Some(slot) => {
                        let value = slot.get();
                        self.bind_ref(target, slot, env)?;
                        Ok(value)
                    }
                    None => {
                        let value = self.read_lvalue(&lv).unwrap_or_default();
                        self.assign(target, value.clone(), env)?;
                        Ok(value)
                    }
                }
            }
            _ => {
                let value = self.eval(source, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
        }
    }
}

// ============ Path helpers ============

/// Largest string a string-offset write may grow, matching the default `memory_limit`
const MAX_STRING_LEN: usize = 128 * 1024 * 1024;

fn take_container(container: &Container) -> Value {
    match container {
        Container::Slot(slot) => slot.replace(Value::Null),
        Container::Prop(obj, name) => obj.with_property_mut(name, std::mem::take),
    }
}

/// Put a container value back, returning what was there meanwhile
fn restore_container(container: &Container, value: Value) -> Value {
    match container {
        Container::Slot(slot) => slot.replace(value),
        Container::Prop(obj, name) => obj.with_property_mut(name, |v| std::mem::replace(v, value)),
    }
}

fn read_path(root: &Value, path: &[Option<Value>]) -> Option<Value> {
    let Some((segment, rest)) = path.split_first() else {
        return Some(root.clone());
    };
    let index = segment.as_ref()?;
    match root {
        Value::Array(arr) => read_path(&*arr.get(&ArrayKey::from_value(index).ok()?)?, rest),
        Value::Str(s) if rest.is_empty() => {
            let i = resolve_offset(s.len(), string_offset(index)?)?;
            Some(Value::Str(vec![s[i]]))
        }
        _ => None,
    }
}

fn path_exists(root: &Value, path: &[Option<Value>]) -> bool {
    let Some((segment, rest)) = path.split_first() else {
        return true;
    };
    let (Some(index), Value::Array(arr)) = (segment, root) else {
        return false;
    };
    ArrayKey::from_value(index)
        .ok()
        .and_then(|key| arr.get(&key))
        .is_some_and(|element| path_exists(&element, rest))
}

/// Walk `path` below `target` like a write would and make the element it names a reference.
/// Only null and `false` are turned into arrays on the way.
fn element_slot(
    target: &mut Value,
    path: &[Option<Value>],
    sink: &mut dyn ErrorSink,
) -> InterpResult<Option<Slot>> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(None);
    };
    match target {
        Value::Void | Value::Null => *target = Value::Array(Array::new()),
        Value::Bool(false) => {
            sink.emit(PhpError::deprecated(
                "Automatic conversion of false to array is deprecated",
            ));
            *target = Value::Array(Array::new());
        }
        _ => {}
    }
    let Value::Array(arr) = target else {
        return Ok(None);
    };
    let key = match segment {
        Some(index) => ArrayKey::from_value(index)?,
        None => match arr.push(Value::Null) {
            Ok(key) => key,
            Err(warning) => {
                sink.emit(warning);
                return Ok(None);
            }
        },
    };
    if rest.is_empty() {
        return Ok(Some(arr.element_slot(key)));
    }
    if !arr.contains_key(&key) {
        arr.insert(key.clone(), Value::Null);
    }
    match arr.get_mut(&key) {
        Some(mut element) => element_slot(&mut element, rest, sink),
        None => Ok(None),
    }
}

/// Walk `path` below `target` and store `value`, returning the value it replaced
fn write_path(
    target: &mut Value,
    path: &[Option<Value>],
    value: Value,
    sink: &mut dyn ErrorSink,
) -> InterpResult<Value> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(std::mem::replace(target, value));
    };

    match target {
        Value::Void | Value::Null => *target = Value::Array(Array::new()),
        Value::Bool(false) => {
            sink.emit(PhpError::deprecated(
                "Automatic conversion of false to array is deprecated",
            ));
            *target = Value::Array(Array::new());
        }
        _ => {}
    }

    match target {
        Value::Array(arr) => {
            let key = match segment {
                Some(index) => ArrayKey::from_value(index)?,
                None => match arr.push(Value::Null) {
                    Ok(key) => key,
                    Err(warning) => {
                        sink.emit(warning);
                        return Ok(Value::Null);
                    }
                },
            };
            if !arr.contains_key(&key) {
                arr.insert(key.clone(), Value::Null);
            }
            match arr.get_mut(&key) {
                Some(mut element) => write_path(&mut element, rest, value, sink),
                None => Ok(Value::Null),
            }
        }
        Value::Str(s) => {
            if !rest.is_empty() {
                return Err(PhpError::uncaught("Cannot use string offset as an array"));
            }
            let Some(index) = segment else {
                return Err(PhpError::uncaught("[] operator not supported for strings"));
            };
            let offset = string_offset(index).ok_or_else(|| offset_type_error(index))?;
            let bytes = to_str(&value)?;
            let Some(&byte) = bytes.first() else {
                return Err(PhpError::uncaught(
                    "Cannot assign an empty string to a string offset",
                ));
            };
            if bytes.len() > 1 {
                sink.emit(PhpError::warning(
                    "Only the first byte will be assigned to the string offset",
                ));
            }
            let position = if offset < 0 {
                match usize::try_from(s.len() as i64 + offset) {
                    Ok(p) => p,
                    Err(_) => {
                        sink.emit(PhpError::warning(format!("Illegal string offset {offset}")));
                        return Ok(Value::Null);
                    }
                }
            } else {
                usize::try_from(offset).unwrap_or(usize::MAX)
            };
            if position >= s.len() {
                let needed = position.saturating_add(1);
                if needed > MAX_STRING_LEN || s.try_reserve(needed - s.len()).is_err() {
                    return Err(PhpError::fatal(format!(
                        "Allowed memory size of {MAX_STRING_LEN} bytes exhausted \
                         (tried to allocate {needed} bytes)"
                    )));
                }
                s.resize(needed, b' ');
            }
            s[position] = byte;
            Ok(Value::Null)
        }
        Value::Object(obj) => Err(PhpError::uncaught(format!(
            "Cannot use object of type {} as array",
            obj.class_name()
        ))),
        _ => Err(PhpError::uncaught("Cannot use a scalar value as an array")),
    }
}

fn remove_path(
    target: &mut Value,
    path: &[Option<Value>],
    key: &Value,
) -> InterpResult<Option<Value>> {
    match path.split_first() {
        Some((segment, rest)) => {
            let Some(index) = segment else {
                return Err(PhpError::fatal("Cannot use [] for unsetting"));
            };
            match target {
                Value::Array(arr) => match arr.get_mut(&ArrayKey::from_value(index)?) {
                    Some(mut inner) => remove_path(&mut inner, rest, key),
                    None => Ok(None),
                },
                _ => Ok(None),
            }
        }
        None => match target {
            Value::Array(arr) => Ok(arr.remove(&ArrayKey::from_value(key)?)),
            Value::Str(_) => Err(PhpError::uncaught("Cannot unset string offsets")),
            Value::Object(obj) => Err(PhpError::uncaught(format!(
                "Cannot use object of type {} as array",
                obj.class_name()
            ))),
            _ => Ok(None),
        },
    }
}

/// Integer offset into a string, or `None` for offsets of the wrong type
fn string_offset(index: &Value) -> Option<i64> {
    match index {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Float(x) => Some(float_to_int(*x)),
        Value::Void | Value::Null => Some(0),
        Value::Str(s) => match parse_numeric(s) {
            Numeric::Whole(Number::Int(n)) => Some(n),
            _ => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Byte position of a possibly negative offset, if it falls inside the string
fn resolve_offset(len: usize, offset: i64) -> Option<usize> {
    let position = if offset < 0 {
        len as i64 + offset
    } else {
        offset
    };
    usize::try_from(position).ok().filter(|p| *p < len)
}

fn offset_type_error(index: &Value) -> PhpError {
    PhpError::type_error(format!(
        "Cannot access offset of type {} on string",
        index.operand_name()
    ))
}

fn quoted_key(key: &ArrayKey) -> String {
    match key {
        ArrayKey::Int(n) => n.to_string(),
        ArrayKey::Str(_) => format!("\"{key}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Option<Value> {
        Some(Value::str(s))
    }

    // ---- write_path ----

    #[test]
    fn test_auto_vivify_nested_arrays() {
        let mut root = Value::Null;
        let mut sink: Vec<PhpError> = Vec::new();
        write_path(&mut root, &[key("x"), key("y")], Value::Int(1), &mut sink).unwrap();
        let inner = Array::from_iter([(ArrayKey::from("y"), Value::Int(1))]);
        let expected = Array::from_iter([(ArrayKey::from("x"), Value::Array(inner))]);
        assert_eq!(root, Value::Array(expected));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_append_segments() {
        let mut root = Value::Array(Array::from_values(vec![Value::Int(1)]));
        let mut sink: Vec<PhpError> = Vec::new();
        write_path(&mut root, &[None], Value::Int(2), &mut sink).unwrap();
        write_path(&mut root, &[None, None], Value::Int(3), &mut sink).unwrap();
        let arr = root.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(&ArrayKey::Int(1)).as_deref(), Some(&Value::Int(2)));
        assert_eq!(
            arr.get(&ArrayKey::Int(2)).as_deref(),
            Some(&Value::Array(Array::from_values(vec![Value::Int(3)])))
        );
    }

    #[test]
    fn test_false_converts_with_deprecation() {
        let mut root = Value::Bool(false);
        let mut sink: Vec<PhpError> = Vec::new();
        write_path(&mut root, &[Some(Value::Int(0))], Value::Int(1), &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].message, "Automatic conversion of false to array is deprecated");
    }

    #[test]
    fn test_scalar_intermediate_is_fatal() {
        let mut root = Value::Int(5);
        let mut sink: Vec<PhpError> = Vec::new();
        let err = write_path(&mut root, &[key("a")], Value::Int(1), &mut sink).unwrap_err();
        assert_eq!(err.message, "Uncaught Error: Cannot use a scalar value as an array");
    }

    // ---- String offsets ----

    #[test]
    fn test_string_offset_pads_with_spaces() {
        let mut root = Value::str("ab");
        let mut sink: Vec<PhpError> = Vec::new();
        write_path(&mut root, &[Some(Value::Int(4))], Value::str("xyz"), &mut sink).unwrap();
        assert_eq!(root, Value::str("ab  x"));
        assert_eq!(
            sink[0].message,
            "Only the first byte will be assigned to the string offset"
        );
    }

    #[test]
    fn test_string_offset_errors() {
        let mut sink: Vec<PhpError> = Vec::new();
        let mut root = Value::str("ab");
        let err = write_path(&mut root, &[Some(Value::Int(0))], Value::str(""), &mut sink)
            .unwrap_err();
        assert_eq!(
            err.message,
            "Uncaught Error: Cannot assign an empty string to a string offset"
        );
        let err = write_path(&mut root, &[None], Value::str("c"), &mut sink).unwrap_err();
        assert_eq!(err.message, "Uncaught Error: [] operator not supported for strings");
        let err = write_path(&mut root, &[key("x")], Value::str("c"), &mut sink).unwrap_err();
        assert_eq!(
            err.message,
            "Uncaught TypeError: Cannot access offset of type string on string"
        );
    }

    #[test]
    fn test_huge_string_offset_is_fatal() {
        let mut root = Value::str("ab");
        let mut sink: Vec<PhpError> = Vec::new();
        let err = write_path(&mut root, &[Some(Value::Int(i64::MAX))], Value::str("x"), &mut sink)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message.starts_with("Allowed memory size of 134217728 bytes exhausted"));
        assert_eq!(root, Value::str("ab"));
    }

    #[test]
    fn test_negative_string_offset() {
        let mut root = Value::str("abc");
        let mut sink: Vec<PhpError> = Vec::new();
        write_path(&mut root, &[Some(Value::Int(-1))], Value::str("z"), &mut sink).unwrap();
        assert_eq!(root, Value::str("abz"));
        assert_eq!(resolve_offset(3, -4), None);
        assert_eq!(resolve_offset(3, 2), Some(2));
    }

    // ---- read_path / remove_path ----

    #[test]
    fn test_read_path_missing_steps() {
        let root = Value::Array(Array::from_values(vec![Value::str("abc")]));
        assert_eq!(read_path(&root, &[Some(Value::Int(0))]), Some(Value::str("abc")));
        assert_eq!(
            read_path(&root, &[Some(Value::Int(0)), Some(Value::Int(1))]),
            Some(Value::str("b"))
        );
        assert_eq!(read_path(&root, &[Some(Value::Int(3))]), None);
        assert_eq!(read_path(&root, &[None]), None);
    }

    #[test]
    fn test_remove_path() {
        let mut root = Value::Array(Array::from_values(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(remove_path(&mut root, &[], &Value::Int(0)).unwrap(), Some(Value::Int(1)));
        assert_eq!(root.as_array().map(Array::len), Some(1));
        let mut s = Value::str("ab");
        let err = remove_path(&mut s, &[], &Value::Int(0)).unwrap_err();
        assert_eq!(err.message, "Uncaught Error: Cannot unset string offsets");
    }

    // ---- Element references ----

    #[test]
    fn test_element_slot_aliases_the_element() {
        let mut root = Value::Array(Array::from_values(vec![Value::Int(1), Value::Int(2)]));
        let mut sink: Vec<PhpError> = Vec::new();
        let slot = element_slot(&mut root, &[Some(Value::Int(1))], &mut sink)
            .unwrap()
            .unwrap();
        slot.set(Value::Int(7));
        assert_eq!(read_path(&root, &[Some(Value::Int(1))]), Some(Value::Int(7)));

        write_path(&mut root, &[Some(Value::Int(1))], Value::Int(9), &mut sink).unwrap();
        assert_eq!(slot.get(), Value::Int(9));
    }

    #[test]
    fn test_element_slot_vivifies_and_skips_strings() {
        let mut root = Value::Null;
        let mut sink: Vec<PhpError> = Vec::new();
        let slot = element_slot(&mut root, &[key("a"), None], &mut sink).unwrap().unwrap();
        slot.set(Value::Int(1));
        assert_eq!(read_path(&root, &[key("a"), Some(Value::Int(0))]), Some(Value::Int(1)));

        let mut s = Value::str("ab");
        assert!(element_slot(&mut s, &[Some(Value::Int(0))], &mut sink).unwrap().is_none());
    }

    #[test]
    fn test_path_exists() {
        let root = Value::Array(Array::from_values(vec![Value::str("abc")]));
        assert!(path_exists(&root, &[]));
        assert!(path_exists(&root, &[Some(Value::Int(0))]));
        assert!(!path_exists(&root, &[Some(Value::Int(1))]));
        assert!(!path_exists(&root, &[Some(Value::Int(0)), Some(Value::Int(0))]));
    }

    #[test]
    fn test_quoted_key() {
        assert_eq!(quoted_key(&ArrayKey::Int(3)), "3");
        assert_eq!(quoted_key(&ArrayKey::from("k")), "\"k\"");
    }
}
