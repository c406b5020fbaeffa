//! Tree-walking evaluator: program driver, statements and the diagnostic surface

use super::array::ArrayKey;
use super::arith::concat_operand;
use super::convert::{to_bool, to_int};
use super::env::{EnvRef, Environment};
use super::error::{ErrorSink, InterpResult, PhpError};
use super::expr::{Container, LValue};
use super::native::register_natives;
use super::object::{ExecutionContext, ObjectRef};
use super::output::Output;
use super::request::Request;
use super::signal::{ControlSignal, EvalResult, LoopAction, Unwind};
use super::slot::Slot;
use super::value::Value;
use crate::ast::{ClassDecl, ConstItem, Expr, Position, Program, Spanned, Stmt};
use crate::config::{Config, ERROR_CONSTANTS};
use std::collections::HashSet;
use std::rc::Rc;

/// Stack growth parameters for deep recursion
pub(super) const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
pub(super) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// What a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Bytes that reached the base sink (empty when the output was streamed)
    pub output: Vec<u8>,
    pub exit_code: i64,
    /// The fatal error that stopped the script, if any
    pub error: Option<PhpError>,
}

/// The interpreter
pub struct Interpreter {
    pub config: Config,
    /// Class/interface registry and live objects
    pub ctx: ExecutionContext,
    pub output: Output,
    /// Global environment
    pub(super) global_env: EnvRef,
    /// Script path for diagnostics and the magic constants
    pub(super) file: String,
    /// Current user call depth
    pub(super) recursion_depth: usize,
    /// Active `@` operators
    pub(super) silence_depth: usize,
    /// Position of the innermost node being evaluated
    pub(super) current_pos: Position,
    /// Declarations registered by the pre-scan, skipped when execution reaches them
    hoisted: HashSet<usize>,
}

impl Interpreter {
    /// Create an interpreter with the natives, predefined constants and superglobals in place
    pub fn new(config: Config, request: &Request) -> Self {
        let mut root = Environment::new();
        register_natives(&mut root);
        for (name, value) in predefined_constants() {
            if let Err(e) = root.declare_constant(name, value) {
                tracing::warn!(name, error = %e, "predefined constant rejected");
            }
        }
        for (name, values) in request.superglobals(&config) {
            root.define_predefined(name, Value::Array(values));
        }

        Interpreter {
            config,
            ctx: ExecutionContext::new(),
            output: Output::captured(),
            global_env: root.into_ref(),
            file: request.script_filename.clone(),
            recursion_depth: 0,
            silence_depth: 0,
            current_pos: Position::default(),
            hoisted: HashSet::new(),
        }
    }

    /// Replace the output sink, e.g. with a streaming one
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn global_env(&self) -> &EnvRef {
        &self.global_env
    }

    // ============ Output surface ============

    pub fn print(&mut self, bytes: &[u8]) {
        self.output.write(bytes);
    }

    pub fn println(&mut self, bytes: &[u8]) {
        self.output.write(bytes);
        self.output.write(b"\n");
    }

    /// Write the string form of a value, warning on arrays
    pub fn write_value(&mut self, value: &Value) -> InterpResult<()> {
        let bytes = concat_operand(value, self)?;
        self.print(&bytes);
        Ok(())
    }

    /// Print a diagnostic inline, subject to `@`, the `error_reporting` mask and
    /// `display_errors`
    pub fn print_error(&mut self, err: &PhpError) {
        tracing::debug!(level = err.level.label(), message = %err.message, "diagnostic");
        if self.silence_depth > 0 && !err.is_fatal() {
            return;
        }
        if self.config.error_reporting & err.level.mask() == 0 || !self.config.display_errors {
            return;
        }
        let line = err.pos.unwrap_or(self.current_pos).line;
        let text = format!(
            "{}: {} in {} on line {line}",
            err.level.label(),
            err.message,
            self.file
        );
        self.println(b"");
        self.println(text.as_bytes());
    }

    // ============ Program driver ============

    /// Run a whole program: pre-scan declarations, execute, destruct, flush
    pub fn run(&mut self, program: &Program) -> RunOutcome {
        if !program.file.is_empty() {
            self.file = program.file.clone();
        }
        tracing::debug!(file = %self.file, statements = program.stmts.len(), "running program");

        let env = Rc::clone(&self.global_env);
        let result = self
            .declare_hoisted(&program.stmts, &env)
            .and_then(|()| self.exec_block(&program.stmts, &env));

        let (mut exit_code, mut error) = match result {
            Ok(ControlSignal::Exit(code)) => (code, None),
            Ok(_) => (0, None),
            Err(err) => (255, Some(err)),
        };
        if error.is_none() {
            match self.shutdown() {
                Ok(()) => {}
                Err(Unwind::Exit(code)) => exit_code = code,
                Err(Unwind::Error(err)) => {
                    exit_code = 255;
                    error = Some(err);
                }
            }
        }
        if let Some(err) = &error {
            self.print_error(err);
        }
        self.hoisted.clear();

        self.output.flush_all();
        tracing::debug!(exit_code, "program finished");
        RunOutcome {
            output: self.output.take_captured(),
            exit_code,
            error,
        }
    }

    /// Destruct whatever is still alive, oldest first
    fn shutdown(&mut self) -> EvalResult<()> {
        self.collect_garbage()?;
        for object in self.ctx.live_objects() {
            self.run_destructor(object)?;
        }
        Ok(())
    }

    /// Register functions, classes and interfaces before anything runs. Compound statements
    /// are scanned too; conditional and nested declarations wait for execution.
    fn declare_hoisted(&mut self, stmts: &[Spanned<Stmt>], env: &EnvRef) -> InterpResult<()> {
        let mut classes = Vec::new();
        self.hoist(stmts, env, &mut classes)?;
        for (class, pos) in &classes {
            self.ctx.validate_class(class).map_err(|e| located(e, *pos))?;
        }
        Ok(())
    }

    fn hoist(
        &mut self,
        stmts: &[Spanned<Stmt>],
        env: &EnvRef,
        classes: &mut Vec<(Rc<ClassDecl>, Position)>,
    ) -> InterpResult<()> {
        for stmt in stmts {
            match &stmt.node {
                Stmt::Function(decl) => {
                    env.borrow_mut()
                        .define_user_function(decl.clone())
                        .map_err(|e| located(e, stmt.pos))?;
                }
                Stmt::Class(decl) => {
                    let class = self
                        .ctx
                        .add_class(decl.clone())
                        .map_err(|e| located(e, stmt.pos))?;
                    tracing::debug!(class = %class.name, "class registered");
                    classes.push((class, stmt.pos));
                }
                Stmt::Interface(decl) => {
                    self.ctx
                        .add_interface(decl.clone())
                        .map_err(|e| located(e, stmt.pos))?;
                }
                Stmt::Block(inner) => {
                    self.hoist(inner, env, classes)?;
                    continue;
                }
                _ => continue,
            }
            self.hoisted.insert(node_id(stmt));
        }
        Ok(())
    }

    // ============ Object lifecycle ============

    /// Run the destructors of objects released since the last call
    pub(super) fn collect_garbage(&mut self) -> EvalResult<()> {
        while let Some(object) = self.ctx.pop_pending() {
            self.run_destructor(object)?;
        }
        Ok(())
    }

    pub(super) fn run_destructor(&mut self, object: ObjectRef) -> EvalResult<()> {
        if object.is_destructed() {
            return Ok(());
        }
        object.mark_destructed();
        let class = object.class();
        let Some(method) = self.ctx.find_method(&class, "__destruct") else {
            return Ok(());
        };
        tracing::trace!(class = %class.name, id = object.id(), "running destructor");
        self.invoke_method(Some(&object), &method, Vec::new())?;
        Ok(())
    }

    // ============ Statements ============

    pub(super) fn exec_block(
        &mut self,
        stmts: &[Spanned<Stmt>],
        env: &EnvRef,
    ) -> InterpResult<ControlSignal> {
        for stmt in stmts {
            let signal = self.exec_stmt(stmt, env)?;
            if !signal.is_normal() {
                return Ok(signal);
            }
        }
        Ok(ControlSignal::normal())
    }

    /// Execute one statement with automatic stack growth, then release unreferenced objects
    pub(super) fn exec_stmt(
        &mut self,
        stmt: &Spanned<Stmt>,
        env: &EnvRef,
    ) -> InterpResult<ControlSignal> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            if stmt.pos.line > 0 {
                self.current_pos = stmt.pos;
            }
            let result = self
                .exec_stmt_inner(stmt, env)
                .and_then(|signal| self.collect_garbage().map(|()| signal));
            result
                .or_else(Unwind::into_signal)
                .map_err(|e| located(e, stmt.pos))
        })
    }

    fn exec_stmt_inner(&mut self, stmt: &Spanned<Stmt>, env: &EnvRef) -> EvalResult<ControlSignal> {
        match &stmt.node {
            Stmt::Echo(exprs) => {
                for expr in exprs {
                    let value = self.eval(expr, env)?;
                    self.write_value(&value)?;
                }
                Ok(ControlSignal::normal())
            }

            Stmt::InlineHtml(text) => {
                self.print(text.as_bytes());
                Ok(ControlSignal::normal())
            }

            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(ControlSignal::normal())
            }

            Stmt::Block(stmts) => Ok(self.exec_block(stmts, env)?),

            Stmt::If {
                cond,
                then_branch,
                elseifs,
                else_branch,
            } => {
                if to_bool(&self.eval(cond, env)?) {
                    return Ok(self.exec_stmt(then_branch, env)?);
                }
                for branch in elseifs {
                    if to_bool(&self.eval(&branch.cond, env)?) {
                        return Ok(self.exec_stmt(&branch.body, env)?);
                    }
                }
                match else_branch {
                    Some(body) => Ok(self.exec_stmt(body, env)?),
                    None => Ok(ControlSignal::normal()),
                }
            }

            Stmt::While { cond, body } => {
                while to_bool(&self.eval(cond, env)?) {
                    match LoopAction::from_signal(self.exec_stmt(body, env)?) {
                        LoopAction::Next => {}
                        LoopAction::Stop => break,
                        LoopAction::Propagate(signal) => return Ok(signal),
                    }
                }
                Ok(ControlSignal::normal())
            }

            Stmt::DoWhile { body, cond } => {
                loop {
                    match LoopAction::from_signal(self.exec_stmt(body, env)?) {
                        LoopAction::Next => {}
                        LoopAction::Stop => break,
                        LoopAction::Propagate(signal) => return Ok(signal),
                    }
                    if !to_bool(&self.eval(cond, env)?) {
                        break;
                    }
                }
                Ok(ControlSignal::normal())
            }

            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                for expr in init {
                    self.eval(expr, env)?;
                }
                loop {
                    // every condition runs; the last one decides
                    let mut proceed = true;
                    for expr in cond {
                        proceed = to_bool(&self.eval(expr, env)?);
                    }
                    if !proceed {
                        break;
                    }
                    match LoopAction::from_signal(self.exec_stmt(body, env)?) {
                        LoopAction::Next => {}
                        LoopAction::Stop => break,
                        LoopAction::Propagate(signal) => return Ok(signal),
                    }
                    for expr in step {
                        self.eval(expr, env)?;
                    }
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Foreach {
                subject,
                key,
                value,
                by_ref,
                body,
            } => self.exec_foreach(subject, key.as_ref(), value, *by_ref, body, env),

            Stmt::Break(level) => Ok(ControlSignal::Break(self.loop_level("break", level, env)?)),
            Stmt::Continue(level) => Ok(ControlSignal::Continue(
                self.loop_level("continue", level, env)?,
            )),

            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Void,
                };
                Ok(ControlSignal::Return(value))
            }

            Stmt::Global(names) => {
                let mut scope = env.borrow_mut();
                for name in names {
                    scope.add_global_variable(name);
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Unset(targets) => {
                for target in targets {
                    self.unset(target, env)?;
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Const(items) => {
                for ConstItem { name, value } in items {
                    let value = self.eval(value, env)?;
                    let declared = env.borrow_mut().declare_constant(name, value);
                    if let Err(warning) = declared {
                        self.print_error(&warning);
                    }
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Function(decl) => {
                if !self.hoisted.contains(&node_id(stmt)) {
                    env.borrow_mut().define_user_function(decl.clone())?;
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Class(decl) => {
                if !self.hoisted.contains(&node_id(stmt)) {
                    let class = self.ctx.add_class(decl.clone())?;
                    tracing::debug!(class = %class.name, "class registered");
                    self.ctx.validate_class(&class)?;
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Interface(decl) => {
                if !self.hoisted.contains(&node_id(stmt)) {
                    self.ctx.add_interface(decl.clone())?;
                }
                Ok(ControlSignal::normal())
            }

            Stmt::Nop => Ok(ControlSignal::normal()),
        }
    }

    /// Level operand of `break`/`continue`; must be a positive integer
    fn loop_level(
        &mut self,
        keyword: &str,
        level: &Option<Spanned<Expr>>,
        env: &EnvRef,
    ) -> EvalResult<usize> {
        let Some(expr) = level else {
            return Ok(1);
        };
        let n = to_int(&self.eval(expr, env)?, true)?;
        usize::try_from(n)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                PhpError::fatal(format!("'{keyword}' operator accepts only positive integers"))
                    .into()
            })
    }

    fn exec_foreach(
        &mut self,
        subject: &Spanned<Expr>,
        key: Option<&Spanned<Expr>>,
        value: &Spanned<Expr>,
        by_ref: bool,
        body: &Spanned<Stmt>,
        env: &EnvRef,
    ) -> EvalResult<ControlSignal> {
        let iterable = self.eval(subject, env)?;
        let entries: Vec<(Value, Value)> = match &iterable {
            Value::Array(arr) => arr.iter().map(|(k, v)| (k.to_value(), v.clone())).collect(),
            Value::Object(obj) => obj
                .public_properties()
                .into_iter()
                .map(|(name, v)| (Value::Str(name.into_bytes()), v))
                .collect(),
            other => {
                self.print_error(&PhpError::warning(format!(
                    "foreach() argument must be of type array|object, {} given",
                    other.type_name()
                )));
                return Ok(ControlSignal::normal());
            }
        };

        // by-reference iteration binds the loop variable to each element of the subject
        let source = match (&iterable, by_ref) {
            (_, false) => None,
            (Value::Object(obj), true) => Some(ElementSource::Object(obj.clone())),
            (_, true) if is_variable(&subject.node) => {
                Some(ElementSource::Lvalue(self.lvalue(subject, env)?))
            }
            _ => None,
        };
        drop(iterable);

        for (k, v) in entries {
            let element = source.as_ref().map(|s| s.element(&k));
            let write_back = match &element {
                // removed by an earlier iteration
                Some(target) if !self.lvalue_exists(target) => continue,
                Some(target) => match self.reference_slot(target)? {
                    Some(slot) => {
                        self.bind_ref(value, slot, env)?;
                        None
                    }
                    None => {
                        let slot = Slot::new(v);
                        self.bind_ref(value, slot.clone(), env)?;
                        Some(slot)
                    }
                },
                None => {
                    self.assign(value, v, env)?;
                    None
                }
            };
            if let Some(key_target) = key {
                self.assign(key_target, k, env)?;
            }

            let signal = self.exec_stmt(body, env)?;
            // properties are not reference cells; the loop variable's value is stored back
            if let (Some(target), Some(slot)) = (&element, write_back) {
                self.write_lvalue(target, slot.get())?;
            }
            match LoopAction::from_signal(signal) {
                LoopAction::Next => {}
                LoopAction::Stop => break,
                LoopAction::Propagate(signal) => return Ok(signal),
            }
        }
        Ok(ControlSignal::normal())
    }

    fn unset(&mut self, target: &Spanned<Expr>, env: &EnvRef) -> EvalResult<()> {
        match &target.node {
            Expr::Var(_) | Expr::VarVar(_) => {
                let name = self.variable_name(target, env)?;
                let released = env.borrow_mut().unset_variable(&name);
                drop(released);
            }
            Expr::Subscript {
                base,
                index: Some(index),
            } => {
                if let Expr::Var(name) = &base.node {
                    if !env.borrow().has_variable(name) {
                        return Ok(());
                    }
                }
                let container = self.lvalue(base, env)?;
                let key = self.eval(index, env)?;
                let released = self.remove_element(&container, &key)?;
                drop(released);
            }
            Expr::Prop { base, name } => {
                if let Value::Object(obj) = self.eval_quiet(base, env)? {
                    let released = obj.remove_property(name);
                    drop(released);
                }
            }
            _ => {
                return Err(PhpError::fatal("Cannot unset the result of an expression").into());
            }
        }
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default(), &Request::empty(""))
    }
}

impl ErrorSink for Interpreter {
    fn emit(&mut self, err: PhpError) {
        self.print_error(&err);
    }
}

/// Attach a position when the node has a real one
pub(super) fn located(err: PhpError, pos: Position) -> PhpError {
    if pos.line == 0 { err } else { err.at(pos) }
}

/// Identity of a statement node for the lifetime of a run
fn node_id(stmt: &Spanned<Stmt>) -> usize {
    std::ptr::from_ref(stmt) as usize
}

fn is_variable(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Var(_) | Expr::VarVar(_) | Expr::Subscript { .. } | Expr::Prop { .. }
    )
}

/// Where a by-reference `foreach` writes its elements back
enum ElementSource {
    Lvalue(LValue),
    /// Objects iterate their public properties; keys are property names
    Object(ObjectRef),
}

impl ElementSource {
    fn element(&self, key: &Value) -> LValue {
        match self {
            ElementSource::Lvalue(lv) => lv.with_key(key.clone()),
            ElementSource::Object(obj) => {
                let name = ArrayKey::from_value(key)
                    .map(|k| k.to_string())
                    .unwrap_or_default();
                LValue::new(Container::Prop(obj.clone(), name))
            }
        }
    }
}

/// `PHP_*` and `E_*` constants seeded into the root scope
fn predefined_constants() -> Vec<(&'static str, Value)> {
    let (os, family) = match std::env::consts::OS {
        "linux" => ("Linux", "Linux"),
        "macos" => ("Darwin", "Darwin"),
        "windows" => ("WINNT", "Windows"),
        "freebsd" | "openbsd" | "netbsd" | "dragonfly" => ("BSD", "BSD"),
        _ => ("Unknown", "Unknown"),
    };
    let mut constants = vec![
        ("PHP_EOL", Value::str("\n")),
        ("PHP_INT_MAX", Value::Int(i64::MAX)),
        ("PHP_INT_MIN", Value::Int(i64::MIN)),
        ("PHP_INT_SIZE", Value::Int(8)),
        ("PHP_FLOAT_EPSILON", Value::Float(f64::EPSILON)),
        ("PHP_FLOAT_MAX", Value::Float(f64::MAX)),
        ("PHP_FLOAT_MIN", Value::Float(f64::MIN_POSITIVE)),
        ("PHP_FLOAT_DIG", Value::Int(15)),
        ("NAN", Value::Float(f64::NAN)),
        ("INF", Value::Float(f64::INFINITY)),
        ("PHP_OS", Value::str(os)),
        ("PHP_OS_FAMILY", Value::str(family)),
        ("DIRECTORY_SEPARATOR", Value::str(std::path::MAIN_SEPARATOR_STR)),
        ("PHP_VERSION", Value::str("8.3.0")),
        ("PHP_MAJOR_VERSION", Value::Int(8)),
        ("PHP_MINOR_VERSION", Value::Int(3)),
        ("PHP_RELEASE_VERSION", Value::Int(0)),
        ("PHP_EXTRA_VERSION", Value::str("")),
        ("PHP_VERSION_ID", Value::Int(80300)),
    ];
    constants.extend(ERROR_CONSTANTS.iter().map(|(name, v)| (*name, Value::Int(*v))));
    constants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, FnDecl};

    fn sp<T>(node: T) -> Spanned<T> {
        Spanned::new(node, Position::new(1, 1))
    }

    fn bx(e: Expr) -> Box<Spanned<Expr>> {
        Box::new(sp(e))
    }

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    fn assign(name: &str, value: Expr) -> Spanned<Stmt> {
        sp(Stmt::Expr(sp(Expr::Assign {
            target: bx(var(name)),
            value: bx(value),
        })))
    }

    fn echo(e: Expr) -> Spanned<Stmt> {
        sp(Stmt::Echo(vec![sp(e)]))
    }

    fn run(stmts: Vec<Spanned<Stmt>>) -> RunOutcome {
        let mut interp = Interpreter::new(Config::default(), &Request::empty("/t.php"));
        interp.run(&Program::new("/t.php", stmts))
    }

    fn output(stmts: Vec<Spanned<Stmt>>) -> String {
        String::from_utf8_lossy(&run(stmts).output).into_owned()
    }

    // ---- Driver ----

    #[test]
    fn test_echo_and_inline_html() {
        let out = output(vec![
            sp(Stmt::InlineHtml("<p>".to_string())),
            echo(Expr::IntLit(1)),
            echo(Expr::StrLit("a".to_string())),
        ]);
        assert_eq!(out, "<p>1a");
    }

    #[test]
    fn test_hoisted_function_callable_before_declaration() {
        let decl = FnDecl {
            name: "f".to_string(),
            params: Vec::new(),
            return_type: None,
            body: vec![sp(Stmt::Return(Some(sp(Expr::IntLit(7)))))],
            pos: Position::new(2, 1),
        };
        let out = output(vec![
            echo(Expr::Call {
                name: "F".to_string(),
                args: Vec::new(),
            }),
            sp(Stmt::Function(decl)),
        ]);
        assert_eq!(out, "7");
    }

    #[test]
    fn test_fatal_error_sets_exit_code() {
        let outcome = run(vec![
            echo(Expr::IntLit(1)),
            echo(Expr::Call {
                name: "nope".to_string(),
                args: Vec::new(),
            }),
            echo(Expr::IntLit(2)),
        ]);
        assert_eq!(outcome.exit_code, 255);
        let out = String::from_utf8_lossy(&outcome.output);
        assert_eq!(
            out,
            "1\nFatal error: Uncaught Error: Call to undefined function nope() \
             in /t.php on line 1\n"
        );
    }

    #[test]
    fn test_exit_code_and_message() {
        let outcome = run(vec![
            sp(Stmt::Expr(sp(Expr::Exit(Some(bx(Expr::IntLit(3))))))),
            echo(Expr::IntLit(1)),
        ]);
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.output.is_empty());

        let outcome = run(vec![sp(Stmt::Expr(sp(Expr::Exit(Some(bx(Expr::StrLit(
            "bye".to_string(),
        )))))))]);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.output, b"bye");
    }

    // ---- Loops ----

    #[test]
    fn test_while_with_break_and_continue() {
        // $i = 0; while (true) { $i++; if ($i == 2) continue; if ($i > 4) break; echo $i; }
        let body = sp(Stmt::Block(vec![
            sp(Stmt::Expr(sp(Expr::IncDec {
                op: crate::ast::IncDecOp::Inc,
                prefix: false,
                target: bx(var("i")),
            }))),
            sp(Stmt::If {
                cond: sp(Expr::Binary {
                    left: bx(var("i")),
                    op: BinOp::Eq,
                    right: bx(Expr::IntLit(2)),
                }),
                then_branch: Box::new(sp(Stmt::Continue(None))),
                elseifs: Vec::new(),
                else_branch: None,
            }),
            sp(Stmt::If {
                cond: sp(Expr::Binary {
                    left: bx(var("i")),
                    op: BinOp::Gt,
                    right: bx(Expr::IntLit(4)),
                }),
                then_branch: Box::new(sp(Stmt::Break(None))),
                elseifs: Vec::new(),
                else_branch: None,
            }),
            echo(var("i")),
        ]));
        let out = output(vec![
            assign("i", Expr::IntLit(0)),
            sp(Stmt::While {
                cond: sp(Expr::Const("true".to_string())),
                body: Box::new(body),
            }),
        ]);
        assert_eq!(out, "134");
    }

    #[test]
    fn test_nested_break_levels() {
        // while (true) { while (true) { break 2; } echo "x"; } echo "done";
        let inner = sp(Stmt::While {
            cond: sp(Expr::Const("true".to_string())),
            body: Box::new(sp(Stmt::Break(Some(sp(Expr::IntLit(2)))))),
        });
        let outer = sp(Stmt::While {
            cond: sp(Expr::Const("true".to_string())),
            body: Box::new(sp(Stmt::Block(vec![inner, echo(Expr::StrLit("x".to_string()))]))),
        });
        assert_eq!(output(vec![outer, echo(Expr::StrLit("done".to_string()))]), "done");
    }

    #[test]
    fn test_break_zero_is_fatal() {
        let outcome = run(vec![sp(Stmt::While {
            cond: sp(Expr::Const("true".to_string())),
            body: Box::new(sp(Stmt::Break(Some(sp(Expr::IntLit(0)))))),
        })]);
        assert_eq!(outcome.exit_code, 255);
        let err = outcome.error.unwrap();
        assert_eq!(err.message, "'break' operator accepts only positive integers");
    }

    #[test]
    fn test_foreach_over_scalar_warns() {
        let out = output(vec![sp(Stmt::Foreach {
            subject: sp(Expr::IntLit(1)),
            key: None,
            value: sp(var("v")),
            by_ref: false,
            body: Box::new(sp(Stmt::Nop)),
        })]);
        assert_eq!(
            out,
            "\nWarning: foreach() argument must be of type array|object, int given \
             in /t.php on line 1\n"
        );
    }

    // ---- Diagnostics ----

    #[test]
    fn test_error_reporting_mask_hides_warnings() {
        let mut config = Config::default();
        config.error_reporting = 0;
        let mut interp = Interpreter::new(config, &Request::empty("/t.php"));
        let outcome = interp.run(&Program::new("/t.php", vec![echo(var("missing"))]));
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    fn test_predefined_constants() {
        let interp = Interpreter::default();
        let env = interp.global_env().borrow();
        assert_eq!(env.lookup_constant("PHP_INT_MAX").unwrap(), Value::Int(i64::MAX));
        assert_eq!(env.lookup_constant("E_ALL").unwrap(), Value::Int(32767));
        assert_eq!(env.lookup_constant("PHP_VERSION_ID").unwrap(), Value::Int(80300));
    }
}
