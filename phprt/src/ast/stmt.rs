//! Statement AST nodes

use super::{ClassDecl, Expr, FnDecl, InterfaceDecl, Spanned};
use serde::{Deserialize, Serialize};

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `echo a, b;`
    Echo(Vec<Spanned<Expr>>),
    /// Text outside of the `<?php ... ?>` tags
    InlineHtml(String),
    /// `expr;`
    Expr(Spanned<Expr>),
    /// `{ ... }`
    Block(Vec<Spanned<Stmt>>),
    /// `if (cond) ... elseif (cond) ... else ...`
    If {
        cond: Spanned<Expr>,
        then_branch: Box<Spanned<Stmt>>,
        #[serde(default)]
        elseifs: Vec<ElseIf>,
        #[serde(default)]
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    /// `while (cond) body`
    While {
        cond: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
    },
    /// `do body while (cond);`
    DoWhile {
        body: Box<Spanned<Stmt>>,
        cond: Spanned<Expr>,
    },
    /// `for (init; cond; step) body`
    For {
        #[serde(default)]
        init: Vec<Spanned<Expr>>,
        #[serde(default)]
        cond: Vec<Spanned<Expr>>,
        #[serde(default)]
        step: Vec<Spanned<Expr>>,
        body: Box<Spanned<Stmt>>,
    },
    /// `foreach (subject as [key =>] [&]value) body`
    Foreach {
        subject: Spanned<Expr>,
        #[serde(default)]
        key: Option<Spanned<Expr>>,
        value: Spanned<Expr>,
        #[serde(default)]
        by_ref: bool,
        body: Box<Spanned<Stmt>>,
    },
    /// `break [level];`
    Break(Option<Spanned<Expr>>),
    /// `continue [level];`
    Continue(Option<Spanned<Expr>>),
    /// `return [expr];`
    Return(Option<Spanned<Expr>>),
    /// `global $a, $b;`
    Global(Vec<String>),
    /// `unset($a, $b[1], ...);`
    Unset(Vec<Spanned<Expr>>),
    /// `const A = 1, B = 2;`
    Const(Vec<ConstItem>),
    /// Function declaration
    Function(FnDecl),
    /// Class declaration
    Class(ClassDecl),
    /// Interface declaration
    Interface(InterfaceDecl),
    /// `;`
    Nop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIf {
    pub cond: Spanned<Expr>,
    pub body: Spanned<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstItem {
    pub name: String,
    pub value: Spanned<Expr>,
}
