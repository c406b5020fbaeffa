//! Expression AST nodes

use super::Spanned;
use serde::{Deserialize, Serialize};

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// String literal (interpolation is resolved by the parser into concatenations)
    StrLit(String),
    /// Array literal: `[k => v, ...]`
    ArrayLit(Vec<ArrayItem>),

    /// Simple variable: `$name` (stored without the `$`)
    Var(String),
    /// Variable variable: `$$expr`
    VarVar(Box<Spanned<Expr>>),
    /// Subscript: `base[index]`, `base[]` when index is absent
    Subscript {
        base: Box<Spanned<Expr>>,
        index: Option<Box<Spanned<Expr>>>,
    },
    /// Property access: `base->name`
    Prop {
        base: Box<Spanned<Expr>>,
        name: String,
    },
    /// Named constant: `PHP_EOL`, `true`, `null`, ...
    Const(String),
    /// Magic constant: `__LINE__`, `__FILE__`, ...
    Magic(MagicConst),

    /// Binary operation (arithmetic, comparison, logical)
    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },
    /// Unary operation
    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },
    /// `++$x`, `$x++`, `--$x`, `$x--`
    IncDec {
        op: IncDecOp,
        prefix: bool,
        target: Box<Spanned<Expr>>,
    },

    /// `target = value`
    Assign {
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },
    /// `target = &source`
    AssignRef {
        target: Box<Spanned<Expr>>,
        source: Box<Spanned<Expr>>,
    },
    /// `target op= value`
    CompoundAssign {
        target: Box<Spanned<Expr>>,
        op: BinOp,
        value: Box<Spanned<Expr>>,
    },
    /// `target ??= value`
    CoalesceAssign {
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },

    /// `cond ? then : else`, or `cond ?: else` when `then` is absent
    Ternary {
        cond: Box<Spanned<Expr>>,
        then_branch: Option<Box<Spanned<Expr>>>,
        else_branch: Box<Spanned<Expr>>,
    },
    /// `left ?? right`
    Coalesce {
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    /// `(type) expr`
    Cast {
        ty: CastType,
        expr: Box<Spanned<Expr>>,
    },

    /// Function call: `name(args)`
    Call {
        name: String,
        args: Vec<Spanned<Expr>>,
    },
    /// Method call: `object->method(args)`
    MethodCall {
        object: Box<Spanned<Expr>>,
        method: String,
        args: Vec<Spanned<Expr>>,
    },
    /// `parent::method(args)` inside a method body
    ParentCall {
        method: String,
        args: Vec<Spanned<Expr>>,
    },
    /// `new Class(args)`
    New {
        class: String,
        args: Vec<Spanned<Expr>>,
    },

    /// `isset(a, b, ...)`
    Isset(Vec<Spanned<Expr>>),
    /// `empty(expr)`
    Empty(Box<Spanned<Expr>>),
    /// `exit(expr)` / `die(expr)`
    Exit(Option<Box<Spanned<Expr>>>),
    /// `print expr`
    Print(Box<Spanned<Expr>>),
    /// `@expr`
    Silence(Box<Spanned<Expr>>),
}

/// One element of an array literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayItem {
    #[serde(default)]
    pub key: Option<Spanned<Expr>>,
    pub value: Spanned<Expr>,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // Comparison
    Eq,
    Ne,
    Identical,
    NotIdentical,
    Lt,
    Gt,
    Le,
    Ge,
    Spaceship,

    // Logical
    And,
    Or,
    Xor,
}

impl BinOp {
    /// Whether the operator is evaluated by the arithmetic engine
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add
                | BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::Mod
                | BinOp::Pow
                | BinOp::Concat
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::Shl
                | BinOp::Shr
        )
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Concat => ".",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Identical => "===",
            BinOp::NotIdentical => "!==",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Spaceship => "<=>",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Xor => "xor",
        };
        write!(f, "{s}")
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Plus => write!(f, "+"),
            UnOp::Not => write!(f, "!"),
            UnOp::BitNot => write!(f, "~"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    Inc,
    Dec,
}

/// Cast targets: `(int)`, `(float)`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastType {
    Int,
    Float,
    String,
    Bool,
    Array,
}

impl CastType {
    /// Resolve a cast keyword (`integer`, `double`, `binary`, ...) to its target
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(CastType::Int),
            "float" | "double" | "real" => Some(CastType::Float),
            "string" | "binary" => Some(CastType::String),
            "bool" | "boolean" => Some(CastType::Bool),
            "array" => Some(CastType::Array),
            _ => None,
        }
    }
}

/// Magic constants resolved from the evaluation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagicConst {
    Line,
    File,
    Dir,
    Function,
    Class,
    Method,
}
