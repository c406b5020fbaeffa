//! Abstract Syntax Tree definitions
//!
//! The tree is produced by an external parser and handed over as JSON, so every node
//! derives serde's `Serialize`/`Deserialize`.

mod expr;
mod span;
mod stmt;

pub use expr::*;
pub use span::*;
pub use stmt::*;

use serde::{Deserialize, Serialize};

/// A parsed script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Absolute path of the script, used for `__FILE__`, `__DIR__` and diagnostics
    #[serde(default)]
    pub file: String,
    pub stmts: Vec<Spanned<Stmt>>,
}

impl Program {
    pub fn new(file: impl Into<String>, stmts: Vec<Spanned<Stmt>>) -> Self {
        Self {
            file: file.into(),
            stmts,
        }
    }
}

/// A declared type: `int`, `?string`, `int|float`, `Foo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHint {
    /// Lowercase names for builtin types, declared spelling for class names
    pub names: Vec<String>,
    /// `?T` form
    #[serde(default)]
    pub nullable: bool,
}

impl TypeHint {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl std::fmt::Display for TypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nullable {
            write!(f, "?")?;
        }
        write!(f, "{}", self.names.join("|"))
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Name without the `$`
    pub name: String,
    #[serde(default)]
    pub ty: Option<TypeHint>,
    #[serde(default)]
    pub default: Option<Spanned<Expr>>,
    #[serde(default)]
    pub by_ref: bool,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<TypeHint>,
    pub body: Vec<Spanned<Stmt>>,
    #[serde(default)]
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Declared property with its default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub ty: Option<TypeHint>,
    #[serde(default)]
    pub default: Option<Spanned<Expr>>,
}

/// Method declaration; `body` is `None` for abstract and interface methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<TypeHint>,
    #[serde(default)]
    pub body: Option<Vec<Spanned<Stmt>>>,
    #[serde(default)]
    pub pos: Position,
}

/// Class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub pos: Position,
}

impl ClassDecl {
    /// Find a method declared directly on this class (case-insensitive)
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// Interface declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub pos: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_from_json() {
        let json = r#"{
            "file": "/tmp/a.php",
            "stmts": [
                {
                    "node": {
                        "Echo": [
                            { "node": { "StrLit": "hi" }, "pos": { "line": 1, "column": 6 } }
                        ]
                    },
                    "pos": { "line": 1, "column": 1 }
                }
            ]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.file, "/tmp/a.php");
        match &program.stmts[0].node {
            Stmt::Echo(exprs) => {
                assert_eq!(exprs[0].node, Expr::StrLit("hi".to_string()));
                assert_eq!(exprs[0].pos, Position::new(1, 6));
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn test_position_defaults_when_missing() {
        let json = r#"{ "stmts": [ { "node": "Nop" } ] }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.stmts[0].pos, Position::default());
        assert_eq!(program.file, "");
    }

    #[test]
    fn test_cast_keywords() {
        assert_eq!(CastType::from_keyword("integer"), Some(CastType::Int));
        assert_eq!(CastType::from_keyword("REAL"), Some(CastType::Float));
        assert_eq!(CastType::from_keyword("binary"), Some(CastType::String));
        assert_eq!(CastType::from_keyword("object"), None);
    }

    #[test]
    fn test_type_hint_display() {
        assert_eq!(TypeHint::new(&["int", "float"]).to_string(), "int|float");
        assert_eq!(TypeHint::new(&["string"]).nullable().to_string(), "?string");
    }
}
