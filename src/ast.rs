//! The abstract syntax tree produced by the reader.
//!
//! An expression is an integer, a symbol, a string, or a list of
//! expressions. Strings exist only so the reader can accept them; the
//! runtime has a single machine-integer value type and lowering rejects
//! string literals.

use std::fmt;

/// One s-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Sym(String),
    Str(String),
    List(Vec<Expr>),
}

impl Expr {
    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    pub fn list(items: impl Into<Vec<Expr>>) -> Self {
        Expr::List(items.into())
    }

    /// The symbol name, if this expression is a symbol.
    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Expr::Sym(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Sym(name) => write!(f, "{}", name),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
