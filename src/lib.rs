//! # Lyre — a tiny Lisp compiled to native code through Cranelift
//!
//! Lyre reads s-expressions, lowers them straight to Cranelift IR (basic
//! blocks with block-parameter merges at control-flow joins) and executes
//! the result through `cranelift-jit`. The language is deliberately small:
//! machine integers, symbols, `defn`, `cond`, `let`, `while` and `set!`.
//!
//! ## Quick start
//!
//! ```
//! let result = lyre::eval_str("(+ 1 2 3)").unwrap();
//! assert_eq!(result, 6);
//! ```
//!
//! ## Pipeline
//!
//! 1. **Reader** — parse s-expressions from text ([`read_program`])
//! 2. **Lowering** — dispatch each expression to Cranelift IR, resolving
//!    symbols through a chain of lexical scopes
//! 3. **JIT** — finalize the module and invoke the compiled `main`

pub mod ast;
pub mod builtins;
pub mod error;
pub mod jit;
pub mod reader;
pub mod scope;

pub use ast::Expr;
pub use error::LyreError;
pub use jit::Compiler;
pub use reader::read_program;

/// Read, compile and run `source`, returning the program's integer result.
pub fn eval_str(source: &str) -> Result<i64, LyreError> {
    let program = read_program(source)?;
    Compiler::new()?.run(&program)
}
