//! JIT compilation: expression trees to native code via Cranelift.
//!
//! ## Architecture
//!
//! ```text
//! Expr -> FunctionLowering -> Cranelift IR -> JITModule -> native code
//! ```
//!
//! Each function (the implicit `main` and every `defn`) is lowered into
//! its own Cranelift function: basic blocks, block parameters at control
//! flow joins (the phi mechanism), and `jump`/`brif`/`return_` as the only
//! terminators. Mutable variables are Cranelift frontend variables, so the
//! SSA bookkeeping for `set!` and loops is handled by `FunctionBuilder`.
//!
//! All compiled functions take and return `i64`; running a program means
//! invoking the compiled zero-argument `main` and yielding its integer.

mod compiler;
mod merge;
pub(crate) mod translate;

pub use compiler::{Compiler, Jit};
