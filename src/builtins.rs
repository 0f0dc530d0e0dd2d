//! The builtin operator table.
//!
//! Two operator families: arithmetic, a left fold over the evaluated
//! arguments, and comparison, every consecutive pair compared and the
//! results ANDed to a single 0/1. Handlers receive *unevaluated* argument
//! expressions — the contract allows a handler to choose its own
//! evaluation strategy, though both current families evaluate
//! left-to-right before combining.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::types::I64;
use cranelift_codegen::ir::{InstBuilder, Value};
use smallvec::SmallVec;

use crate::ast::Expr;
use crate::error::LyreError;
use crate::jit::translate::FunctionLowering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl ChainOp {
    fn cc(self) -> IntCC {
        match self {
            ChainOp::Eq => IntCC::Equal,
            ChainOp::Ne => IntCC::NotEqual,
            ChainOp::Lt => IntCC::SignedLessThan,
            ChainOp::Gt => IntCC::SignedGreaterThan,
            ChainOp::Le => IntCC::SignedLessThanOrEqual,
            ChainOp::Ge => IntCC::SignedGreaterThanOrEqual,
        }
    }
}

/// One builtin operator, dispatched by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Fold(FoldOp),
    Chain(ChainOp),
}

/// Operator table installed once in the root scope frame.
pub static TABLE: &[(&str, Builtin)] = &[
    ("+", Builtin::Fold(FoldOp::Add)),
    ("-", Builtin::Fold(FoldOp::Sub)),
    ("*", Builtin::Fold(FoldOp::Mul)),
    ("/", Builtin::Fold(FoldOp::Div)),
    ("=", Builtin::Chain(ChainOp::Eq)),
    ("not=", Builtin::Chain(ChainOp::Ne)),
    ("<", Builtin::Chain(ChainOp::Lt)),
    (">", Builtin::Chain(ChainOp::Gt)),
    ("<=", Builtin::Chain(ChainOp::Le)),
    (">=", Builtin::Chain(ChainOp::Ge)),
];

impl Builtin {
    /// Lower an invocation of this operator inside the current function.
    pub(crate) fn apply(
        self,
        fx: &mut FunctionLowering,
        name: &str,
        args: &[Expr],
    ) -> Result<Value, LyreError> {
        match self {
            Builtin::Fold(op) => {
                if args.is_empty() {
                    return Err(LyreError::not_enough_args(name, 1, 0));
                }
                let mut acc = fx.lower(&args[0])?;
                for arg in &args[1..] {
                    let rhs = fx.lower(arg)?;
                    acc = match op {
                        FoldOp::Add => fx.builder.ins().iadd(acc, rhs),
                        FoldOp::Sub => fx.builder.ins().isub(acc, rhs),
                        FoldOp::Mul => fx.builder.ins().imul(acc, rhs),
                        // sdiv traps at runtime on a zero divisor
                        FoldOp::Div => fx.builder.ins().sdiv(acc, rhs),
                    };
                }
                Ok(acc)
            }
            Builtin::Chain(op) => {
                if args.len() < 2 {
                    return Err(LyreError::not_enough_args(name, 2, args.len()));
                }
                let mut values: SmallVec<[Value; 4]> = SmallVec::new();
                for arg in args {
                    values.push(fx.lower(arg)?);
                }
                let cc = op.cc();
                let mut acc = fx.builder.ins().icmp(cc, values[0], values[1]);
                for pair in values.windows(2).skip(1) {
                    let next = fx.builder.ins().icmp(cc, pair[0], pair[1]);
                    acc = fx.builder.ins().band(acc, next);
                }
                Ok(fx.builder.ins().uextend(I64, acc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_both_families() {
        let folds = TABLE
            .iter()
            .filter(|(_, b)| matches!(b, Builtin::Fold(_)))
            .count();
        let chains = TABLE
            .iter()
            .filter(|(_, b)| matches!(b, Builtin::Chain(_)))
            .count();
        assert_eq!(folds, 4);
        assert_eq!(chains, 6);
    }

    #[test]
    fn test_table_names_unique() {
        for (i, (name, _)) in TABLE.iter().enumerate() {
            assert!(
                TABLE.iter().skip(i + 1).all(|(other, _)| other != name),
                "duplicate operator {}",
                name
            );
        }
    }
}
