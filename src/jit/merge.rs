//! Control-flow join points.
//!
//! A `MergePoint` is a block with a single I64 block parameter: the
//! phi-style merge of one incoming value per predecessor. Predecessors are
//! recorded explicitly as they arrive and validated, because a mismatch
//! between the recorded predecessors and the blocks that actually branch
//! into the join is a lowering bug, never a user error — hence the
//! assertions rather than `Result`s.

use cranelift_codegen::ir::types::I64;
use cranelift_codegen::ir::{Block, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;

pub(crate) struct MergePoint {
    block: Block,
    value: Value,
    preds: Vec<Block>,
    sealed: bool,
}

impl MergePoint {
    /// Create the join block and its merged-value parameter. The cursor is
    /// left untouched.
    pub fn new(builder: &mut FunctionBuilder) -> Self {
        let block = builder.create_block();
        let value = builder.append_block_param(block, I64);
        MergePoint {
            block,
            value,
            preds: Vec::new(),
            sealed: false,
        }
    }

    /// Terminate the current block with a jump into the join, carrying
    /// `value` as this predecessor's contribution.
    pub fn arrive(&mut self, builder: &mut FunctionBuilder, value: Value) {
        assert!(!self.sealed, "arrival at an already sealed merge");
        let pred = builder
            .current_block()
            .expect("arriving at a merge with no current block");
        assert!(
            !self.preds.contains(&pred),
            "block {} arrives at the same merge twice",
            pred
        );
        self.preds.push(pred);
        builder.ins().jump(self.block, &[value]);
    }

    /// Declare the predecessor set complete.
    pub fn seal(&mut self, builder: &mut FunctionBuilder) {
        assert!(!self.sealed, "merge sealed twice");
        assert!(
            !self.preds.is_empty(),
            "sealing a merge that nothing branches into"
        );
        self.sealed = true;
        builder.seal_block(self.block);
    }

    /// Move the cursor into the join block and return the merged value.
    pub fn switch_to(&self, builder: &mut FunctionBuilder) -> Value {
        builder.switch_to_block(self.block);
        self.value
    }
}
