// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The magic model: everything completes in zero cycles.
//!
//! Used to fast-forward through regions whose timing is of no interest.
//! The facts the functional side produces are still consumed one-for-one,
//! otherwise the dynamic-info queue would run away and trip the
//! desynchronisation cap the moment a timed model is re-enabled.

use intercity_engine::instruction::Instruction;
use intercity_engine::perf_model::{CoreModel, CostContext, CostOutcome};

#[derive(Default)]
pub struct MagicCoreModel;

impl CoreModel for MagicCoreModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        if ctx.available_infos() < crate::facts_required(instruction) {
            return CostOutcome::Stalled;
        }

        for operand in instruction.operands().iter().filter(|o| o.is_memory()) {
            // Consume and discard; only parity matters here.
            let _ = ctx.pop_info().memory_latency(operand.direction);
        }
        if instruction.is_branch() {
            let _ = ctx.pop_info().branch_outcome();
        }

        ctx.count_instruction();
        CostOutcome::Completed
    }
}
