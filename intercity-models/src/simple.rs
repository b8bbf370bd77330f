// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The simple in-order model: every instruction costs its static cycles
//! plus whatever the memory system reported for its memory operands.

use intercity_engine::instruction::{Instruction, InstructionType};
use intercity_engine::perf_model::{CoreModel, CostContext, CostOutcome};

/// Instruction types this model prices from their static cost. The
/// remainder (the co-processor set) contribute a single cycle each.
fn is_modeled(itype: InstructionType) -> bool {
    !matches!(
        itype,
        InstructionType::Recv | InstructionType::Sync | InstructionType::Spawn
    )
}

#[derive(Default)]
pub struct SimpleCoreModel;

impl CoreModel for SimpleCoreModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        if ctx.available_infos() < crate::facts_required(instruction) {
            return CostOutcome::Stalled;
        }

        let mut cost = 0;
        for operand in instruction.operands().iter().filter(|o| o.is_memory()) {
            cost += ctx.pop_info().memory_latency(operand.direction);
        }
        if instruction.is_branch() {
            cost += crate::charge_branch(ctx);
        }

        cost += if is_modeled(instruction.itype()) {
            instruction.cost()
        } else {
            1
        };

        ctx.count_instruction();
        ctx.add_cycles(cost);
        CostOutcome::Completed
    }
}
