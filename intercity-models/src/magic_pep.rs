// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The co-processor (PEP) model.
//!
//! A PEP core runs the communication side of its tile: receives, sync
//! operations and thread spawns. Only those carry their static cost here;
//! every other instruction type is charged a single cycle. Memory operands
//! are priced from the observed latencies as usual.

use intercity_engine::instruction::{Instruction, InstructionType};
use intercity_engine::perf_model::{CoreModel, CostContext, CostOutcome};

fn is_modeled(itype: InstructionType) -> bool {
    matches!(
        itype,
        InstructionType::Recv | InstructionType::Sync | InstructionType::Spawn
    )
}

#[derive(Default)]
pub struct MagicPepCoreModel;

impl CoreModel for MagicPepCoreModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        if ctx.available_infos() < instruction.memory_operand_count() {
            return CostOutcome::Stalled;
        }

        let mut cost = 0;
        for operand in instruction.operands().iter().filter(|o| o.is_memory()) {
            cost += ctx.pop_info().memory_latency(operand.direction);
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
