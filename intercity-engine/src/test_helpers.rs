// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Small deterministic [CoreModel]s for exercising the iterate loop in
//! tests and benchmarks. The realistic models live in `intercity-models`.

use crate::instruction::Instruction;
use crate::perf_model::{CoreModel, CostContext, CostOutcome};

/// Charges every instruction its static cost and consumes no facts.
pub struct FixedCostModel;

impl CoreModel for FixedCostModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        ctx.count_instruction();
        ctx.add_cycles(instruction.cost());
        CostOutcome::Completed
    }
}

/// Charges the static cost plus one fact latency per memory operand,
/// stalling until every required fact has arrived.
#[derive(Default)]
pub struct MemoryLatencyModel;

impl CoreModel for MemoryLatencyModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        let facts_required = instruction.memory_operand_count();
        if ctx.available_infos() < facts_required {
            return CostOutcome::Stalled;
        }

        let mut cost = instruction.cost();
        for operand in instruction.operands().iter().filter(|o| o.is_memory()) {
            cost += ctx.pop_info().memory_latency(operand.direction);
        }

        ctx.count_instruction();
        ctx.add_cycles(cost);
        CostOutcome::Completed
    }
}

/// Aborts every instruction of the given type and charges the static cost
/// for the rest.
pub struct AbortTypeModel(pub crate::instruction::InstructionType);

impl CoreModel for AbortTypeModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        if instruction.itype() == self.0 {
            return CostOutcome::Aborted;
        }
        ctx.count_instruction();
        ctx.add_cycles(instruction.cost());
        CostOutcome::Completed
    }
}
