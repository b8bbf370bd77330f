// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Concrete performance models.
//!
//! Every model here implements
//! [`CoreModel`](intercity_engine::perf_model::CoreModel) and is selected by
//! name through [`create_core_model`](crate::factory::create_core_model):
//!
//!  - [`simple`]: static costs plus observed memory latencies.
//!  - [`iocoom`]: in-order issue with out-of-order memory commit.
//!  - [`magic`]: zero cost, used to fast-forward regions of no interest.
//!  - [`magic_pep`]: the co-processor model, costing only the
//!    receive/sync/spawn instructions a PEP core executes on behalf of its
//!    main core.
//!
//! All models obey the same two contracts. First, fact parity: exactly one
//! dynamic fact is consumed per memory operand and per branch, so the
//! producer and consumer streams stay aligned. Second, whole-or-nothing
//! consumption: a model checks that every fact its instruction needs has
//! arrived before it consumes any of them, and stalls otherwise.

pub mod factory;
pub mod iocoom;
pub mod magic;
pub mod magic_pep;
pub mod one_bit;
pub mod simple;

use intercity_engine::instruction::Instruction;
use intercity_engine::perf_model::CostContext;

/// Facts an instruction will consume: one per memory operand, one per
/// branch.
fn facts_required(instruction: &Instruction) -> usize {
    instruction.memory_operand_count() + usize::from(instruction.is_branch())
}

/// Pop the branch fact for `instruction`, run the predictor and return the
/// penalty cycles (zero when predicted correctly or no predictor is fitted).
fn charge_branch(ctx: &mut CostContext<'_>) -> u64 {
    let (address, taken, target, mispredict_penalty) = ctx.pop_info().branch_outcome();
    match ctx.branch_predictor() {
        Some(predictor) => {
            let predicted = predictor.predict(address, target);
            predictor.update(predicted, taken, address, target);
            if predicted == taken {
                0
            } else {
                mispredict_penalty
            }
        }
        None => 0,
    }
}
