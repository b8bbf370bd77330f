// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The simple model against the iterate loop.

mod common;

use common::{block, branch_fact, enabled_perf, read_fact, sentinel, write_fact};
use intercity_engine::instruction::{Instruction, InstructionType, Operand};
use intercity_models::one_bit::OneBitBranchPredictor;
use intercity_models::simple::SimpleCoreModel;

#[test]
fn block_of_plain_instructions_costs_the_static_sum() {
    let perf = enabled_perf(Box::new(SimpleCoreModel), None);
    perf.queue_basic_block(block(vec![
        Instruction::simple(InstructionType::Generic, 2),
        Instruction::simple(InstructionType::Generic, 2),
        Instruction::simple(InstructionType::Generic, 2),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 6);
    assert_eq!(perf.queued_dynamic_info(), 0);
    assert_eq!(perf.queued_basic_blocks(), 1);
    assert_eq!(perf.instruction_count(), 3);
}

#[test]
fn missing_memory_fact_stalls_and_one_push_resumes() {
    let perf = enabled_perf(Box::new(SimpleCoreModel), None);
    perf.queue_basic_block(block(vec![
        Instruction::simple(InstructionType::Generic, 1),
        Instruction::new(InstructionType::Memory, vec![Operand::read_memory()], 0),
        Instruction::simple(InstructionType::Generic, 1),
    ]));
    perf.queue_basic_block(sentinel());

    perf.iterate();
    assert_eq!(perf.cycle_count(), 1);
    assert_eq!(perf.resume_index(), 1);

    perf.push_dynamic_info(read_fact(5));
    perf.iterate();
    assert_eq!(perf.cycle_count(), 7);
    assert_eq!(perf.resume_index(), 0);
    assert_eq!(perf.queued_basic_blocks(), 1);
}

#[test]
fn co_processor_instruction_types_cost_one_cycle() {
    let perf = enabled_perf(Box::new(SimpleCoreModel), None);
    perf.queue_basic_block(block(vec![
        Instruction::simple(InstructionType::Recv, 50),
        Instruction::simple(InstructionType::Sync, 60),
        Instruction::simple(InstructionType::Spawn, 70),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 3);
}

#[test]
fn read_and_write_operands_pop_matching_variants() {
    let perf = enabled_perf(Box::new(SimpleCoreModel), None);
    perf.push_dynamic_info(read_fact(4));
    perf.push_dynamic_info(write_fact(6));
    perf.queue_basic_block(block(vec![Instruction::new(
        InstructionType::Memory,
        vec![Operand::read_memory(), Operand::write_memory()],
        1,
    )]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 1 + 4 + 6);
    assert_eq!(perf.queued_dynamic_info(), 0);
}

#[test]
fn mispredicted_branch_pays_the_penalty_once() {
    let perf = enabled_perf(
        Box::new(SimpleCoreModel),
        Some(Box::new(OneBitBranchPredictor::new(64))),
    );

    // Cold predictor says not-taken; the branch is taken: penalty applies.
    perf.push_dynamic_info(branch_fact(true, 10));
    perf.queue_basic_block(block(vec![Instruction::simple(InstructionType::Branch, 1)]));
    perf.queue_basic_block(sentinel());
    perf.iterate();
    assert_eq!(perf.cycle_count(), 11);

    // Second taken branch at the same address predicts correctly.
    perf.push_dynamic_info(branch_fact(true, 10));
    perf.queue_basic_block(block(vec![Instruction::simple(InstructionType::Branch, 1)]));
    perf.iterate();
    assert_eq!(perf.cycle_count(), 12);
}

#[test]
fn branch_without_predictor_still_pops_its_fact() {
    let perf = enabled_perf(Box::new(SimpleCoreModel), None);
    perf.push_dynamic_info(branch_fact(true, 10));
    perf.queue_basic_block(block(vec![Instruction::simple(InstructionType::Branch, 2)]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 2);
    assert_eq!(perf.queued_dynamic_info(), 0);
}
