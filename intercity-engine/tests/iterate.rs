// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Cross-module behaviour of the cooperative iterate loop.

use std::sync::Arc;

use intercity_engine::basic_block::{BasicBlock, BlockRef};
use intercity_engine::dynamic_info::DynamicInstructionInfo;
use intercity_engine::instruction::{Instruction, InstructionType, Operand};
use intercity_engine::perf_model::CorePerfModel;
use intercity_engine::test_helpers::{AbortTypeModel, FixedCostModel, MemoryLatencyModel};
use intercity_engine::types::{CoreId, CoreKind};

fn perf(model: Box<dyn intercity_engine::perf_model::CoreModel>) -> CorePerfModel {
    let perf = CorePerfModel::new(CoreId(0), CoreKind::Main, 1.0, 5000, model, None);
    perf.enable();
    perf
}

fn sentinel() -> BlockRef {
    BlockRef::Owned(BasicBlock::new(vec![Instruction::simple(
        InstructionType::Generic,
        1,
    )]))
}

#[test]
fn aborted_instructions_are_skipped_but_iteration_continues() {
    let perf = perf(Box::new(AbortTypeModel(InstructionType::FpDiv)));
    perf.queue_basic_block(BlockRef::Owned(BasicBlock::new(vec![
        Instruction::simple(InstructionType::Generic, 3),
        Instruction::simple(InstructionType::FpDiv, 40),
        Instruction::simple(InstructionType::Generic, 4),
    ])));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    // The aborted FpDiv contributes nothing but does not stop the block.
    assert_eq!(perf.cycle_count(), 7);
    assert_eq!(perf.instruction_count(), 2);
    assert_eq!(perf.queued_basic_blocks(), 1);
}

#[test]
fn shared_blocks_can_be_queued_repeatedly() {
    let perf = perf(Box::new(FixedCostModel));
    let interned = Arc::new(BasicBlock::new(vec![
        Instruction::simple(InstructionType::IntAlu, 2),
        Instruction::simple(InstructionType::IntMul, 3),
    ]));

    for _ in 0..4 {
        perf.queue_basic_block(BlockRef::Shared(interned.clone()));
    }
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 4 * 5);
    // The interned block survives all four drains.
    assert_eq!(interned.len(), 2);
}

#[test]
fn facts_then_instructions_round_trip_to_empty_queues() {
    let perf = perf(Box::new(MemoryLatencyModel));
    let latencies = [4u64, 11, 2, 9];
    for &latency in &latencies {
        perf.push_dynamic_info(DynamicInstructionInfo::MemoryRead {
            address: 0x1000,
            latency,
        });
    }
    let reads = latencies
        .iter()
        .map(|_| Instruction::new(InstructionType::Memory, vec![Operand::read_memory()], 1))
        .collect();
    perf.queue_basic_block(BlockRef::Owned(BasicBlock::new(reads)));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    let static_costs = latencies.len() as u64;
    let latency_sum: u64 = latencies.iter().sum();
    assert_eq!(perf.cycle_count(), static_costs + latency_sum);
    assert_eq!(perf.queued_dynamic_info(), 0);
    assert_eq!(perf.queued_basic_blocks(), 1);
}

#[test]
fn queue_instruction_wraps_in_a_dynamic_block() {
    let perf = perf(Box::new(FixedCostModel));
    perf.queue_instruction(Instruction::simple(InstructionType::Generic, 2));
    perf.queue_instruction(Instruction::simple(InstructionType::Generic, 2));
    assert_eq!(perf.queued_basic_blocks(), 2);

    perf.iterate();
    // The second single-instruction block is the sentinel.
    assert_eq!(perf.cycle_count(), 2);
    assert_eq!(perf.queued_basic_blocks(), 1);
}
