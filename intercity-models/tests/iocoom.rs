// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Hazard behaviour of the iocoom model.

mod common;

use common::{block, enabled_perf, read_fact, sentinel, write_fact};
use intercity_engine::instruction::{Instruction, InstructionType, Operand};
use intercity_models::iocoom::IocoomCoreModel;

fn iocoom(load_slots: usize, store_slots: usize) -> Box<IocoomCoreModel> {
    Box::new(IocoomCoreModel::new(load_slots, store_slots))
}

#[test]
fn independent_instructions_issue_once_per_cycle() {
    let perf = enabled_perf(iocoom(4, 4), None);
    perf.queue_basic_block(block(vec![
        Instruction::simple(InstructionType::IntAlu, 1),
        Instruction::simple(InstructionType::IntAlu, 1),
        Instruction::simple(InstructionType::IntAlu, 1),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 3);
}

#[test]
fn consumer_of_a_load_waits_out_the_latency() {
    let perf = enabled_perf(iocoom(4, 4), None);
    perf.push_dynamic_info(read_fact(10));
    perf.queue_basic_block(block(vec![
        // Load into r1: issues at cycle 0, data lands at cycle 10.
        Instruction::new(
            InstructionType::Memory,
            vec![Operand::read_memory(), Operand::write_register(1)],
            0,
        ),
        // Dependent add: cannot issue before the data is back.
        Instruction::new(
            InstructionType::IntAlu,
            vec![Operand::read_register(1), Operand::write_register(2)],
            1,
        ),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    // Load issues in cycle 0 (advance 1); the add issues at cycle 10.
    assert_eq!(perf.cycle_count(), 11);
}

#[test]
fn load_latency_alone_does_not_stall_independent_work() {
    let perf = enabled_perf(iocoom(4, 4), None);
    perf.push_dynamic_info(read_fact(50));
    perf.queue_basic_block(block(vec![
        Instruction::new(
            InstructionType::Memory,
            vec![Operand::read_memory(), Operand::write_register(1)],
            0,
        ),
        // Independent of r1: the 50-cycle latency is invisible to it.
        Instruction::new(
            InstructionType::IntAlu,
            vec![Operand::read_register(3), Operand::write_register(4)],
            1,
        ),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 2);
}

#[test]
fn single_load_slot_is_a_structural_hazard() {
    let perf = enabled_perf(iocoom(1, 4), None);
    perf.push_dynamic_info(read_fact(10));
    perf.push_dynamic_info(read_fact(10));
    perf.queue_basic_block(block(vec![
        Instruction::new(
            InstructionType::Memory,
            vec![Operand::read_memory(), Operand::write_register(1)],
            0,
        ),
        // Second load needs the only slot, which is busy until cycle 10.
        Instruction::new(
            InstructionType::Memory,
            vec![Operand::read_memory(), Operand::write_register(2)],
            0,
        ),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    assert_eq!(perf.cycle_count(), 11);
}

#[test]
fn stores_do_not_hold_up_issue() {
    let perf = enabled_perf(iocoom(4, 4), None);
    perf.push_dynamic_info(write_fact(100));
    perf.queue_basic_block(block(vec![
        Instruction::new(InstructionType::Memory, vec![Operand::write_memory()], 1),
        Instruction::simple(InstructionType::IntAlu, 1),
        Instruction::simple(InstructionType::IntAlu, 1),
    ]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    // The 100-cycle store drains in the background.
    assert_eq!(perf.cycle_count(), 3);
}

#[test]
fn reset_clears_scoreboard_state() {
    let perf = enabled_perf(iocoom(4, 4), None);
    perf.push_dynamic_info(read_fact(40));
    perf.queue_basic_block(block(vec![Instruction::new(
        InstructionType::Memory,
        vec![Operand::read_memory(), Operand::write_register(1)],
        0,
    )]));
    perf.queue_basic_block(sentinel());
    perf.iterate();

    perf.reset();
    assert_eq!(perf.cycle_count(), 0);

    // r1 is no longer pending after the reset.
    perf.queue_basic_block(block(vec![Instruction::new(
        InstructionType::IntAlu,
        vec![Operand::read_register(1)],
        1,
    )]));
    perf.queue_basic_block(sentinel());
    perf.iterate();
    assert_eq!(perf.cycle_count(), 1);
}
