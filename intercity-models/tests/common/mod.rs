// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared helpers for model tests.

use intercity_engine::basic_block::{BasicBlock, BlockRef};
use intercity_engine::branch_predictor::BranchPredictor;
use intercity_engine::dynamic_info::DynamicInstructionInfo;
use intercity_engine::instruction::{Instruction, InstructionType};
use intercity_engine::perf_model::{CoreModel, CorePerfModel};
use intercity_engine::types::{CoreId, CoreKind};

pub const SOFT_CAP: usize = 5000;

/// An enabled model on tile 0 at 1 GHz.
pub fn enabled_perf(
    model: Box<dyn CoreModel>,
    branch_predictor: Option<Box<dyn BranchPredictor>>,
) -> CorePerfModel {
    let perf = CorePerfModel::new(
        CoreId(0),
        CoreKind::Main,
        1.0,
        SOFT_CAP,
        model,
        branch_predictor,
    );
    perf.enable();
    perf
}

pub fn block(instructions: Vec<Instruction>) -> BlockRef {
    BlockRef::Owned(BasicBlock::new(instructions))
}

/// A one-instruction block to keep at the tail of the queue.
pub fn sentinel() -> BlockRef {
    block(vec![Instruction::simple(InstructionType::Generic, 1)])
}

pub fn read_fact(latency: u64) -> DynamicInstructionInfo {
    DynamicInstructionInfo::MemoryRead {
        address: 0x1000,
        latency,
    }
}

pub fn write_fact(latency: u64) -> DynamicInstructionInfo {
    DynamicInstructionInfo::MemoryWrite {
        address: 0x2000,
        latency,
    }
}

pub fn branch_fact(taken: bool, penalty: u64) -> DynamicInstructionInfo {
    DynamicInstructionInfo::Branch {
        address: 0x400,
        taken,
        target: 0x800,
        mispredict_penalty: penalty,
    }
}
