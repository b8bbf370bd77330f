// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The in-order-issue, out-of-order-memory-commit (iocoom) model.
//!
//! The cycle count tracks issue time, one instruction per cycle plus
//! whatever the hazards cost. An instruction issues once every register it
//! reads is ready (register scoreboard) and every load it performs has a
//! free load slot (structural hazard). Load data does not stall the load
//! itself: the destination register becomes ready at the load's completion,
//! so only consumers of that register wait out the memory latency. Stores
//! drain through a bounded store buffer after execute and never hold up
//! issue.
//!
//! Within one instruction, load facts are consumed before store facts, so
//! producers must order an instruction's facts reads-first.

use std::io;

use intercity_engine::instruction::{Instruction, OperandDirection, OperandKind};
use intercity_engine::perf_model::{CoreModel, CostContext, CostOutcome};

/// Architectural registers tracked by the scoreboard.
const NUM_REGISTERS: usize = 512;

/// A bounded unit: each slot records the cycle it frees up.
struct ExecutionUnit {
    slot_free_cycle: Vec<u64>,
}

impl ExecutionUnit {
    fn new(slots: usize) -> Self {
        assert!(slots > 0, "an execution unit needs at least one slot");
        Self {
            slot_free_cycle: vec![0; slots],
        }
    }

    /// Occupy the earliest-free slot from `now` for `latency` cycles.
    /// Returns `(issue, completion)`: `issue - now` is the structural wait.
    fn execute(&mut self, now: u64, latency: u64) -> (u64, u64) {
        let slot = self
            .slot_free_cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, &free)| free)
            .map(|(i, _)| i)
            .unwrap();
        let issue = now.max(self.slot_free_cycle[slot]);
        let completion = issue + latency;
        self.slot_free_cycle[slot] = completion;
        (issue, completion)
    }

    fn reset(&mut self) {
        self.slot_free_cycle.fill(0);
    }
}

pub struct IocoomCoreModel {
    register_scoreboard: Vec<u64>,
    load_unit: ExecutionUnit,
    store_unit: ExecutionUnit,
    load_structural_stalls: u64,
    store_structural_stalls: u64,
}

impl IocoomCoreModel {
    #[must_use]
    pub fn new(load_slots: usize, store_slots: usize) -> Self {
        Self {
            register_scoreboard: vec![0; NUM_REGISTERS],
            load_unit: ExecutionUnit::new(load_slots),
            store_unit: ExecutionUnit::new(store_slots),
            load_structural_stalls: 0,
            store_structural_stalls: 0,
        }
    }
}

impl CoreModel for IocoomCoreModel {
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome {
        if ctx.available_infos() < crate::facts_required(instruction) {
            return CostOutcome::Stalled;
        }

        // `now` is the issue cycle of this instruction. One instruction
        // issues per cycle; waits push the issue point out.
        let now = ctx.cycle_count();

        // Reads must be ready before issue; loads additionally need a free
        // load slot (structural hazard) but their data only gates the
        // instructions that consume the destination register.
        let mut operands_ready = now;
        let mut memory_completion = now;
        for operand in instruction.operands() {
            match (operand.kind, operand.direction) {
                (OperandKind::Register(reg), OperandDirection::Read) => {
                    operands_ready = operands_ready.max(self.register_scoreboard[reg.0 as usize]);
                }
                (OperandKind::Memory, OperandDirection::Read) => {
                    let latency = ctx.pop_info().memory_latency(OperandDirection::Read);
                    let (issue, completion) = self.load_unit.execute(now, latency);
                    if issue > now {
                        self.load_structural_stalls += issue - now;
                    }
                    operands_ready = operands_ready.max(issue);
                    memory_completion = memory_completion.max(completion);
                }
                _ => {}
            }
        }

        let branch_penalty = if instruction.is_branch() {
            crate::charge_branch(ctx)
        } else {
            0
        };

        let issue_time = operands_ready;
        let completion = (issue_time + instruction.cost()).max(memory_completion);

        // Write-backs: registers become ready at completion; stores drain
        // through the buffer without holding up issue.
        for operand in instruction.operands() {
            match (operand.kind, operand.direction) {
                (OperandKind::Register(reg), OperandDirection::Write) => {
                    self.register_scoreboard[reg.0 as usize] = completion;
                }
                (OperandKind::Memory, OperandDirection::Write) => {
                    let latency = ctx.pop_info().memory_latency(OperandDirection::Write);
                    let (issue, _) = self.store_unit.execute(completion, latency);
                    if issue > completion {
                        self.store_structural_stalls += issue - completion;
                    }
                }
                _ => {}
            }
        }

        ctx.count_instruction();
        ctx.add_cycles(issue_time - now + 1 + branch_penalty);
        CostOutcome::Completed
    }

    fn output_summary(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(
            out,
            "   Structural Stalls (load/store): {}/{}",
            self.load_structural_stalls, self.store_structural_stalls
        )
    }

    fn reset(&mut self) {
        self.register_scoreboard.fill(0);
        self.load_unit.reset();
        self.store_unit.reset();
        self.load_structural_stalls = 0;
        self.store_structural_stalls = 0;
    }
}
