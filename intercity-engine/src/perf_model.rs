// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The per-tile performance model.
//!
//! A [CorePerfModel] is a cooperative consumer: functional execution pushes
//! basic blocks and dynamic facts into it and then calls
//! [iterate](CorePerfModel::iterate) inline, on the same host thread. The
//! model never suspends the thread; when a cost routine needs a fact that
//! has not arrived yet it reports [CostOutcome::Stalled] and `iterate`
//! returns immediately. The resumption cursor is kept so that the same
//! instruction is retried once more facts have been pushed.
//!
//! Because we can return from the middle of a basic block, `iterate` only
//! pops a block once every instruction in it has been costed. It also never
//! drains the queue completely: the trailing block is left in place as a
//! sentinel so the producer never observes an empty queue mid-stream. A
//! queue of length one therefore does no work at all.
//!
//! The actual cost of an instruction is delegated to the [CoreModel]
//! supplied at construction; the model sees the shared state it is allowed
//! to touch through a [CostContext].

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::trace;

use crate::basic_block::BlockRef;
use crate::branch_predictor::BranchPredictor;
use crate::counters::CoreCounters;
use crate::dynamic_info::{DynamicInfoQueue, DynamicInstructionInfo};
use crate::instruction::Instruction;
use crate::types::{CoreId, CoreKind};

/// The three-valued result of costing one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum CostOutcome {
    /// The instruction was costed; advance to the next one.
    Completed,
    /// The model elected to discard this instruction's cost; advance anyway.
    Aborted,
    /// A required fact has not arrived. Nothing was consumed; retry this
    /// instruction on a later `iterate`.
    Stalled,
}

/// The state a cost routine is allowed to touch.
pub struct CostContext<'a> {
    counters: &'a mut CoreCounters,
    infos: &'a mut DynamicInfoQueue,
    branch_predictor: &'a mut Option<Box<dyn BranchPredictor>>,
}

impl CostContext<'_> {
    /// How many facts are currently queued.
    ///
    /// A cost routine must establish that every fact its instruction needs
    /// is available *before* consuming any of them, and return
    /// [CostOutcome::Stalled] otherwise. Facts for one instruction arrive
    /// all together or not at all; partial consumption across a stall would
    /// double-count on retry.
    #[must_use]
    pub fn available_infos(&self) -> usize {
        self.infos.len()
    }

    /// The front fact without consuming it.
    #[must_use]
    pub fn peek_info(&self) -> Option<&DynamicInstructionInfo> {
        self.infos.front()
    }

    /// Consume the front fact. Panics when none is queued.
    pub fn pop_info(&mut self) -> DynamicInstructionInfo {
        self.infos.pop()
    }

    pub fn add_cycles(&mut self, cycles: u64) {
        self.counters.advance(cycles);
    }

    pub fn count_instruction(&mut self) {
        self.counters.count_instruction();
    }

    /// The cycle the core has reached so far.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.counters.cycle_count()
    }

    #[must_use]
    pub fn branch_predictor(&mut self) -> Option<&mut dyn BranchPredictor> {
        match self.branch_predictor.as_mut() {
            Some(predictor) => Some(&mut **predictor),
            None => None,
        }
    }
}

/// The capability a concrete performance model provides: cost one
/// instruction and report a summary.
pub trait CoreModel: Send {
    /// Cost `instruction`, advancing the counters and consuming exactly the
    /// facts it references.
    fn handle_instruction(
        &mut self,
        instruction: &Instruction,
        ctx: &mut CostContext<'_>,
    ) -> CostOutcome;

    /// Model-specific summary lines appended after the shared ones.
    fn output_summary(&self, _out: &mut dyn io::Write) -> io::Result<()> {
        Ok(())
    }

    /// Drop any accumulated model state (scoreboards, unit occupancy).
    fn reset(&mut self) {}
}

struct BlockQueue {
    queue: VecDeque<BlockRef>,
    /// Resumption cursor into the head block after a stall.
    cursor: usize,
}

struct ModelSlot {
    model: Box<dyn CoreModel>,
    branch_predictor: Option<Box<dyn BranchPredictor>>,
}

/// The per-tile performance model: queues, counters and the cooperative
/// iterate loop around a [CoreModel].
pub struct CorePerfModel {
    core_id: CoreId,
    kind: CoreKind,
    enabled: AtomicBool,
    /// Set for the MCP tile, whose model must never be enabled.
    enable_lockout: bool,
    counters: Mutex<CoreCounters>,
    blocks: Mutex<BlockQueue>,
    infos: Mutex<DynamicInfoQueue>,
    slot: Mutex<ModelSlot>,
}

impl CorePerfModel {
    #[must_use]
    pub fn new(
        core_id: CoreId,
        kind: CoreKind,
        frequency: f64,
        dynamic_info_soft_cap: usize,
        model: Box<dyn CoreModel>,
        branch_predictor: Option<Box<dyn BranchPredictor>>,
    ) -> Self {
        Self {
            core_id,
            kind,
            enabled: AtomicBool::new(false),
            enable_lockout: false,
            counters: Mutex::new(CoreCounters::new(frequency)),
            blocks: Mutex::new(BlockQueue {
                queue: VecDeque::new(),
                cursor: 0,
            }),
            infos: Mutex::new(DynamicInfoQueue::new(dynamic_info_soft_cap)),
            slot: Mutex::new(ModelSlot {
                model,
                branch_predictor,
            }),
        }
    }

    /// Permanently prevent this model from being enabled. Used for the MCP
    /// tile, which must never account application work.
    pub fn lock_out_enable(&mut self) {
        self.enable_lockout = true;
        self.enabled.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn core_id(&self) -> CoreId {
        self.core_id
    }

    #[must_use]
    pub fn kind(&self) -> CoreKind {
        self.kind
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        if self.enable_lockout {
            return;
        }
        self.enabled.store(true, Ordering::Release);
    }

    /// Disable accounting and drop anything still queued, so that both
    /// queues are empty for as long as the model stays disabled.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        let mut blocks = self.blocks.lock().unwrap();
        blocks.queue.clear();
        blocks.cursor = 0;
        self.infos.lock().unwrap().clear();
    }

    /// Zero the counters and all queued work, keeping the frequency.
    pub fn reset(&self) {
        self.counters.lock().unwrap().reset();
        let mut blocks = self.blocks.lock().unwrap();
        blocks.queue.clear();
        blocks.cursor = 0;
        self.infos.lock().unwrap().clear();
        self.slot.lock().unwrap().model.reset();
    }

    /// Wrap `instruction` in a fresh dynamic block and queue it. Dropped
    /// (and the instruction destroyed) while disabled.
    pub fn queue_instruction(&self, instruction: Instruction) {
        if !self.is_enabled() {
            return;
        }
        self.blocks
            .lock()
            .unwrap()
            .queue
            .push_back(BlockRef::single(instruction));
    }

    /// Queue a prepared block. Dropped while disabled; a `Shared` entry only
    /// gives up its handle, the interned block itself survives.
    pub fn queue_basic_block(&self, block: BlockRef) {
        if !self.is_enabled() {
            return;
        }
        self.blocks.lock().unwrap().queue.push_back(block);
    }

    /// Push one dynamic fact. Dropped while disabled.
    pub fn push_dynamic_info(&self, info: DynamicInstructionInfo) {
        if !self.is_enabled() {
            return;
        }
        self.infos.lock().unwrap().push(info);
    }

    /// Consume the front fact. No-op while disabled.
    pub fn pop_dynamic_info(&self) {
        if !self.is_enabled() {
            return;
        }
        self.infos.lock().unwrap().pop();
    }

    /// The front fact without consuming it.
    #[must_use]
    pub fn peek_dynamic_info(&self) -> Option<DynamicInstructionInfo> {
        self.infos.lock().unwrap().front().copied()
    }

    /// Drain as much queued work as the available facts allow.
    ///
    /// Processes blocks in insertion order while more than one remains (the
    /// trailing block is the producer's sentinel), resuming the head block
    /// at the stall cursor. Returns as soon as a cost routine stalls.
    pub fn iterate(&self) {
        let mut blocks = self.blocks.lock().unwrap();
        let mut infos = self.infos.lock().unwrap();
        let mut counters = self.counters.lock().unwrap();
        let mut slot = self.slot.lock().unwrap();
        let ModelSlot {
            model,
            branch_predictor,
        } = &mut *slot;

        while blocks.queue.len() > 1 {
            let block = blocks.queue.pop_front().unwrap();
            let mut cursor = blocks.cursor;

            while cursor < block.len() {
                let instruction = &block.instructions()[cursor];
                let mut ctx = CostContext {
                    counters: &mut *counters,
                    infos: &mut *infos,
                    branch_predictor: &mut *branch_predictor,
                };
                match model.handle_instruction(instruction, &mut ctx) {
                    CostOutcome::Completed => cursor += 1,
                    CostOutcome::Aborted => {
                        trace!("core {}: aborted {instruction}", self.core_id);
                        cursor += 1;
                    }
                    CostOutcome::Stalled => {
                        // Put the head back and remember where to resume.
                        blocks.cursor = cursor;
                        blocks.queue.push_front(block);
                        return;
                    }
                }
            }

            // Head block fully costed: an owned block is destroyed here, a
            // shared one just releases its handle.
            blocks.cursor = 0;
        }
    }

    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.counters.lock().unwrap().frequency()
    }

    pub fn set_frequency(&self, frequency: f64) {
        self.counters.lock().unwrap().set_frequency(frequency);
    }

    #[must_use]
    pub fn average_frequency(&self) -> f64 {
        self.counters.lock().unwrap().average_frequency()
    }

    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.counters.lock().unwrap().cycle_count()
    }

    /// Called on thread start so a spawned thread continues from its
    /// spawner's cycle count.
    pub fn set_cycle_count(&self, cycle_count: u64) {
        self.counters.lock().unwrap().set_cycle_count(cycle_count);
    }

    #[must_use]
    pub fn instruction_count(&self) -> u64 {
        self.counters.lock().unwrap().instruction_count()
    }

    /// Close the current frequency epoch. Called on thread exit and before
    /// reporting.
    pub fn recompute_average_frequency(&self) {
        self.counters
            .lock()
            .unwrap()
            .recompute_average_frequency();
    }

    #[must_use]
    pub fn queued_basic_blocks(&self) -> usize {
        self.blocks.lock().unwrap().queue.len()
    }

    #[must_use]
    pub fn queued_dynamic_info(&self) -> usize {
        self.infos.lock().unwrap().len()
    }

    /// The resumption cursor within the head block.
    #[must_use]
    pub fn resume_index(&self) -> usize {
        self.blocks.lock().unwrap().cursor
    }

    /// Human-readable per-tile report.
    pub fn output_summary(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.recompute_average_frequency();
        {
            let counters = self.counters.lock().unwrap();
            writeln!(out, "  Instructions: {}", counters.instruction_count())?;
            counters.write_frequency_summary(out)?;
        }
        let slot = self.slot.lock().unwrap();
        if let Some(branch_predictor) = &slot.branch_predictor {
            branch_predictor.output_summary(out)?;
        }
        slot.model.output_summary(out)
    }
}
