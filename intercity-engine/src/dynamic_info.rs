// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Dynamic instruction facts.
//!
//! The functional side pushes one [DynamicInstructionInfo] for every memory
//! operand and every branch it executes; the performance side consumes them
//! in the same order when it costs the matching instruction. The two streams
//! must stay in lock-step - a variant mismatch or an unbounded backlog means
//! the producer and consumer have desynchronised, which invalidates the
//! simulation and is treated as fatal.

use std::collections::VecDeque;

use crate::instruction::OperandDirection;

/// One fact produced by functional execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynamicInstructionInfo {
    MemoryRead { address: u64, latency: u64 },
    MemoryWrite { address: u64, latency: u64 },
    Branch { address: u64, taken: bool, target: u64, mispredict_penalty: u64 },
}

impl DynamicInstructionInfo {
    /// The latency of a memory fact matching `direction`.
    ///
    /// Panics if the fact is not the matching memory variant: the queues
    /// have desynchronised and the results can no longer be trusted.
    #[must_use]
    pub fn memory_latency(&self, direction: OperandDirection) -> u64 {
        match (direction, self) {
            (OperandDirection::Read, DynamicInstructionInfo::MemoryRead { latency, .. }) => *latency,
            (OperandDirection::Write, DynamicInstructionInfo::MemoryWrite { latency, .. }) => {
                *latency
            }
            _ => panic!("expected memory {direction} info, got: {self:?}"),
        }
    }

    /// The `(address, taken, target, mispredict_penalty)` tuple of a branch
    /// fact.
    ///
    /// Panics if the fact is not a branch.
    #[must_use]
    pub fn branch_outcome(&self) -> (u64, bool, u64, u64) {
        match self {
            DynamicInstructionInfo::Branch {
                address,
                taken,
                target,
                mispredict_penalty,
            } => (*address, *taken, *target, *mispredict_penalty),
            _ => panic!("expected branch info, got: {self:?}"),
        }
    }
}

/// FIFO of pending facts with a desynchronisation tripwire.
///
/// The cap is soft in the sense that it does not bound memory use by
/// design; crossing it means the consumer has stopped draining and the
/// simulation state is no longer meaningful.
#[derive(Debug)]
pub struct DynamicInfoQueue {
    queue: VecDeque<DynamicInstructionInfo>,
    soft_cap: usize,
}

impl DynamicInfoQueue {
    #[must_use]
    pub fn new(soft_cap: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            soft_cap,
        }
    }

    pub fn push(&mut self, info: DynamicInstructionInfo) {
        assert!(
            self.queue.len() < self.soft_cap,
            "dynamic info queue is growing too big ({} facts queued, cap {})",
            self.queue.len(),
            self.soft_cap
        );
        self.queue.push_back(info);
    }

    /// The front fact without consuming it, if any has arrived.
    #[must_use]
    pub fn front(&self) -> Option<&DynamicInstructionInfo> {
        self.queue.front()
    }

    /// Consume the front fact.
    ///
    /// Panics when empty: a cost routine must only pop facts it has already
    /// established are available.
    pub fn pop(&mut self) -> DynamicInstructionInfo {
        self.queue
            .pop_front()
            .expect("expected some dynamic info to be available")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
