// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Basic blocks.
//!
//! A [BasicBlock] is an ordered run of instructions costed as a unit. Blocks
//! enter the performance model's queue either as `Owned` (built on the fly
//! for a burst of dynamic instructions, destroyed once drained) or `Shared`
//! (interned once by the functional side and referenced from the queue many
//! times). [BlockRef] encodes that split as a tagged owning/borrowed
//! reference; dropping a `Shared` entry only releases the handle.

use std::ops::Deref;
use std::sync::Arc;

use crate::instruction::Instruction;

/// An ordered sequence of instructions.
#[derive(Debug, Default)]
pub struct BasicBlock {
    instructions: Vec<Instruction>,
}

impl BasicBlock {
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl From<Vec<Instruction>> for BasicBlock {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

/// A queue entry: an owned (dynamic) block or a handle to an interned one.
#[derive(Debug)]
pub enum BlockRef {
    Owned(BasicBlock),
    Shared(Arc<BasicBlock>),
}

impl BlockRef {
    /// Wrap a single instruction in a fresh owned block.
    #[must_use]
    pub fn single(instruction: Instruction) -> Self {
        BlockRef::Owned(BasicBlock::new(vec![instruction]))
    }

    /// Whether this entry owns its block (and destroys it when dropped).
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, BlockRef::Owned(_))
    }
}

impl Deref for BlockRef {
    type Target = BasicBlock;

    fn deref(&self) -> &BasicBlock {
        match self {
            BlockRef::Owned(block) => block,
            BlockRef::Shared(block) => block,
        }
    }
}
