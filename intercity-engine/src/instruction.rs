// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Instructions and their operands.
//!
//! An [Instruction] is an immutable description of one unit of work surfaced
//! by functional execution: a type tag from a closed set, an ordered operand
//! list and a static cost in cycles. Anything that can only be known at run
//! time (a memory latency, a branch outcome) is delivered separately as a
//! [DynamicInstructionInfo](crate::dynamic_info::DynamicInstructionInfo).

use std::fmt;

use crate::types::RegisterId;

/// The closed set of instruction type tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InstructionType {
    #[default]
    Generic,
    IntAlu,
    IntMul,
    IntDiv,
    FpAdd,
    FpMul,
    FpDiv,
    Branch,
    Memory,
    Recv,
    Sync,
    Spawn,
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            InstructionType::Generic => "generic",
            InstructionType::IntAlu => "ialu",
            InstructionType::IntMul => "imul",
            InstructionType::IntDiv => "idiv",
            InstructionType::FpAdd => "fadd",
            InstructionType::FpMul => "fmul",
            InstructionType::FpDiv => "fdiv",
            InstructionType::Branch => "branch",
            InstructionType::Memory => "memory",
            InstructionType::Recv => "recv",
            InstructionType::Sync => "sync",
            InstructionType::Spawn => "spawn",
        };
        write!(f, "{name}")
    }
}

/// Whether an operand is read or written by its instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandDirection {
    Read,
    Write,
}

impl fmt::Display for OperandDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperandDirection::Read => write!(f, "read"),
            OperandDirection::Write => write!(f, "write"),
        }
    }
}

/// The location class of an operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandKind {
    Register(RegisterId),
    Memory,
    Immediate(u64),
}

/// One operand of an [Instruction].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    pub kind: OperandKind,
    pub direction: OperandDirection,
}

impl Operand {
    #[must_use]
    pub fn read_register(reg: u16) -> Self {
        Self {
            kind: OperandKind::Register(RegisterId(reg)),
            direction: OperandDirection::Read,
        }
    }

    #[must_use]
    pub fn write_register(reg: u16) -> Self {
        Self {
            kind: OperandKind::Register(RegisterId(reg)),
            direction: OperandDirection::Write,
        }
    }

    #[must_use]
    pub fn read_memory() -> Self {
        Self {
            kind: OperandKind::Memory,
            direction: OperandDirection::Read,
        }
    }

    #[must_use]
    pub fn write_memory() -> Self {
        Self {
            kind: OperandKind::Memory,
            direction: OperandDirection::Write,
        }
    }

    #[must_use]
    pub fn immediate(value: u64) -> Self {
        Self {
            kind: OperandKind::Immediate(value),
            direction: OperandDirection::Read,
        }
    }

    /// Whether this operand names a memory location.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        matches!(self.kind, OperandKind::Memory)
    }
}

/// One simulated instruction. Immutable after construction.
#[derive(Clone, Debug)]
pub struct Instruction {
    itype: InstructionType,
    operands: Vec<Operand>,
    cost: u64,
}

impl Instruction {
    #[must_use]
    pub fn new(itype: InstructionType, operands: Vec<Operand>, cost: u64) -> Self {
        Self {
            itype,
            operands,
            cost,
        }
    }

    /// A plain instruction with no operands.
    #[must_use]
    pub fn simple(itype: InstructionType, cost: u64) -> Self {
        Self::new(itype, Vec::new(), cost)
    }

    #[must_use]
    pub fn itype(&self) -> InstructionType {
        self.itype
    }

    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// The static cost in cycles.
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// How many of the operands name memory locations.
    #[must_use]
    pub fn memory_operand_count(&self) -> usize {
        self.operands.iter().filter(|o| o.is_memory()).count()
    }

    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.itype == InstructionType::Branch
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (cost {}, {} operands)",
            self.itype,
            self.cost,
            self.operands.len()
        )
    }
}
