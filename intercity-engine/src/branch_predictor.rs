// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The branch predictor capability.
//!
//! Cost models call [predict](BranchPredictor::predict) then
//! [update](BranchPredictor::update) for every branch they cost and charge
//! the mispredict penalty carried by the branch fact when the two disagree.
//! Implementations keep their own accuracy counters and report them from
//! [output_summary](BranchPredictor::output_summary).

use std::io;

pub trait BranchPredictor: Send {
    /// Predict whether the branch at `address` towards `target` is taken.
    fn predict(&mut self, address: u64, target: u64) -> bool;

    /// Record the actual outcome against the prediction made for it.
    fn update(&mut self, predicted: bool, actual: bool, address: u64, target: u64);

    /// Write the predictor's own summary lines.
    fn output_summary(&self, out: &mut dyn io::Write) -> io::Result<()>;
}
