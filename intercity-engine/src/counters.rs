// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Cycle, instruction and frequency/time accounting for one core.

use std::io;

/// Per-core counters.
///
/// The cycle count only ever moves forward. Frequency changes split the run
/// into epochs; `total_time` accumulates `cycles_in_epoch / epoch_frequency`
/// and `average_frequency` is kept as total cycles over total time, so it
/// stays meaningful across reconfigurations where `cycle_count / frequency`
/// is only correct at steady state.
#[derive(Debug)]
pub struct CoreCounters {
    cycle_count: u64,
    checkpointed_cycle_count: u64,
    frequency: f64,
    average_frequency: f64,
    total_time: f64,
    instruction_count: u64,
}

impl CoreCounters {
    #[must_use]
    pub fn new(frequency: f64) -> Self {
        Self {
            cycle_count: 0,
            checkpointed_cycle_count: 0,
            frequency,
            average_frequency: 0.0,
            total_time: 0.0,
            instruction_count: 0,
        }
    }

    pub fn advance(&mut self, cycles: u64) {
        self.cycle_count += cycles;
    }

    pub fn count_instruction(&mut self) {
        self.instruction_count += 1;
    }

    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    #[must_use]
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[must_use]
    pub fn average_frequency(&self) -> f64 {
        self.average_frequency
    }

    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Called on thread start to pick up the spawner's cycle count.
    pub fn set_cycle_count(&mut self, cycle_count: u64) {
        self.checkpointed_cycle_count = cycle_count;
        self.cycle_count = cycle_count;
    }

    /// Fold the epoch since the last checkpoint into the running average,
    /// then switch to the new frequency.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.recompute_average_frequency();
        self.frequency = frequency;
    }

    /// Close the current epoch: credit its cycles at the current frequency
    /// and move the checkpoint up to now.
    pub fn recompute_average_frequency(&mut self) {
        let cycles_elapsed = (self.cycle_count - self.checkpointed_cycle_count) as f64;
        let total_cycles_executed = self.average_frequency * self.total_time + cycles_elapsed;
        let total_time_taken = self.total_time + cycles_elapsed / self.frequency;

        self.average_frequency = total_cycles_executed / total_time_taken;
        self.total_time = total_time_taken;
        self.checkpointed_cycle_count = self.cycle_count;
    }

    /// Completion time in the current frequency's cycles, meaningful at
    /// steady state only.
    #[must_use]
    pub fn completion_time(&self) -> u64 {
        (self.cycle_count as f64 / self.frequency) as u64
    }

    /// Zero everything except the configured frequency.
    pub fn reset(&mut self) {
        self.cycle_count = 0;
        self.checkpointed_cycle_count = 0;
        self.average_frequency = 0.0;
        self.total_time = 0.0;
        self.instruction_count = 0;
    }

    pub fn write_frequency_summary(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "   Completion Time: {}", self.completion_time())?;
        writeln!(out, "   Average Frequency: {}", self.average_frequency)
    }
}
