// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Simulate a many-tile chip split across several processes.
//!
//! All simulated processes run inside this one host process over the
//! shared-memory transport. The initial thread on core 0 spawns a worker
//! on every other application core; each worker issues a seeded random
//! instruction stream (with matching memory and branch facts) through its
//! tile's performance model inside a collectively-enabled window, takes a
//! turn on a shared mutex, and exits. Per-tile summaries are printed at
//! the end.
//!
//! # Examples
//!
//! ```text
//! cargo run --bin sim-cluster -- --tiles 9 --processes 2 --core-model iocoom
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use intercity_config::SimulationConfig;
use intercity_engine::basic_block::{BasicBlock, BlockRef};
use intercity_engine::dynamic_info::DynamicInstructionInfo;
use intercity_engine::instruction::{Instruction, InstructionType, Operand};
use intercity_engine::types::{CoreId, ProcessId, SimError};
use intercity_platform::simulator::Simulator;
use intercity_platform::transport::{LocalTransport, Transport};
use intercity_platform::user::CoreHandle;
use log::info;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// The registered worker entry.
const WORKLOAD_ENTRY: u32 = 0;

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Simulate a many-tile chip split across several processes")]
struct Cli {
    /// Total simulated tiles, including the MCP tile.
    #[arg(long, default_value = "5")]
    tiles: u32,

    /// Number of simulated processes the tiles are partitioned across.
    #[arg(long, default_value = "2")]
    processes: u32,

    /// Performance model for the MAIN cores (simple, iocoom or magic).
    #[arg(long, default_value = "simple")]
    core_model: String,

    /// Basic blocks each worker issues.
    #[arg(long, default_value = "64")]
    blocks_per_core: usize,

    /// Instructions per basic block.
    #[arg(long, default_value = "16")]
    block_len: usize,

    /// Seed for the workload generator.
    #[arg(long, default_value = "1")]
    seed: u32,

    /// Load the full configuration from this TOML file instead of the
    /// `--tiles`/`--processes`/`--core-model` flags.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    log_level: log::LevelFilter,
}

/// One worker's issue loop: build a block, push the facts it will need,
/// queue it and drain.
fn issue_stream(handle: &CoreHandle, seed: u64, blocks: usize, block_len: usize) {
    let model = handle.perf_model();
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);

    for _ in 0..blocks {
        let mut instructions = Vec::with_capacity(block_len);
        for slot in 0..block_len {
            match rng.gen_range(0..10u32) {
                0..=5 => instructions.push(Instruction::simple(
                    InstructionType::IntAlu,
                    rng.gen_range(1..=4),
                )),
                6 | 7 => {
                    let address = rng.gen_range(0x1000u64..0x9000) & !0x7;
                    let latency = rng.gen_range(2..=30);
                    model.push_dynamic_info(DynamicInstructionInfo::MemoryRead {
                        address,
                        latency,
                    });
                    instructions.push(Instruction::new(
                        InstructionType::Memory,
                        vec![
                            Operand::read_memory(),
                            Operand::write_register((slot % 32) as u16),
                        ],
                        0,
                    ));
                }
                8 => {
                    let address = rng.gen_range(0x1000u64..0x9000) & !0x7;
                    let latency = rng.gen_range(2..=30);
                    model.push_dynamic_info(DynamicInstructionInfo::MemoryWrite {
                        address,
                        latency,
                    });
                    instructions.push(Instruction::new(
                        InstructionType::Memory,
                        vec![
                            Operand::read_register((slot % 32) as u16),
                            Operand::write_memory(),
                        ],
                        1,
                    ));
                }
                _ => {
                    let address = rng.gen_range(0x100u64..0x200);
                    model.push_dynamic_info(DynamicInstructionInfo::Branch {
                        address,
                        taken: rng.gen_bool(0.6),
                        target: address + 0x40,
                        mispredict_penalty: 8,
                    });
                    instructions.push(Instruction::simple(InstructionType::Branch, 1));
                }
            }
        }
        model.queue_basic_block(BlockRef::Owned(BasicBlock::new(instructions)));
        model.iterate();
    }
}

/// The body every application core runs. The mutex id and seed are packed
/// into the spawn argument.
fn worker(handle: &CoreHandle, arg: u64, blocks: usize, block_len: usize) {
    let mutex = (arg >> 32) as u32;
    let seed = (arg & 0xffff_ffff) ^ (u64::from(handle.core_id().0) << 16);

    handle.init_models().unwrap();
    handle.enable_models().unwrap();

    issue_stream(handle, seed, blocks, block_len);

    // A turn on the shared mutex, to put the sync server through its paces.
    handle.mutex_lock(mutex).unwrap();
    issue_stream(handle, seed.rotate_left(7), 1, block_len);
    handle.mutex_unlock(mutex).unwrap();

    handle.disable_models().unwrap();
}

fn main() -> Result<(), SimError> {
    let args = Cli::parse();

    simplelog::TermLogger::init(
        args.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("logger init");

    let config = match &args.config {
        Some(path) => SimulationConfig::load(Some(path))?,
        None => SimulationConfig::from_toml_str(&format!(
            "total_tiles = {}\nprocess_count = {}\n\n[core]\nmodel = \"{}\"\n",
            args.tiles, args.processes, args.core_model
        ))?,
    };
    let application_cores = config.application_cores();
    info!(
        "cluster: {} tiles over {} processes, '{}' cores",
        config.total_cores(),
        config.process_count(),
        config.core_model(CoreId(0))
    );

    let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new());
    let sims: Vec<Simulator> = (0..config.process_count())
        .map(|p| Simulator::start(config.clone(), ProcessId(p), &transport))
        .collect::<Result<_, _>>()?;

    let blocks = args.blocks_per_core;
    let block_len = args.block_len;
    for sim in &sims {
        sim.register_thread_entry(
            WORKLOAD_ENTRY,
            Arc::new(move |handle, arg| worker(&handle, arg, blocks, block_len)),
        );
    }

    let seed = args.seed;
    sims[0].launch_thread_on(CoreId(0), move |handle| {
        let mutex = handle.mutex_init().unwrap();
        let arg = (u64::from(mutex) << 32) | u64::from(seed);

        let workers: Vec<CoreId> = (1..application_cores)
            .map(|_| handle.spawn_thread(WORKLOAD_ENTRY, arg).unwrap())
            .collect();

        worker(&handle, arg, blocks, block_len);

        for core in workers {
            handle.join_thread(core).unwrap();
        }
    })?;

    for sim in &sims {
        sim.join_application_threads();
    }

    let mut stdout = std::io::stdout();
    for sim in &sims {
        sim.write_summaries(&mut stdout)
            .map_err(|e| SimError(format!("summary write failed: {e}")))?;
    }

    let mut sims = sims.into_iter();
    let master = sims.next().expect("at least one process");
    master.shutdown()?;
    for sim in sims {
        sim.shutdown()?;
    }
    Ok(())
}
