// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Collective model controls and rank-addressed messaging across a
//! two-process cluster.

mod common;

use std::sync::Arc;

use common::{local_cluster, shutdown_cluster};
use intercity_engine::instruction::{Instruction, InstructionType};
use intercity_engine::types::{CommId, CoreId};
use intercity_platform::user::CommError;

const APP_CORES: u32 = 3;

#[test]
fn enable_issue_disable_over_two_processes() {
    // Application tiles 0, 1 (process 0) and 2 (process 1); MCP tile 3.
    let (config, sims) = local_cluster(4, 2);

    for core in 0..APP_CORES {
        let process = config.process_for_tile(CoreId(core));
        sims[process.0 as usize]
            .launch_thread_on(CoreId(core), move |handle| {
                handle.init_models().unwrap();
                handle.comm_init(CommId(core as i32)).unwrap();

                handle.enable_models().unwrap();
                assert!(handle.perf_model().is_enabled());

                // Issue some work: N+1 blocks so one remains as sentinel.
                for _ in 0..core + 2 {
                    handle.perf_model().queue_instruction(Instruction::simple(
                        InstructionType::Generic,
                        3,
                    ));
                }
                handle.perf_model().iterate();

                // Ring messaging: send to the next rank, receive from the
                // previous one.
                let next = CommId(((core + 1) % APP_CORES) as i32);
                let prev = CommId(((core + APP_CORES - 1) % APP_CORES) as i32);
                let own = CommId(core as i32);
                handle
                    .message_send(own, next, &core.to_le_bytes())
                    .unwrap();
                let mut buffer = [0u8; 4];
                handle.message_receive(prev, own, &mut buffer).unwrap();
                assert_eq!(
                    u32::from_le_bytes(buffer),
                    (core + APP_CORES - 1) % APP_CORES
                );

                handle.disable_models().unwrap();
                assert!(!handle.perf_model().is_enabled());
            })
            .unwrap();
    }

    for sim in &sims {
        sim.join_application_threads();
    }

    // Accounting stuck: cycles survived the disable, queues were cleared.
    for core in 0..APP_CORES {
        let process = config.process_for_tile(CoreId(core));
        let ctx = sims[process.0 as usize].context();
        let tile = ctx.tile(CoreId(core)).unwrap();
        assert_eq!(tile.main_model().cycle_count(), 3 * (core as u64 + 1));
        assert_eq!(tile.main_model().queued_basic_blocks(), 0);
        assert_eq!(tile.main_model().queued_dynamic_info(), 0);
    }

    // The MCP tile never took part.
    let mcp_tile = sims[0].context().tile(config.mcp_core()).unwrap().clone();
    assert!(!mcp_tile.main_model().is_enabled());
    assert_eq!(mcp_tile.main_model().cycle_count(), 0);

    shutdown_cluster(sims);
}

#[test]
fn collective_reset_zeroes_every_model() {
    let (_config, sims) = local_cluster(3, 1);

    for core in 0..2u32 {
        sims[0]
            .launch_thread_on(CoreId(core), move |handle| {
                handle.enable_models().unwrap();
                for _ in 0..3 {
                    handle
                        .perf_model()
                        .queue_instruction(Instruction::simple(InstructionType::Generic, 5));
                }
                handle.perf_model().iterate();
                assert!(handle.perf_model().cycle_count() > 0);

                handle.reset_models().unwrap();
                assert_eq!(handle.perf_model().cycle_count(), 0);

                handle.disable_models().unwrap();
            })
            .unwrap();
    }

    sims[0].join_application_threads();
    shutdown_cluster(sims);
}

#[test]
fn cache_counter_collectives_complete() {
    let (_config, sims) = local_cluster(2, 1);
    let handle = sims[0].initialize_thread(CoreId(0)).unwrap();
    handle.reset_cache_counters().unwrap();
    handle.disable_cache_counters().unwrap();
    shutdown_cluster(sims);
}

#[test]
fn messaging_error_codes() {
    let (_config, sims) = local_cluster(3, 1);
    let handle = sims[0].initialize_thread(CoreId(0)).unwrap();

    // Nothing bound yet.
    assert_eq!(
        handle.message_send(CommId(0), CommId(9), b"x"),
        Err(CommError::UnknownRank(CommId(9)))
    );

    handle.comm_init(CommId(0)).unwrap();
    // Fence behind the broadcast so the local map holds the binding.
    handle.reset_cache_counters().unwrap();

    // A receive endpoint bound to another core is refused.
    let other = sims[0].initialize_thread(CoreId(1)).unwrap();
    other.comm_init(CommId(1)).unwrap();
    other.reset_cache_counters().unwrap();
    assert_eq!(
        handle.message_receive(CommId(1), CommId(1), &mut [0u8; 4]),
        Err(CommError::ForeignRank {
            rank: CommId(1),
            core: CoreId(1),
        })
    );

    // Sender and receiver must agree on the size.
    handle.message_send(CommId(0), CommId(1), &[1, 2, 3]).unwrap();
    let mut too_big = [0u8; 8];
    assert_eq!(
        other.message_receive(CommId(0), CommId(1), &mut too_big),
        Err(CommError::SizeMismatch {
            expected: 8,
            actual: 3,
        })
    );

    // Oversized sends are refused before they reach the wire.
    let limit = sims[0].context().config().max_message_bytes();
    let huge = vec![0u8; limit + 1];
    assert_eq!(
        handle.message_send(CommId(0), CommId(1), &huge),
        Err(CommError::MessageTooLarge {
            size: limit + 1,
            limit,
        })
    );

    shutdown_cluster(sims);
}
