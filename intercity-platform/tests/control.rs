// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Control-plane behaviour: broadcast serialisation, syscall round trips
//! and orderly shutdown.

mod common;

use std::sync::Arc;

use common::{config, shutdown_cluster, start_cluster, RecordingTransport, SendEvent};
use intercity_engine::types::{CommId, CoreId, ProcessId};
use intercity_platform::transport::{Endpoint, Transport};

#[test]
fn comm_map_broadcast_is_serialised_per_process() {
    // Three processes: application tiles 0, 1, 2 plus the MCP tile 3.
    let config = config(4, 3);
    let mcp_core = config.mcp_core();
    let recording = RecordingTransport::new();
    let events = recording.events();
    let transport: Arc<dyn Transport> = Arc::new(recording);
    let sims = start_cluster(&config, &transport);

    let handle = sims[0].initialize_thread(CoreId(0)).unwrap();
    handle.comm_init(CommId(5)).unwrap();
    // Any later MCP round trip fences behind the broadcast.
    handle.reset_cache_counters().unwrap();

    // Every process observed the binding.
    for sim in &sims {
        assert_eq!(
            sim.context().comm_map().lookup(CommId(5)),
            Some(CoreId(0)),
            "process {} missed the comm-map update",
            sim.context().process()
        );
    }

    // The fan-out is strictly send-then-ack per process, in process order.
    let observed: Vec<SendEvent> = events
        .lock()
        .unwrap()
        .iter()
        .copied()
        .filter(|e| {
            matches!(
                (e.from, e.to),
                (Endpoint::Tile(t), Endpoint::Lcp(_)) if t == mcp_core
            ) || matches!(
                (e.from, e.to),
                (Endpoint::Lcp(_), Endpoint::Tile(t)) if t == mcp_core
            )
        })
        .collect();
    let expected: Vec<SendEvent> = (0..3)
        .flat_map(|p| {
            [
                SendEvent {
                    from: Endpoint::Tile(mcp_core),
                    to: Endpoint::Lcp(ProcessId(p)),
                },
                SendEvent {
                    from: Endpoint::Lcp(ProcessId(p)),
                    to: Endpoint::Tile(mcp_core),
                },
            ]
        })
        .collect();
    assert_eq!(observed, expected);

    shutdown_cluster(sims);
}

#[test]
fn syscalls_round_trip_through_the_mcp() {
    let (_config, sims) = common::local_cluster(3, 1);

    let handle = sims[0].initialize_thread(CoreId(0)).unwrap();
    let response = handle.syscall(b"open /dev/null").unwrap();
    assert_eq!(response, b"open /dev/null");

    shutdown_cluster(sims);
}

#[test]
fn cluster_shuts_down_orderly() {
    let (_config, sims) = common::local_cluster(6, 3);
    // No application work at all: quit must still reach the MCP and every
    // LCP, and every loop must drain.
    shutdown_cluster(sims);
}

#[test]
fn single_process_cluster_shuts_down() {
    let (_config, sims) = common::local_cluster(2, 1);
    shutdown_cluster(sims);
}

#[test]
fn utilization_updates_are_accepted_without_a_reply() {
    let (_config, sims) = common::local_cluster(3, 1);

    let handle = sims[0].initialize_thread(CoreId(0)).unwrap();
    handle.report_utilization(0.75).unwrap();
    // A later round trip proves the loop is still serving.
    assert!(handle.syscall(b"x").is_ok());

    shutdown_cluster(sims);
}
