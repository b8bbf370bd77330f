// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The cross-process thread lifecycle protocol.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use common::{local_cluster, shutdown_cluster};
use intercity_engine::types::CoreId;

#[test]
fn spawn_lands_on_remote_processes_and_join_returns() {
    // Application tiles 0..4 split over two processes (0,1 / 2,3); the MCP
    // tile 4 lives in process 0.
    let (_config, sims) = local_cluster(5, 2);

    let ran_on: Arc<Mutex<Vec<(u32, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    for sim in &sims {
        let ran_on = ran_on.clone();
        sim.register_thread_entry(
            7,
            Arc::new(move |handle, arg| {
                ran_on.lock().unwrap().push((handle.core_id().0, arg));
            }),
        );
    }

    let done = Arc::new(AtomicU32::new(0));
    {
        let done = done.clone();
        sims[0]
            .launch_thread_on(CoreId(0), move |handle| {
                let first = handle.spawn_thread(7, 100).unwrap();
                let second = handle.spawn_thread(7, 200).unwrap();
                let third = handle.spawn_thread(7, 300).unwrap();
                // Core 0 runs this thread, so allocation starts at core 1
                // and crosses into process 1.
                assert_eq!(first, CoreId(1));
                assert_eq!(second, CoreId(2));
                assert_eq!(third, CoreId(3));

                handle.join_thread(first).unwrap();
                handle.join_thread(second).unwrap();
                handle.join_thread(third).unwrap();
                done.store(1, Ordering::Release);
            })
            .unwrap();
    }

    sims[0].join_application_threads();
    assert_eq!(done.load(Ordering::Acquire), 1);

    let mut observed = ran_on.lock().unwrap().clone();
    observed.sort_unstable();
    assert_eq!(observed, vec![(1, 100), (2, 200), (3, 300)]);

    shutdown_cluster(sims);
}

#[test]
fn exited_cores_are_reused_and_late_joins_complete_immediately() {
    let (_config, sims) = local_cluster(3, 1);

    for sim in &sims {
        sim.register_thread_entry(1, Arc::new(|_handle, _arg| {}));
    }

    sims[0]
        .launch_thread_on(CoreId(0), move |handle| {
            let first = handle.spawn_thread(1, 0).unwrap();
            handle.join_thread(first).unwrap();

            // The core is idle again; a second spawn reuses it, and a join
            // after its exit message must not block.
            let second = handle.spawn_thread(1, 0).unwrap();
            assert_eq!(second, first);
            handle.join_thread(second).unwrap();
        })
        .unwrap();

    sims[0].join_application_threads();
    shutdown_cluster(sims);
}

#[test]
fn spawn_with_no_idle_core_reports_an_error() {
    // Two application tiles: core 0 runs the requester, core 1 is taken by
    // the first spawn, so the second must fail.
    let (_config, sims) = local_cluster(3, 1);

    let release = Arc::new(AtomicU32::new(0));
    for sim in &sims {
        let release = release.clone();
        sim.register_thread_entry(
            2,
            Arc::new(move |_handle, _arg| {
                while release.load(Ordering::Acquire) == 0 {
                    std::thread::yield_now();
                }
            }),
        );
    }

    sims[0]
        .launch_thread_on(CoreId(0), move |handle| {
            let held = handle.spawn_thread(2, 0).unwrap();
            assert!(handle.spawn_thread(2, 0).is_err());
            release.store(1, Ordering::Release);
            handle.join_thread(held).unwrap();
        })
        .unwrap();

    sims[0].join_application_threads();
    shutdown_cluster(sims);
}
