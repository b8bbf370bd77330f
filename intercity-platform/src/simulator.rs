// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The per-process simulator context.
//!
//! Everything a process's collaborators share - configuration, transport,
//! tiles, the communicator map, the thread registry and master table - is
//! concentrated in one [ProcessContext] value and threaded through
//! explicitly. There are no ambient singletons; two clusters can coexist in
//! one host process, which is exactly how the tests run multi-process
//! topologies.
//!
//! [Simulator::start] wires a process up (tiles, LCP thread, and on process
//! 0 the MCP thread); [Simulator::shutdown] walks the orderly teardown:
//! application threads drain, the master stops the MCP, notifies every
//! other process and collects their acknowledgements, and each process then
//! quits its own LCP.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use intercity_config::SimulationConfig;
use intercity_engine::sim_error;
use intercity_engine::types::{CommId, CoreId, ProcessId, SimError, SimResult};
use log::{debug, info};

use crate::lcp::{finish_lcp, Lcp};
use crate::mcp::{finish_mcp, Mcp};
use crate::packet::{LcpTag, PayloadWriter};
use crate::thread_manager::{ThreadEntryFn, ThreadManager, ThreadRegistry};
use crate::tile::Tile;
use crate::transport::{Endpoint, Transport};
use crate::user::CoreHandle;

/// The process-wide communicator-rank to core map. Only the LCP writes it.
#[derive(Default)]
pub struct CommMap {
    map: Mutex<HashMap<CommId, CoreId>>,
}

impl CommMap {
    pub fn update(&self, comm_id: CommId, core_id: CoreId) {
        self.map.lock().unwrap().insert(comm_id, core_id);
    }

    #[must_use]
    pub fn lookup(&self, comm_id: CommId) -> Option<CoreId> {
        self.map.lock().unwrap().get(&comm_id).copied()
    }
}

/// Shared state of one simulated process.
pub struct ProcessContext {
    config: SimulationConfig,
    process: ProcessId,
    tiles: Vec<Arc<Tile>>,
    comm_map: CommMap,
    thread_registry: ThreadRegistry,
    thread_manager: ThreadManager,
    simulator_finished: AtomicBool,
    finish_acks: AtomicU32,
    application_threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ProcessContext {
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn process(&self) -> ProcessId {
        self.process
    }

    #[must_use]
    pub fn tiles(&self) -> &[Arc<Tile>] {
        &self.tiles
    }

    /// The local tile for `core`.
    pub fn tile(&self, core: CoreId) -> Result<&Arc<Tile>, SimError> {
        match self.tiles.iter().find(|t| t.id() == core) {
            Some(tile) => Ok(tile),
            None => sim_error!("core {core} is not simulated by process {}", self.process),
        }
    }

    /// The rank-0 application core of this process.
    #[must_use]
    pub fn representative_core(&self) -> CoreId {
        self.config.representative_tile(self.process)
    }

    #[must_use]
    pub fn comm_map(&self) -> &CommMap {
        &self.comm_map
    }

    #[must_use]
    pub fn thread_registry(&self) -> &ThreadRegistry {
        &self.thread_registry
    }

    #[must_use]
    pub fn thread_manager(&self) -> &ThreadManager {
        &self.thread_manager
    }

    /// Flip every local application model on. The MCP tile stays out - its
    /// model is construction-locked on top of being skipped here.
    pub fn enable_local_models(&self) {
        if !self.config.enable_performance_modeling() {
            return;
        }
        for tile in &self.tiles {
            if tile.id() != self.config.mcp_core() {
                tile.enable_models();
            }
        }
    }

    pub fn disable_local_models(&self) {
        for tile in &self.tiles {
            tile.disable_models();
        }
    }

    pub fn reset_local_models(&self) {
        for tile in &self.tiles {
            tile.reset_models();
        }
    }

    pub(crate) fn note_simulator_finished(&self) {
        self.simulator_finished.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn simulator_finished(&self) -> bool {
        self.simulator_finished.load(Ordering::Acquire)
    }

    pub(crate) fn note_finish_ack(&self) {
        self.finish_acks.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn track_application_thread(&self, handle: JoinHandle<()>) {
        self.application_threads.lock().unwrap().push(handle);
    }
}

/// One simulated process: the context plus its control threads.
pub struct Simulator {
    ctx: Arc<ProcessContext>,
    lcp_finished: Arc<AtomicBool>,
    mcp_finished: Arc<AtomicBool>,
    lcp_thread: Option<JoinHandle<()>>,
    mcp_thread: Option<JoinHandle<()>>,
}

impl Simulator {
    /// Bring up this process's partition of the cluster.
    pub fn start(
        config: SimulationConfig,
        process: ProcessId,
        transport: &Arc<dyn Transport>,
    ) -> Result<Self, SimError> {
        let tile_ids = config.tile_list_for_process(process);
        info!(
            "process {process}: starting with tiles {:?}",
            tile_ids.iter().map(|t| t.0).collect::<Vec<_>>()
        );

        let mut tiles = Vec::with_capacity(tile_ids.len());
        for id in tile_ids {
            let node = transport.create_node(Endpoint::Tile(id))?;
            tiles.push(Arc::new(Tile::new(&config, id, node)?));
        }

        let ctx = Arc::new(ProcessContext {
            thread_manager: ThreadManager::new(config.application_cores()),
            config: config.clone(),
            process,
            tiles,
            comm_map: CommMap::default(),
            thread_registry: ThreadRegistry::default(),
            simulator_finished: AtomicBool::new(false),
            finish_acks: AtomicU32::new(0),
            application_threads: Mutex::new(Vec::new()),
        });

        let lcp_finished = Arc::new(AtomicBool::new(false));
        let lcp = Lcp::new(
            ctx.clone(),
            transport.create_node(Endpoint::Lcp(process))?,
            lcp_finished.clone(),
        );
        let lcp_thread = thread::Builder::new()
            .name(format!("lcp-{process}"))
            .spawn(move || lcp.run().expect("LCP loop failed"))
            .map_err(|e| SimError(format!("failed to start LCP thread: {e}")))?;

        let mcp_finished = Arc::new(AtomicBool::new(false));
        let mcp_thread = if process == ProcessId(0) {
            let mcp_tile = ctx.tile(config.mcp_core())?.clone();
            let mut mcp = Mcp::new(config, mcp_tile, mcp_finished.clone());
            Some(
                thread::Builder::new()
                    .name("mcp".to_string())
                    .spawn(move || mcp.run().expect("MCP loop failed"))
                    .map_err(|e| SimError(format!("failed to start MCP thread: {e}")))?,
            )
        } else {
            None
        };

        Ok(Self {
            ctx,
            lcp_finished,
            mcp_finished,
            lcp_thread: Some(lcp_thread),
            mcp_thread,
        })
    }

    #[must_use]
    pub fn context(&self) -> Arc<ProcessContext> {
        self.ctx.clone()
    }

    /// Make a thread entry point spawnable by id. Every process must
    /// register the same entries before spawn traffic starts.
    pub fn register_thread_entry(&self, func_id: u32, entry: ThreadEntryFn) {
        self.ctx.thread_registry.register(func_id, entry);
    }

    /// Register the calling host thread as simulated core `core`.
    pub fn initialize_thread(&self, core: CoreId) -> Result<CoreHandle, SimError> {
        CoreHandle::new(self.ctx.clone(), core)
    }

    /// Run `body` on a new host thread bound to `core`. Used for the
    /// initial application thread; everything else arrives through the
    /// spawn protocol.
    pub fn launch_thread_on<F>(&self, core: CoreId, body: F) -> SimResult
    where
        F: FnOnce(CoreHandle) + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let handle = thread::Builder::new()
            .name(format!("core-{core}"))
            .spawn(move || {
                let handle = CoreHandle::new(ctx, core).expect("core is not local");
                body(handle);
            })
            .map_err(|e| SimError(format!("host thread spawn failed: {e}")))?;
        self.ctx.track_application_thread(handle);
        Ok(())
    }

    /// Join every application thread this process started.
    pub fn join_application_threads(&self) {
        let handles: Vec<_> = self
            .ctx
            .application_threads
            .lock()
            .unwrap()
            .drain(..)
            .collect();
        for handle in handles {
            handle.join().expect("application thread panicked");
        }
    }

    /// Write every local tile's report.
    pub fn write_summaries(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for tile in self.ctx.tiles() {
            writeln!(out, "Tile {}:", tile.id())?;
            tile.output_summary(out)?;
        }
        Ok(())
    }

    /// Orderly teardown of this process's share of the cluster.
    pub fn shutdown(mut self) -> SimResult {
        self.join_application_threads();

        let representative = self.ctx.representative_core();
        let net = self.ctx.tile(representative)?.network();
        let process_count = self.ctx.config.process_count();

        if self.ctx.process == ProcessId(0) {
            // Stop the global arbiter before telling anyone the run is over.
            finish_mcp(net, self.ctx.config.mcp_core(), &self.mcp_finished)?;
            if let Some(mcp) = self.mcp_thread.take() {
                mcp.join().expect("MCP thread panicked");
            }

            for process in 1..process_count {
                net.send_to_process(
                    ProcessId(process),
                    PayloadWriter::lcp(LcpTag::SimulatorFinished).finish(),
                )?;
            }
            while self.ctx.finish_acks.load(Ordering::Acquire) < process_count - 1 {
                thread::yield_now();
            }
            debug!("all processes acknowledged the finish");
        } else {
            while !self.ctx.simulator_finished() {
                thread::yield_now();
            }
        }

        finish_lcp(net, self.ctx.process, &self.lcp_finished)?;
        if let Some(lcp) = self.lcp_thread.take() {
            lcp.join().expect("LCP thread panicked");
        }
        Ok(())
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        // Best effort: never leak a thread blocked in a transport receive.
        if let Some(lcp) = self.lcp_thread.take() {
            let representative = self.ctx.representative_core();
            if let Ok(tile) = self.ctx.tile(representative) {
                let _ = tile
                    .network()
                    .send_to_process(self.ctx.process, PayloadWriter::lcp(LcpTag::Quit).finish());
            }
            let _ = lcp.join();
        }
        if let Some(mcp) = self.mcp_thread.take() {
            let representative = self.ctx.representative_core();
            if let Ok(tile) = self.ctx.tile(representative) {
                let _ = tile.network().send(
                    self.ctx.config.mcp_core(),
                    crate::packet::PacketType::McpSystem,
                    &PayloadWriter::mcp(crate::packet::McpMessage::Quit).finish(),
                );
            }
            let _ = mcp.join();
        }
    }
}
