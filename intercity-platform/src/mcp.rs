// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The Master Control Process.
//!
//! Exactly one MCP exists in a cluster, on the distinguished MCP core. Its
//! loop receives one request at a time and dispatches it, so every global
//! operation - syscalls, sync primitives, comm-map broadcasts - is
//! serialised cluster-wide. Blocking primitives never block the loop: they
//! are deferred replies served by the [SyncServer](crate::sync_server).
//!
//! LCP-directed broadcasts go out one process at a time, each send followed
//! by a receive of that process's acknowledgement. When a broadcast
//! completes, every process has applied it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use intercity_config::SimulationConfig;
use intercity_engine::types::{CoreId, ProcessId, SimResult};
use log::{debug, trace};

use crate::network::Network;
use crate::packet::{LcpTag, McpMessage, PacketType, PayloadReader, PayloadWriter};
use crate::sync_server::SyncServer;
use crate::tile::Tile;

/// Handles a forwarded syscall argument buffer and produces the response
/// bytes. The default handler echoes, which is enough for loopback tests;
/// a host integration installs its own.
pub type SyscallHandler = Box<dyn FnMut(CoreId, &[u8]) -> Vec<u8> + Send>;

/// Accumulates the utilisation samples the analytical network model feeds
/// on.
#[derive(Default)]
pub struct UtilizationModel {
    total: f64,
    samples: u64,
}

impl UtilizationModel {
    pub fn update(&mut self, sender: CoreId, utilization: f64) {
        trace!("utilization {utilization} from core {sender}");
        self.total += utilization;
        self.samples += 1;
    }

    #[must_use]
    pub fn average(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total / self.samples as f64
        }
    }
}

pub struct Mcp {
    config: SimulationConfig,
    tile: Arc<Tile>,
    finished: Arc<AtomicBool>,
    sync_server: SyncServer,
    syscall_handler: SyscallHandler,
    utilization: UtilizationModel,
}

impl Mcp {
    #[must_use]
    pub fn new(config: SimulationConfig, tile: Arc<Tile>, finished: Arc<AtomicBool>) -> Self {
        let sync_server = SyncServer::new(config.application_cores());
        Self {
            config,
            tile,
            finished,
            sync_server,
            syscall_handler: Box::new(|_, args| args.to_vec()),
            utilization: UtilizationModel::default(),
        }
    }

    pub fn set_syscall_handler(&mut self, handler: SyscallHandler) {
        self.syscall_handler = handler;
    }

    fn network(&self) -> &Network {
        self.tile.network()
    }

    /// Serve requests until a quit arrives.
    pub fn run(&mut self) -> SimResult {
        debug!("MCP started.");
        while !self.finished.load(Ordering::Acquire) {
            self.process_packet()?;
        }
        debug!("MCP finished.");
        Ok(())
    }

    fn process_packet(&mut self) -> SimResult {
        let packet = self
            .network()
            .recv(&[PacketType::McpRequest, PacketType::McpSystem]);
        let mut reader = PayloadReader::new(&packet.payload);
        let message = McpMessage::from_u32(reader.u32());
        let sender = packet.sender;
        trace!("MCP message {message:?} from core {sender}");

        match message {
            McpMessage::SysCall => {
                let response = (self.syscall_handler)(sender, reader.rest());
                self.network()
                    .send(sender, PacketType::McpResponse, &response)
            }
            McpMessage::Quit => {
                debug!("Quit message received.");
                self.finished.store(true, Ordering::Release);
                Ok(())
            }
            McpMessage::MutexInit => self.sync_server.mutex_init(self.tile.network(), sender),
            McpMessage::MutexLock => {
                self.sync_server
                    .mutex_lock(self.tile.network(), sender, &mut reader)
            }
            McpMessage::MutexUnlock => {
                self.sync_server
                    .mutex_unlock(self.tile.network(), sender, &mut reader)
            }
            McpMessage::CondInit => self.sync_server.cond_init(self.tile.network(), sender),
            McpMessage::CondWait => {
                self.sync_server
                    .cond_wait(self.tile.network(), sender, &mut reader)
            }
            McpMessage::CondSignal => {
                self.sync_server
                    .cond_signal(self.tile.network(), sender, &mut reader)
            }
            McpMessage::CondBroadcast => {
                self.sync_server
                    .cond_broadcast(self.tile.network(), sender, &mut reader)
            }
            McpMessage::BarrierInit => {
                self.sync_server
                    .barrier_init(self.tile.network(), sender, &mut reader)
            }
            McpMessage::BarrierWait => {
                self.sync_server
                    .barrier_wait(self.tile.network(), sender, &mut reader)
            }
            McpMessage::UtilizationUpdate => {
                let utilization = reader.f64();
                self.utilization.update(sender, utilization);
                Ok(())
            }
            McpMessage::BroadcastCommMapUpdate => self.broadcast_comm_map_update(reader.rest()),
            McpMessage::ResetCacheCounters | McpMessage::DisableCacheCounters => {
                // No cache hierarchy is modelled here; complete the
                // collective so the caller's round-trip finishes.
                self.network().send(sender, PacketType::McpResponse, &[])
            }
        }
    }

    /// Fan a comm-map update out to the LCP of every process, strictly one
    /// at a time: send, await that process's ack, move on.
    fn broadcast_comm_map_update(&mut self, update: &[u8]) -> SimResult {
        for process in 0..self.config.process_count() {
            let mut writer = PayloadWriter::lcp(LcpTag::CommIdUpdate);
            writer.bytes(update);
            debug!("comm map: broadcasting to process {process}");
            self.network()
                .send_to_process(ProcessId(process), writer.finish())?;

            let _ack = self.network().recv(&[PacketType::McpResponse]);
        }
        Ok(())
    }
}

/// Ask the MCP to quit, then wait for its loop to notice.
pub fn finish_mcp(net: &Network, mcp_core: CoreId, finished: &AtomicBool) -> SimResult {
    debug!("Send MCP quit message");
    net.send(
        mcp_core,
        PacketType::McpSystem,
        &PayloadWriter::mcp(McpMessage::Quit).finish(),
    )?;
    while !finished.load(Ordering::Acquire) {
        std::thread::yield_now();
    }
    Ok(())
}
