// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The Local Control Process.
//!
//! One per host process, on its own thread, blocking in the transport's
//! receive between packets. Dispatch is serial: process-local state (the
//! communicator map, the master thread table in process 0) only ever
//! changes under this loop.
//!
//! Comm-map updates are acknowledged back to the MCP once applied; the
//! MCP's broadcast fan-out waits for that ack before moving to the next
//! process, which is what makes a completed broadcast globally coherent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use intercity_engine::types::{CommId, CoreId, ProcessId, SimResult};
use log::{debug, trace};

use crate::packet::{LcpTag, NetPacket, PacketType, PayloadReader, PayloadWriter};
use crate::simulator::ProcessContext;
use crate::thread_manager::ThreadSpawnRequest;
use crate::transport::{Endpoint, TransportNode};

pub struct Lcp {
    ctx: Arc<ProcessContext>,
    node: Box<dyn TransportNode>,
    finished: Arc<AtomicBool>,
}

impl Lcp {
    #[must_use]
    pub fn new(
        ctx: Arc<ProcessContext>,
        node: Box<dyn TransportNode>,
        finished: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ctx,
            node,
            finished,
        }
    }

    pub fn run(&self) -> SimResult {
        debug!("LCP started.");
        while !self.finished.load(Ordering::Acquire) {
            self.process_packet()?;
        }
        debug!("LCP finished.");
        Ok(())
    }

    fn process_packet(&self) -> SimResult {
        let data = self.node.recv();
        let mut reader = PayloadReader::new(&data);
        let tag = LcpTag::from_u32(reader.u32());
        trace!("process {}: LCP message {tag:?}", self.ctx.process());

        let manager = self.ctx.thread_manager();
        match tag {
            LcpTag::Quit => {
                debug!("Received quit message.");
                self.finished.store(true, Ordering::Release);
                Ok(())
            }
            LcpTag::CommIdUpdate => self.update_comm_id(&mut reader),
            LcpTag::SimulatorFinished => {
                self.ctx.note_simulator_finished();
                self.node.global_send(
                    ProcessId(0),
                    PayloadWriter::lcp(LcpTag::SimulatorFinishedAck).finish(),
                )
            }
            LcpTag::SimulatorFinishedAck => {
                self.ctx.note_finish_ack();
                Ok(())
            }
            LcpTag::ThreadSpawnRequestFromRequester => manager.master_spawn_thread(
                &self.ctx,
                self.node.as_ref(),
                ThreadSpawnRequest::decode(&mut reader),
            ),
            LcpTag::ThreadSpawnRequestFromMaster => manager.slave_spawn_thread(
                &self.ctx,
                self.node.as_ref(),
                ThreadSpawnRequest::decode(&mut reader),
            ),
            LcpTag::ThreadSpawnReplyFromSlave => manager
                .master_spawn_reply(self.node.as_ref(), ThreadSpawnRequest::decode(&mut reader)),
            LcpTag::ThreadExit => {
                let core = CoreId(reader.u32());
                let cycle_count = reader.u64();
                manager.master_on_thread_exit(self.node.as_ref(), core, cycle_count)
            }
            LcpTag::ThreadJoinRequest => {
                let joiner = CoreId(reader.u32());
                let target = CoreId(reader.u32());
                manager.master_join_thread(self.node.as_ref(), joiner, target)
            }
        }
    }

    /// Apply a communicator binding and acknowledge it to the MCP.
    fn update_comm_id(&self, reader: &mut PayloadReader) -> SimResult {
        let comm_id = CommId(reader.i32());
        let core_id = CoreId(reader.u32());
        debug!("Initializing comm_id: {comm_id} to core_id: {core_id}");
        self.ctx.comm_map().update(comm_id, core_id);

        let mcp_core = self.ctx.config().mcp_core();
        let ack = NetPacket::new(
            self.ctx.representative_core(),
            mcp_core,
            PacketType::McpResponse,
            Vec::new(),
        );
        self.node.send(Endpoint::Tile(mcp_core), ack.encode())
    }
}

/// Ask a process's LCP to quit, then wait for its loop to notice.
pub fn finish_lcp(
    node_owner: &crate::network::Network,
    process: ProcessId,
    finished: &AtomicBool,
) -> SimResult {
    debug!("Send LCP quit message");
    node_owner.send_to_process(process, PayloadWriter::lcp(LcpTag::Quit).finish())?;
    while !finished.load(Ordering::Acquire) {
        std::thread::yield_now();
    }
    debug!("LCP finished.");
    Ok(())
}
