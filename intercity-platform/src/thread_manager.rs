// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Cross-process thread lifecycle.
//!
//! All bookkeeping is master-side: process 0's LCP owns the table of which
//! application core is running a thread and who is waiting to join it. A
//! spawn travels requester -> master LCP (allocation) -> owning process's
//! LCP (host thread creation) -> master LCP (confirmation) -> requester.
//! Exits and joins flow through the same master table, so a join issued
//! after the target exited completes immediately and one issued before
//! parks until the exit message lands.
//!
//! Spawned entries come from a per-process [ThreadRegistry]: a spawn
//! request names a function id rather than carrying code, and every process
//! registers the same entries at start-up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use intercity_engine::sim_error;
use intercity_engine::types::{CoreId, ProcessId, SimError, SimResult};
use log::{debug, trace};

use crate::packet::{LcpTag, NetPacket, PacketType, PayloadReader, PayloadWriter};
use crate::simulator::ProcessContext;
use crate::transport::{Endpoint, TransportNode};
use crate::user::CoreHandle;

/// Placeholder until the master allocates a destination core.
pub const INVALID_CORE: CoreId = CoreId(u32::MAX);

/// The spawn request as it travels between control processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadSpawnRequest {
    pub func_id: u32,
    pub arg: u64,
    pub requester: CoreId,
    pub destination: CoreId,
    /// The requester's cycle count; the spawned thread starts from it.
    pub cycle_count: u64,
}

impl ThreadSpawnRequest {
    #[must_use]
    pub fn encode(&self, tag: LcpTag) -> Vec<u8> {
        let mut writer = PayloadWriter::lcp(tag);
        writer
            .u32(self.func_id)
            .u64(self.arg)
            .u32(self.requester.0)
            .u32(self.destination.0)
            .u64(self.cycle_count);
        writer.finish()
    }

    #[must_use]
    pub fn decode(reader: &mut PayloadReader) -> Self {
        Self {
            func_id: reader.u32(),
            arg: reader.u64(),
            requester: CoreId(reader.u32()),
            destination: CoreId(reader.u32()),
            cycle_count: reader.u64(),
        }
    }
}

/// A registered thread entry point.
pub type ThreadEntryFn = Arc<dyn Fn(CoreHandle, u64) + Send + Sync>;

/// Function-id to entry-point registry, populated identically in every
/// process before any spawn traffic.
#[derive(Default)]
pub struct ThreadRegistry {
    entries: Mutex<HashMap<u32, ThreadEntryFn>>,
}

impl ThreadRegistry {
    pub fn register(&self, func_id: u32, entry: ThreadEntryFn) {
        self.entries.lock().unwrap().insert(func_id, entry);
    }

    fn get(&self, func_id: u32) -> Result<ThreadEntryFn, SimError> {
        match self.entries.lock().unwrap().get(&func_id) {
            Some(entry) => Ok(entry.clone()),
            None => sim_error!("spawn names unregistered thread entry {func_id}"),
        }
    }
}

struct ThreadEntry {
    running: bool,
    joiner: Option<CoreId>,
}

/// Master-side thread table plus the handlers both LCP roles dispatch to.
pub struct ThreadManager {
    entries: Mutex<Vec<ThreadEntry>>,
}

impl ThreadManager {
    /// Core 0 hosts the initial application thread and starts out running.
    #[must_use]
    pub fn new(application_cores: u32) -> Self {
        let entries = (0..application_cores)
            .map(|core| ThreadEntry {
                running: core == 0,
                joiner: None,
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn reply_to_requester(
        node: &dyn TransportNode,
        requester: CoreId,
        responder: CoreId,
        payload: Vec<u8>,
    ) -> SimResult {
        let packet = NetPacket::new(responder, requester, PacketType::LcpReply, payload);
        node.send(Endpoint::Tile(requester), packet.encode())
    }

    /// Master: allocate an idle core and forward the spawn to its owner.
    pub fn master_spawn_thread(
        &self,
        ctx: &Arc<ProcessContext>,
        node: &dyn TransportNode,
        mut request: ThreadSpawnRequest,
    ) -> SimResult {
        let allocated = {
            let mut entries = self.entries.lock().unwrap();
            entries.iter_mut().enumerate().find(|(_, e)| !e.running)
                .map(|(core, entry)| {
                    entry.running = true;
                    entry.joiner = None;
                    CoreId(core as u32)
                })
        };

        match allocated {
            Some(core) => {
                debug!("spawn from core {}: allocated core {core}", request.requester);
                request.destination = core;
                let owner = ctx.config().process_for_tile(core);
                node.global_send(owner, request.encode(LcpTag::ThreadSpawnRequestFromMaster))
            }
            None => {
                debug!("spawn from core {}: no idle core", request.requester);
                Self::reply_to_requester(
                    node,
                    request.requester,
                    INVALID_CORE,
                    INVALID_CORE.0.to_le_bytes().to_vec(),
                )
            }
        }
    }

    /// Slave: create the host thread running the registered entry on the
    /// allocated core, then confirm to the master.
    pub fn slave_spawn_thread(
        &self,
        ctx: &Arc<ProcessContext>,
        node: &dyn TransportNode,
        request: ThreadSpawnRequest,
    ) -> SimResult {
        let entry = ctx.thread_registry().get(request.func_id)?;
        let tile = ctx.tile(request.destination)?;
        tile.main_model().set_cycle_count(request.cycle_count);

        let thread_ctx = ctx.clone();
        let handle = thread::Builder::new()
            .name(format!("core-{}", request.destination))
            .spawn(move || {
                run_spawned_thread(&thread_ctx, request, entry);
            })
            .map_err(|e| SimError(format!("host thread spawn failed: {e}")))?;
        ctx.track_application_thread(handle);

        node.global_send(
            ProcessId(0),
            request.encode(LcpTag::ThreadSpawnReplyFromSlave),
        )
    }

    /// Master: the slave confirmed; unblock the requester with the
    /// allocated core id.
    pub fn master_spawn_reply(
        &self,
        node: &dyn TransportNode,
        request: ThreadSpawnRequest,
    ) -> SimResult {
        Self::reply_to_requester(
            node,
            request.requester,
            request.destination,
            request.destination.0.to_le_bytes().to_vec(),
        )
    }

    /// Master: a thread finished; free its core and release any joiner.
    pub fn master_on_thread_exit(
        &self,
        node: &dyn TransportNode,
        core: CoreId,
        cycle_count: u64,
    ) -> SimResult {
        trace!("thread on core {core} exited at cycle {cycle_count}");
        let joiner = {
            let mut entries = self.entries.lock().unwrap();
            let entry = &mut entries[core.0 as usize];
            assert!(entry.running, "exit from core {core} which is not running");
            entry.running = false;
            entry.joiner.take()
        };
        match joiner {
            Some(joiner) => Self::reply_to_requester(node, joiner, core, Vec::new()),
            None => Ok(()),
        }
    }

    /// Master: park the joiner, or answer straight away if the target has
    /// already exited.
    pub fn master_join_thread(
        &self,
        node: &dyn TransportNode,
        joiner: CoreId,
        target: CoreId,
    ) -> SimResult {
        let immediate = {
            let mut entries = self.entries.lock().unwrap();
            let entry = &mut entries[target.0 as usize];
            if entry.running {
                assert!(
                    entry.joiner.is_none(),
                    "core {target} already has a joiner waiting"
                );
                entry.joiner = Some(joiner);
                false
            } else {
                true
            }
        };
        if immediate {
            Self::reply_to_requester(node, joiner, target, Vec::new())
        } else {
            Ok(())
        }
    }
}

/// Body of a spawned application thread: run the entry, then walk the exit
/// protocol so the master can account the thread and wake joiners.
fn run_spawned_thread(ctx: &Arc<ProcessContext>, request: ThreadSpawnRequest, entry: ThreadEntryFn) {
    let handle = CoreHandle::new(ctx.clone(), request.destination)
        .expect("spawned thread bound to a tile this process does not own");
    entry(handle, request.arg);

    let tile = ctx
        .tile(request.destination)
        .expect("tile disappeared under a running thread");
    tile.main_model().recompute_average_frequency();
    let cycle_count = tile.main_model().cycle_count();

    let mut writer = PayloadWriter::lcp(LcpTag::ThreadExit);
    writer.u32(request.destination.0).u64(cycle_count);
    tile.network()
        .send_to_process(ProcessId(0), writer.finish())
        .expect("thread exit notification failed");
}
