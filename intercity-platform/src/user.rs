// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The user-facing API of a simulated core.
//!
//! A [CoreHandle] binds the calling host thread to one simulated core and
//! carries everything an application thread does: issuing work to the
//! performance model, rank-addressed messaging, the sync primitives served
//! by the MCP, and the collective model controls.
//!
//! Blocking is always the same shape: send a request, then block in a
//! typed network receive until the reply - possibly deferred - arrives.

use std::cell::Cell;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use intercity_engine::perf_model::CorePerfModel;
use intercity_engine::sim_error;
use intercity_engine::types::{CommId, CoreId, ProcessId, SimError, SimResult};
use log::debug;

use crate::network::Network;
use crate::packet::{LcpTag, McpMessage, PacketType, PayloadWriter};
use crate::simulator::ProcessContext;
use crate::sync_server::MODELS_BARRIER;
use crate::thread_manager::{ThreadSpawnRequest, INVALID_CORE};
use crate::tile::Tile;

/// Non-success codes of the rank-addressed messaging calls.
#[derive(Debug, PartialEq, Eq)]
pub enum CommError {
    /// The rank has no binding in this process's communicator map.
    UnknownRank(CommId),
    /// The receive endpoint resolves to a different core than the caller.
    ForeignRank { rank: CommId, core: CoreId },
    /// Sender and receiver disagree about the message size.
    SizeMismatch { expected: usize, actual: usize },
    /// The message exceeds the configured per-message bound.
    MessageTooLarge { size: usize, limit: usize },
    TransportFailure(String),
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommError::UnknownRank(rank) => write!(f, "rank {rank} is not bound to any core"),
            CommError::ForeignRank { rank, core } => {
                write!(f, "rank {rank} is bound to core {core}, not to the caller")
            }
            CommError::SizeMismatch { expected, actual } => {
                write!(f, "message size mismatch: expected {expected}, got {actual}")
            }
            CommError::MessageTooLarge { size, limit } => {
                write!(f, "message of {size} bytes exceeds the {limit} byte limit")
            }
            CommError::TransportFailure(reason) => write!(f, "transport failure: {reason}"),
        }
    }
}

impl Error for CommError {}

/// The calling host thread's identity as a simulated core.
pub struct CoreHandle {
    ctx: Arc<ProcessContext>,
    tile: Arc<Tile>,
    rank: Cell<Option<CommId>>,
}

impl CoreHandle {
    /// Bind to `core`, which must be simulated by this process.
    pub fn new(ctx: Arc<ProcessContext>, core: CoreId) -> Result<Self, SimError> {
        let tile = ctx.tile(core)?.clone();
        Ok(Self {
            ctx,
            tile,
            rank: Cell::new(None),
        })
    }

    #[must_use]
    pub fn core_id(&self) -> CoreId {
        self.tile.id()
    }

    #[must_use]
    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    #[must_use]
    pub fn perf_model(&self) -> &CorePerfModel {
        self.tile.main_model()
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        self.tile.network()
    }

    /// Round-trip a request to the MCP; blocks until the (possibly
    /// deferred) response arrives.
    fn mcp_round_trip(
        &self,
        packet_type: PacketType,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, SimError> {
        self.network()
            .send(self.ctx.config().mcp_core(), packet_type, &payload)?;
        let reply = self.network().recv(&[PacketType::McpResponse]);
        Ok(reply.payload)
    }

    fn sync_request(&self, message: McpMessage, args: &[u32]) -> Result<Vec<u8>, SimError> {
        let mut writer = PayloadWriter::mcp(message);
        for &arg in args {
            writer.u32(arg);
        }
        self.mcp_round_trip(PacketType::McpRequest, writer.finish())
    }

    fn id_from_reply(reply: &[u8]) -> u32 {
        u32::from_le_bytes(reply[..4].try_into().expect("short sync reply"))
    }

    // --- syscalls and telemetry ---------------------------------------

    /// Forward an argument buffer to the cluster's syscall handler.
    pub fn syscall(&self, args: &[u8]) -> Result<Vec<u8>, SimError> {
        let mut writer = PayloadWriter::mcp(McpMessage::SysCall);
        writer.bytes(args);
        self.mcp_round_trip(PacketType::McpRequest, writer.finish())
    }

    /// Feed one utilisation sample to the analytical network model. Fire
    /// and forget.
    pub fn report_utilization(&self, utilization: f64) -> SimResult {
        let mut writer = PayloadWriter::mcp(McpMessage::UtilizationUpdate);
        writer.f64(utilization);
        self.network().send(
            self.ctx.config().mcp_core(),
            PacketType::McpRequest,
            &writer.finish(),
        )
    }

    // --- sync primitives ----------------------------------------------

    pub fn mutex_init(&self) -> Result<u32, SimError> {
        Ok(Self::id_from_reply(&self.sync_request(McpMessage::MutexInit, &[])?))
    }

    pub fn mutex_lock(&self, mutex: u32) -> SimResult {
        self.sync_request(McpMessage::MutexLock, &[mutex]).map(|_| ())
    }

    pub fn mutex_unlock(&self, mutex: u32) -> SimResult {
        self.sync_request(McpMessage::MutexUnlock, &[mutex]).map(|_| ())
    }

    pub fn cond_init(&self) -> Result<u32, SimError> {
        Ok(Self::id_from_reply(&self.sync_request(McpMessage::CondInit, &[])?))
    }

    /// Atomically release `mutex` and sleep until signalled; the mutex is
    /// re-acquired before this returns.
    pub fn cond_wait(&self, cond: u32, mutex: u32) -> SimResult {
        self.sync_request(McpMessage::CondWait, &[cond, mutex])
            .map(|_| ())
    }

    pub fn cond_signal(&self, cond: u32) -> SimResult {
        self.sync_request(McpMessage::CondSignal, &[cond]).map(|_| ())
    }

    pub fn cond_broadcast(&self, cond: u32) -> SimResult {
        self.sync_request(McpMessage::CondBroadcast, &[cond])
            .map(|_| ())
    }

    pub fn barrier_init(&self, size: u32) -> Result<u32, SimError> {
        Ok(Self::id_from_reply(
            &self.sync_request(McpMessage::BarrierInit, &[size])?,
        ))
    }

    pub fn barrier_wait(&self, barrier: u32) -> SimResult {
        self.sync_request(McpMessage::BarrierWait, &[barrier])
            .map(|_| ())
    }

    // --- communicator ranks and messaging -----------------------------

    /// Bind the calling core to `rank`, cluster-wide. Routed through the
    /// MCP so the binding reaches every process's map, one process at a
    /// time.
    pub fn comm_init(&self, rank: CommId) -> SimResult {
        debug!("core {}: binding rank {rank}", self.core_id());
        let mut writer = PayloadWriter::mcp(McpMessage::BroadcastCommMapUpdate);
        writer.i32(rank.0).u32(self.core_id().0);
        self.network().send(
            self.ctx.config().mcp_core(),
            PacketType::McpRequest,
            &writer.finish(),
        )?;
        self.rank.set(Some(rank));
        Ok(())
    }

    /// The rank this thread bound with [comm_init](Self::comm_init).
    #[must_use]
    pub fn comm_rank(&self) -> Option<CommId> {
        self.rank.get()
    }

    /// Blocking rank-addressed send.
    pub fn message_send(
        &self,
        _src: CommId,
        dst: CommId,
        data: &[u8],
    ) -> Result<(), CommError> {
        let limit = self.ctx.config().max_message_bytes();
        if data.len() > limit {
            return Err(CommError::MessageTooLarge {
                size: data.len(),
                limit,
            });
        }
        let dst_core = self
            .ctx
            .comm_map()
            .lookup(dst)
            .ok_or(CommError::UnknownRank(dst))?;
        self.network()
            .send(dst_core, PacketType::UserOne, data)
            .map_err(|e| CommError::TransportFailure(e.0))
    }

    /// Blocking rank-addressed receive into `buffer`, which must be sized
    /// exactly to the incoming message.
    pub fn message_receive(
        &self,
        src: CommId,
        dst: CommId,
        buffer: &mut [u8],
    ) -> Result<(), CommError> {
        let dst_core = self
            .ctx
            .comm_map()
            .lookup(dst)
            .ok_or(CommError::UnknownRank(dst))?;
        if dst_core != self.core_id() {
            return Err(CommError::ForeignRank {
                rank: dst,
                core: dst_core,
            });
        }
        let src_core = self
            .ctx
            .comm_map()
            .lookup(src)
            .ok_or(CommError::UnknownRank(src))?;

        let packet = self
            .network()
            .recv_matching(&[PacketType::UserOne], Some(src_core));
        if packet.payload.len() != buffer.len() {
            return Err(CommError::SizeMismatch {
                expected: buffer.len(),
                actual: packet.payload.len(),
            });
        }
        buffer.copy_from_slice(&packet.payload);
        Ok(())
    }

    // --- collective model controls ------------------------------------

    /// The collective barrier backing the model controls is created with
    /// the cluster; nothing is left to arrange here.
    pub fn init_models(&self) -> SimResult {
        debug!("core {}: models barrier ready", self.core_id());
        Ok(())
    }

    /// Collectively enable every application model. All application cores
    /// call this; the rank-0 core of each process flips the switch between
    /// the two barrier waits, so no core is still issuing under the old
    /// mode and none resumes before every peer sees the new one.
    pub fn enable_models(&self) -> SimResult {
        self.barrier_wait(MODELS_BARRIER)?;
        if self.core_id() == self.ctx.representative_core() {
            self.ctx.enable_local_models();
        }
        self.barrier_wait(MODELS_BARRIER)
    }

    /// Collectively disable every application model.
    pub fn disable_models(&self) -> SimResult {
        self.barrier_wait(MODELS_BARRIER)?;
        if self.core_id() == self.ctx.representative_core() {
            self.ctx.disable_local_models();
        }
        self.barrier_wait(MODELS_BARRIER)
    }

    /// Collectively zero every application model.
    pub fn reset_models(&self) -> SimResult {
        self.barrier_wait(MODELS_BARRIER)?;
        if self.core_id() == self.ctx.representative_core() {
            self.ctx.reset_local_models();
        }
        self.barrier_wait(MODELS_BARRIER)
    }

    pub fn reset_cache_counters(&self) -> SimResult {
        self.mcp_round_trip(
            PacketType::McpSystem,
            PayloadWriter::mcp(McpMessage::ResetCacheCounters).finish(),
        )
        .map(|_| ())
    }

    pub fn disable_cache_counters(&self) -> SimResult {
        self.mcp_round_trip(
            PacketType::McpSystem,
            PayloadWriter::mcp(McpMessage::DisableCacheCounters).finish(),
        )
        .map(|_| ())
    }

    // --- thread lifecycle ---------------------------------------------

    /// Spawn a registered entry on an idle application core anywhere in
    /// the cluster. Returns the core the thread landed on.
    pub fn spawn_thread(&self, func_id: u32, arg: u64) -> Result<CoreId, SimError> {
        let request = ThreadSpawnRequest {
            func_id,
            arg,
            requester: self.core_id(),
            destination: INVALID_CORE,
            cycle_count: self.perf_model().cycle_count(),
        };
        self.network().send_to_process(
            ProcessId(0),
            request.encode(LcpTag::ThreadSpawnRequestFromRequester),
        )?;

        let reply = self.network().recv(&[PacketType::LcpReply]);
        let core = u32::from_le_bytes(reply.payload[..4].try_into().expect("short spawn reply"));
        if core == INVALID_CORE.0 {
            sim_error!("no idle core available to spawn thread entry {func_id}")
        } else {
            Ok(CoreId(core))
        }
    }

    /// Block until the thread running on `thread` exits.
    pub fn join_thread(&self, thread: CoreId) -> SimResult {
        let mut writer = PayloadWriter::lcp(LcpTag::ThreadJoinRequest);
        writer.u32(self.core_id().0).u32(thread.0);
        self.network()
            .send_to_process(ProcessId(0), writer.finish())?;
        let _reply = self.network().recv(&[PacketType::LcpReply]);
        Ok(())
    }
}
