// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Wire formats for the control plane and user messaging.
//!
//! Network packets carry a type, the sender and receiver cores, and a
//! payload. Control-plane payloads start with a 32-bit tag word: [LcpTag]
//! for packets addressed to a Local Control Process, [McpMessage] for
//! requests to the Master Control Process. The tag sets are closed; an
//! unknown tag on the wire means the cluster is corrupt and is fatal.
//!
//! All integers are little-endian.

use intercity_engine::types::CoreId;

/// Network packet type classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    /// Rank-addressed user messages.
    UserOne,
    UserTwo,
    /// Requests to the MCP (syscalls, sync primitives, comm-map updates).
    McpRequest,
    /// Replies from the MCP, including deferred sync grants.
    McpResponse,
    /// System traffic to the MCP (quit, cache-counter controls).
    McpSystem,
    /// Replies from a control process to an application core.
    LcpReply,
}

impl PacketType {
    fn to_u32(self) -> u32 {
        match self {
            PacketType::UserOne => 0,
            PacketType::UserTwo => 1,
            PacketType::McpRequest => 2,
            PacketType::McpResponse => 3,
            PacketType::McpSystem => 4,
            PacketType::LcpReply => 5,
        }
    }

    fn from_u32(raw: u32) -> Self {
        match raw {
            0 => PacketType::UserOne,
            1 => PacketType::UserTwo,
            2 => PacketType::McpRequest,
            3 => PacketType::McpResponse,
            4 => PacketType::McpSystem,
            5 => PacketType::LcpReply,
            other => panic!("unknown packet type on the wire: {other}"),
        }
    }
}

/// One network packet. The payload buffer is owned by whoever holds the
/// packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetPacket {
    pub sender: CoreId,
    pub receiver: CoreId,
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

impl NetPacket {
    #[must_use]
    pub fn new(sender: CoreId, receiver: CoreId, packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            sender,
            receiver,
            packet_type,
            payload,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16 + self.payload.len());
        bytes.extend_from_slice(&self.packet_type.to_u32().to_le_bytes());
        bytes.extend_from_slice(&self.sender.0.to_le_bytes());
        bytes.extend_from_slice(&self.receiver.0.to_le_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode a packet. Malformed framing is fatal: the transport promised
    /// exactly-once delivery of what was sent.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let mut reader = PayloadReader::new(bytes);
        let packet_type = PacketType::from_u32(reader.u32());
        let sender = CoreId(reader.u32());
        let receiver = CoreId(reader.u32());
        let length = reader.u32() as usize;
        let payload = reader.rest().to_vec();
        assert_eq!(
            payload.len(),
            length,
            "packet from {sender} truncated: header says {length} bytes"
        );
        Self {
            sender,
            receiver,
            packet_type,
            payload,
        }
    }
}

/// Tags on packets addressed to a Local Control Process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LcpTag {
    Quit,
    CommIdUpdate,
    SimulatorFinished,
    SimulatorFinishedAck,
    ThreadSpawnRequestFromRequester,
    ThreadSpawnRequestFromMaster,
    ThreadSpawnReplyFromSlave,
    ThreadExit,
    ThreadJoinRequest,
}

impl LcpTag {
    #[must_use]
    pub fn to_u32(self) -> u32 {
        match self {
            LcpTag::Quit => 0,
            LcpTag::CommIdUpdate => 1,
            LcpTag::SimulatorFinished => 2,
            LcpTag::SimulatorFinishedAck => 3,
            LcpTag::ThreadSpawnRequestFromRequester => 4,
            LcpTag::ThreadSpawnRequestFromMaster => 5,
            LcpTag::ThreadSpawnReplyFromSlave => 6,
            LcpTag::ThreadExit => 7,
            LcpTag::ThreadJoinRequest => 8,
        }
    }

    #[must_use]
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            0 => LcpTag::Quit,
            1 => LcpTag::CommIdUpdate,
            2 => LcpTag::SimulatorFinished,
            3 => LcpTag::SimulatorFinishedAck,
            4 => LcpTag::ThreadSpawnRequestFromRequester,
            5 => LcpTag::ThreadSpawnRequestFromMaster,
            6 => LcpTag::ThreadSpawnReplyFromSlave,
            7 => LcpTag::ThreadExit,
            8 => LcpTag::ThreadJoinRequest,
            other => panic!("unexpected LCP message type: {other}"),
        }
    }
}

/// Message types understood by the Master Control Process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McpMessage {
    SysCall,
    Quit,
    MutexInit,
    MutexLock,
    MutexUnlock,
    CondInit,
    CondWait,
    CondSignal,
    CondBroadcast,
    BarrierInit,
    BarrierWait,
    UtilizationUpdate,
    BroadcastCommMapUpdate,
    ResetCacheCounters,
    DisableCacheCounters,
}

impl McpMessage {
    #[must_use]
    pub fn to_u32(self) -> u32 {
        match self {
            McpMessage::SysCall => 0,
            McpMessage::Quit => 1,
            McpMessage::MutexInit => 2,
            McpMessage::MutexLock => 3,
            McpMessage::MutexUnlock => 4,
            McpMessage::CondInit => 5,
            McpMessage::CondWait => 6,
            McpMessage::CondSignal => 7,
            McpMessage::CondBroadcast => 8,
            McpMessage::BarrierInit => 9,
            McpMessage::BarrierWait => 10,
            McpMessage::UtilizationUpdate => 11,
            McpMessage::BroadcastCommMapUpdate => 12,
            McpMessage::ResetCacheCounters => 13,
            McpMessage::DisableCacheCounters => 14,
        }
    }

    #[must_use]
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            0 => McpMessage::SysCall,
            1 => McpMessage::Quit,
            2 => McpMessage::MutexInit,
            3 => McpMessage::MutexLock,
            4 => McpMessage::MutexUnlock,
            5 => McpMessage::CondInit,
            6 => McpMessage::CondWait,
            7 => McpMessage::CondSignal,
            8 => McpMessage::CondBroadcast,
            9 => McpMessage::BarrierInit,
            10 => McpMessage::BarrierWait,
            11 => McpMessage::UtilizationUpdate,
            12 => McpMessage::BroadcastCommMapUpdate,
            13 => McpMessage::ResetCacheCounters,
            14 => McpMessage::DisableCacheCounters,
            other => panic!("unhandled MCP message type: {other}"),
        }
    }
}

/// Append-only payload builder.
#[derive(Default)]
pub struct PayloadWriter {
    bytes: Vec<u8>,
}

impl PayloadWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an LCP packet with its tag word.
    #[must_use]
    pub fn lcp(tag: LcpTag) -> Self {
        let mut writer = Self::new();
        writer.u32(tag.to_u32());
        writer
    }

    /// Start an MCP request with its message type word.
    #[must_use]
    pub fn mcp(message: McpMessage) -> Self {
        let mut writer = Self::new();
        writer.u32(message.to_u32());
        writer
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(value);
        self
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sequential payload reader. Truncated control packets are fatal.
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        assert!(
            self.pos + n <= self.bytes.len(),
            "payload truncated: wanted {n} bytes at offset {}, have {}",
            self.pos,
            self.bytes.len()
        );
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take(4).try_into().unwrap())
    }

    pub fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take(8).try_into().unwrap())
    }

    pub fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take(4).try_into().unwrap())
    }

    pub fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take(8).try_into().unwrap())
    }

    /// Everything not yet consumed.
    #[must_use]
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }
}
