// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The per-tile network endpoint.
//!
//! [Network::recv] blocks on the tile's transport node until a packet of
//! one of the accepted types (optionally from a named sender) arrives.
//! Anything else that turns up in the meantime is stashed in arrival order
//! and replayed by later receives, so a thread waiting on an MCP response
//! cannot lose the user message that overtakes it.
//!
//! Only the owning thread receives on a tile's network; sends are safe from
//! anywhere.

use std::collections::VecDeque;
use std::sync::Mutex;

use intercity_engine::types::{CoreId, ProcessId, SimResult};

use crate::packet::{NetPacket, PacketType};
use crate::transport::{Endpoint, TransportNode};

pub struct Network {
    core_id: CoreId,
    node: Box<dyn TransportNode>,
    stashed: Mutex<VecDeque<NetPacket>>,
}

impl Network {
    #[must_use]
    pub fn new(core_id: CoreId, node: Box<dyn TransportNode>) -> Self {
        Self {
            core_id,
            node,
            stashed: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn core_id(&self) -> CoreId {
        self.core_id
    }

    /// Send `payload` to `receiver` as this core.
    pub fn send(&self, receiver: CoreId, packet_type: PacketType, payload: &[u8]) -> SimResult {
        let packet = NetPacket::new(self.core_id, receiver, packet_type, payload.to_vec());
        self.node.send(Endpoint::Tile(receiver), packet.encode())
    }

    /// Send a raw control packet to the LCP of `process`.
    pub fn send_to_process(&self, process: ProcessId, data: Vec<u8>) -> SimResult {
        self.node.global_send(process, data)
    }

    /// Block until a packet whose type is in `match_types` arrives.
    pub fn recv(&self, match_types: &[PacketType]) -> NetPacket {
        self.recv_matching(match_types, None)
    }

    /// Block until a packet whose type is in `match_types` - and, when
    /// `from` is given, whose sender matches - arrives.
    pub fn recv_matching(&self, match_types: &[PacketType], from: Option<CoreId>) -> NetPacket {
        let matches = |packet: &NetPacket| {
            match_types.contains(&packet.packet_type)
                && from.map_or(true, |sender| packet.sender == sender)
        };

        {
            let mut stashed = self.stashed.lock().unwrap();
            if let Some(pos) = stashed.iter().position(|p| matches(p)) {
                return stashed.remove(pos).unwrap();
            }
        }

        loop {
            let packet = NetPacket::decode(&self.node.recv());
            if matches(&packet) {
                return packet;
            }
            self.stashed.lock().unwrap().push_back(packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LocalTransport, Transport};

    fn network(transport: &LocalTransport, core: u32) -> Network {
        Network::new(
            CoreId(core),
            transport.create_node(Endpoint::Tile(CoreId(core))).unwrap(),
        )
    }

    #[test]
    fn typed_receive_stashes_and_replays_other_traffic() {
        let transport = LocalTransport::new();
        let a = network(&transport, 0);
        let b = network(&transport, 1);

        a.send(CoreId(1), PacketType::UserOne, &[1]).unwrap();
        a.send(CoreId(1), PacketType::McpResponse, &[2]).unwrap();
        a.send(CoreId(1), PacketType::UserOne, &[3]).unwrap();

        // The response is matched first even though a user packet arrived
        // before it.
        let response = b.recv(&[PacketType::McpResponse]);
        assert_eq!(response.payload, vec![2]);

        // The stashed user packets replay in arrival order.
        assert_eq!(b.recv(&[PacketType::UserOne]).payload, vec![1]);
        assert_eq!(b.recv(&[PacketType::UserOne]).payload, vec![3]);
    }

    #[test]
    fn sender_filter_holds_back_other_senders() {
        let transport = LocalTransport::new();
        let a = network(&transport, 0);
        let b = network(&transport, 1);
        let c = network(&transport, 2);

        a.send(CoreId(2), PacketType::UserOne, b"from a").unwrap();
        b.send(CoreId(2), PacketType::UserOne, b"from b").unwrap();

        let from_b = c.recv_matching(&[PacketType::UserOne], Some(CoreId(1)));
        assert_eq!(from_b.payload, b"from b");
        let from_a = c.recv_matching(&[PacketType::UserOne], Some(CoreId(0)));
        assert_eq!(from_a.payload, b"from a");
    }
}
