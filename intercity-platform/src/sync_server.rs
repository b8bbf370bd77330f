// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Mutexes, condition variables and barriers, served from the MCP.
//!
//! Every operation is a request/deferred-reply pair: the calling thread
//! sends its request and then blocks in a network receive for an
//! [McpResponse](crate::packet::PacketType::McpResponse). The server never
//! blocks - when a primitive cannot be granted yet it records the waiter
//! and replies later, from whichever request makes the grant possible.
//!
//! Barrier 0 is reserved at construction: it is the models barrier that
//! wraps the collective enable/disable/reset operations, sized to the
//! application-core count. Reserving it at startup gives every process the
//! same id without a bootstrap round-trip.

use std::collections::VecDeque;

use intercity_engine::types::{CoreId, SimResult};
use log::trace;

use crate::network::Network;
use crate::packet::{PacketType, PayloadReader};

/// The reserved barrier wrapping the collective model controls.
pub const MODELS_BARRIER: u32 = 0;

struct ServerMutex {
    owner: Option<CoreId>,
    waiters: VecDeque<CoreId>,
}

struct ServerCond {
    /// Waiter and the mutex it must re-acquire before waking.
    waiters: VecDeque<(CoreId, u32)>,
}

struct ServerBarrier {
    size: u32,
    arrived: Vec<CoreId>,
}

pub struct SyncServer {
    mutexes: Vec<ServerMutex>,
    conds: Vec<ServerCond>,
    barriers: Vec<ServerBarrier>,
}

impl SyncServer {
    #[must_use]
    pub fn new(application_cores: u32) -> Self {
        Self {
            mutexes: Vec::new(),
            conds: Vec::new(),
            barriers: vec![ServerBarrier {
                size: application_cores,
                arrived: Vec::new(),
            }],
        }
    }

    fn reply(net: &Network, core: CoreId, payload: &[u8]) -> SimResult {
        net.send(core, PacketType::McpResponse, payload)
    }

    pub fn mutex_init(&mut self, net: &Network, sender: CoreId) -> SimResult {
        let id = self.mutexes.len() as u32;
        self.mutexes.push(ServerMutex {
            owner: None,
            waiters: VecDeque::new(),
        });
        trace!("mutex {id} created for core {sender}");
        Self::reply(net, sender, &id.to_le_bytes())
    }

    pub fn mutex_lock(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let id = reader.u32() as usize;
        let mutex = &mut self.mutexes[id];
        if mutex.owner.is_none() {
            mutex.owner = Some(sender);
            Self::reply(net, sender, &[])
        } else {
            // Deferred: the grant goes out when the holder unlocks.
            mutex.waiters.push_back(sender);
            Ok(())
        }
    }

    pub fn mutex_unlock(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let id = reader.u32() as usize;
        self.release_mutex(net, id, sender)?;
        Self::reply(net, sender, &[])
    }

    /// Hand the mutex to the next waiter, or leave it free.
    fn release_mutex(&mut self, net: &Network, id: usize, sender: CoreId) -> SimResult {
        let mutex = &mut self.mutexes[id];
        assert_eq!(
            mutex.owner,
            Some(sender),
            "core {sender} released mutex {id} it does not hold"
        );
        match mutex.waiters.pop_front() {
            Some(next) => {
                mutex.owner = Some(next);
                Self::reply(net, next, &[])
            }
            None => {
                mutex.owner = None;
                Ok(())
            }
        }
    }

    /// Acquire `id` on behalf of a woken cond waiter; the reply to the
    /// waiter is its pending cond-wait response.
    fn acquire_mutex_for(&mut self, net: &Network, id: usize, core: CoreId) -> SimResult {
        let mutex = &mut self.mutexes[id];
        if mutex.owner.is_none() {
            mutex.owner = Some(core);
            Self::reply(net, core, &[])
        } else {
            mutex.waiters.push_back(core);
            Ok(())
        }
    }

    pub fn cond_init(&mut self, net: &Network, sender: CoreId) -> SimResult {
        let id = self.conds.len() as u32;
        self.conds.push(ServerCond {
            waiters: VecDeque::new(),
        });
        Self::reply(net, sender, &id.to_le_bytes())
    }

    pub fn cond_wait(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let cond_id = reader.u32() as usize;
        let mutex_id = reader.u32();
        self.release_mutex(net, mutex_id as usize, sender)?;
        self.conds[cond_id].waiters.push_back((sender, mutex_id));
        // No reply: the sender sleeps until a signal re-acquires its mutex.
        Ok(())
    }

    pub fn cond_signal(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let cond_id = reader.u32() as usize;
        if let Some((waiter, mutex_id)) = self.conds[cond_id].waiters.pop_front() {
            self.acquire_mutex_for(net, mutex_id as usize, waiter)?;
        }
        Self::reply(net, sender, &[])
    }

    pub fn cond_broadcast(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let cond_id = reader.u32() as usize;
        let waiters: Vec<_> = self.conds[cond_id].waiters.drain(..).collect();
        for (waiter, mutex_id) in waiters {
            self.acquire_mutex_for(net, mutex_id as usize, waiter)?;
        }
        Self::reply(net, sender, &[])
    }

    pub fn barrier_init(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let size = reader.u32();
        assert!(size > 0, "core {sender} created an empty barrier");
        let id = self.barriers.len() as u32;
        self.barriers.push(ServerBarrier {
            size,
            arrived: Vec::new(),
        });
        Self::reply(net, sender, &id.to_le_bytes())
    }

    pub fn barrier_wait(
        &mut self,
        net: &Network,
        sender: CoreId,
        reader: &mut PayloadReader,
    ) -> SimResult {
        let id = reader.u32() as usize;
        let barrier = &mut self.barriers[id];
        assert!(
            !barrier.arrived.contains(&sender),
            "core {sender} entered barrier {id} twice in one round"
        );
        barrier.arrived.push(sender);
        trace!(
            "barrier {id}: {}/{} arrived",
            barrier.arrived.len(),
            barrier.size
        );
        if barrier.arrived.len() as u32 == barrier.size {
            // Release everyone; the barrier resets for the next round.
            for core in barrier.arrived.drain(..) {
                Self::reply(net, core, &[])?;
            }
        }
        Ok(())
    }
}
