// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Byte-packet transport between processes and between tiles.
//!
//! Every simulated tile has an endpoint, and every process has one more for
//! its Local Control Process. A [TransportNode] is the owner's handle on an
//! endpoint: sends may target any endpoint, receives block until a packet
//! arrives and hand the buffer to the caller. Delivery is reliable,
//! exactly-once and FIFO per sender.
//!
//! [LocalTransport] is the in-memory implementation used when all simulated
//! processes share one host process (tests, single-host runs): one channel
//! per endpoint behind a shared registry. Registry slots are created on
//! first use from either side, so node creation order does not matter.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use intercity_engine::sim_error;
use intercity_engine::types::{CoreId, ProcessId, SimError, SimResult};

/// A transport address: a tile or a process's LCP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tile(CoreId),
    Lcp(ProcessId),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Endpoint::Tile(core) => write!(f, "tile{core}"),
            Endpoint::Lcp(process) => write!(f, "lcp{process}"),
        }
    }
}

/// One endpoint's handle on the transport.
pub trait TransportNode: Send + Sync {
    fn endpoint(&self) -> Endpoint;

    /// Deliver `data` to `dst`, exactly once, FIFO with respect to this
    /// node's earlier sends.
    fn send(&self, dst: Endpoint, data: Vec<u8>) -> SimResult;

    /// Deliver `data` to the LCP of `process`.
    fn global_send(&self, process: ProcessId, data: Vec<u8>) -> SimResult {
        self.send(Endpoint::Lcp(process), data)
    }

    /// Block until a packet arrives. The caller owns the returned buffer.
    fn recv(&self) -> Vec<u8>;
}

/// Creates endpoint nodes. One node per endpoint.
pub trait Transport: Send + Sync {
    fn create_node(&self, endpoint: Endpoint) -> Result<Box<dyn TransportNode>, SimError>;
}

struct Slot {
    sender: Sender<Vec<u8>>,
    /// Taken by `create_node`; present until the endpoint is claimed.
    receiver: Option<Receiver<Vec<u8>>>,
}

#[derive(Default)]
struct Registry {
    slots: Mutex<HashMap<Endpoint, Slot>>,
}

impl Registry {
    /// The send half for `endpoint`, creating the channel on first use so
    /// that senders and receivers may start in any order.
    fn sender(&self, endpoint: Endpoint) -> Sender<Vec<u8>> {
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry(endpoint)
            .or_insert_with(|| {
                let (sender, receiver) = channel();
                Slot {
                    sender,
                    receiver: Some(receiver),
                }
            })
            .sender
            .clone()
    }

    fn claim_receiver(&self, endpoint: Endpoint) -> Result<Receiver<Vec<u8>>, SimError> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(endpoint).or_insert_with(|| {
            let (sender, receiver) = channel();
            Slot {
                sender,
                receiver: Some(receiver),
            }
        });
        match slot.receiver.take() {
            Some(receiver) => Ok(receiver),
            None => sim_error!("endpoint {endpoint} already claimed"),
        }
    }
}

/// Shared-memory transport: all processes live in one host process.
#[derive(Clone, Default)]
pub struct LocalTransport {
    registry: Arc<Registry>,
}

impl LocalTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LocalTransport {
    fn create_node(&self, endpoint: Endpoint) -> Result<Box<dyn TransportNode>, SimError> {
        let receiver = self.registry.claim_receiver(endpoint)?;
        Ok(Box::new(LocalNode {
            endpoint,
            receiver: Mutex::new(receiver),
            registry: self.registry.clone(),
        }))
    }
}

struct LocalNode {
    endpoint: Endpoint,
    receiver: Mutex<Receiver<Vec<u8>>>,
    registry: Arc<Registry>,
}

impl TransportNode for LocalNode {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn send(&self, dst: Endpoint, data: Vec<u8>) -> SimResult {
        match self.registry.sender(dst).send(data) {
            Ok(()) => Ok(()),
            Err(_) => sim_error!("{}: send to {dst} failed, endpoint is gone", self.endpoint),
        }
    }

    fn recv(&self) -> Vec<u8> {
        self.receiver
            .lock()
            .unwrap()
            .recv()
            .unwrap_or_else(|_| panic!("{}: transport closed under a receive", self.endpoint))
    }
}
