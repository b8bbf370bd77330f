// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared helpers for platform tests.

use std::sync::{Arc, Mutex};

use intercity_config::SimulationConfig;
use intercity_engine::types::{ProcessId, SimError, SimResult};
use intercity_platform::simulator::Simulator;
use intercity_platform::transport::{Endpoint, LocalTransport, Transport, TransportNode};

pub fn config(total_tiles: u32, process_count: u32) -> SimulationConfig {
    SimulationConfig::from_toml_str(&format!(
        "total_tiles = {total_tiles}\nprocess_count = {process_count}\n"
    ))
    .unwrap()
}

/// Start one simulator per process over a shared transport.
pub fn start_cluster(
    config: &SimulationConfig,
    transport: &Arc<dyn Transport>,
) -> Vec<Simulator> {
    (0..config.process_count())
        .map(|p| Simulator::start(config.clone(), ProcessId(p), transport).unwrap())
        .collect()
}

pub fn local_cluster(total_tiles: u32, process_count: u32) -> (SimulationConfig, Vec<Simulator>) {
    let config = config(total_tiles, process_count);
    let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new());
    let sims = start_cluster(&config, &transport);
    (config, sims)
}

/// Tear the cluster down master-first: the master's shutdown needs every
/// other LCP still serving.
pub fn shutdown_cluster(sims: Vec<Simulator>) {
    let mut sims = sims.into_iter();
    let master = sims.next().expect("cluster has a master");
    master.shutdown().unwrap();
    for sim in sims {
        sim.shutdown().unwrap();
    }
}

/// One observed transport send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendEvent {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// A transport decorator that records every send in global order.
pub struct RecordingTransport {
    inner: LocalTransport,
    events: Arc<Mutex<Vec<SendEvent>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            inner: LocalTransport::new(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SendEvent>>> {
        self.events.clone()
    }
}

impl Transport for RecordingTransport {
    fn create_node(&self, endpoint: Endpoint) -> Result<Box<dyn TransportNode>, SimError> {
        let inner = self.inner.create_node(endpoint)?;
        Ok(Box::new(RecordingNode {
            inner,
            events: self.events.clone(),
        }))
    }
}

struct RecordingNode {
    inner: Box<dyn TransportNode>,
    events: Arc<Mutex<Vec<SendEvent>>>,
}

impl TransportNode for RecordingNode {
    fn endpoint(&self) -> Endpoint {
        self.inner.endpoint()
    }

    fn send(&self, dst: Endpoint, data: Vec<u8>) -> SimResult {
        self.events.lock().unwrap().push(SendEvent {
            from: self.inner.endpoint(),
            to: dst,
        });
        self.inner.send(dst, data)
    }

    fn recv(&self) -> Vec<u8> {
        self.inner.recv()
    }
}
