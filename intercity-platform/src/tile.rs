// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A simulated tile: a network endpoint, a MAIN core model and an optional
//! PEP co-processor model.

use std::io;

use intercity_config::SimulationConfig;
use intercity_engine::perf_model::CorePerfModel;
use intercity_engine::types::{CoreId, CoreKind, SimError};
use intercity_models::factory::create_core_model;

use crate::network::Network;
use crate::transport::TransportNode;

pub struct Tile {
    id: CoreId,
    network: Network,
    main_model: CorePerfModel,
    pep_model: Option<CorePerfModel>,
}

impl Tile {
    pub fn new(
        config: &SimulationConfig,
        id: CoreId,
        node: Box<dyn TransportNode>,
    ) -> Result<Self, SimError> {
        let network = Network::new(id, node);
        let mut main_model = create_core_model(config, id, CoreKind::Main)?
            .ok_or_else(|| SimError(format!("tile {id} has no main core model")))?;
        let mut pep_model = create_core_model(config, id, CoreKind::Pep)?;

        if id == config.mcp_core() {
            main_model.lock_out_enable();
            if let Some(pep) = pep_model.as_mut() {
                pep.lock_out_enable();
            }
        }

        Ok(Self {
            id,
            network,
            main_model,
            pep_model,
        })
    }

    #[must_use]
    pub fn id(&self) -> CoreId {
        self.id
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    #[must_use]
    pub fn main_model(&self) -> &CorePerfModel {
        &self.main_model
    }

    #[must_use]
    pub fn pep_model(&self) -> Option<&CorePerfModel> {
        self.pep_model.as_ref()
    }

    pub fn enable_models(&self) {
        self.main_model.enable();
        if let Some(pep) = &self.pep_model {
            pep.enable();
        }
    }

    pub fn disable_models(&self) {
        self.main_model.disable();
        if let Some(pep) = &self.pep_model {
            pep.disable();
        }
    }

    pub fn reset_models(&self) {
        self.main_model.reset();
        if let Some(pep) = &self.pep_model {
            pep.reset();
        }
    }

    /// The per-tile report: main core first, then the co-processor.
    pub fn output_summary(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, " Core (main):")?;
        self.main_model.output_summary(out)?;
        if let Some(pep) = &self.pep_model {
            writeln!(out, " Core (pep):")?;
            pep.output_summary(out)?;
        }
        Ok(())
    }
}
