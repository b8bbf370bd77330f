// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Build a tile's performance models from the configuration.

use intercity_config::SimulationConfig;
use intercity_engine::branch_predictor::BranchPredictor;
use intercity_engine::perf_model::{CoreModel, CorePerfModel};
use intercity_engine::types::{CoreId, CoreKind, SimError};
use intercity_engine::sim_error;
use log::debug;

use crate::iocoom::IocoomCoreModel;
use crate::magic::MagicCoreModel;
use crate::magic_pep::MagicPepCoreModel;
use crate::one_bit::OneBitBranchPredictor;
use crate::simple::SimpleCoreModel;

/// Build the performance model for one core of `tile`.
///
/// Returns `None` where no model belongs (a tile whose configuration names
/// no PEP core). An unrecognised model name is an error; the caller treats
/// it as fatal.
pub fn create_core_model(
    config: &SimulationConfig,
    tile: CoreId,
    kind: CoreKind,
) -> Result<Option<CorePerfModel>, SimError> {
    let frequency = config.core_frequency(tile);
    let soft_cap = config.dynamic_info_soft_cap();
    let name = match kind {
        CoreKind::Main => config.core_model(tile),
        CoreKind::Pep => config.pep_core_model(tile),
    };

    let model: Box<dyn CoreModel> = match (kind, name) {
        (CoreKind::Main, "simple") => Box::new(SimpleCoreModel),
        (CoreKind::Main, "iocoom") => Box::new(IocoomCoreModel::new(
            config.iocoom_load_slots(),
            config.iocoom_store_slots(),
        )),
        (CoreKind::Main, "magic") => Box::new(MagicCoreModel),
        (CoreKind::Main, other) => return sim_error!("invalid core model type: {other}"),
        (CoreKind::Pep, "none") => return Ok(None),
        (CoreKind::Pep, "magic") => Box::new(MagicPepCoreModel),
        (CoreKind::Pep, other) => return sim_error!("invalid pep core model type: {other}"),
    };

    debug!("tile {tile}: {kind} core model '{name}' at {frequency} GHz");
    Ok(Some(CorePerfModel::new(
        tile,
        kind,
        frequency,
        soft_cap,
        model,
        create_branch_predictor(config)?,
    )))
}

/// Build the configured branch predictor, if any.
pub fn create_branch_predictor(
    config: &SimulationConfig,
) -> Result<Option<Box<dyn BranchPredictor>>, SimError> {
    match config.branch_predictor_kind() {
        "none" => Ok(None),
        "one_bit" => Ok(Some(Box::new(OneBitBranchPredictor::new(
            config.branch_predictor_size(),
        )))),
        other => sim_error!("invalid branch predictor type: {other}"),
    }
}
