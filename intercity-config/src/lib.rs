// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Simulation configuration.
//!
//! A [SimulationConfig] is assembled by merging three sources, later ones
//! winning: built-in defaults, an optional TOML file, and
//! `INTERCITY_`-prefixed environment variables (with `__` separating nested
//! keys, e.g. `INTERCITY_CORE__FREQUENCY=2.0`).
//!
//! The merged tree stays available for hierarchical path lookups via
//! [get](SimulationConfig::get) / [get_or](SimulationConfig::get_or); the
//! cluster-shape queries every subsystem needs are exposed as named
//! methods. The configuration is read-only after load - runtime state such
//! as the communicator map lives with the owning process, not here.

use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use intercity_engine::types::{CoreId, ProcessId, SimError};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides.
const ENV_PREFIX: &str = "INTERCITY_";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct CoreSection {
    /// Clock frequency in GHz applied to every tile without an override.
    frequency: f64,

    /// Per-tile frequency overrides, keyed by tile id.
    frequency_overrides: BTreeMap<String, f64>,

    /// Performance model for MAIN cores: `simple`, `iocoom` or `magic`.
    model: String,

    /// Per-tile model overrides, keyed by tile id.
    model_overrides: BTreeMap<String, String>,

    /// Performance model for PEP co-processor cores: `none` or `magic`.
    pep_model: String,
}

impl Default for CoreSection {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            frequency_overrides: BTreeMap::new(),
            model: String::from("simple"),
            model_overrides: BTreeMap::new(),
            pep_model: String::from("none"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct PerfModelSection {
    /// Desynchronisation tripwire for the per-tile dynamic-info queue.
    dynamic_info_soft_cap: usize,

    /// Outstanding-load slots in the iocoom model.
    iocoom_load_slots: usize,

    /// Store-buffer slots in the iocoom model.
    iocoom_store_slots: usize,
}

impl Default for PerfModelSection {
    fn default() -> Self {
        Self {
            dynamic_info_soft_cap: 5000,
            iocoom_load_slots: 4,
            iocoom_store_slots: 4,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct BranchPredictorSection {
    /// `none` or `one_bit`.
    kind: String,

    /// History table entries.
    size: usize,
}

impl Default for BranchPredictorSection {
    fn default() -> Self {
        Self {
            kind: String::from("one_bit"),
            size: 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct UserSection {
    /// Upper bound on one rank-addressed user message.
    max_message_bytes: usize,
}

impl Default for UserSection {
    fn default() -> Self {
        Self {
            max_message_bytes: 64 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct ConfigData {
    /// Total simulated tiles, including the MCP tile.
    total_tiles: u32,

    /// Host processes the tile set is partitioned across.
    process_count: u32,

    /// Master switch for all performance accounting.
    enable_performance_modeling: bool,

    core: CoreSection,
    perf_model: PerfModelSection,
    branch_predictor: BranchPredictorSection,
    user: UserSection,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            total_tiles: 3,
            process_count: 1,
            enable_performance_modeling: true,
            core: CoreSection::default(),
            perf_model: PerfModelSection::default(),
            branch_predictor: BranchPredictorSection::default(),
            user: UserSection::default(),
        }
    }
}

/// The loaded, validated configuration plus the merged tree it came from.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    figment: Figment,
    data: ConfigData,
}

impl SimulationConfig {
    /// Merge defaults, the optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SimError> {
        let mut figment = Figment::from(Serialized::defaults(ConfigData::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Merge defaults with an inline TOML document. Intended for tests and
    /// programmatic assembly.
    pub fn from_toml_str(toml: &str) -> Result<Self, SimError> {
        let figment = Figment::from(Serialized::defaults(ConfigData::default()))
            .merge(Toml::string(toml));
        Self::from_figment(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self, SimError> {
        let data: ConfigData = figment
            .extract()
            .map_err(|e| SimError(format!("configuration rejected: {e}")))?;
        let config = Self { figment, data };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SimError> {
        if self.data.total_tiles < 2 {
            return intercity_engine::sim_error!(
                "total_tiles must cover at least one application tile and the MCP tile, got {}",
                self.data.total_tiles
            );
        }
        if self.data.process_count == 0 {
            return intercity_engine::sim_error!("process_count must be at least 1");
        }
        if self.data.process_count > self.application_cores() {
            return intercity_engine::sim_error!(
                "process_count {} exceeds the {} application tiles",
                self.data.process_count,
                self.application_cores()
            );
        }
        Ok(())
    }

    /// Typed lookup of any merged key by `a.b.c` path.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, SimError> {
        self.figment
            .extract_inner(path)
            .map_err(|e| SimError(format!("config key '{path}': {e}")))
    }

    /// Typed lookup falling back to `default` when the key is absent or
    /// malformed.
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    #[must_use]
    pub fn total_cores(&self) -> u32 {
        self.data.total_tiles
    }

    /// Tiles available to the application: everything except the MCP tile.
    #[must_use]
    pub fn application_cores(&self) -> u32 {
        self.data.total_tiles - 1
    }

    /// The distinguished MCP core: the highest tile id.
    #[must_use]
    pub fn mcp_core(&self) -> CoreId {
        CoreId(self.data.total_tiles - 1)
    }

    #[must_use]
    pub fn process_count(&self) -> u32 {
        self.data.process_count
    }

    #[must_use]
    pub fn enable_performance_modeling(&self) -> bool {
        self.data.enable_performance_modeling
    }

    #[must_use]
    pub fn core_frequency(&self, tile: CoreId) -> f64 {
        self.data
            .core
            .frequency_overrides
            .get(&tile.0.to_string())
            .copied()
            .unwrap_or(self.data.core.frequency)
    }

    #[must_use]
    pub fn core_model(&self, tile: CoreId) -> &str {
        self.data
            .core
            .model_overrides
            .get(&tile.0.to_string())
            .unwrap_or(&self.data.core.model)
    }

    #[must_use]
    pub fn pep_core_model(&self, _tile: CoreId) -> &str {
        &self.data.core.pep_model
    }

    #[must_use]
    pub fn dynamic_info_soft_cap(&self) -> usize {
        self.data.perf_model.dynamic_info_soft_cap
    }

    #[must_use]
    pub fn iocoom_load_slots(&self) -> usize {
        self.data.perf_model.iocoom_load_slots
    }

    #[must_use]
    pub fn iocoom_store_slots(&self) -> usize {
        self.data.perf_model.iocoom_store_slots
    }

    #[must_use]
    pub fn branch_predictor_kind(&self) -> &str {
        &self.data.branch_predictor.kind
    }

    #[must_use]
    pub fn branch_predictor_size(&self) -> usize {
        self.data.branch_predictor.size
    }

    #[must_use]
    pub fn max_message_bytes(&self) -> usize {
        self.data.user.max_message_bytes
    }

    /// Which process simulates `tile`.
    ///
    /// Application tiles are split into contiguous ranges, earlier processes
    /// taking the remainder; the MCP tile always lives in process 0.
    #[must_use]
    pub fn process_for_tile(&self, tile: CoreId) -> ProcessId {
        assert!(
            tile.0 < self.data.total_tiles,
            "tile {tile} out of range (total {})",
            self.data.total_tiles
        );
        if tile == self.mcp_core() {
            return ProcessId(0);
        }

        let apps = self.application_cores();
        let procs = self.data.process_count;
        let base = apps / procs;
        let remainder = apps % procs;
        // The first `remainder` processes own `base + 1` tiles each.
        let boundary = remainder * (base + 1);
        if tile.0 < boundary {
            ProcessId(tile.0 / (base + 1))
        } else {
            ProcessId(remainder + (tile.0 - boundary) / base)
        }
    }

    /// All tiles simulated by process `process`, in ascending id order.
    #[must_use]
    pub fn tile_list_for_process(&self, process: ProcessId) -> Vec<CoreId> {
        (0..self.data.total_tiles)
            .map(CoreId)
            .filter(|&tile| self.process_for_tile(tile) == process)
            .collect()
    }

    /// The representative (lowest-id) application tile of `process`.
    #[must_use]
    pub fn representative_tile(&self, process: ProcessId) -> CoreId {
        *self
            .tile_list_for_process(process)
            .first()
            .expect("every process owns at least one tile")
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::from_toml_str("").expect("defaults are valid")
    }
}
