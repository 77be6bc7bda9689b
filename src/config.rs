use crate::error::{Error, Result};

const DEFAULT_TELEPORTATION_PROBABILITY: f64 = 0.15;
const DEFAULT_SEED: u64 = 123;
const DEFAULT_OPTIMIZATION_LEVEL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    Transactions,
    #[default]
    Edges,
    Links,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowModelKind {
    Undirected,
    DirectedWithTeleportation,
    DirectedNonDetailedBalance,
    DirectedNonDetailedBalanceWithTeleportation,
}

impl FlowModelKind {
    pub fn teleports(self) -> bool {
        matches!(
            self,
            FlowModelKind::DirectedWithTeleportation
                | FlowModelKind::DirectedNonDetailedBalanceWithTeleportation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStrategy {
    Undirected,
    PageRank,
    StationaryWalk,
    UndirectedDegree,
    OutDegree,
    RawWeights,
}

/// Immutable run parameters. Build with [`ConfigBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    directed: bool,
    undirdir: bool,
    outdirdir: bool,
    rawdir: bool,
    record_teleportation: bool,
    teleportation_probability: f64,
    self_teleportation_probability: Option<f64>,
    seed: u64,
    num_trials: u32,
    trial_threads: Option<usize>,
    optimization_level: u8,
    minimum_codelength_improvement: f64,
    minimum_relative_tune_iteration_improvement: f64,
    coarse_tune_level: u32,
    core_loop_limit: u32,
    level_aggregation_limit: u32,
    tune_iteration_limit: u32,
    randomize_core_loop_limit: bool,
    fast_coarse_tune_partition: bool,
    alternate_coarse_tune_level: bool,
    two_level: bool,
    flow_tolerance: f64,
    max_flow_iterations: u32,
    connection_mode: ConnectionMode,
    print_tree: bool,
    print_clu: bool,
    print_node_ranks: bool,
    print_flow_network: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut cfg = Self {
            directed: false,
            undirdir: false,
            outdirdir: false,
            rawdir: false,
            record_teleportation: false,
            teleportation_probability: DEFAULT_TELEPORTATION_PROBABILITY,
            self_teleportation_probability: None,
            seed: DEFAULT_SEED,
            num_trials: 1,
            trial_threads: None,
            optimization_level: DEFAULT_OPTIMIZATION_LEVEL,
            minimum_codelength_improvement: 1e-10,
            minimum_relative_tune_iteration_improvement: 1e-5,
            coarse_tune_level: 1,
            core_loop_limit: 10,
            level_aggregation_limit: 0,
            tune_iteration_limit: 0,
            randomize_core_loop_limit: true,
            fast_coarse_tune_partition: true,
            alternate_coarse_tune_level: false,
            two_level: false,
            flow_tolerance: 1e-15,
            max_flow_iterations: 200,
            connection_mode: ConnectionMode::default(),
            print_tree: false,
            print_clu: false,
            print_node_ranks: false,
            print_flow_network: false,
        };
        cfg.apply_optimization_level(DEFAULT_OPTIMIZATION_LEVEL);
        cfg
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    // Slow and thorough at 0, fast and approximate at 3.
    fn apply_optimization_level(&mut self, level: u8) {
        let (core, randomize, aggregation, tune, fast_coarse, alternate, coarse_level) = match level
        {
            0 => (0, false, 0, 0, false, true, 3),
            1 => (10, true, 0, 0, true, false, 1),
            2 => (10, true, 0, 1, true, false, 1),
            _ => (10, true, 1, 1, true, false, 1),
        };
        self.optimization_level = level;
        self.core_loop_limit = core;
        self.randomize_core_loop_limit = randomize;
        self.level_aggregation_limit = aggregation;
        self.tune_iteration_limit = tune;
        self.fast_coarse_tune_partition = fast_coarse;
        self.alternate_coarse_tune_level = alternate;
        self.coarse_tune_level = coarse_level;
    }

    pub fn is_undirected(&self) -> bool {
        !(self.directed || self.undirdir || self.outdirdir || self.rawdir)
    }

    pub fn have_modular_result_output(&self) -> bool {
        self.print_tree || self.print_clu || self.print_node_ranks || self.print_flow_network
    }

    pub fn flow_model(&self) -> FlowModelKind {
        if self.is_undirected() {
            FlowModelKind::Undirected
        } else if self.undirdir
            || self.outdirdir
            || self.rawdir
            || self.teleportation_probability == 0.0
        {
            FlowModelKind::DirectedNonDetailedBalance
        } else if self.record_teleportation {
            FlowModelKind::DirectedWithTeleportation
        } else {
            FlowModelKind::DirectedNonDetailedBalanceWithTeleportation
        }
    }

    pub fn flow_strategy(&self) -> FlowStrategy {
        if self.is_undirected() {
            FlowStrategy::Undirected
        } else if self.rawdir {
            FlowStrategy::RawWeights
        } else if self.outdirdir {
            FlowStrategy::OutDegree
        } else if self.undirdir {
            FlowStrategy::UndirectedDegree
        } else if self.teleportation_probability == 0.0 {
            FlowStrategy::StationaryWalk
        } else {
            FlowStrategy::PageRank
        }
    }

    pub fn directed(&self) -> bool {
        self.directed
    }
    pub fn undirdir(&self) -> bool {
        self.undirdir
    }
    pub fn outdirdir(&self) -> bool {
        self.outdirdir
    }
    pub fn rawdir(&self) -> bool {
        self.rawdir
    }
    pub fn record_teleportation(&self) -> bool {
        self.record_teleportation
    }
    pub fn teleportation_probability(&self) -> f64 {
        self.teleportation_probability
    }
    pub fn self_teleportation_probability(&self) -> Option<f64> {
        self.self_teleportation_probability
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    pub fn num_trials(&self) -> u32 {
        self.num_trials
    }
    pub fn trial_threads(&self) -> Option<usize> {
        self.trial_threads
    }
    pub fn optimization_level(&self) -> u8 {
        self.optimization_level
    }
    pub fn minimum_codelength_improvement(&self) -> f64 {
        self.minimum_codelength_improvement
    }
    pub fn minimum_relative_tune_iteration_improvement(&self) -> f64 {
        self.minimum_relative_tune_iteration_improvement
    }
    pub fn coarse_tune_level(&self) -> u32 {
        self.coarse_tune_level
    }
    pub fn core_loop_limit(&self) -> u32 {
        self.core_loop_limit
    }
    pub fn level_aggregation_limit(&self) -> u32 {
        self.level_aggregation_limit
    }
    pub fn tune_iteration_limit(&self) -> u32 {
        self.tune_iteration_limit
    }
    pub fn randomize_core_loop_limit(&self) -> bool {
        self.randomize_core_loop_limit
    }
    pub fn fast_coarse_tune_partition(&self) -> bool {
        self.fast_coarse_tune_partition
    }
    pub fn alternate_coarse_tune_level(&self) -> bool {
        self.alternate_coarse_tune_level
    }
    pub fn two_level(&self) -> bool {
        self.two_level
    }
    pub fn flow_tolerance(&self) -> f64 {
        self.flow_tolerance
    }
    pub fn max_flow_iterations(&self) -> u32 {
        self.max_flow_iterations
    }
    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }
    pub fn print_tree(&self) -> bool {
        self.print_tree
    }
    pub fn print_clu(&self) -> bool {
        self.print_clu
    }
    pub fn print_node_ranks(&self) -> bool {
        self.print_node_ranks
    }
    pub fn print_flow_network(&self) -> bool {
        self.print_flow_network
    }
}

/// Builder for [`Config`]. Presets are expanded when
/// [`optimization_level`](ConfigBuilder::optimization_level) is called, so
/// explicit limits set afterwards override the preset.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    cfg: Config,
    invalid_level: Option<u8>,
}

impl ConfigBuilder {
    pub fn directed(mut self, v: bool) -> Self {
        self.cfg.directed = v;
        self
    }

    pub fn undirdir(mut self, v: bool) -> Self {
        self.cfg.undirdir = v;
        self
    }

    pub fn outdirdir(mut self, v: bool) -> Self {
        self.cfg.outdirdir = v;
        self
    }

    pub fn rawdir(mut self, v: bool) -> Self {
        self.cfg.rawdir = v;
        self
    }

    pub fn record_teleportation(mut self, v: bool) -> Self {
        self.cfg.record_teleportation = v;
        self
    }

    pub fn teleportation_probability(mut self, p: f64) -> Self {
        self.cfg.teleportation_probability = p;
        self
    }

    pub fn self_teleportation_probability(mut self, p: Option<f64>) -> Self {
        self.cfg.self_teleportation_probability = p;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.cfg.seed = seed;
        self
    }

    pub fn num_trials(mut self, n: u32) -> Self {
        self.cfg.num_trials = n;
        self
    }

    pub fn trial_threads(mut self, threads: Option<usize>) -> Self {
        self.cfg.trial_threads = threads;
        self
    }

    pub fn optimization_level(mut self, level: u8) -> Self {
        if level > 3 {
            self.invalid_level = Some(level);
        } else {
            self.invalid_level = None;
            self.cfg.apply_optimization_level(level);
        }
        self
    }

    pub fn minimum_codelength_improvement(mut self, v: f64) -> Self {
        self.cfg.minimum_codelength_improvement = v;
        self
    }

    pub fn minimum_relative_tune_iteration_improvement(mut self, v: f64) -> Self {
        self.cfg.minimum_relative_tune_iteration_improvement = v;
        self
    }

    pub fn coarse_tune_level(mut self, v: u32) -> Self {
        self.cfg.coarse_tune_level = v;
        self
    }

    pub fn core_loop_limit(mut self, v: u32) -> Self {
        self.cfg.core_loop_limit = v;
        self
    }

    pub fn level_aggregation_limit(mut self, v: u32) -> Self {
        self.cfg.level_aggregation_limit = v;
        self
    }

    pub fn tune_iteration_limit(mut self, v: u32) -> Self {
        self.cfg.tune_iteration_limit = v;
        self
    }

    pub fn randomize_core_loop_limit(mut self, v: bool) -> Self {
        self.cfg.randomize_core_loop_limit = v;
        self
    }

    pub fn fast_coarse_tune_partition(mut self, v: bool) -> Self {
        self.cfg.fast_coarse_tune_partition = v;
        self
    }

    pub fn alternate_coarse_tune_level(mut self, v: bool) -> Self {
        self.cfg.alternate_coarse_tune_level = v;
        self
    }

    pub fn two_level(mut self, v: bool) -> Self {
        self.cfg.two_level = v;
        self
    }

    pub fn flow_tolerance(mut self, v: f64) -> Self {
        self.cfg.flow_tolerance = v;
        self
    }

    pub fn max_flow_iterations(mut self, v: u32) -> Self {
        self.cfg.max_flow_iterations = v;
        self
    }

    pub fn connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.cfg.connection_mode = mode;
        self
    }

    pub fn print_tree(mut self, v: bool) -> Self {
        self.cfg.print_tree = v;
        self
    }

    pub fn print_clu(mut self, v: bool) -> Self {
        self.cfg.print_clu = v;
        self
    }

    pub fn print_node_ranks(mut self, v: bool) -> Self {
        self.cfg.print_node_ranks = v;
        self
    }

    pub fn print_flow_network(mut self, v: bool) -> Self {
        self.cfg.print_flow_network = v;
        self
    }

    pub fn build(self) -> Result<Config> {
        if let Some(level) = self.invalid_level {
            return Err(Error::invalid_config(
                "optimization_level",
                format!("{level} is outside 0..=3"),
            ));
        }
        let cfg = self.cfg;
        let p = cfg.teleportation_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::invalid_config(
                "teleportation_probability",
                format!("{p} is outside [0, 1]"),
            ));
        }
        if let Some(s) = cfg.self_teleportation_probability {
            if !(0.0..1.0).contains(&s) {
                return Err(Error::invalid_config(
                    "self_teleportation_probability",
                    format!("{s} is outside [0, 1)"),
                ));
            }
        }
        if cfg.num_trials == 0 {
            return Err(Error::invalid_config("num_trials", "at least one trial is required"));
        }
        if cfg.coarse_tune_level == 0 {
            return Err(Error::invalid_config("coarse_tune_level", "must be at least 1"));
        }
        if cfg.trial_threads == Some(0) {
            return Err(Error::invalid_config("trial_threads", "must be at least 1"));
        }
        for (name, v) in [
            ("minimum_codelength_improvement", cfg.minimum_codelength_improvement),
            (
                "minimum_relative_tune_iteration_improvement",
                cfg.minimum_relative_tune_iteration_improvement,
            ),
            ("flow_tolerance", cfg.flow_tolerance),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::invalid_config(name, format!("{v} must be a positive number")));
            }
        }
        if cfg.max_flow_iterations == 0 {
            return Err(Error::invalid_config("max_flow_iterations", "must be at least 1"));
        }
        Ok(cfg)
    }
}
