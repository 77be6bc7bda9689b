use crate::config::{Config, ConnectionMode};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectionModeArg {
    Transactions,
    Edges,
    Links,
}

impl From<ConnectionModeArg> for ConnectionMode {
    fn from(mode: ConnectionModeArg) -> Self {
        match mode {
            ConnectionModeArg::Transactions => ConnectionMode::Transactions,
            ConnectionModeArg::Edges => ConnectionMode::Edges,
            ConnectionModeArg::Links => ConnectionMode::Links,
        }
    }
}

/// Hierarchical community detection by minimizing the map equation.
#[derive(Debug, Clone, Parser)]
#[command(name = "infoflow", version, about)]
pub struct Args {
    /// Pajek network or plain link list.
    pub network_file: PathBuf,

    /// Treat links as directed, with teleportation.
    #[arg(long)]
    pub directed: bool,
    /// Directed links, node flow from the undirected degree.
    #[arg(long)]
    pub undirdir: bool,
    /// Directed links, node flow from the out-degree.
    #[arg(long)]
    pub outdirdir: bool,
    /// Directed links, flow proportional to raw link weight.
    #[arg(long)]
    pub rawdir: bool,
    /// Count teleportation steps in the codelength.
    #[arg(long)]
    pub record_teleportation: bool,
    #[arg(long, short = 'p', default_value_t = 0.15)]
    pub teleportation_probability: f64,
    #[arg(long)]
    pub self_teleportation_probability: Option<f64>,

    #[arg(long, short = 's', default_value_t = 123)]
    pub seed: u64,
    #[arg(long, short = 'N', default_value_t = 1)]
    pub num_trials: u32,
    /// Worker threads for trials; all cores by default.
    #[arg(long)]
    pub threads: Option<usize>,
    /// 0 is slow and thorough, 3 is fast.
    #[arg(long, short = 'O', default_value_t = 1)]
    pub optimization_level: u8,
    /// Only search for a flat partition.
    #[arg(long)]
    pub two_level: bool,
    #[arg(long, value_enum, default_value_t = ConnectionModeArg::Edges)]
    pub connection_mode: ConnectionModeArg,

    /// Print the module hierarchy.
    #[arg(long)]
    pub tree: bool,
    /// Print the top module of every node.
    #[arg(long)]
    pub clu: bool,
    /// Print nodes by descending flow.
    #[arg(long)]
    pub node_ranks: bool,
    /// Print node and link flow.
    #[arg(long)]
    pub flow_network: bool,
    /// No summary and only warnings in the log.
    #[arg(long)]
    pub silent: bool,
}

impl Args {
    /// Network links are directed for every directed flow model.
    pub fn is_directed(&self) -> bool {
        self.directed || self.undirdir || self.outdirdir || self.rawdir
    }

    pub fn to_config(&self) -> Result<Config> {
        Config::builder()
            .optimization_level(self.optimization_level)
            .directed(self.directed)
            .undirdir(self.undirdir)
            .outdirdir(self.outdirdir)
            .rawdir(self.rawdir)
            .record_teleportation(self.record_teleportation)
            .teleportation_probability(self.teleportation_probability)
            .self_teleportation_probability(self.self_teleportation_probability)
            .seed(self.seed)
            .num_trials(self.num_trials)
            .trial_threads(self.threads)
            .two_level(self.two_level)
            .connection_mode(self.connection_mode.into())
            .print_tree(self.tree)
            .print_clu(self.clu)
            .print_node_ranks(self.node_ranks)
            .print_flow_network(self.flow_network)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("infoflow").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_config_defaults() {
        let args = parse(&["in.net"]);
        let cfg = args.to_config().unwrap();
        assert_eq!(cfg, Config::builder().build().unwrap());
        assert!(!cfg.have_modular_result_output());
    }

    #[test]
    fn flags_reach_the_config() {
        let args = parse(&[
            "in.net",
            "--directed",
            "--num-trials",
            "8",
            "--threads=6",
            "-O",
            "2",
            "--clu",
            "--connection-mode",
            "links",
        ]);
        assert!(args.is_directed());
        let cfg = args.to_config().unwrap();
        assert_eq!(cfg.num_trials(), 8);
        assert_eq!(cfg.trial_threads(), Some(6));
        assert_eq!(cfg.tune_iteration_limit(), 1);
        assert_eq!(cfg.connection_mode(), ConnectionMode::Links);
        assert!(cfg.print_clu());
        assert!(cfg.have_modular_result_output());
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let err = parse(&["in.net", "-p", "1.5"]).to_config().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { name: "teleportation_probability", .. }));
        let err = parse(&["in.net", "-O", "4"]).to_config().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { name: "optimization_level", .. }));
    }

    #[test]
    fn missing_network_file_is_a_usage_error() {
        assert!(Args::try_parse_from(["infoflow", "--silent"]).is_err());
    }
}
