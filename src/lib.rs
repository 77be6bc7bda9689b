//! Hierarchical community detection by minimizing the map equation.
//!
//! A network is turned into the stationary flow of a random walk, and nodes
//! are grouped into nested modules so that the walk can be described in as
//! few bits as possible. [`run`] is the one-call entry point; [`TrialRunner`]
//! gives access to a prepared [`Network`] and a cancel token.

mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod hierarchy;
pub mod input;
mod level;
pub mod network;
pub mod objective;
mod optimizer;
pub mod parser;
pub mod report;
pub mod rng;
pub mod trial;

pub use config::{Config, ConfigBuilder, ConnectionMode, FlowModelKind, FlowStrategy};
pub use error::{Error, Result};
pub use hierarchy::{Child, HierarchyTree, ModuleNode};
pub use network::{Edge, Network, NetworkInput, NodeInput};
pub use trial::{CancelToken, ClusterResult, TrialRunner};

/// Cluster `edges` after merging them according to the configured connection mode.
pub fn run(edges: &[Edge], config: &Config) -> Result<ClusterResult> {
    run_with_cancel(edges, config, &CancelToken::new())
}

/// Like [`run`], stopping early once `cancel` is set.
pub fn run_with_cancel(edges: &[Edge], config: &Config, cancel: &CancelToken) -> Result<ClusterResult> {
    let edges = input::aggregate_connections(edges, config.connection_mode());
    let network = Network::from_edges(&edges, config)?;
    TrialRunner::new(&network, config)
        .with_cancel(cancel.clone())
        .run()
}
