use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by network construction, flow calculation and the trial runner.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration '{name}': {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    #[error("invalid weight {weight} on link {from} -> {to}")]
    NegativeWeight { from: u32, to: u32, weight: f64 },

    #[error("invalid weight {weight} on node {node}")]
    NegativeNodeWeight { node: u32, weight: f64 },

    #[error("directed flow without teleportation requires a strongly connected network ({unreachable} of {nodes} nodes unreachable)")]
    DisconnectedGraph { unreachable: usize, nodes: usize },

    #[error("cancelled before completion")]
    Cancelled,

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("failed to build trial thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_config(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            name,
            reason: reason.into(),
        }
    }
}
