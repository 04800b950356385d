use std::{
    error::Error,
    fmt::{self, Display},
};

use machine_learning::MlErr;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, SageErr>;

/// All errors that can occur while training.
#[derive(Debug)]
pub enum SageErr {
    /// Invalid configuration, caught before any sampling.
    InvalidConfig(String),
    /// A relationship with a negative weight was met while walking the graph.
    NegativeRelationshipWeight {
        source: u64,
        target: u64,
        weight: f64,
    },
    /// A node id outside of `0..node_count`.
    NodeOutOfRange { node: u64, node_count: u64 },
    /// An extended batch whose length is not a multiple of three.
    MalformedBatch { len: usize },
    /// The run was stopped through its `TerminationFlag`.
    Terminated,
    /// The worker pool could not be created.
    ThreadPool(String),
    /// The tensor runtime failed.
    Ml(MlErr),
}

impl Display for SageErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::NegativeRelationshipWeight {
                source,
                target,
                weight,
            } => write!(
                f,
                "relationship {source} -> {target} has negative weight {weight}, \
                 weights must be non-negative"
            ),
            Self::NodeOutOfRange { node, node_count } => {
                write!(f, "node {node} is out of range for a graph of {node_count} nodes")
            }
            Self::MalformedBatch { len } => {
                write!(f, "extended batch of length {len} is not made of triples")
            }
            Self::Terminated => write!(f, "training was terminated"),
            Self::ThreadPool(msg) => write!(f, "failed to build the worker pool: {msg}"),
            Self::Ml(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl Error for SageErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for SageErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}
