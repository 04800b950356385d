pub mod activations;
mod adjacency;
mod context;
mod graph;
pub mod layers;
mod operation;
pub mod ops;
mod weights;

pub use adjacency::Adjacency;
pub use context::ComputationContext;
pub use graph::{ComputationGraph, NodeId, WeightsId};
pub use operation::{BackwardArgs, Operation};
pub use weights::{Weights, WeightsKind};
