//! Mini-batch GraphSAGE training.
//!
//! A `GraphSageTrainer` learns the weights of a stack of neighborhood aggregation layers
//! such that the embeddings of structurally close nodes are similar. Every iteration
//! samples batches of `(target, positive, negative)` node triples, builds a computation
//! graph per batch over the sampled neighborhoods, and applies the averaged gradient of a
//! negative sampling loss with Adam.

pub mod batch;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod layer_factory;
pub mod loss;
pub mod sampling;
pub mod training;

pub use config::{ActivationFunction, AggregatorType, LayerConfig, TrainConfig};
pub use error::{Result, SageErr};
pub use graph::{CsrGraph, CsrGraphBuilder, Graph};
pub use training::{
    EmptyProgressTracker, EpochResult, GraphSageTrainer, LogProgressTracker, ProgressTracker,
    TerminationFlag, TrainMetrics, TrainResult,
};
