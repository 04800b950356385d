mod mean;
mod pool;

pub use mean::MeanAggregator;
pub use pool::PoolAggregator;

use std::{cell::RefCell, rc::Rc, sync::Arc};

use rand::Rng;
use rand_distr::Uniform;

use super::{Adjacency, ComputationGraph, NodeId, Weights, WeightsId, activations::ActFn};
use crate::{Result, initialization::RandParamGen};

/// A neighborhood aggregation stage of an embedding model.
#[derive(Debug, Clone)]
pub enum Layer {
    Mean(MeanAggregator),
    Pool(PoolAggregator),
}
use Layer::*;

impl Layer {
    /// Creates a new mean aggregation layer with randomly initialized weights.
    ///
    /// # Arguments
    /// * `input_dim` - The width of the rows this layer consumes.
    /// * `output_dim` - The width of the rows this layer produces.
    /// * `sample_size` - The maximum amount of neighbors aggregated per node.
    /// * `act_fn` - The activation applied to the aggregated rows.
    /// * `rng` - The random number generator shared by the whole model.
    pub fn mean<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        sample_size: usize,
        act_fn: ActFn,
        rng: Rc<RefCell<R>>,
    ) -> Result<Self> {
        let aggregator = MeanAggregator::new(input_dim, output_dim, sample_size, act_fn, rng)?;
        Ok(Mean(aggregator))
    }

    /// Creates a new max-pooling aggregation layer with randomly initialized weights.
    ///
    /// Takes the same arguments as `Layer::mean`.
    pub fn pool<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        sample_size: usize,
        act_fn: ActFn,
        rng: Rc<RefCell<R>>,
    ) -> Result<Self> {
        let aggregator = PoolAggregator::new(input_dim, output_dim, sample_size, act_fn, rng)?;
        Ok(Pool(aggregator))
    }

    pub fn sample_size(&self) -> usize {
        match self {
            Mean(l) => l.sample_size(),
            Pool(l) => l.sample_size(),
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Mean(l) => l.input_dim(),
            Pool(l) => l.input_dim(),
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            Mean(l) => l.output_dim(),
            Pool(l) => l.output_dim(),
        }
    }

    pub fn act_fn(&self) -> ActFn {
        match self {
            Mean(l) => l.act_fn(),
            Pool(l) => l.act_fn(),
        }
    }

    /// Returns the trainable tensors of this layer, in a fixed order.
    pub fn weights(&self) -> Vec<&Weights> {
        match self {
            Mean(l) => l.weights(),
            Pool(l) => l.weights(),
        }
    }

    /// Returns the trainable tensors of this layer, in the same order as `weights`.
    pub fn weights_mut(&mut self) -> Vec<&mut Weights> {
        match self {
            Mean(l) => l.weights_mut(),
            Pool(l) => l.weights_mut(),
        }
    }

    /// Adds the aggregation of this layer to a computation graph.
    ///
    /// # Arguments
    /// * `graph` - The graph to extend.
    /// * `first_id` - The id of this layer's first tensor, the rest follow consecutively.
    /// * `input` - The rows of the previous layer.
    /// * `adjacency` - Which input rows are aggregated into every output row.
    ///
    /// # Returns
    /// The node holding one output row per adjacency row.
    pub fn aggregate<'w>(
        &'w self,
        graph: &mut ComputationGraph<'w>,
        first_id: WeightsId,
        input: NodeId,
        adjacency: Arc<Adjacency>,
    ) -> Result<NodeId> {
        match self {
            Mean(l) => l.aggregate(graph, first_id, input, adjacency),
            Pool(l) => l.aggregate(graph, first_id, input, adjacency),
        }
    }
}

/// Returns the initializer of a `[fan_out × fan_in]` weight matrix followed by `act_fn`.
fn weight_gen<R: Rng>(
    rng: Rc<RefCell<R>>,
    act_fn: ActFn,
    fan_in: usize,
    fan_out: usize,
) -> Result<RandParamGen<R, Uniform<f64>>> {
    let limit = fan_in * fan_out;

    match act_fn {
        ActFn::Sigmoid(_) => RandParamGen::xavier_uniform(rng, limit, fan_in, fan_out),
        ActFn::Relu(_) => RandParamGen::kaiming_uniform(rng, limit, fan_in),
    }
}
