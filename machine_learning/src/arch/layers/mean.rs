use std::{cell::RefCell, rc::Rc, sync::Arc};

use rand::Rng;

use super::weight_gen;
use crate::{
    Result,
    arch::{
        Adjacency, ComputationGraph, NodeId, Weights, WeightsId, WeightsKind,
        activations::ActFn,
        ops::{Activation, MatMulTransB, MeanAggregate},
    },
};

/// `act(mean(self, neighbors) · Wᵀ)`
#[derive(Debug, Clone)]
pub struct MeanAggregator {
    weights: Weights,
    act_fn: ActFn,
    sample_size: usize,
}

impl MeanAggregator {
    pub fn new<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        sample_size: usize,
        act_fn: ActFn,
        rng: Rc<RefCell<R>>,
    ) -> Result<Self> {
        let mut param_gen = weight_gen(rng, act_fn, input_dim, output_dim)?;
        let weights = Weights::generate(
            "weights",
            WeightsKind::Weight,
            (output_dim, input_dim),
            &mut param_gen,
        )?;

        Ok(Self {
            weights,
            act_fn,
            sample_size,
        })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn input_dim(&self) -> usize {
        self.weights.dim().1
    }

    pub fn output_dim(&self) -> usize {
        self.weights.dim().0
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn weights(&self) -> Vec<&Weights> {
        vec![&self.weights]
    }

    pub fn weights_mut(&mut self) -> Vec<&mut Weights> {
        vec![&mut self.weights]
    }

    pub fn aggregate<'w>(
        &'w self,
        graph: &mut ComputationGraph<'w>,
        first_id: WeightsId,
        input: NodeId,
        adjacency: Arc<Adjacency>,
    ) -> Result<NodeId> {
        let weights = graph.weights(first_id, &self.weights);

        let means = graph.apply(MeanAggregate::new(adjacency), &[input])?;
        let product = graph.apply(MatMulTransB, &[means, weights])?;
        graph.apply(Activation::new(self.act_fn), &[product])
    }
}
