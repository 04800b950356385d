use std::{cell::RefCell, rc::Rc, sync::Arc};

use rand::Rng;

use super::weight_gen;
use crate::{
    Result,
    arch::{
        Adjacency, ComputationGraph, NodeId, Weights, WeightsId, WeightsKind,
        activations::ActFn,
        ops::{Activation, AddBias, ElementwiseMax, MatMulTransB, MatrixSum, Slice},
    },
    initialization::ConstParamGen,
};

/// Max-pooling aggregation.
///
/// Every input row goes through a dense pooling stage, `act(x · Pᵀ + b)`, the pooled
/// neighbor rows are reduced with an element-wise maximum and the result is combined with
/// the node's own row as `act(self · Sᵀ + pooled · Nᵀ)`.
#[derive(Debug, Clone)]
pub struct PoolAggregator {
    pool_weights: Weights,
    self_weights: Weights,
    neighbors_weights: Weights,
    bias: Weights,
    act_fn: ActFn,
    sample_size: usize,
}

impl PoolAggregator {
    pub fn new<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        sample_size: usize,
        act_fn: ActFn,
        rng: Rc<RefCell<R>>,
    ) -> Result<Self> {
        let square = (input_dim, input_dim);
        let dense = (output_dim, input_dim);

        let mut pool_gen = weight_gen(rng.clone(), act_fn, input_dim, input_dim)?;
        let mut self_gen = weight_gen(rng.clone(), act_fn, input_dim, output_dim)?;
        let mut neighbors_gen = weight_gen(rng, act_fn, input_dim, output_dim)?;

        let weight = WeightsKind::Weight;
        let pool_weights = Weights::generate("pool_weights", weight, square, &mut pool_gen)?;
        let self_weights = Weights::generate("self_weights", weight, dense, &mut self_gen)?;
        let neighbors_weights =
            Weights::generate("neighbors_weights", weight, dense, &mut neighbors_gen)?;

        let mut bias_gen = ConstParamGen::zeros(input_dim);
        let bias = Weights::generate("bias", WeightsKind::Bias, (1, input_dim), &mut bias_gen)?;

        Ok(Self {
            pool_weights,
            self_weights,
            neighbors_weights,
            bias,
            act_fn,
            sample_size,
        })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn input_dim(&self) -> usize {
        self.self_weights.dim().1
    }

    pub fn output_dim(&self) -> usize {
        self.self_weights.dim().0
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn weights(&self) -> Vec<&Weights> {
        vec![
            &self.pool_weights,
            &self.self_weights,
            &self.neighbors_weights,
            &self.bias,
        ]
    }

    pub fn weights_mut(&mut self) -> Vec<&mut Weights> {
        vec![
            &mut self.pool_weights,
            &mut self.self_weights,
            &mut self.neighbors_weights,
            &mut self.bias,
        ]
    }

    pub fn aggregate<'w>(
        &'w self,
        graph: &mut ComputationGraph<'w>,
        first_id: WeightsId,
        input: NodeId,
        adjacency: Arc<Adjacency>,
    ) -> Result<NodeId> {
        let pool_weights = graph.weights(first_id, &self.pool_weights);
        let self_weights = graph.weights(first_id + 1, &self.self_weights);
        let neighbors_weights = graph.weights(first_id + 2, &self.neighbors_weights);
        let bias = graph.weights(first_id + 3, &self.bias);

        let pooled = graph.apply(MatMulTransB, &[input, pool_weights])?;
        let pooled = graph.apply(AddBias, &[pooled, bias])?;
        let pooled = graph.apply(Activation::new(self.act_fn), &[pooled])?;
        let neighbors = graph.apply(ElementwiseMax::new(adjacency.clone()), &[pooled])?;

        let own = graph.apply(Slice::new(adjacency.self_adjacency()), &[input])?;
        let own = graph.apply(MatMulTransB, &[own, self_weights])?;
        let neighbors = graph.apply(MatMulTransB, &[neighbors, neighbors_weights])?;

        let sum = graph.apply(MatrixSum, &[own, neighbors])?;
        graph.apply(Activation::new(self.act_fn), &[sum])
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::layers::{Layer, gradcheck};

    fn rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(11)))
    }

    #[test]
    fn weights_have_the_layer_shape() {
        let layer = PoolAggregator::new(3, 2, 4, ActFn::relu(), rng()).unwrap();
        let dims: Vec<_> = layer.weights().iter().map(|w| w.dim()).collect();

        assert_eq!(dims, [(3, 3), (2, 3), (2, 3), (1, 3)]);
        assert!(layer.weights()[3].is_bias());
        assert!(layer.weights()[3].data().iter().all(|&b| b == 0.));
    }

    #[test]
    fn gradients_match_finite_differences() {
        let adjacency = Adjacency::new(vec![0, 2], vec![vec![1, 3], vec![3]]).unwrap();
        let input = array![[0.5, -1.0, 0.2], [1.0, 0.3, -0.4], [0.0, 0.8, 0.1], [-0.6, 0.2, 0.9]];

        let layer = Layer::pool(3, 2, 2, ActFn::sigmoid(), rng()).unwrap();
        gradcheck::check(layer, input, Arc::new(adjacency));
    }
}
