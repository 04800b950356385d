use std::sync::Arc;

use machine_learning::{
    MlErr,
    arch::{ComputationContext, ComputationGraph, layers::Layer},
};
use ndarray::Array2;

use super::TerminationFlag;
use crate::{
    Result,
    batch::{ExtendedBatch, SubGraph},
    embeddings::embeddings,
    graph::Graph,
    loss::LossAssembler,
    sampling::NeighborhoodSampler,
};

/// The loss of one batch and its gradient with respect to every trainable tensor.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub loss: f64,
    /// One gradient per tensor, in the order the layers list their weights.
    pub gradients: Vec<Array2<f64>>,
}

/// One extended batch together with the neighborhoods sampled for it.
#[derive(Debug)]
pub struct BatchTask {
    batch: Arc<ExtendedBatch>,
    subgraphs: Vec<SubGraph>,
}

impl BatchTask {
    /// Samples the subgraphs of every layer for `batch`.
    ///
    /// # Arguments
    /// * `graph` - The graph to sample from.
    /// * `batch` - The extended batch.
    /// * `sample_sizes` - The sample size of every layer, first layer first.
    /// * `seed` - Seeds the neighborhood sampler of this task.
    /// * `termination` - Polled before every subgraph.
    pub fn build<G: Graph + ?Sized>(
        graph: &G,
        batch: Arc<ExtendedBatch>,
        sample_sizes: &[usize],
        seed: u64,
        termination: &TerminationFlag,
    ) -> Result<Self> {
        let mut sampler = NeighborhoodSampler::new(seed);
        let subgraphs =
            SubGraph::build_all(graph, batch.ids(), sample_sizes, &mut sampler, termination)?;

        Ok(Self { batch, subgraphs })
    }

    pub fn batch(&self) -> &ExtendedBatch {
        &self.batch
    }

    pub fn subgraphs(&self) -> &[SubGraph] {
        &self.subgraphs
    }

    /// Computes the loss of this batch and its gradients.
    ///
    /// Tensors the loss doesn't depend on get a zero gradient.
    ///
    /// # Arguments
    /// * `layers` - The current model, only read.
    /// * `features` - One row per node of the whole graph.
    /// * `loss_fn` - Builds the loss on top of the embeddings.
    pub fn run(
        &self,
        layers: &[Layer],
        features: &Array2<f64>,
        loss_fn: &LossAssembler,
    ) -> Result<BatchOutcome> {
        let mut graph = ComputationGraph::new();
        let embeddings = embeddings(&mut graph, layers, &self.subgraphs, features)?;
        let root = loss_fn.assemble(
            &mut graph,
            embeddings,
            layers,
            self.batch.original_batch_size(),
        )?;

        let mut ctx = ComputationContext::new();
        let loss = ctx.forward(&graph, root)?;
        ctx.backward(&graph, root)?;

        let gradients = layers
            .iter()
            .flat_map(Layer::weights)
            .enumerate()
            .map(|(id, weights)| {
                ctx.gradient(&graph, id)
                    .cloned()
                    .unwrap_or_else(|| Array2::zeros(weights.dim()))
            })
            .collect();

        Ok(BatchOutcome { loss, gradients })
    }
}

/// Averages the gradients of several batches tensor by tensor.
///
/// Gradients are summed in the order of `outcomes` and then divided by their amount.
///
/// # Returns
/// An error if there are no outcomes or they disagree on the amount or shape of tensors.
pub fn average_gradients(outcomes: &[BatchOutcome]) -> Result<Vec<Array2<f64>>> {
    let Some((first, rest)) = outcomes.split_first() else {
        return Err(MlErr::SizeMismatch {
            what: "batch outcomes",
            got: 0,
            expected: 1,
        }
        .into());
    };

    let mut sums = first.gradients.clone();
    for outcome in rest {
        if outcome.gradients.len() != sums.len() {
            return Err(MlErr::SizeMismatch {
                what: "batch gradients",
                got: outcome.gradients.len(),
                expected: sums.len(),
            }
            .into());
        }

        for (sum, grad) in sums.iter_mut().zip(&outcome.gradients) {
            if sum.dim() != grad.dim() {
                return Err(MlErr::ShapeMismatch {
                    what: "batch gradient",
                    got: grad.dim(),
                    expected: sum.dim(),
                }
                .into());
            }

            *sum += grad;
        }
    }

    let count = outcomes.len() as f64;
    sums.iter_mut().for_each(|sum| *sum /= count);

    Ok(sums)
}

/// Returns the arithmetic mean of the batch losses, `NaN` if there are none.
pub fn mean_loss(outcomes: &[BatchOutcome]) -> f64 {
    outcomes.iter().map(|o| o.loss).sum::<f64>() / outcomes.len() as f64
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use machine_learning::arch::activations::ActFn;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::graph::CsrGraphBuilder;

    fn outcome(loss: f64, gradients: Vec<Array2<f64>>) -> BatchOutcome {
        BatchOutcome { loss, gradients }
    }

    #[test]
    fn averaging_is_order_independent() {
        let a = outcome(1., vec![array![[0.1, 0.7]], array![[3.0]]]);
        let b = outcome(2., vec![array![[0.2, -0.3]], array![[1e-9]]]);
        let c = outcome(4., vec![array![[1e6, 0.3]], array![[-2.5]]]);

        let forward = average_gradients(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = average_gradients(&[c, b, a]).unwrap();

        for (f, b) in forward.iter().zip(&backward) {
            for (x, y) in f.iter().zip(b) {
                assert!((x - y).abs() <= 1e-9 * x.abs().max(1.));
            }
        }
        assert!((forward[1][[0, 0]] - 0.5 / 3.).abs() < 1e-9);
    }

    #[test]
    fn averaging_rejects_mismatches() {
        let a = outcome(1., vec![array![[0.1, 0.7]]]);
        let b = outcome(1., vec![array![[0.1], [0.7]]]);

        assert!(average_gradients(&[]).is_err());
        assert!(average_gradients(&[a.clone(), b]).is_err());
        assert!(average_gradients(&[a.clone(), outcome(1., Vec::new())]).is_err());
        assert_eq!(mean_loss(&[a.clone(), outcome(3., Vec::new())]), 2.);
    }

    #[test]
    fn a_task_yields_one_gradient_per_tensor() {
        let graph = CsrGraphBuilder::new(5)
            .undirected()
            .relationship(0, 1)
            .relationship(1, 2)
            .relationship(2, 3)
            .relationship(3, 4)
            .build()
            .unwrap();
        let features = Array2::from_shape_fn((5, 3), |(i, j)| (i * 3 + j) as f64 / 10.);
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(3)));
        let layers = vec![
            Layer::pool(3, 4, 2, ActFn::relu(), rng.clone()).unwrap(),
            Layer::mean(4, 2, 2, ActFn::sigmoid(), rng).unwrap(),
        ];

        let batch = Arc::new(ExtendedBatch::sample(&graph, 0..3, 2, 7).unwrap());
        let task =
            BatchTask::build(&graph, batch, &[2, 2], 11, &TerminationFlag::running()).unwrap();
        let outcome = task
            .run(&layers, &features, &LossAssembler::new(1., 0.1, 5))
            .unwrap();

        assert!(outcome.loss.is_finite());
        assert_eq!(outcome.gradients.len(), 5);
        let shapes: Vec<_> = layers.iter().flat_map(Layer::weights).map(|w| w.dim()).collect();
        let grad_shapes: Vec<_> = outcome.gradients.iter().map(Array2::dim).collect();
        assert_eq!(shapes, grad_shapes);
    }
}
