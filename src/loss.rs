use machine_learning::{
    MlErr,
    arch::{
        BackwardArgs, ComputationGraph, NodeId, Operation,
        layers::Layer,
        ops::{ElementSum, L2NormSquared, MatrixSum, Scale},
    },
};
use ndarray::{Array2, ArrayView1, array};

use crate::{Result, embeddings::first_weight_ids};

fn sigmoid(x: f64) -> f64 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        let e = x.exp();
        e / (1. + e)
    }
}

/// `ln(1 + eˣ)`, stable for large `|x|`.
fn softplus(x: f64) -> f64 {
    x.max(0.) + (-x.abs()).exp().ln_1p()
}

/// The negative sampling loss over embeddings laid out as `(target, positive, negative)`
/// row triples.
///
/// Every triple contributes `-ln σ(z·p) - Q·ln σ(-z·n)`, the loss is the mean over triples.
#[derive(Debug, Clone, Copy)]
pub struct NegativeSamplingLoss {
    negative_sample_weight: f64,
}

impl NegativeSamplingLoss {
    pub fn new(negative_sample_weight: f64) -> Self {
        Self {
            negative_sample_weight,
        }
    }

    fn triples<'a>(
        &self,
        embeddings: &'a Array2<f64>,
    ) -> machine_learning::Result<Vec<[ArrayView1<'a, f64>; 3]>> {
        let rows = embeddings.nrows();
        if rows == 0 || rows % 3 != 0 {
            return Err(MlErr::SizeMismatch {
                what: "negative sampling rows",
                got: rows,
                expected: (rows / 3).max(1) * 3,
            });
        }

        Ok((0..rows / 3)
            .map(|i| {
                [
                    embeddings.row(3 * i),
                    embeddings.row(3 * i + 1),
                    embeddings.row(3 * i + 2),
                ]
            })
            .collect())
    }
}

impl Operation for NegativeSamplingLoss {
    fn name(&self) -> &'static str {
        "negative_sampling_loss"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> machine_learning::Result<Array2<f64>> {
        let [embeddings] = inputs else {
            return Err(MlErr::SizeMismatch {
                what: self.name(),
                got: inputs.len(),
                expected: 1,
            });
        };

        let triples = self.triples(embeddings)?;
        let q = self.negative_sample_weight;

        let total: f64 = triples
            .iter()
            .map(|[z, p, n]| softplus(-z.dot(p)) + q * softplus(z.dot(n)))
            .sum();

        Ok(array![[total / triples.len() as f64]])
    }

    fn backward(
        &self,
        args: BackwardArgs<'_>,
    ) -> machine_learning::Result<Vec<Option<Array2<f64>>>> {
        let [embeddings] = args.inputs else {
            return Err(MlErr::SizeMismatch {
                what: self.name(),
                got: args.inputs.len(),
                expected: 1,
            });
        };

        if !args.wants(0) {
            return Ok(vec![None]);
        }

        let triples = self.triples(embeddings)?;
        let scale = args.scalar_upstream(self.name())? / triples.len() as f64;
        let q = self.negative_sample_weight;
        let mut grad = Array2::zeros(embeddings.dim());

        for (i, [z, p, n]) in triples.iter().enumerate() {
            let d_positive = -sigmoid(-z.dot(p)) * scale;
            let d_negative = q * sigmoid(z.dot(n)) * scale;

            let mut dz = grad.row_mut(3 * i);
            dz.scaled_add(d_positive, p);
            dz.scaled_add(d_negative, n);
            grad.row_mut(3 * i + 1).scaled_add(d_positive, z);
            grad.row_mut(3 * i + 2).scaled_add(d_negative, z);
        }

        Ok(vec![Some(grad)])
    }
}

/// Builds the scalar training loss of a batch.
#[derive(Debug, Clone, Copy)]
pub struct LossAssembler {
    negative_sample_weight: f64,
    penalty_l2: f64,
    node_count: u64,
}

impl LossAssembler {
    /// Creates a new `LossAssembler`.
    ///
    /// # Arguments
    /// * `negative_sample_weight` - How much negative pairs weigh against positive ones.
    /// * `penalty_l2` - The L2 regularization coefficient, `0` disables it.
    /// * `node_count` - The amount of nodes in the graph, scales the penalty per batch.
    pub fn new(negative_sample_weight: f64, penalty_l2: f64, node_count: u64) -> Self {
        Self {
            negative_sample_weight,
            penalty_l2,
            node_count,
        }
    }

    /// Adds the loss on top of the batch embeddings.
    ///
    /// The L2 penalty is scaled by `original_batch_size / node_count`, so that a smaller
    /// final batch is penalized proportionally to its size.
    ///
    /// # Arguments
    /// * `graph` - The computation graph holding the embeddings.
    /// * `embeddings` - One embedding per extended batch entry.
    /// * `layers` - The layers whose weights are penalized.
    /// * `original_batch_size` - The amount of triples in the batch.
    ///
    /// # Returns
    /// A scalar node.
    pub fn assemble<'w>(
        &self,
        graph: &mut ComputationGraph<'w>,
        embeddings: NodeId,
        layers: &'w [Layer],
        original_batch_size: usize,
    ) -> Result<NodeId> {
        let loss_fn = NegativeSamplingLoss::new(self.negative_sample_weight);
        let loss = graph.apply(loss_fn, &[embeddings])?;

        if self.penalty_l2 <= 0. {
            return Ok(loss);
        }

        let mut norms = Vec::new();
        for (layer, first_id) in layers.iter().zip(first_weight_ids(layers)) {
            for (offset, weights) in layer.weights().into_iter().enumerate() {
                if weights.is_bias() {
                    continue;
                }

                let node = graph.weights(first_id + offset, weights);
                norms.push(graph.apply(L2NormSquared, &[node])?);
            }
        }

        let factor = self.penalty_l2 * original_batch_size as f64 / self.node_count as f64;
        let penalty = graph.apply(ElementSum, &norms)?;
        let penalty = graph.apply(Scale::new(factor), &[penalty])?;

        Ok(graph.apply(MatrixSum, &[loss, penalty])?)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use machine_learning::arch::{ComputationContext, activations::ActFn};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn softplus_matches_its_definition() {
        for x in [-30., -2., 0., 0.5, 3., 30.] {
            let expected = (1. + f64::exp(x)).ln();
            assert!((softplus(x) - expected).abs() < 1e-12);
        }
        assert!(softplus(1000.).is_finite());
    }

    #[test]
    fn loss_of_a_known_triple() {
        let embeddings = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];

        let loss = NegativeSamplingLoss::new(2.).forward(&[&embeddings]).unwrap();

        let expected = (1. + (-1f64).exp()).ln() + 2. * 2f64.ln();
        assert!((loss[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn rows_must_form_triples() {
        let embeddings = array![[1.0], [2.0]];

        assert!(NegativeSamplingLoss::new(1.).forward(&[&embeddings]).is_err());
    }

    #[test]
    fn upstream_must_be_a_scalar() {
        let op = NegativeSamplingLoss::new(1.);
        let embeddings = array![[1.0], [0.5], [-0.5]];
        let output = op.forward(&[&embeddings]).unwrap();

        let result = op.backward(BackwardArgs {
            inputs: &[&embeddings],
            output: &output,
            upstream: &array![[1.0], [1.0]],
            requires_grad: &[true],
        });

        assert!(matches!(
            result,
            Err(MlErr::ShapeMismatch {
                got: (2, 1),
                expected: (1, 1),
                ..
            })
        ));
    }

    #[test]
    fn gradients_match_finite_differences() {
        const H: f64 = 1e-6;
        let op = NegativeSamplingLoss::new(3.);
        let embeddings = array![
            [0.3, -0.2],
            [0.1, 0.9],
            [-0.5, 0.4],
            [0.3, -0.2],
            [0.7, 0.1],
            [0.2, 0.2]
        ];

        let output = op.forward(&[&embeddings]).unwrap();
        let grads = op
            .backward(BackwardArgs {
                inputs: &[&embeddings],
                output: &output,
                upstream: &array![[1.0]],
                requires_grad: &[true],
            })
            .unwrap();
        let grad = grads[0].as_ref().unwrap();

        for (idx, &g) in grad.indexed_iter() {
            let mut plus = embeddings.clone();
            plus[idx] += H;
            let mut minus = embeddings.clone();
            minus[idx] -= H;

            let numeric = (op.forward(&[&plus]).unwrap()[[0, 0]]
                - op.forward(&[&minus]).unwrap()[[0, 0]])
                / (2. * H);

            assert!((numeric - g).abs() < 1e-6, "{idx:?}: {g} vs {numeric}");
        }
    }

    #[test]
    fn penalty_scales_with_the_batch_share() {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(0)));
        let mut layer = Layer::pool(2, 3, 1, ActFn::sigmoid(), rng).unwrap();
        for weights in layer.weights_mut() {
            weights.data_mut().fill(0.5);
        }
        let layers = [layer];
        let embeddings = Array2::from_shape_fn((6, 2), |(i, j)| (i + j) as f64 / 10.);

        let evaluate = |penalty_l2: f64| {
            let mut graph = ComputationGraph::new();
            let node = graph.constant(embeddings.clone());
            let root = LossAssembler::new(2., penalty_l2, 10)
                .assemble(&mut graph, node, &layers, 2)
                .unwrap();

            let mut ctx = ComputationContext::new();
            let loss = ctx.forward(&graph, root).unwrap();
            ctx.backward(&graph, root).unwrap();

            let grads: Vec<_> = (0..4).map(|id| ctx.gradient(&graph, id).cloned()).collect();
            (loss, grads)
        };

        let (plain, _) = evaluate(0.);
        let (penalized, grads) = evaluate(0.3);

        // 16 non-bias entries of 0.25, scaled by 0.3 * 2 / 10
        assert!((penalized - plain - 0.24).abs() < 1e-12);
        for grad in &grads[..3] {
            let grad = grad.as_ref().unwrap();
            assert!(grad.iter().all(|g| (g - 0.06).abs() < 1e-12));
        }
        assert!(grads[3].is_none());
    }
}
