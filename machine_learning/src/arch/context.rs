use ndarray::Array2;

use super::{
    BackwardArgs, ComputationGraph, NodeId, WeightsId,
    graph::Node,
};
use crate::{MlErr, Result};

/// Forward values and gradients of one evaluation of a `ComputationGraph`.
///
/// Leaf values are read straight from the graph, only operation outputs are stored here.
#[derive(Debug, Default)]
pub struct ComputationContext {
    values: Vec<Option<Array2<f64>>>,
    grads: Vec<Option<Array2<f64>>>,
}

impl ComputationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates `root`, which must be a scalar.
    ///
    /// # Arguments
    /// * `graph` - The graph `root` belongs to.
    /// * `root` - The node to evaluate.
    ///
    /// # Returns
    /// The value of `root` or an error if it isn't a `1x1` matrix.
    pub fn forward(&mut self, graph: &ComputationGraph<'_>, root: NodeId) -> Result<f64> {
        let value = self.evaluate(graph, root)?;

        match value.dim() {
            (1, 1) => Ok(value[[0, 0]]),
            shape => Err(MlErr::NotScalar {
                node: root.index(),
                shape,
            }),
        }
    }

    /// Evaluates `root` and every node it depends on, in arena order.
    ///
    /// Values computed by earlier calls are reused.
    pub fn evaluate<'a>(
        &'a mut self,
        graph: &'a ComputationGraph<'_>,
        root: NodeId,
    ) -> Result<&'a Array2<f64>> {
        graph.node(root)?;
        self.values.resize_with(graph.len(), || None);

        let needed = ancestors(graph, root)?;

        for index in (0..=root.index()).filter(|&i| needed[i]) {
            if self.values[index].is_some() {
                continue;
            }

            let Node::Op { op, parents } = graph.node(NodeId(index))? else {
                continue;
            };

            let output = {
                let inputs = parents
                    .iter()
                    .map(|&p| lookup(&self.values, graph, p))
                    .collect::<Result<Vec<_>>>()?;

                op.forward(&inputs)?
            };

            self.values[index] = Some(output);
        }

        lookup(&self.values, graph, root)
    }

    /// Propagates gradients from a scalar `root` to every node it depends on.
    ///
    /// `forward` must have been called with the same `root` beforehand.
    pub fn backward(&mut self, graph: &ComputationGraph<'_>, root: NodeId) -> Result<()> {
        let shape = lookup(&self.values, graph, root)?.dim();
        if shape != (1, 1) {
            return Err(MlErr::NotScalar {
                node: root.index(),
                shape,
            });
        }

        self.grads.clear();
        self.grads.resize_with(graph.len(), || None);
        self.grads[root.index()] = Some(Array2::ones((1, 1)));

        for index in (0..=root.index()).rev() {
            let node = NodeId(index);
            if !graph.requires_grad(node) {
                continue;
            }

            let Node::Op { op, parents } = graph.node(node)? else {
                continue;
            };

            let Some(upstream) = self.grads[index].take() else {
                continue;
            };

            let parent_grads = {
                let output = lookup(&self.values, graph, node)?;
                if output.dim() != upstream.dim() {
                    return Err(MlErr::ShapeMismatch {
                        what: op.name(),
                        got: upstream.dim(),
                        expected: output.dim(),
                    });
                }

                let inputs = parents
                    .iter()
                    .map(|&p| lookup(&self.values, graph, p))
                    .collect::<Result<Vec<_>>>()?;
                let requires_grad: Vec<_> =
                    parents.iter().map(|&p| graph.requires_grad(p)).collect();

                op.backward(BackwardArgs {
                    inputs: &inputs,
                    output,
                    upstream: &upstream,
                    requires_grad: &requires_grad,
                })?
            };

            self.grads[index] = Some(upstream);

            for (&parent, grad) in parents.iter().zip(parent_grads) {
                let Some(grad) = grad else {
                    continue;
                };

                if graph.requires_grad(parent) {
                    accumulate(&mut self.grads[parent.index()], grad)?;
                }
            }
        }

        Ok(())
    }

    /// Returns the forward value of an already evaluated node.
    pub fn value<'a>(
        &'a self,
        graph: &'a ComputationGraph<'_>,
        node: NodeId,
    ) -> Result<&'a Array2<f64>> {
        lookup(&self.values, graph, node)
    }

    /// Returns the gradient of the last `backward` root with respect to the tensor `id`.
    ///
    /// `None` if the tensor isn't part of the graph or the root doesn't depend on it.
    pub fn gradient(&self, graph: &ComputationGraph<'_>, id: WeightsId) -> Option<&Array2<f64>> {
        let node = graph.weights_node(id)?;
        self.grads.get(node.index())?.as_ref()
    }
}

fn lookup<'a>(
    values: &'a [Option<Array2<f64>>],
    graph: &'a ComputationGraph<'_>,
    id: NodeId,
) -> Result<&'a Array2<f64>> {
    match graph.node(id)? {
        Node::Constant(value) => Ok(value),
        Node::Weights(weights) => Ok(weights.data()),
        Node::Op { .. } => values
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(MlErr::MissingValue { node: id.index() }),
    }
}

fn ancestors(graph: &ComputationGraph<'_>, root: NodeId) -> Result<Vec<bool>> {
    let mut needed = vec![false; graph.len()];
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if std::mem::replace(&mut needed[node.index()], true) {
            continue;
        }

        if let Node::Op { parents, .. } = graph.node(node)? {
            stack.extend(parents.iter().filter(|p| !needed[p.index()]));
        }
    }

    Ok(needed)
}

fn accumulate(slot: &mut Option<Array2<f64>>, grad: Array2<f64>) -> Result<()> {
    match slot {
        Some(acc) if acc.dim() != grad.dim() => Err(MlErr::ShapeMismatch {
            what: "gradient",
            got: grad.dim(),
            expected: acc.dim(),
        }),
        Some(acc) => {
            *acc += &grad;
            Ok(())
        }
        None => {
            *slot = Some(grad);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::{
        Weights,
        ops::{ElementSum, L2NormSquared, MatrixSum},
    };

    #[test]
    fn forward_requires_a_scalar_root() {
        let mut graph = ComputationGraph::new();
        let c = graph.constant(array![[1.0, 2.0]]);

        let result = ComputationContext::new().forward(&graph, c);

        assert!(matches!(result, Err(MlErr::NotScalar { shape: (1, 2), .. })));
    }

    #[test]
    fn backward_before_forward_fails() {
        let w = Weights::new("w", array![[1.0, 2.0]]);
        let mut graph = ComputationGraph::new();
        let w = graph.weights(0, &w);
        let root = graph.apply(L2NormSquared, &[w]).unwrap();

        let result = ComputationContext::new().backward(&graph, root);

        assert!(matches!(result, Err(MlErr::MissingValue { .. })));
    }

    #[test]
    fn shared_nodes_accumulate_gradients() {
        let w = Weights::new("w", array![[1.0, -2.0]]);
        let mut graph = ComputationGraph::new();
        let node = graph.weights(0, &w);
        let doubled = graph.apply(MatrixSum, &[node, node]).unwrap();
        let root = graph.apply(ElementSum, &[doubled, node]).unwrap();

        let mut ctx = ComputationContext::new();
        let loss = ctx.forward(&graph, root).unwrap();
        ctx.backward(&graph, root).unwrap();

        assert_eq!(loss, -3.0);
        assert_eq!(ctx.gradient(&graph, 0).unwrap(), &array![[3.0, 3.0]]);
    }

    #[test]
    fn only_ancestors_are_evaluated() {
        let mut graph = ComputationGraph::new();
        let a = graph.constant(array![[1.0]]);
        let unused = graph.apply(MatrixSum, &[a, a]).unwrap();
        let root = graph.apply(ElementSum, &[a]).unwrap();

        let mut ctx = ComputationContext::new();
        ctx.forward(&graph, root).unwrap();

        assert!(ctx.value(&graph, unused).is_err());
        assert_eq!(ctx.value(&graph, root).unwrap(), &array![[1.0]]);
    }
}
