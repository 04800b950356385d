use std::collections::HashMap;

use ndarray::Array2;

use super::{Operation, Weights};
use crate::{MlErr, Result};

/// Identifies a trainable tensor across every computation graph of a training run.
pub type WeightsId = usize;

/// The position of a node inside a `ComputationGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) enum Node<'w> {
    Constant(Array2<f64>),
    Weights(&'w Weights),
    Op {
        op: Box<dyn Operation>,
        parents: Vec<NodeId>,
    },
}

/// An arena of differentiable nodes.
///
/// Nodes can only refer to nodes inserted before them, so the insertion order is always a
/// topological order. Weights are borrowed for the lifetime of the graph, they can't be
/// updated while a graph that reads them is alive.
#[derive(Default)]
pub struct ComputationGraph<'w> {
    nodes: Vec<Node<'w>>,
    requires_grad: Vec<bool>,
    weight_nodes: HashMap<WeightsId, NodeId>,
}

impl<'w> ComputationGraph<'w> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constant leaf, constants never receive gradients.
    pub fn constant(&mut self, value: Array2<f64>) -> NodeId {
        self.push(Node::Constant(value), false)
    }

    /// Adds a trainable leaf.
    ///
    /// Adding the same `id` twice returns the node created the first time.
    ///
    /// # Arguments
    /// * `id` - The identifier of the tensor, used to read its gradient back.
    /// * `weights` - The tensor.
    pub fn weights(&mut self, id: WeightsId, weights: &'w Weights) -> NodeId {
        if let Some(&node) = self.weight_nodes.get(&id) {
            return node;
        }

        let node = self.push(Node::Weights(weights), true);
        self.weight_nodes.insert(id, node);
        node
    }

    /// Adds an operation over already existing nodes.
    ///
    /// # Arguments
    /// * `op` - The operation.
    /// * `parents` - Its operands, in the order the operation expects them.
    ///
    /// # Returns
    /// The new node or an error if a parent doesn't belong to this graph.
    pub fn apply<O>(&mut self, op: O, parents: &[NodeId]) -> Result<NodeId>
    where
        O: Operation + 'static,
    {
        let len = self.nodes.len();
        if let Some(parent) = parents.iter().find(|p| p.0 >= len) {
            return Err(MlErr::UnknownNode {
                node: parent.0,
                len,
            });
        }

        let requires_grad = parents.iter().any(|p| self.requires_grad[p.0]);
        let node = Node::Op {
            op: Box::new(op),
            parents: parents.to_vec(),
        };

        Ok(self.push(node, requires_grad))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node holding the tensor `id`, if it was added.
    pub fn weights_node(&self, id: WeightsId) -> Option<NodeId> {
        self.weight_nodes.get(&id).copied()
    }

    /// Returns whether gradients flow from `node` to some trainable tensor.
    pub fn requires_grad(&self, node: NodeId) -> bool {
        self.requires_grad.get(node.0).copied().unwrap_or(false)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node<'w>> {
        self.nodes.get(id.0).ok_or(MlErr::UnknownNode {
            node: id.0,
            len: self.nodes.len(),
        })
    }

    fn push(&mut self, node: Node<'w>, requires_grad: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.requires_grad.push(requires_grad);
        id
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::ops::MatrixSum;

    #[test]
    fn weights_are_added_once() {
        let w = Weights::new("w", array![[1.0]]);
        let mut graph = ComputationGraph::new();

        let a = graph.weights(3, &w);
        let b = graph.weights(3, &w);

        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.weights_node(3), Some(a));
    }

    #[test]
    fn requires_grad_propagates_from_weights() {
        let w = Weights::new("w", array![[1.0]]);
        let mut graph = ComputationGraph::new();

        let c1 = graph.constant(array![[1.0]]);
        let c2 = graph.constant(array![[2.0]]);
        let w = graph.weights(0, &w);
        let constants = graph.apply(MatrixSum, &[c1, c2]).unwrap();
        let mixed = graph.apply(MatrixSum, &[c1, w]).unwrap();

        assert!(!graph.requires_grad(constants));
        assert!(graph.requires_grad(mixed));
    }

    #[test]
    fn unknown_parents_are_rejected() {
        let mut graph = ComputationGraph::new();
        let c = graph.constant(array![[1.0]]);

        let result = graph.apply(MatrixSum, &[c, NodeId(7)]);

        assert!(matches!(result, Err(MlErr::UnknownNode { node: 7, len: 1 })));
    }
}
