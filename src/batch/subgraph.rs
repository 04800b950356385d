use std::{collections::HashMap, sync::Arc};

use machine_learning::arch::Adjacency;

use crate::{Result, graph::Graph, sampling::NeighborhoodSampler, training::TerminationFlag};

/// Maps global node ids to dense local ids, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct LocalIdMap {
    original_ids: Vec<u64>,
    local_ids: HashMap<u64, usize>,
}

impl LocalIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the local id of `original`, assigning the next free one if it's new.
    pub fn to_mapped(&mut self, original: u64) -> usize {
        *self.local_ids.entry(original).or_insert_with(|| {
            self.original_ids.push(original);
            self.original_ids.len() - 1
        })
    }

    /// Returns the global id of every local id, indexed by local id.
    pub fn original_ids(&self) -> &[u64] {
        &self.original_ids
    }

    pub fn len(&self) -> usize {
        self.original_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_ids.is_empty()
    }
}

/// The sampled neighborhood consumed by one layer for one batch.
///
/// Row `i` of the layer's output belongs to the `i`-th node the subgraph was built for,
/// the layer's input rows are the nodes listed by `original_ids`.
#[derive(Debug, Clone)]
pub struct SubGraph {
    adjacency: Arc<Adjacency>,
    original_ids: Vec<u64>,
}

impl SubGraph {
    /// Samples the neighborhood of every node in `nodes`.
    ///
    /// # Arguments
    /// * `graph` - The graph to sample from.
    /// * `nodes` - The nodes whose representation is computed, may repeat.
    /// * `sample_size` - The maximum amount of neighbors per node.
    /// * `sampler` - The neighborhood sampler.
    pub fn build<G: Graph + ?Sized>(
        graph: &G,
        nodes: &[u64],
        sample_size: usize,
        sampler: &mut NeighborhoodSampler,
    ) -> Result<Self> {
        let lower_bound = graph.node_count().saturating_sub(1);
        let mut id_map = LocalIdMap::new();

        let self_adjacency: Vec<_> = nodes.iter().map(|&n| id_map.to_mapped(n)).collect();

        let neighbors = nodes
            .iter()
            .map(|&node| {
                let sample = sampler.sample(graph, node, lower_bound, sample_size, |n| n == node)?;
                Ok(sample.into_iter().map(|n| id_map.to_mapped(n)).collect())
            })
            .collect::<Result<Vec<Vec<usize>>>>()?;

        Ok(Self {
            adjacency: Arc::new(Adjacency::new(self_adjacency, neighbors)?),
            original_ids: id_map.original_ids,
        })
    }

    /// Builds the subgraphs of every layer for the nodes of one batch.
    ///
    /// Layers are expanded from the last to the first, each one sampling around the input
    /// nodes of the next.
    ///
    /// # Arguments
    /// * `graph` - The graph to sample from.
    /// * `nodes` - The nodes whose embeddings are computed.
    /// * `sample_sizes` - The sample size of every layer, first layer first.
    /// * `sampler` - The neighborhood sampler.
    /// * `termination` - Polled before every layer.
    ///
    /// # Returns
    /// One subgraph per layer, first layer first.
    pub fn build_all<G: Graph + ?Sized>(
        graph: &G,
        nodes: &[u64],
        sample_sizes: &[usize],
        sampler: &mut NeighborhoodSampler,
        termination: &TerminationFlag,
    ) -> Result<Vec<Self>> {
        let mut subgraphs = Vec::with_capacity(sample_sizes.len());
        let mut frontier = nodes.to_vec();

        for &sample_size in sample_sizes.iter().rev() {
            termination.assert_running()?;

            let subgraph = Self::build(graph, &frontier, sample_size, sampler)?;
            frontier = subgraph.original_ids.clone();
            subgraphs.push(subgraph);
        }

        subgraphs.reverse();
        Ok(subgraphs)
    }

    pub fn adjacency(&self) -> Arc<Adjacency> {
        self.adjacency.clone()
    }

    /// Returns the global id of every input row.
    pub fn original_ids(&self) -> &[u64] {
        &self.original_ids
    }

    /// Returns the amount of output rows.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CsrGraphBuilder;

    #[test]
    fn local_ids_are_dense_and_stable() {
        let mut map = LocalIdMap::new();

        assert_eq!(map.to_mapped(40), 0);
        assert_eq!(map.to_mapped(7), 1);
        assert_eq!(map.to_mapped(40), 0);
        assert_eq!(map.original_ids(), [40, 7]);
    }

    #[test]
    fn layers_chain_through_original_ids() {
        let graph = CsrGraphBuilder::new(8)
            .undirected()
            .relationship(0, 1)
            .relationship(1, 2)
            .relationship(2, 3)
            .relationship(3, 4)
            .relationship(5, 6)
            .relationship(6, 7)
            .build()
            .unwrap();
        let mut sampler = NeighborhoodSampler::new(5);
        let nodes = [2, 6, 2];

        let subgraphs =
            SubGraph::build_all(&graph, &nodes, &[3, 2], &mut sampler, &TerminationFlag::running())
                .unwrap();

        let [first, last] = &subgraphs[..] else {
            panic!("expected two subgraphs");
        };

        assert_eq!(last.len(), nodes.len());
        assert_eq!(first.len(), last.original_ids().len());
        assert_eq!(&first.original_ids()[..first.len()], last.original_ids());

        for subgraph in &subgraphs {
            let adjacency = subgraph.adjacency();
            for row in 0..subgraph.len() {
                let own = adjacency.self_index(row);
                assert!(!adjacency.neighbors(row).contains(&own));
            }
            adjacency.check_bounds(subgraph.original_ids().len()).unwrap();
        }
    }

    #[test]
    fn termination_stops_the_build() {
        let graph = CsrGraphBuilder::new(2).relationship(0, 1).build().unwrap();
        let termination = TerminationFlag::running();
        termination.stop();

        let result = SubGraph::build_all(
            &graph,
            &[0],
            &[1],
            &mut NeighborhoodSampler::new(0),
            &termination,
        );

        assert!(matches!(result, Err(crate::SageErr::Terminated)));
    }
}
