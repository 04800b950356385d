use std::sync::Arc;

use super::Graph;
use crate::{Result, SageErr};

/// An immutable in-memory graph in compressed sparse row layout.
///
/// Copies share the underlying arrays.
#[derive(Debug, Clone)]
pub struct CsrGraph {
    offsets: Arc<[usize]>,
    targets: Arc<[u64]>,
    weights: Option<Arc<[f64]>>,
}

impl CsrGraph {
    fn range(&self, node: u64) -> std::ops::Range<usize> {
        let node = node as usize;
        match (self.offsets.get(node), self.offsets.get(node + 1)) {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Returns the amount of relationships stored, undirected ones count twice.
    pub fn relationship_count(&self) -> usize {
        self.targets.len()
    }
}

impl Graph for CsrGraph {
    fn node_count(&self) -> u64 {
        (self.offsets.len() - 1) as u64
    }

    fn degree(&self, node: u64) -> usize {
        self.range(node).len()
    }

    fn for_each_neighbor(&self, node: u64, f: &mut dyn FnMut(u64, f64) -> bool) {
        for i in self.range(node) {
            let weight = self.weights.as_ref().map_or(1., |w| w[i]);
            if !f(self.targets[i], weight) {
                break;
            }
        }
    }

    fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    fn concurrent_copy(&self) -> Self {
        self.clone()
    }

    fn nth_neighbor(&self, node: u64, index: usize) -> Option<(u64, f64)> {
        let range = self.range(node);
        let i = range.start + index;

        (i < range.end).then(|| (self.targets[i], self.weights.as_ref().map_or(1., |w| w[i])))
    }
}

/// Collects relationships and builds a `CsrGraph`.
#[derive(Debug)]
pub struct CsrGraphBuilder {
    node_count: u64,
    undirected: bool,
    weighted: bool,
    relationships: Vec<(u64, u64, f64)>,
}

impl CsrGraphBuilder {
    /// Creates a new `CsrGraphBuilder` for a graph of `node_count` nodes.
    pub fn new(node_count: u64) -> Self {
        Self {
            node_count,
            undirected: false,
            weighted: false,
            relationships: Vec::new(),
        }
    }

    /// Stores every relationship in both directions.
    pub fn undirected(mut self) -> Self {
        self.undirected = true;
        self
    }

    pub fn relationship(mut self, source: u64, target: u64) -> Self {
        self.relationships.push((source, target, 1.));
        self
    }

    /// Adds a weighted relationship, the built graph becomes weighted.
    pub fn weighted_relationship(mut self, source: u64, target: u64, weight: f64) -> Self {
        self.weighted = true;
        self.relationships.push((source, target, weight));
        self
    }

    /// Builds the graph, the neighbors of every node keep their insertion order.
    ///
    /// # Returns
    /// An error if a relationship references a node outside of `0..node_count`.
    pub fn build(self) -> Result<CsrGraph> {
        let node_count = self.node_count;

        if let Some(&(source, target, _)) = self
            .relationships
            .iter()
            .find(|(s, t, _)| *s >= node_count || *t >= node_count)
        {
            let node = if source >= node_count { source } else { target };
            return Err(SageErr::NodeOutOfRange { node, node_count });
        }

        let directed: Vec<_> = if self.undirected {
            self.relationships
                .iter()
                .flat_map(|&(s, t, w)| [(s, t, w), (t, s, w)])
                .collect()
        } else {
            self.relationships
        };

        let mut offsets = vec![0; node_count as usize + 1];
        for &(source, _, _) in &directed {
            offsets[source as usize + 1] += 1;
        }
        for i in 0..node_count as usize {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let mut targets = vec![0; directed.len()];
        let mut weights = vec![0.; directed.len()];

        for (source, target, weight) in directed {
            let slot = &mut cursor[source as usize];
            targets[*slot] = target;
            weights[*slot] = weight;
            *slot += 1;
        }

        Ok(CsrGraph {
            offsets: offsets.into(),
            targets: targets.into(),
            weights: self.weighted.then(|| weights.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbors(graph: &CsrGraph, node: u64) -> Vec<(u64, f64)> {
        let mut neighbors = Vec::new();
        graph.for_each_neighbor(node, &mut |t, w| {
            neighbors.push((t, w));
            true
        });
        neighbors
    }

    #[test]
    fn undirected_relationships_are_stored_twice() {
        let graph = CsrGraphBuilder::new(3)
            .undirected()
            .relationship(0, 1)
            .relationship(1, 2)
            .build()
            .unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.relationship_count(), 4);
        assert_eq!(neighbors(&graph, 1), [(0, 1.), (2, 1.)]);
        assert_eq!(graph.degree(0), 1);
        assert!(!graph.is_weighted());
    }

    #[test]
    fn weights_and_nth_neighbor() {
        let graph = CsrGraphBuilder::new(3)
            .weighted_relationship(0, 2, 0.5)
            .weighted_relationship(0, 1, 2.)
            .build()
            .unwrap();

        assert!(graph.is_weighted());
        assert_eq!(graph.nth_neighbor(0, 1), Some((1, 2.)));
        assert_eq!(graph.nth_neighbor(0, 2), None);
        assert_eq!(graph.degree(2), 0);
    }

    #[test]
    fn iteration_stops_early() {
        let graph = CsrGraphBuilder::new(4)
            .relationship(0, 1)
            .relationship(0, 2)
            .relationship(0, 3)
            .build()
            .unwrap();

        let mut visited = 0;
        graph.for_each_neighbor(0, &mut |_, _| {
            visited += 1;
            visited < 2
        });

        assert_eq!(visited, 2);
    }

    #[test]
    fn out_of_range_nodes_are_rejected() {
        let result = CsrGraphBuilder::new(2).relationship(0, 5).build();

        assert!(matches!(
            result,
            Err(SageErr::NodeOutOfRange {
                node: 5,
                node_count: 2
            })
        ));
    }
}
