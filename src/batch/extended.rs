use std::ops::Range;

use rand::Rng;

use crate::{
    Result, SageErr,
    graph::Graph,
    sampling::{positive_sample, seeded_rng},
};

/// A batch of `(target, positive, negative)` node triples, stored flat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedBatch {
    ids: Vec<u64>,
}

impl ExtendedBatch {
    /// Samples the positive and negative node of every target in `batch`.
    ///
    /// # Arguments
    /// * `graph` - The graph to sample from.
    /// * `batch` - The target nodes.
    /// * `search_depth` - The maximum length of the walks reaching positive nodes.
    /// * `seed` - Seeds every random choice of this batch.
    ///
    /// # Returns
    /// An error if a walk meets a negative relationship weight.
    pub fn sample<G: Graph + ?Sized>(
        graph: &G,
        batch: Range<u64>,
        search_depth: usize,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = seeded_rng(seed);
        let node_count = graph.node_count();

        let mut ids = Vec::with_capacity(3 * batch.end.saturating_sub(batch.start) as usize);
        for target in batch {
            if target >= node_count {
                return Err(SageErr::NodeOutOfRange { node: target, node_count });
            }

            let positive = positive_sample(graph, target, search_depth, &mut rng)?;
            let negative = negative_sample(node_count, target, &mut rng);
            ids.extend([target, positive, negative]);
        }

        Ok(Self { ids })
    }

    /// Wraps already sampled triples.
    ///
    /// # Returns
    /// An error if `ids` isn't made of whole triples.
    pub fn from_triples(ids: Vec<u64>) -> Result<Self> {
        if ids.len() % 3 != 0 {
            return Err(SageErr::MalformedBatch { len: ids.len() });
        }

        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the amount of target nodes in this batch.
    pub fn original_batch_size(&self) -> usize {
        self.ids.len() / 3
    }

    pub fn triples(&self) -> impl Iterator<Item = (u64, u64, u64)> + '_ {
        self.ids.chunks_exact(3).map(|t| (t[0], t[1], t[2]))
    }
}

/// Draws a node uniformly among every node but `target`.
fn negative_sample<R: Rng + ?Sized>(node_count: u64, target: u64, rng: &mut R) -> u64 {
    if node_count <= 1 {
        return target;
    }

    let candidate = rng.random_range(0..node_count - 1);
    if candidate >= target { candidate + 1 } else { candidate }
}
