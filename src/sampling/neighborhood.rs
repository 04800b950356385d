use std::collections::HashSet;

use rand::{Rng, rngs::StdRng};

use super::{random_step, seeded_rng};
use crate::{Result, graph::Graph};

/// Walk steps taken per requested sample before falling back to uniform sampling.
pub const DEFAULT_WALK_MULTIPLIER: usize = 3;

/// Uniform draws per requested sample before the fallback switches to a linear scan.
const REJECTION_DRAWS_PER_SAMPLE: usize = 4;

/// Samples distinct nodes around a start node.
///
/// Nodes are first collected along a truncated random walk, which favours structurally
/// close nodes. Any shortfall is filled by sampling uniformly over all node ids.
#[derive(Debug, Clone)]
pub struct NeighborhoodSampler {
    rng: StdRng,
    walk_multiplier: usize,
}

impl NeighborhoodSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: seeded_rng(seed),
            walk_multiplier: DEFAULT_WALK_MULTIPLIER,
        }
    }

    pub fn with_walk_multiplier(mut self, walk_multiplier: usize) -> Self {
        self.walk_multiplier = walk_multiplier;
        self
    }

    /// Samples up to `k` distinct nodes for which `is_invalid` returns `false`.
    ///
    /// # Arguments
    /// * `graph` - The graph to sample from.
    /// * `node` - The start of the walk.
    /// * `lower_bound_on_valid_samples_in_range` - A lower bound on the amount of valid
    ///   nodes in the whole graph, the uniform fallback never collects more than that.
    /// * `k` - The amount of nodes to sample.
    /// * `is_invalid` - Rejects candidates.
    ///
    /// # Returns
    /// Exactly `k` nodes whenever the graph holds at least `k` valid nodes and the lower
    /// bound is at least `k`, fewer otherwise, so never more nodes than the graph holds.
    /// An error on a negative relationship weight.
    pub fn sample<G, F>(
        &mut self,
        graph: &G,
        node: u64,
        lower_bound_on_valid_samples_in_range: u64,
        k: usize,
        is_invalid: F,
    ) -> Result<Vec<u64>>
    where
        G: Graph + ?Sized,
        F: Fn(u64) -> bool,
    {
        let node_count = graph.node_count();
        let k = k.min(usize::try_from(node_count).unwrap_or(usize::MAX));

        let mut sampled = Vec::with_capacity(k);
        let mut seen = HashSet::with_capacity(k);

        let mut take = |candidate: u64, sampled: &mut Vec<u64>| {
            if !is_invalid(candidate) && seen.insert(candidate) {
                sampled.push(candidate);
            }
        };

        let mut current = node;
        for _ in 0..self.walk_multiplier.saturating_mul(k) {
            if sampled.len() == k {
                return Ok(sampled);
            }

            match random_step(graph, current, &mut self.rng)? {
                Some(next) => {
                    take(next, &mut sampled);
                    current = next;
                }
                None if current == node => break,
                None => current = node,
            }
        }

        let bound = (k as u64).min(lower_bound_on_valid_samples_in_range) as usize;
        if sampled.len() >= bound || node_count == 0 {
            return Ok(sampled);
        }

        for _ in 0..REJECTION_DRAWS_PER_SAMPLE.saturating_mul(k) {
            if sampled.len() == bound {
                return Ok(sampled);
            }

            take(self.rng.random_range(0..node_count), &mut sampled);
        }

        let offset = self.rng.random_range(0..node_count);
        for i in 0..node_count {
            if sampled.len() == bound {
                break;
            }

            take((offset + i) % node_count, &mut sampled);
        }

        Ok(sampled)
    }
}
