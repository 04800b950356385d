use std::sync::Arc;

use rand::{Rng, rngs::StdRng};
use rayon::{ThreadPool, prelude::*};

use super::{BatchTask, TerminationFlag};
use crate::{
    Result,
    batch::ExtendedBatch,
    graph::Graph,
    sampling::{seeded_rng, split_seed},
};

/// Hands out the batch tasks of every iteration of an epoch.
pub trait BatchTaskSupplier {
    /// Returns `count` tasks drawn at random, the same task may be returned more than once.
    fn next_tasks(&mut self, count: usize) -> Result<Vec<Arc<BatchTask>>>;
}

/// Builds every task of the epoch up front and draws from them.
pub struct EagerSupplier {
    tasks: Vec<Arc<BatchTask>>,
    rng: StdRng,
}

impl EagerSupplier {
    /// Creates a new `EagerSupplier`, building one task per batch on `pool`.
    ///
    /// # Arguments
    /// * `graph` - The graph to sample from, every worker samples from its own copy.
    /// * `batches` - The extended batches of the run.
    /// * `sample_sizes` - The sample size of every layer, first layer first.
    /// * `epoch_seed` - Seeds the tasks and the draws.
    /// * `termination` - Polled before every task.
    /// * `pool` - The worker pool the tasks are built on.
    pub fn new<G: Graph>(
        graph: &G,
        batches: &[Arc<ExtendedBatch>],
        sample_sizes: &[usize],
        epoch_seed: u64,
        termination: &TerminationFlag,
        pool: &ThreadPool,
    ) -> Result<Self> {
        let tasks = pool.install(|| {
            batches
                .par_iter()
                .enumerate()
                .map_init(
                    || graph.concurrent_copy(),
                    |graph, (i, batch)| -> Result<Arc<BatchTask>> {
                        termination.assert_running()?;

                        let seed = split_seed(epoch_seed, i as u64);
                        let batch = batch.clone();
                        let task =
                            BatchTask::build(&*graph, batch, sample_sizes, seed, termination)?;
                        Ok(Arc::new(task))
                    },
                )
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(Self {
            tasks,
            rng: seeded_rng(epoch_seed),
        })
    }
}

impl BatchTaskSupplier for EagerSupplier {
    fn next_tasks(&mut self, count: usize) -> Result<Vec<Arc<BatchTask>>> {
        if self.tasks.is_empty() {
            return Ok(Vec::new());
        }

        Ok((0..count)
            .map(|_| self.tasks[self.rng.random_range(0..self.tasks.len())].clone())
            .collect())
    }
}

/// Builds fresh tasks for every iteration.
pub struct LazySupplier<'a, G> {
    graph: &'a G,
    batches: &'a [Arc<ExtendedBatch>],
    sample_sizes: &'a [usize],
    termination: &'a TerminationFlag,
    pool: &'a ThreadPool,
    rng: StdRng,
}

impl<'a, G: Graph> LazySupplier<'a, G> {
    /// Creates a new `LazySupplier`.
    ///
    /// Takes the same arguments as `EagerSupplier::new`, nothing is built until
    /// `next_tasks` is called.
    pub fn new(
        graph: &'a G,
        batches: &'a [Arc<ExtendedBatch>],
        sample_sizes: &'a [usize],
        epoch_seed: u64,
        termination: &'a TerminationFlag,
        pool: &'a ThreadPool,
    ) -> Self {
        Self {
            graph,
            batches,
            sample_sizes,
            termination,
            pool,
            rng: seeded_rng(epoch_seed),
        }
    }
}

impl<G: Graph> BatchTaskSupplier for LazySupplier<'_, G> {
    fn next_tasks(&mut self, count: usize) -> Result<Vec<Arc<BatchTask>>> {
        if self.batches.is_empty() {
            return Ok(Vec::new());
        }

        let draws: Vec<(usize, u64)> = (0..count)
            .map(|_| {
                let index = self.rng.random_range(0..self.batches.len());
                (index, self.rng.random())
            })
            .collect();

        let Self {
            graph,
            batches,
            sample_sizes,
            termination,
            ..
        } = *self;

        self.pool.install(|| {
            draws
                .into_par_iter()
                .map_init(
                    || graph.concurrent_copy(),
                    |graph, (index, seed)| -> Result<Arc<BatchTask>> {
                        termination.assert_running()?;

                        let batch = batches[index].clone();
                        let task =
                            BatchTask::build(&*graph, batch, sample_sizes, seed, termination)?;
                        Ok(Arc::new(task))
                    },
                )
                .collect()
        })
    }
}
