use std::sync::Arc;

use log::{debug, info};
use machine_learning::{
    arch::{Weights, layers::Layer},
    optimization::{Adam, Optimizer},
};
use ndarray::Array2;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use super::{
    BatchTaskSupplier, EagerSupplier, EpochResult, LazySupplier, ProgressTracker, Subtask,
    TerminationFlag, TrainResult, TrainResultBuilder, average_gradients, mean_loss,
};
use crate::{
    Result, SageErr,
    batch::{Batches, ExtendedBatch},
    config::{LayerConfig, TrainConfig, validate_layers},
    graph::Graph,
    layer_factory::LayerFactory,
    loss::LossAssembler,
    sampling::split_seed,
};

/// Trains the layers of a GraphSAGE model with mini-batch gradient descent.
pub struct GraphSageTrainer {
    config: TrainConfig,
    random_seed: u64,
    progress: Arc<dyn ProgressTracker>,
    termination: TerminationFlag,
    pool: ThreadPool,
}

impl GraphSageTrainer {
    /// Creates a new `GraphSageTrainer`.
    ///
    /// # Arguments
    /// * `config` - The configuration of the run.
    /// * `progress` - Receives the progress of the run.
    /// * `termination` - Stops the run once stopped.
    ///
    /// # Returns
    /// An error if the configuration is invalid or the worker pool can't be created.
    pub fn new(
        config: TrainConfig,
        progress: Arc<dyn ProgressTracker>,
        termination: TerminationFlag,
    ) -> Result<Self> {
        config.validate()?;

        let random_seed = config.random_seed.unwrap_or_else(rand::random);
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.concurrency.get())
            .build()
            .map_err(|e| SageErr::ThreadPool(e.to_string()))?;

        Ok(Self {
            config,
            random_seed,
            progress,
            termination,
            pool,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Returns the seed of the run, drawn at random if none was configured.
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Trains a model with the given layers over `graph`.
    ///
    /// # Arguments
    /// * `graph` - The graph to train on.
    /// * `features` - One row per node.
    /// * `layer_configs` - The layers of the model, first layer first.
    ///
    /// # Returns
    /// The trained layers and the loss history, or an error if the input is invalid, the
    /// graph holds a negative relationship weight or the run was terminated.
    pub fn train<G: Graph>(
        &self,
        graph: &G,
        features: &Array2<f64>,
        layer_configs: &[LayerConfig],
    ) -> Result<TrainResult> {
        let node_count = graph.node_count();
        if node_count == 0 {
            return Err(SageErr::InvalidConfig("graph must have at least one node".into()));
        }

        if features.nrows() as u64 != node_count {
            return Err(SageErr::InvalidConfig(format!(
                "features have {} rows, expected one per node ({node_count})",
                features.nrows()
            )));
        }

        validate_layers(layer_configs, features.ncols())?;
        self.termination.assert_running()?;

        let mut layers = LayerFactory::new(Some(self.random_seed)).build(layer_configs)?;
        let sample_sizes: Vec<_> = layer_configs.iter().map(|l| l.sample_size).collect();

        let batches = self.prepare_batches(graph)?;
        let batches_per_iteration = self.config.batches_per_iteration(node_count);
        let max_iterations = self.config.max_iterations.get();
        let eager = max_iterations * batches_per_iteration > batches.len();

        let loss_fn = LossAssembler::new(
            self.config.negative_sample_weight,
            self.config.penalty_l2,
            node_count,
        );

        info!(
            node_count = node_count,
            batches = batches.len(),
            batches_per_iteration = batches_per_iteration;
            "training started"
        );

        let train_task = Subtask::begin(self.progress.as_ref(), "Train model");

        let mut builder = TrainResultBuilder::new();
        let mut previous_loss = f64::MAX;

        for epoch in 1..=self.config.epochs.get() {
            self.termination.assert_running()?;
            let epoch_task = Subtask::begin(self.progress.as_ref(), "Epoch");

            let epoch_seed = (epoch as u64).wrapping_add(self.random_seed);
            let mut supplier: Box<dyn BatchTaskSupplier + '_> = if eager {
                Box::new(EagerSupplier::new(
                    graph,
                    &batches,
                    &sample_sizes,
                    epoch_seed,
                    &self.termination,
                    &self.pool,
                )?)
            } else {
                Box::new(LazySupplier::new(
                    graph,
                    &batches,
                    &sample_sizes,
                    epoch_seed,
                    &self.termination,
                    &self.pool,
                ))
            };

            let shapes: Vec<_> = layers
                .iter()
                .flat_map(Layer::weights)
                .map(Weights::dim)
                .collect();
            let mut adam = Adam::new(shapes, self.config.learning_rate);

            let mut losses = Vec::with_capacity(max_iterations);
            let mut converged = false;

            for iteration in 1..=max_iterations {
                self.termination.assert_running()?;
                let iteration_task = Subtask::begin(self.progress.as_ref(), "Iteration");

                let tasks = supplier.next_tasks(batches_per_iteration)?;
                let termination = &self.termination;
                let model = &layers;
                let outcomes = self.pool.install(|| {
                    tasks
                        .par_iter()
                        .map(|task| {
                            termination.assert_running()?;
                            task.run(model, features, &loss_fn)
                        })
                        .collect::<Result<Vec<_>>>()
                })?;

                self.progress.log_progress(tasks.len());
                drop(iteration_task);

                let loss = mean_loss(&outcomes);
                losses.push(loss);
                self.progress.log_message(&format!("LOSS: {loss}"));
                debug!(epoch = epoch, iteration = iteration; "loss {loss}");

                if (previous_loss - loss).abs() < self.config.tolerance {
                    converged = true;
                    break;
                }
                previous_loss = loss;

                let grads = average_gradients(&outcomes)?;
                let mut weights: Vec<_> =
                    layers.iter_mut().flat_map(Layer::weights_mut).collect();
                adam.update_weights(&mut weights, &grads)?;
            }

            drop(epoch_task);
            info!(
                epoch = epoch,
                iterations = losses.len(),
                converged = converged;
                "epoch finished"
            );

            builder.add_epoch(EpochResult::new(losses, converged));
            if converged {
                break;
            }
        }

        drop(train_task);

        Ok(builder.build(layers))
    }

    /// Samples the extended batch of every batch of node ids on the worker pool.
    fn prepare_batches<G: Graph>(&self, graph: &G) -> Result<Vec<Arc<ExtendedBatch>>> {
        let ranges: Vec<_> = Batches::new(graph.node_count(), self.config.batch_size)
            .iter()
            .collect();
        let search_depth = self.config.search_depth.get();
        let random_seed = self.random_seed;
        let termination = &self.termination;
        let progress = &self.progress;

        let prepare_task = Subtask::begin(progress.as_ref(), "Prepare batches");

        let batches = self.pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map_init(
                    || graph.concurrent_copy(),
                    |graph, (i, range)| -> Result<Arc<ExtendedBatch>> {
                        termination.assert_running()?;

                        let seed = split_seed(random_seed, i as u64);
                        let batch = ExtendedBatch::sample(&*graph, range, search_depth, seed)?;
                        progress.log_progress(1);

                        Ok(Arc::new(batch))
                    },
                )
                .collect::<Result<Vec<_>>>()
        })?;

        drop(prepare_task);
        debug!(batches = batches.len(); "prepared batches");

        Ok(batches)
    }
}
