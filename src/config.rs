use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{Result, SageErr};

const DEFAULT_EMBEDDING_DIMENSION: NonZeroUsize = NonZeroUsize::new(64).unwrap();
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_MAX_ITERATIONS: NonZeroUsize = NonZeroUsize::new(10).unwrap();
const DEFAULT_SEARCH_DEPTH: NonZeroUsize = NonZeroUsize::new(5).unwrap();
const DEFAULT_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(4).unwrap();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorType {
    #[default]
    Mean,
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[default]
    Sigmoid,
    Relu,
}

/// The structure of one layer of the embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub aggregator: AggregatorType,
    pub activation_function: ActivationFunction,
    pub sample_size: usize,
    pub input_dimension: usize,
    pub output_dimension: usize,
}

/// Every knob of a training run.
///
/// Counts that can never be zero are `NonZeroUsize`, the remaining constraints are checked
/// by `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub embedding_dimension: NonZeroUsize,
    pub aggregator: AggregatorType,
    pub activation_function: ActivationFunction,
    /// One entry per layer, the maximum amount of neighbors sampled per node.
    pub sample_sizes: Vec<usize>,
    pub batch_size: NonZeroUsize,
    pub learning_rate: f64,
    pub epochs: NonZeroUsize,
    pub max_iterations: NonZeroUsize,
    /// Training stops once two consecutive iteration losses are closer than this.
    pub tolerance: f64,
    /// The maximum length of the walks that reach positive samples.
    pub search_depth: NonZeroUsize,
    pub negative_sample_weight: f64,
    pub penalty_l2: f64,
    /// The share of batches used per iteration, derived from the graph size when `None`.
    pub batch_sampling_ratio: Option<f64>,
    pub concurrency: NonZeroUsize,
    pub random_seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            aggregator: AggregatorType::Mean,
            activation_function: ActivationFunction::Sigmoid,
            sample_sizes: vec![25, 10],
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: 0.1,
            epochs: NonZeroUsize::MIN,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: 1e-4,
            search_depth: DEFAULT_SEARCH_DEPTH,
            negative_sample_weight: 20.,
            penalty_l2: 0.,
            batch_sampling_ratio: None,
            concurrency: DEFAULT_CONCURRENCY,
            random_seed: None,
        }
    }
}

impl TrainConfig {
    /// Checks the constraints the field types can't express.
    ///
    /// # Returns
    /// An `InvalidConfig` error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.sample_sizes.is_empty() {
            return Err(invalid("sample_sizes must have at least one entry"));
        }

        if let Some(i) = self.sample_sizes.iter().position(|&s| s == 0) {
            return Err(invalid(format!(
                "sample_sizes[{i}] must be greater than 0"
            )));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(invalid(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }

        if !(self.tolerance.is_finite() && self.tolerance >= 0.) {
            return Err(invalid(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }

        if !(self.negative_sample_weight.is_finite() && self.negative_sample_weight > 0.) {
            return Err(invalid(format!(
                "negative_sample_weight must be positive, got {}",
                self.negative_sample_weight
            )));
        }

        if !(self.penalty_l2.is_finite() && self.penalty_l2 >= 0.) {
            return Err(invalid(format!(
                "penalty_l2 must be non-negative, got {}",
                self.penalty_l2
            )));
        }

        if let Some(ratio) = self
            .batch_sampling_ratio
            .filter(|&ratio| !(ratio > 0. && ratio <= 1.))
        {
            return Err(invalid(format!(
                "batch_sampling_ratio must be in (0, 1], got {ratio}"
            )));
        }

        Ok(())
    }

    /// Derives the layer stack described by this configuration.
    ///
    /// # Arguments
    /// * `feature_dimension` - The width of the node features fed to the first layer.
    pub fn layer_configs(&self, feature_dimension: usize) -> Vec<LayerConfig> {
        let embedding_dimension = self.embedding_dimension.get();

        self.sample_sizes
            .iter()
            .enumerate()
            .map(|(i, &sample_size)| LayerConfig {
                aggregator: self.aggregator,
                activation_function: self.activation_function,
                sample_size,
                input_dimension: if i == 0 {
                    feature_dimension
                } else {
                    embedding_dimension
                },
                output_dimension: embedding_dimension,
            })
            .collect()
    }

    /// Returns the amount of batches the node ids are split into.
    pub fn batch_count(&self, node_count: u64) -> usize {
        (node_count as usize).div_ceil(self.batch_size.get())
    }

    /// Returns the configured batch sampling ratio, or one derived from the graph size
    /// such that an iteration keeps every worker busy with one batch.
    pub fn batch_sampling_ratio(&self, node_count: u64) -> f64 {
        self.batch_sampling_ratio.unwrap_or_else(|| {
            let sampled = (self.batch_size.get() * self.concurrency.get()) as f64;
            (sampled / node_count.max(1) as f64).min(1.)
        })
    }

    /// Returns the amount of batches trained on per iteration, at least one.
    pub fn batches_per_iteration(&self, node_count: u64) -> usize {
        let batch_count = self.batch_count(node_count);
        let batches = (self.batch_sampling_ratio(node_count) * batch_count as f64).ceil() as usize;

        batches.clamp(1, batch_count.max(1))
    }
}

/// Checks that a layer stack can be fed with features of `feature_dimension` columns.
///
/// # Arguments
/// * `layers` - The layer stack, outermost first.
/// * `feature_dimension` - The width of the node features.
pub fn validate_layers(layers: &[LayerConfig], feature_dimension: usize) -> Result<()> {
    let Some(first) = layers.first() else {
        return Err(invalid("model must have at least one layer"));
    };

    if first.input_dimension != feature_dimension {
        return Err(invalid(format!(
            "layer 0: input size ({}) does not match feature size ({feature_dimension})",
            first.input_dimension
        )));
    }

    for (i, layer) in layers.iter().enumerate() {
        if layer.sample_size == 0 {
            return Err(invalid(format!("layer {i}: sample_size must be greater than 0")));
        }

        if layer.input_dimension == 0 || layer.output_dimension == 0 {
            return Err(invalid(format!(
                "layer {i}: dimensions must be greater than 0"
            )));
        }
    }

    for (i, pair) in layers.windows(2).enumerate() {
        let (prev, curr) = (pair[0].output_dimension, pair[1].input_dimension);
        if prev != curr {
            return Err(invalid(format!(
                "layer {}: input size ({curr}) does not match previous layer output size ({prev})",
                i + 1
            )));
        }
    }

    Ok(())
}

fn invalid(msg: impl Into<String>) -> SageErr {
    SageErr::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonzero(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = TrainConfig::default();

        config.validate().unwrap();
        assert_eq!(config.embedding_dimension.get(), 64);
        assert_eq!(config.sample_sizes, [25, 10]);
        assert_eq!(config.epochs.get(), 1);
    }

    #[test]
    fn invalid_fields_are_named() {
        let cases = [
            TrainConfig {
                learning_rate: 0.,
                ..Default::default()
            },
            TrainConfig {
                tolerance: -1.,
                ..Default::default()
            },
            TrainConfig {
                penalty_l2: f64::NAN,
                ..Default::default()
            },
            TrainConfig {
                batch_sampling_ratio: Some(1.5),
                ..Default::default()
            },
            TrainConfig {
                sample_sizes: vec![3, 0],
                ..Default::default()
            },
            TrainConfig {
                negative_sample_weight: 0.,
                ..Default::default()
            },
        ];
        let fields = [
            "learning_rate",
            "tolerance",
            "penalty_l2",
            "batch_sampling_ratio",
            "sample_sizes[1]",
            "negative_sample_weight",
        ];

        for (config, field) in cases.iter().zip(fields) {
            match config.validate() {
                Err(SageErr::InvalidConfig(msg)) => assert!(msg.contains(field), "{msg}"),
                other => panic!("expected an invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn layer_stack_chains_dimensions() {
        let config = TrainConfig {
            embedding_dimension: nonzero(8),
            sample_sizes: vec![5, 3, 2],
            ..Default::default()
        };

        let layers = config.layer_configs(12);

        let dims: Vec<_> = layers
            .iter()
            .map(|l| (l.input_dimension, l.output_dimension, l.sample_size))
            .collect();
        assert_eq!(dims, [(12, 8, 5), (8, 8, 3), (8, 8, 2)]);
        validate_layers(&layers, 12).unwrap();
    }

    #[test]
    fn mis_chained_layers_are_rejected() {
        let mut layers = TrainConfig::default().layer_configs(4);
        layers[1].input_dimension = 3;

        assert!(validate_layers(&layers, 4).is_err());
        assert!(validate_layers(&layers[..1], 5).is_err());
        assert!(validate_layers(&[], 4).is_err());
    }

    #[test]
    fn batches_per_iteration_follows_the_sampling_ratio() {
        let config = TrainConfig {
            batch_size: nonzero(10),
            concurrency: nonzero(2),
            ..Default::default()
        };

        assert_eq!(config.batch_count(95), 10);
        assert_eq!(config.batch_sampling_ratio(95), 20. / 95.);
        assert_eq!(config.batches_per_iteration(95), 3);

        let config = TrainConfig {
            batch_sampling_ratio: Some(0.5),
            ..config
        };
        assert_eq!(config.batches_per_iteration(95), 5);

        let small = TrainConfig::default();
        assert_eq!(small.batch_count(7), 1);
        assert_eq!(small.batch_sampling_ratio(7), 1.);
        assert_eq!(small.batches_per_iteration(7), 1);
    }
}
