use std::{cell::RefCell, rc::Rc};

use machine_learning::arch::{activations::ActFn, layers::Layer};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    config::{ActivationFunction, AggregatorType, LayerConfig},
};

/// Builds the layers of a model given their configuration.
///
/// Every layer draws its initial weights from one shared random number generator, in
/// layer order.
pub struct LayerFactory {
    rng: Rc<RefCell<StdRng>>,
}

impl LayerFactory {
    /// Creates a new `LayerFactory`.
    ///
    /// # Arguments
    /// * `seed` - An optional seed for the initial weights.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Self::generate_rng(seed),
        }
    }

    /// Builds one layer per configuration, in order.
    ///
    /// # Returns
    /// The layers or an error if an initializer can't be built for some dimensions.
    pub fn build(&self, configs: &[LayerConfig]) -> Result<Vec<Layer>> {
        configs
            .iter()
            .map(|config| self.resolve_layer(config))
            .collect()
    }

    /// Generates a random number generator given (or not) a seed.
    fn generate_rng(seed: Option<u64>) -> Rc<RefCell<StdRng>> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Rc::new(RefCell::new(rng))
    }

    fn resolve_act_fn(activation_function: ActivationFunction) -> ActFn {
        match activation_function {
            ActivationFunction::Sigmoid => ActFn::sigmoid(),
            ActivationFunction::Relu => ActFn::relu(),
        }
    }

    fn resolve_layer(&self, config: &LayerConfig) -> Result<Layer> {
        let LayerConfig {
            aggregator,
            activation_function,
            sample_size,
            input_dimension,
            output_dimension,
        } = *config;

        let act_fn = Self::resolve_act_fn(activation_function);
        let rng = self.rng.clone();

        let layer = match aggregator {
            AggregatorType::Mean => {
                Layer::mean(input_dimension, output_dimension, sample_size, act_fn, rng)?
            }
            AggregatorType::Pool => {
                Layer::pool(input_dimension, output_dimension, sample_size, act_fn, rng)?
            }
        };

        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainConfig;

    #[test]
    fn builds_the_configured_stack() {
        let config = TrainConfig {
            aggregator: AggregatorType::Pool,
            activation_function: ActivationFunction::Relu,
            sample_sizes: vec![4, 2],
            ..Default::default()
        };

        let layers = LayerFactory::new(Some(1))
            .build(&config.layer_configs(6))
            .unwrap();

        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0], Layer::Pool(_)));
        assert_eq!(layers[0].input_dim(), 6);
        assert_eq!(layers[1].input_dim(), 64);
        assert_eq!(layers[1].sample_size(), 2);
        assert_eq!(layers[1].act_fn(), ActFn::relu());
    }

    #[test]
    fn same_seed_same_weights() {
        let configs = TrainConfig::default().layer_configs(3);

        let a = LayerFactory::new(Some(9)).build(&configs).unwrap();
        let b = LayerFactory::new(Some(9)).build(&configs).unwrap();

        let weights = |layers: &[Layer]| -> Vec<_> {
            layers
                .iter()
                .flat_map(|l| l.weights())
                .map(|w| w.data().clone())
                .collect()
        };
        assert_eq!(weights(&a), weights(&b));
    }
}
