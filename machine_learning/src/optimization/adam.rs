use ndarray::{Array2, Zip};

use super::Optimizer;
use crate::{MlErr, Result, arch::Weights};

pub const DEFAULT_BETA1: f64 = 0.9;
pub const DEFAULT_BETA2: f64 = 0.999;
pub const DEFAULT_EPSILON: f64 = 1e-8;

#[derive(Debug)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    beta1_t: f64,
    beta2_t: f64,
    epsilon: f64,
    m: Vec<Array2<f64>>,
    v: Vec<Array2<f64>>,
}

impl Adam {
    /// Creates a new `Adam` optimizer with the usual hyperparameters.
    ///
    /// # Arguments
    /// * `shapes` - The shape of every tensor this instance updates, in update order.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    pub fn new<I>(shapes: I, learning_rate: f64) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        Self::with_hyperparameters(
            shapes,
            learning_rate,
            DEFAULT_BETA1,
            DEFAULT_BETA2,
            DEFAULT_EPSILON,
        )
    }

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `shapes` - The shape of every tensor this instance updates, in update order.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    pub fn with_hyperparameters<I>(
        shapes: I,
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    ) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let m: Vec<_> = shapes.into_iter().map(Array2::zeros).collect();
        let v = m.clone();

        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            epsilon,
            m,
            v,
        }
    }

    fn check_sizes(&self, weights: &[&mut Weights], grads: &[Array2<f64>]) -> Result<()> {
        for len in [weights.len(), grads.len()] {
            if len != self.m.len() {
                return Err(MlErr::SizeMismatch {
                    what: "optimized tensors",
                    got: len,
                    expected: self.m.len(),
                });
            }
        }

        for ((w, g), m) in weights.iter().zip(grads).zip(&self.m) {
            for dim in [w.dim(), g.dim()] {
                if dim != m.dim() {
                    return Err(MlErr::ShapeMismatch {
                        what: w.name(),
                        got: dim,
                        expected: m.dim(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl Optimizer for Adam {
    fn update_weights(
        &mut self,
        weights: &mut [&mut Weights],
        grads: &[Array2<f64>],
    ) -> Result<()> {
        self.check_sizes(weights, grads)?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;

        for (((w, g), m), v) in weights
            .iter_mut()
            .zip(grads)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            Zip::from(w.data_mut())
                .and(g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = b1 * *m + (1. - b1) * g;
                    *v = b2 * *v + (1. - b2) * g * g;
                    let m_hat = *m / bc1;
                    let v_hat = *v / bc2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }

        Ok(())
    }
}
