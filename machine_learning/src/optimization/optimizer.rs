use ndarray::Array2;

use crate::{Result, arch::Weights};

pub trait Optimizer {
    /// Updates the parameters according to the algorithm's learning rule.
    ///
    /// # Arguments
    /// * `weights` - The tensors that are going to be modified.
    /// * `grads` - One gradient per tensor, in the same order.
    ///
    /// # Returns
    /// An error if the amount or the shapes of the gradients don't match the tensors.
    fn update_weights(
        &mut self,
        weights: &mut [&mut Weights],
        grads: &[Array2<f64>],
    ) -> Result<()>;
}
