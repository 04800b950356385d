use ndarray::Array2;

use crate::{MlErr, Result};

/// The values available to an operation while computing the gradients of its inputs.
pub struct BackwardArgs<'a> {
    /// The forward values of the operation's parents, in declaration order.
    pub inputs: &'a [&'a Array2<f64>],
    /// The forward value of the operation itself.
    pub output: &'a Array2<f64>,
    /// The gradient of the root with respect to the operation's output, same shape as `output`.
    pub upstream: &'a Array2<f64>,
    /// Whether each parent needs a gradient at all.
    pub requires_grad: &'a [bool],
}

impl BackwardArgs<'_> {
    /// Returns whether the `i`-th parent needs a gradient.
    pub fn wants(&self, i: usize) -> bool {
        self.requires_grad.get(i).copied().unwrap_or(false)
    }

    /// Returns the upstream gradient of an operation with a `1×1` output.
    ///
    /// # Arguments
    /// * `what` - The name of the operation, used in the error.
    pub fn scalar_upstream(&self, what: &'static str) -> Result<f64> {
        match self.upstream.dim() {
            (1, 1) => Ok(self.upstream[[0, 0]]),
            got => Err(MlErr::ShapeMismatch {
                what,
                got,
                expected: (1, 1),
            }),
        }
    }
}

/// A differentiable function inside a `ComputationGraph`.
pub trait Operation: Send + Sync {
    /// A short name used in error messages and debugging output.
    fn name(&self) -> &'static str;

    /// Computes the value of this operation.
    ///
    /// # Arguments
    /// * `inputs` - The values of the parents, in declaration order.
    ///
    /// # Returns
    /// The output value or an error if the inputs have incompatible shapes.
    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>>;

    /// Computes the gradient of the root with respect to every parent.
    ///
    /// # Returns
    /// One entry per parent, `None` for the parents that don't require a gradient.
    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>>;
}
