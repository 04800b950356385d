mod activation;
mod aggregate;
mod matmul;
mod reduce;
mod rows;
mod sum;

pub use activation::Activation;
pub use aggregate::{ElementwiseMax, MeanAggregate};
pub use matmul::MatMulTransB;
pub use reduce::{ElementSum, L2NormSquared, Scale};
pub use rows::{NormalizeRows, Slice};
pub use sum::{AddBias, MatrixSum};

use ndarray::Array2;

use crate::{MlErr, Result};

/// Destructures the inputs of an operation that takes exactly `N` operands.
fn operands<'a, const N: usize>(
    what: &'static str,
    inputs: &[&'a Array2<f64>],
) -> Result<[&'a Array2<f64>; N]> {
    inputs.try_into().map_err(|_| MlErr::SizeMismatch {
        what,
        got: inputs.len(),
        expected: N,
    })
}

fn same_shape(what: &'static str, got: &Array2<f64>, expected: &Array2<f64>) -> Result<()> {
    if got.dim() != expected.dim() {
        return Err(MlErr::ShapeMismatch {
            what,
            got: got.dim(),
            expected: expected.dim(),
        });
    }

    Ok(())
}
