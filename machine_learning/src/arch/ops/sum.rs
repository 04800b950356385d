use ndarray::{Array2, Axis};

use super::{operands, same_shape};
use crate::{
    MlErr, Result,
    arch::{BackwardArgs, Operation},
};

/// Element-wise sum of any amount of equally shaped matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixSum;

impl Operation for MatrixSum {
    fn name(&self) -> &'static str {
        "matrix_sum"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let Some((first, rest)) = inputs.split_first() else {
            return Err(MlErr::SizeMismatch {
                what: self.name(),
                got: 0,
                expected: 1,
            });
        };

        let mut sum = (*first).clone();
        for input in rest {
            same_shape(self.name(), input, first)?;
            sum += *input;
        }

        Ok(sum)
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        Ok((0..args.inputs.len())
            .map(|i| args.wants(i).then(|| args.upstream.clone()))
            .collect())
    }
}

/// Adds a `[1 × m]` bias to every row of an `[n × m]` matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddBias;

impl Operation for AddBias {
    fn name(&self) -> &'static str {
        "add_bias"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [matrix, bias] = operands(self.name(), inputs)?;

        if bias.dim() != (1, matrix.ncols()) {
            return Err(MlErr::ShapeMismatch {
                what: self.name(),
                got: bias.dim(),
                expected: (1, matrix.ncols()),
            });
        }

        Ok(matrix + bias)
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let up = args.upstream;

        let dmatrix = args.wants(0).then(|| up.clone());
        let dbias = args.wants(1).then(|| up.sum_axis(Axis(0)).insert_axis(Axis(0)));

        Ok(vec![dmatrix, dbias])
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::ops::gradcheck;

    #[test]
    fn sums_every_input() {
        let a = array![[1.0, 2.0]];
        let b = array![[3.0, 4.0]];

        let out = MatrixSum.forward(&[&a, &b, &a]).unwrap();

        assert_eq!(out, array![[5.0, 8.0]]);
    }

    #[test]
    fn sum_rejects_mismatched_shapes() {
        let a = array![[1.0, 2.0]];
        let b = array![[3.0], [4.0]];

        assert!(MatrixSum.forward(&[&a, &b]).is_err());
    }

    #[test]
    fn bias_is_broadcast_over_rows() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        let bias = array![[10.0, 20.0]];

        let out = AddBias.forward(&[&m, &bias]).unwrap();

        assert_eq!(out, array![[11.0, 22.0], [13.0, 24.0]]);
    }

    #[test]
    fn gradients_match_finite_differences() {
        gradcheck::check(&MatrixSum, &[array![[1.0, -2.0]], array![[0.5, 0.25]]]);
        gradcheck::check(
            &AddBias,
            &[array![[1.0, -2.0], [0.3, 0.7], [2.0, 1.0]], array![[0.5, 0.25]]],
        );
    }
}
