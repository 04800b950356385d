use ndarray::Array2;

use super::operands;
use crate::{
    MlErr, Result,
    arch::{BackwardArgs, Operation},
};

/// `a · bᵀ`, the product of an `[n × k]` input and a `[m × k]` weight matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatMulTransB;

impl Operation for MatMulTransB {
    fn name(&self) -> &'static str {
        "matmul_transb"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [a, b] = operands(self.name(), inputs)?;

        if a.ncols() != b.ncols() {
            return Err(MlErr::ShapeMismatch {
                what: self.name(),
                got: b.dim(),
                expected: (b.nrows(), a.ncols()),
            });
        }

        Ok(a.dot(&b.t()))
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [a, b] = operands(self.name(), args.inputs)?;
        let up = args.upstream;

        let da = args.wants(0).then(|| up.dot(b));
        let db = args.wants(1).then(|| up.t().dot(a));

        Ok(vec![da, db])
    }
}
