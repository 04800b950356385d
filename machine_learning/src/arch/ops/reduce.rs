use ndarray::{Array2, array};

use super::operands;
use crate::{
    Result,
    arch::{BackwardArgs, Operation},
};

/// Sums every element of every input into a `1x1` matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementSum;

impl Operation for ElementSum {
    fn name(&self) -> &'static str {
        "element_sum"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let sum = inputs.iter().map(|input| input.sum()).sum::<f64>();
        Ok(array![[sum]])
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let up = args.scalar_upstream(self.name())?;

        Ok(args
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| args.wants(i).then(|| Array2::from_elem(input.dim(), up)))
            .collect())
    }
}

/// Multiplies a matrix by a constant.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    factor: f64,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl Operation for Scale {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [x] = operands(self.name(), inputs)?;
        Ok(x * self.factor)
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        Ok(vec![args.wants(0).then(|| args.upstream * self.factor)])
    }
}

/// The squared Frobenius norm of a matrix, as a `1x1` matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct L2NormSquared;

impl Operation for L2NormSquared {
    fn name(&self) -> &'static str {
        "l2_norm_squared"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [x] = operands(self.name(), inputs)?;
        Ok(array![[x.iter().map(|v| v * v).sum::<f64>()]])
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [x] = operands(self.name(), args.inputs)?;
        let up = args.scalar_upstream(self.name())?;

        Ok(vec![args.wants(0).then(|| x * (2. * up))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ops::gradcheck;

    #[test]
    fn reductions_produce_scalars() {
        let x = array![[1.0, -2.0], [3.0, 0.5]];

        assert_eq!(ElementSum.forward(&[&x, &x]).unwrap(), array![[5.0]]);
        assert_eq!(L2NormSquared.forward(&[&x]).unwrap(), array![[14.25]]);
        assert_eq!(Scale::new(2.).forward(&[&x]).unwrap(), &x * 2.);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let x = array![[1.0, -2.0], [3.0, 0.5]];

        gradcheck::check(&ElementSum, &[x.clone(), array![[0.25]]]);
        gradcheck::check(&Scale::new(-0.3), &[x.clone()]);
        gradcheck::check(&L2NormSquared, &[x]);
    }
}
