use ndarray::{Array2, Zip};

use super::operands;
use crate::{
    Result,
    arch::{BackwardArgs, Operation, activations::ActFn},
};

/// Applies an activation function to every element.
#[derive(Debug, Clone, Copy)]
pub struct Activation {
    act_fn: ActFn,
}

impl Activation {
    pub fn new(act_fn: ActFn) -> Self {
        Self { act_fn }
    }
}

impl Operation for Activation {
    fn name(&self) -> &'static str {
        self.act_fn.name()
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [z] = operands(self.name(), inputs)?;
        Ok(z.mapv(|z| self.act_fn.f(z)))
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [z] = operands(self.name(), args.inputs)?;

        let dz = args.wants(0).then(|| {
            Zip::from(z)
                .and(args.upstream)
                .map_collect(|&z, &up| up * self.act_fn.df(z))
        });

        Ok(vec![dz])
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::ops::gradcheck;

    #[test]
    fn relu_clamps_negatives() {
        let z = array![[-1.0, 0.0, 2.0]];

        let out = Activation::new(ActFn::relu()).forward(&[&z]).unwrap();

        assert_eq!(out, array![[0.0, 0.0, 2.0]]);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let z = array![[-1.5, 0.3], [2.0, -0.2]];

        gradcheck::check(&Activation::new(ActFn::sigmoid()), &[z.clone()]);
        gradcheck::check(&Activation::new(ActFn::relu()), &[z]);
    }
}
