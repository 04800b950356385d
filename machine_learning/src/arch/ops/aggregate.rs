use std::sync::Arc;

use ndarray::Array2;

use super::operands;
use crate::{
    Result,
    arch::{Adjacency, BackwardArgs, Operation},
};

/// Averages every node's own row with the rows of its neighbors.
///
/// Output row `i` is the mean of `input[self_index(i)]` and `input[neighbors(i)]`.
#[derive(Debug, Clone)]
pub struct MeanAggregate {
    adjacency: Arc<Adjacency>,
}

impl MeanAggregate {
    pub fn new(adjacency: Arc<Adjacency>) -> Self {
        Self { adjacency }
    }
}

impl Operation for MeanAggregate {
    fn name(&self) -> &'static str {
        "mean_aggregate"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [x] = operands(self.name(), inputs)?;
        let adjacency = &self.adjacency;
        adjacency.check_bounds(x.nrows())?;

        let mut means = Array2::zeros((adjacency.len(), x.ncols()));

        for (i, mut row) in means.rows_mut().into_iter().enumerate() {
            let neighbors = adjacency.neighbors(i);

            row += &x.row(adjacency.self_index(i));
            for &neighbor in neighbors {
                row += &x.row(neighbor);
            }

            row /= (neighbors.len() + 1) as f64;
        }

        Ok(means)
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [x] = operands(self.name(), args.inputs)?;
        if !args.wants(0) {
            return Ok(vec![None]);
        }

        let adjacency = &self.adjacency;
        let mut grad = Array2::zeros(x.dim());

        for (i, up) in args.upstream.rows().into_iter().enumerate() {
            let neighbors = adjacency.neighbors(i);
            let share = 1. / (neighbors.len() + 1) as f64;

            grad.row_mut(adjacency.self_index(i)).scaled_add(share, &up);
            for &neighbor in neighbors {
                grad.row_mut(neighbor).scaled_add(share, &up);
            }
        }

        Ok(vec![Some(grad)])
    }
}

/// Element-wise maximum over the rows of every node's neighbors.
///
/// A node without neighbors aggregates to a zero row.
#[derive(Debug, Clone)]
pub struct ElementwiseMax {
    adjacency: Arc<Adjacency>,
}

impl ElementwiseMax {
    pub fn new(adjacency: Arc<Adjacency>) -> Self {
        Self { adjacency }
    }

    /// Returns, for output row `row` and column `col`, the input row holding the maximum.
    fn argmax(&self, x: &Array2<f64>, row: usize, col: usize) -> Option<usize> {
        self.adjacency
            .neighbors(row)
            .iter()
            .copied()
            .reduce(|best, n| if x[[n, col]] > x[[best, col]] { n } else { best })
    }
}

impl Operation for ElementwiseMax {
    fn name(&self) -> &'static str {
        "elementwise_max"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [x] = operands(self.name(), inputs)?;
        self.adjacency.check_bounds(x.nrows())?;

        Ok(Array2::from_shape_fn(
            (self.adjacency.len(), x.ncols()),
            |(row, col)| {
                self.argmax(x, row, col)
                    .map_or(0., |argmax| x[[argmax, col]])
            },
        ))
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [x] = operands(self.name(), args.inputs)?;
        if !args.wants(0) {
            return Ok(vec![None]);
        }

        let mut grad = Array2::zeros(x.dim());

        for ((row, col), &up) in args.upstream.indexed_iter() {
            if let Some(argmax) = self.argmax(x, row, col) {
                grad[[argmax, col]] += up;
            }
        }

        Ok(vec![Some(grad)])
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{MlErr, arch::ops::gradcheck};

    fn adjacency() -> Arc<Adjacency> {
        let adjacency = Adjacency::new(vec![0, 1, 2], vec![vec![1, 3], vec![], vec![0, 1, 3]]);
        Arc::new(adjacency.unwrap())
    }

    fn input() -> Array2<f64> {
        array![[1.0, -4.0], [3.0, 2.5], [-2.0, 0.5], [0.75, 6.0]]
    }

    #[test]
    fn mean_includes_the_node_itself() {
        let out = MeanAggregate::new(adjacency()).forward(&[&input()]).unwrap();

        assert_eq!(
            out,
            array![
                [(1.0 + 3.0 + 0.75) / 3., (-4.0 + 2.5 + 6.0) / 3.],
                [3.0, 2.5],
                [(-2.0 + 1.0 + 3.0 + 0.75) / 4., (0.5 - 4.0 + 2.5 + 6.0) / 4.],
            ]
        );
    }

    #[test]
    fn max_takes_neighbors_only() {
        let out = ElementwiseMax::new(adjacency()).forward(&[&input()]).unwrap();

        assert_eq!(out, array![[3.0, 6.0], [0.0, 0.0], [3.0, 6.0]]);
    }

    #[test]
    fn out_of_bounds_neighbors_are_rejected() {
        let adjacency = Arc::new(Adjacency::new(vec![0], vec![vec![9]]).unwrap());

        let result = MeanAggregate::new(adjacency).forward(&[&input()]);

        assert!(matches!(result, Err(MlErr::IndexOutOfBounds { index: 9, .. })));
    }

    #[test]
    fn gradients_match_finite_differences() {
        gradcheck::check(&MeanAggregate::new(adjacency()), &[input()]);
        gradcheck::check(&ElementwiseMax::new(adjacency()), &[input()]);
    }
}
