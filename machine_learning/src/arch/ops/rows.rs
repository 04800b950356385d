use std::sync::Arc;

use ndarray::{Array2, Axis, Zip};

use super::operands;
use crate::{
    MlErr, Result,
    arch::{BackwardArgs, Operation},
};

/// Gathers a list of rows, rows may repeat.
#[derive(Debug, Clone)]
pub struct Slice {
    rows: Arc<[usize]>,
}

impl Slice {
    pub fn new(rows: impl Into<Arc<[usize]>>) -> Self {
        Self { rows: rows.into() }
    }
}

impl Operation for Slice {
    fn name(&self) -> &'static str {
        "slice"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [x] = operands(self.name(), inputs)?;

        if let Some(&index) = self.rows.iter().find(|&&r| r >= x.nrows()) {
            return Err(MlErr::IndexOutOfBounds {
                what: self.name(),
                index,
                len: x.nrows(),
            });
        }

        Ok(x.select(Axis(0), &self.rows))
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [x] = operands(self.name(), args.inputs)?;
        if !args.wants(0) {
            return Ok(vec![None]);
        }

        let mut grad = Array2::zeros(x.dim());
        for (&row, up) in self.rows.iter().zip(args.upstream.rows()) {
            grad.row_mut(row).scaled_add(1., &up);
        }

        Ok(vec![Some(grad)])
    }
}

/// Scales every row to unit euclidean length, zero rows are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeRows;

impl Operation for NormalizeRows {
    fn name(&self) -> &'static str {
        "normalize_rows"
    }

    fn forward(&self, inputs: &[&Array2<f64>]) -> Result<Array2<f64>> {
        let [x] = operands(self.name(), inputs)?;
        let mut normalized = x.clone();

        for mut row in normalized.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 0. {
                row /= norm;
            }
        }

        Ok(normalized)
    }

    fn backward(&self, args: BackwardArgs<'_>) -> Result<Vec<Option<Array2<f64>>>> {
        let [x] = operands(self.name(), args.inputs)?;
        if !args.wants(0) {
            return Ok(vec![None]);
        }

        let mut grad = Array2::zeros(x.dim());

        Zip::from(grad.rows_mut())
            .and(x.rows())
            .and(args.output.rows())
            .and(args.upstream.rows())
            .for_each(|mut grad, x, y, up| {
                let norm = x.dot(&x).sqrt();
                if norm > 0. {
                    let projection = up.dot(&y);
                    grad.assign(&((&up - &(&y * projection)) / norm));
                }
            });

        Ok(vec![Some(grad)])
    }
}
