use ndarray::Array2;

use crate::{MlErr, Result, initialization::ParamGen};

/// Whether a parameter tensor is a weight matrix or a bias vector.
///
/// Biases are excluded from weight regularization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsKind {
    Weight,
    Bias,
}

/// A named trainable parameter tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    name: &'static str,
    kind: WeightsKind,
    data: Array2<f64>,
}

impl Weights {
    /// Creates a new weight matrix.
    ///
    /// # Arguments
    /// * `name` - A human readable name, unique within its layer.
    /// * `data` - The initial values.
    pub fn new(name: &'static str, data: Array2<f64>) -> Self {
        Self {
            name,
            kind: WeightsKind::Weight,
            data,
        }
    }

    /// Creates a new bias vector, stored as a single row.
    ///
    /// # Arguments
    /// * `name` - A human readable name, unique within its layer.
    /// * `data` - The initial values, must have exactly one row.
    ///
    /// # Returns
    /// An error if `data` has more than one row.
    pub fn bias(name: &'static str, data: Array2<f64>) -> Result<Self> {
        if data.nrows() != 1 {
            return Err(MlErr::ShapeMismatch {
                what: "bias",
                got: data.dim(),
                expected: (1, data.ncols()),
            });
        }

        Ok(Self {
            name,
            kind: WeightsKind::Bias,
            data,
        })
    }

    /// Samples the initial values of a `(rows, cols)` tensor from a parameter generator.
    ///
    /// # Arguments
    /// * `name` - A human readable name, unique within its layer.
    /// * `kind` - Whether the tensor is a weight matrix or a bias.
    /// * `dim` - The shape of the tensor.
    /// * `param_gen` - The generator of the initial values.
    ///
    /// # Returns
    /// An error if the generator is exhausted before filling the tensor.
    pub fn generate<G>(
        name: &'static str,
        kind: WeightsKind,
        dim: (usize, usize),
        param_gen: &mut G,
    ) -> Result<Self>
    where
        G: ParamGen + ?Sized,
    {
        let expected = dim.0 * dim.1;
        let values = param_gen.sample(expected).unwrap_or_default();

        if values.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "generated parameters",
                got: values.len(),
                expected,
            });
        }

        let data = Array2::from_shape_vec(dim, values)?;

        match kind {
            WeightsKind::Weight => Ok(Self::new(name, data)),
            WeightsKind::Bias => Self::bias(name, data),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> WeightsKind {
        self.kind
    }

    pub fn is_bias(&self) -> bool {
        self.kind == WeightsKind::Bias
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Returns the amount of scalar parameters in this tensor.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
