use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        what: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    },
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },
    UnknownNode {
        node: usize,
        len: usize,
    },
    MissingValue {
        node: usize,
    },
    NotScalar {
        node: usize,
        shape: (usize, usize),
    },
    InvalidDistribution(String),
    InvalidShape(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}: got {got}, expected {expected}"),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got:?}, expected {expected:?}"
            ),
            MlErr::IndexOutOfBounds { what, index, len } => {
                write!(f, "index {index} out of bounds for {what} of length {len}")
            }
            MlErr::UnknownNode { node, len } => write!(
                f,
                "node {node} does not belong to a computation graph of {len} nodes"
            ),
            MlErr::MissingValue { node } => {
                write!(f, "node {node} has not been evaluated by a forward pass")
            }
            MlErr::NotScalar { node, shape } => {
                write!(f, "node {node} is not a scalar, its shape is {shape:?}")
            }
            MlErr::InvalidDistribution(detail) => {
                write!(f, "invalid parameter distribution: {detail}")
            }
            MlErr::InvalidShape(detail) => write!(f, "invalid array shape: {detail}"),
        }
    }
}

impl Error for MlErr {}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::InvalidDistribution(value.to_string())
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::InvalidShape(value.to_string())
    }
}
