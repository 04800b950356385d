use crate::{MlErr, Result};

/// Local adjacency consumed by the aggregation operations.
///
/// Row `i` of an aggregation output corresponds to the input row `self_index(i)` and
/// combines it with the input rows listed by `neighbors(i)`. All indices point into the
/// rows of the aggregated input matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    self_adjacency: Vec<usize>,
    neighbors: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Creates a new `Adjacency`.
    ///
    /// # Arguments
    /// * `self_adjacency` - The input row of every output row.
    /// * `neighbors` - The input rows aggregated into every output row.
    ///
    /// # Returns
    /// An error if both lists don't have the same length.
    pub fn new(self_adjacency: Vec<usize>, neighbors: Vec<Vec<usize>>) -> Result<Self> {
        if self_adjacency.len() != neighbors.len() {
            return Err(MlErr::SizeMismatch {
                what: "adjacency rows",
                got: neighbors.len(),
                expected: self_adjacency.len(),
            });
        }

        Ok(Self {
            self_adjacency,
            neighbors,
        })
    }

    /// Returns the amount of output rows.
    pub fn len(&self) -> usize {
        self.self_adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.self_adjacency.is_empty()
    }

    pub fn self_index(&self, row: usize) -> usize {
        self.self_adjacency[row]
    }

    pub fn self_adjacency(&self) -> &[usize] {
        &self.self_adjacency
    }

    pub fn neighbors(&self, row: usize) -> &[usize] {
        &self.neighbors[row]
    }

    /// Checks that every referenced input row exists.
    ///
    /// # Arguments
    /// * `input_rows` - The amount of rows of the aggregated input.
    pub fn check_bounds(&self, input_rows: usize) -> Result<()> {
        let referenced = self
            .self_adjacency
            .iter()
            .chain(self.neighbors.iter().flatten());

        for &index in referenced {
            if index >= input_rows {
                return Err(MlErr::IndexOutOfBounds {
                    what: "aggregation input",
                    index,
                    len: input_rows,
                });
            }
        }

        Ok(())
    }
}
