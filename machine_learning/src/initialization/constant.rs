use super::ParamGen;

/// Generates a fixed amount of copies of one value.
///
/// Used for tensors whose initial values carry no randomness, biases start at zero.
#[derive(Debug, Clone, Copy)]
pub struct ConstParamGen {
    value: f64,
    left: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen`.
    ///
    /// # Arguments
    /// * `value` - The generated value.
    /// * `limit` - How many values can be generated in total.
    pub fn new(value: f64, limit: usize) -> Self {
        Self { value, left: limit }
    }

    /// Creates a generator of `limit` zeros.
    pub fn zeros(limit: usize) -> Self {
        Self::new(0., limit)
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f64>> {
        let taken = n.min(self.left);
        if taken == 0 {
            return None;
        }

        self.left -= taken;
        Some(vec![self.value; taken])
    }
}
