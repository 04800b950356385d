#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Relu;

impl Relu {
    pub fn f(&self, z: f64) -> f64 {
        z.max(0.)
    }

    /// The subgradient at `0` is taken as `0`.
    pub fn df(&self, z: f64) -> f64 {
        if z > 0. { 1. } else { 0. }
    }
}
