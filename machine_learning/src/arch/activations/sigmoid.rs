#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sigmoid;

impl Sigmoid {
    pub fn f(&self, z: f64) -> f64 {
        if z >= 0. {
            1. / (1. + (-z).exp())
        } else {
            let e = z.exp();
            e / (1. + e)
        }
    }

    pub fn df(&self, z: f64) -> f64 {
        let s = self.f(z);
        s * (1. - s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_for_large_inputs() {
        assert_eq!(Sigmoid.f(0.), 0.5);
        assert!((Sigmoid.f(800.) - 1.).abs() < 1e-12);
        assert!(Sigmoid.f(-800.).is_finite());
        assert_eq!(Sigmoid.df(0.), 0.25);
    }
}
