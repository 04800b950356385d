use rand::{SeedableRng, rngs::StdRng};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Derives the seed of the `stream`-th child of `seed`.
///
/// Uses the SplitMix64 mixing function, children of one seed are statistically
/// independent of each other and of their parent.
pub fn split_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed.wrapping_add(GOLDEN_GAMMA.wrapping_mul(stream.wrapping_add(1)));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::Rng;

    use super::*;

    #[test]
    fn split_is_deterministic() {
        assert_eq!(split_seed(42, 3), split_seed(42, 3));
        assert_eq!(
            seeded_rng(7).random::<u64>(),
            seeded_rng(7).random::<u64>()
        );
    }

    #[test]
    fn streams_differ() {
        let seeds: HashSet<_> = (0..1000).map(|stream| split_seed(42, stream)).collect();

        assert_eq!(seeds.len(), 1000);
        assert_ne!(split_seed(42, 0), split_seed(43, 0));
    }
}
