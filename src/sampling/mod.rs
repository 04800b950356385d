mod neighborhood;
mod seed;
mod walk;

pub use neighborhood::{DEFAULT_WALK_MULTIPLIER, NeighborhoodSampler};
pub use seed::{seeded_rng, split_seed};
pub use walk::{positive_sample, random_step};
