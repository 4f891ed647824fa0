use rand::{rngs::StdRng, SeedableRng};

/// Builds the random number generator used for rollouts.
///
/// # Parameters
/// - `seed`: fixed seed for reproducible searches, or `None` to seed
///           from the operating system.
///
/// # Returns
/// A `StdRng` instance.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng{
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng()
    }
}
