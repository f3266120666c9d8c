//! Process-wide random source.

use std::sync::Arc;

use rand::RngExt;

/// Source of uniformly distributed integers.
///
/// Shared by the selectors and the delivery jitter. Implementations must be
/// safe to call concurrently.
pub trait RandomSource: Send + Sync {
    /// Draw a value uniformly from `[0, upper)`. `upper` must be non-zero.
    fn below(&self, upper: u64) -> u64;
}

/// Thread-local `rand` generator, seeded from the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, upper: u64) -> u64 {
        debug_assert!(upper > 0, "empty range");
        if upper <= 1 {
            return 0;
        }
        rand::rng().random_range(0..upper)
    }
}

/// Shared handle used throughout the crate.
pub type SharedRandom = Arc<dyn RandomSource>;

/// The default process-wide random source.
pub fn thread_random() -> SharedRandom {
    Arc::new(ThreadRandom)
}
