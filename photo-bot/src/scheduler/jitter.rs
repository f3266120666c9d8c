//! Bounded random delay before scheduled deliveries.

use std::time::Duration;

use crate::random::RandomSource;

/// Uniform delay in `[0, bound)`; a zero bound disables jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JitterPolicy {
    bound: Duration,
}

impl JitterPolicy {
    pub fn from_secs(bound_secs: u64) -> Self {
        Self {
            bound: Duration::from_secs(bound_secs),
        }
    }

    pub fn bound(&self) -> Duration {
        self.bound
    }

    pub fn is_enabled(&self) -> bool {
        !self.bound.is_zero()
    }

    /// Draw a delay with millisecond resolution.
    pub fn draw(&self, rng: &dyn RandomSource) -> Duration {
        let bound_ms = self.bound.as_millis().min(u64::MAX as u128) as u64;
        if bound_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.below(bound_ms))
    }
}
