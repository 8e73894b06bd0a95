//! Random sources for jittered delays.
//!
//! When jitter is enabled, the retrier replaces each gap with a duration drawn
//! uniformly from `[0, current_delay)`. The draw goes through a
//! [`JitterSource`] so callers and tests can control the randomness.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// A source of uniformly distributed delays.
///
/// Implementations must be safe to share between concurrent retriers.
pub trait JitterSource: Send + Sync {
    /// Draw a duration uniformly from `[0, upper)`.
    ///
    /// Must return [`Duration::ZERO`] when `upper` is zero.
    fn sample(&self, upper: Duration) -> Duration;
}

/// Draws from the thread-local generator.
///
/// Each thread has its own generator, so concurrent retriers never contend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self, upper: Duration) -> Duration {
        sample_with(&mut rand::thread_rng(), upper)
    }
}

/// A deterministic generator seeded by the caller.
///
/// Two sources created with the same seed produce the same sequence of draws.
///
/// # Examples
///
/// ```rust
/// use retrier::{JitterSource, SeededJitter};
/// use std::time::Duration;
///
/// let a = SeededJitter::new(7);
/// let b = SeededJitter::new(7);
/// let upper = Duration::from_millis(100);
///
/// assert_eq!(a.sample(upper), b.sample(upper));
/// assert!(a.sample(upper) < upper);
/// ```
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    /// Create a source from a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn sample(&self, upper: Duration) -> Duration {
        // Generator state stays valid across a poisoned lock.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sample_with(&mut *rng, upper)
    }
}

impl<J: JitterSource + ?Sized> JitterSource for std::sync::Arc<J> {
    fn sample(&self, upper: Duration) -> Duration {
        (**self).sample(upper)
    }
}

/// Uniform draw from `[0, upper)` at nanosecond resolution.
///
/// Bounds beyond `u64::MAX` nanoseconds (about 584 years) are truncated.
fn sample_with<R: Rng>(rng: &mut R, upper: Duration) -> Duration {
    let nanos = u64::try_from(upper.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.gen_range(0..nanos))
}
