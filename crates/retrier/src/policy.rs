//! Retry policy configuration and the delay schedule it produces.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_FACTOR: f64 = 2.0;

/// How many times to try an operation and how long to wait in between.
///
/// A policy is immutable once built. Delays grow geometrically: the gap
/// before attempt `k` (for `k >= 2`) is `initial_delay * factor^(k-2)`,
/// capped at `max_delay` when that is non-zero.
///
/// # Normalization
///
/// - `max_attempts` below 1 is treated as 1
/// - a negative or NaN `factor` is treated as 0
///
/// # Configuration
///
/// Policies deserialize from any serde format. Durations are integer
/// milliseconds and every key is optional:
///
/// ```rust
/// use retrier::RetryPolicy;
/// use std::time::Duration;
///
/// let policy: RetryPolicy = toml::from_str(r#"
///     max_attempts = 5
///     initial_delay_ms = 250
///     max_delay_ms = 2000
///     jitter = true
/// "#).unwrap();
///
/// assert_eq!(policy.max_attempts(), 5);
/// assert_eq!(policy.initial_delay(), Duration::from_millis(250));
/// assert_eq!(policy.factor(), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PolicyConfig", into = "PolicyConfig")]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy from explicit values, normalizing them.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        factor: f64,
        jitter: bool,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            factor: normalize_factor(factor),
            jitter,
        }
    }

    /// Create a new builder for configuring a policy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::builder()
    ///     .max_attempts(5)
    ///     .initial_delay(Duration::from_millis(100))
    ///     .max_delay(Duration::from_secs(2))
    ///     .build();
    /// ```
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Total number of tries, including the first. Always at least 1.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the second attempt.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Ceiling for every gap. [`Duration::ZERO`] means no ceiling.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Multiplier applied to the delay after each completed wait.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Whether each gap is drawn uniformly from `[0, current_delay)`.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Clamp `delay` to `max_delay` when a ceiling is set.
    pub fn cap(&self, delay: Duration) -> Duration {
        if !self.max_delay.is_zero() && delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// The gaps this policy inserts between attempts, without jitter.
    ///
    /// Yields `max_attempts - 1` durations: the gap before attempt 2, the gap
    /// before attempt 3, and so on.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::builder()
    ///     .max_attempts(5)
    ///     .initial_delay(Duration::from_millis(10))
    ///     .max_delay(Duration::from_millis(30))
    ///     .factor(2.0)
    ///     .build();
    ///
    /// let gaps: Vec<_> = policy.delays().map(|d| d.as_millis()).collect();
    /// assert_eq!(gaps, vec![10, 20, 30, 30]);
    /// ```
    pub fn delays(&self) -> DelaySchedule<'_> {
        DelaySchedule {
            policy: self,
            current: self.initial_delay,
            remaining: self.max_attempts - 1,
        }
    }
}

impl Default for RetryPolicy {
    /// Defaults:
    /// - `max_attempts`: 3
    /// - `initial_delay`: 100ms
    /// - `max_delay`: none
    /// - `factor`: 2.0
    /// - `jitter`: off
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: Duration::ZERO,
            factor: DEFAULT_FACTOR,
            jitter: false,
        }
    }
}

/// Builder for configuring a [`RetryPolicy`].
///
/// Unset parameters take the [`RetryPolicy::default`] values.
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    factor: Option<f64>,
    jitter: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Set the total number of tries, including the first.
    ///
    /// Default: 3. Zero is treated as 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the wait before the second attempt.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the ceiling for every gap. [`Duration::ZERO`] disables the ceiling.
    ///
    /// Default: no ceiling
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the growth multiplier.
    ///
    /// Default: 2.0 (doubles each time). Negative values are treated as 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::RetryPolicy;
    ///
    /// let policy = RetryPolicy::builder()
    ///     .factor(1.5)  // More gradual backoff
    ///     .build();
    /// ```
    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = Some(factor);
        self
    }

    /// Randomize each gap within `[0, current_delay)`.
    ///
    /// Default: false
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Build the `RetryPolicy`, normalizing out-of-range values.
    pub fn build(self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY),
            self.max_delay.unwrap_or(Duration::ZERO),
            self.factor.unwrap_or(DEFAULT_FACTOR),
            self.jitter.unwrap_or(false),
        )
    }
}

/// Iterator over the un-jittered gaps of a [`RetryPolicy`].
///
/// Created by [`RetryPolicy::delays`].
#[derive(Debug, Clone)]
pub struct DelaySchedule<'a> {
    policy: &'a RetryPolicy,
    current: Duration,
    remaining: u32,
}

impl DelaySchedule<'_> {
    /// The delay the next gap is derived from, before jitter and ceiling.
    ///
    /// This is the exclusive upper bound of a jittered draw.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grow the current delay by the policy's factor, then apply the ceiling.
    pub fn advance(&mut self) {
        self.current = self.policy.cap(grow(self.current, self.policy.factor));
    }
}

impl Iterator for DelaySchedule<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let gap = self.policy.cap(self.current);
        self.advance();
        Some(gap)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DelaySchedule<'_> {}

/// Multiply a delay, saturating instead of overflowing.
fn grow(delay: Duration, factor: f64) -> Duration {
    let nanos = delay.as_nanos() as f64 * factor;
    if nanos.is_nan() {
        // zero delay times an infinite factor
        Duration::ZERO
    } else if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos.round() as u64)
    }
}

fn normalize_factor(factor: f64) -> f64 {
    if factor >= 0.0 { factor } else { 0.0 }
}

/// Serialized form of a [`RetryPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicyConfig {
    max_attempts: i64,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    factor: f64,
    jitter: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        RetryPolicy::default().into()
    }
}

impl From<PolicyConfig> for RetryPolicy {
    fn from(config: PolicyConfig) -> Self {
        let max_attempts = u32::try_from(config.max_attempts.max(1)).unwrap_or(u32::MAX);
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.factor,
            config.jitter,
        )
    }
}

impl From<RetryPolicy> for PolicyConfig {
    fn from(policy: RetryPolicy) -> Self {
        let millis = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self {
            max_attempts: i64::from(policy.max_attempts),
            initial_delay_ms: millis(policy.initial_delay),
            max_delay_ms: millis(policy.max_delay),
            factor: policy.factor,
            jitter: policy.jitter,
        }
    }
}
