//! The retry loop.

use crate::cancel::CancelSignal;
use crate::error::{Result, RetryError};
use crate::jitter::{JitterSource, ThreadRngJitter};
use crate::policy::RetryPolicy;
use std::future::Future;

/// Runs fallible operations under a [`RetryPolicy`].
///
/// Each call to [`execute`](Self::execute) is independent: the evolving
/// delay and attempt counter live on that call's stack, so one `Retrier` can
/// be shared by any number of concurrent callers.
///
/// # Algorithm
///
/// For attempt `n` in `1..=max_attempts`:
/// ```text
/// result = operation()
/// success                 -> return Ok
/// failure, n == max       -> return the failure
/// gap = jitter ? uniform[0, current) : current
/// gap = min(gap, max_delay)             (when max_delay > 0)
/// race sleep(gap) against cancellation  -> cancelled: return the reason
/// current = min(current * factor, max_delay)
/// ```
///
/// # Examples
///
/// ```rust
/// use retrier::{CancelToken, Retrier, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let retrier = Retrier::new(
///     RetryPolicy::builder()
///         .max_attempts(3)
///         .initial_delay(Duration::from_millis(100))
///         .build(),
/// );
///
/// let token = CancelToken::new().with_timeout(Duration::from_secs(5));
/// let value = retrier
///     .execute(&token, || async { Ok::<_, std::io::Error>(42) })
///     .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Retrier<J = ThreadRngJitter> {
    policy: RetryPolicy,
    jitter: J,
}

impl Retrier {
    /// Create a retrier that draws jitter from the thread-local generator.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_jitter(policy, ThreadRngJitter)
    }
}

impl<J: JitterSource> Retrier<J> {
    /// Create a retrier with an explicit jitter source.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::{Retrier, RetryPolicy, SeededJitter};
    ///
    /// let policy = RetryPolicy::builder().jitter(true).build();
    /// let retrier = Retrier::with_jitter(policy, SeededJitter::new(42));
    /// ```
    pub fn with_jitter(policy: RetryPolicy, jitter: J) -> Self {
        Self { policy, jitter }
    }

    /// The policy this retrier applies.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, attempts run out, or `signal`
    /// fires during a wait.
    ///
    /// The operation is called exactly once per attempt and is never
    /// interrupted; cancellation is only observed between attempts. If the
    /// signal has already fired when a wait begins, the wait counts as
    /// cancelled.
    ///
    /// # Returns
    /// - `Ok(T)`: the value from the first successful attempt
    /// - `Err(RetryError::Operation(e))`: the failure from the final attempt
    /// - `Err(RetryError::Cancelled(reason))`: the signal fired while waiting
    pub async fn execute<S, F, Fut, T, E>(
        &self,
        signal: &S,
        mut operation: F,
    ) -> Result<T, E>
    where
        S: CancelSignal + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut schedule = self.policy.delays();
        let mut attempt = 1;

        loop {
            // Only the final failure is kept; earlier ones drop before the wait.
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, "retry attempts exhausted");
                    return Err(RetryError::Operation(err));
                }
                Err(_) => {}
            }

            let current = schedule.current();
            let gap = if self.policy.jitter() {
                self.policy.cap(self.jitter.sample(current))
            } else {
                self.policy.cap(current)
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, max_attempts, ?gap, "attempt failed, backing off");

            tokio::select! {
                biased;
                reason = signal.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, %reason, "retry cancelled while waiting");
                    return Err(RetryError::Cancelled(reason));
                }
                _ = tokio::time::sleep(gap) => {}
            }

            schedule.advance();
            attempt += 1;
        }
    }
}

/// Run `operation` under `policy`, drawing jitter from the thread-local
/// generator.
///
/// Shorthand for `Retrier::new(policy).execute(signal, operation)`.
///
/// # Examples
///
/// ```rust
/// use retrier::{Never, RetryPolicy, retry};
/// use std::time::Duration;
///
/// # async fn example() {
/// let policy = RetryPolicy::builder()
///     .max_attempts(2)
///     .initial_delay(Duration::from_millis(1))
///     .build();
///
/// let operation = || async { Err::<(), _>(std::io::Error::other("down")) };
/// let result = retry(&Never, operation, policy).await;
/// assert!(result.unwrap_err().as_operation().is_some());
/// # }
/// ```
pub async fn retry<S, F, Fut, T, E>(
    signal: &S,
    operation: F,
    policy: RetryPolicy,
) -> Result<T, E>
where
    S: CancelSignal + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    Retrier::new(policy).execute(signal, operation).await
}
