//! Integration tests for the retry loop

use retrier::prelude::*;
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(10))
        .factor(2.0)
        .build()
}

/// Fails `failures` times, then succeeds unless `always_fail` is set.
async fn run(
    policy: RetryPolicy,
    failures: u32,
    always_fail: bool,
) -> (u32, retrier::error::Result<(), std::io::Error>) {
    let mut count = 0;
    let result = retry(
        &Never,
        || {
            count += 1;
            let current = count;
            async move {
                if current <= failures {
                    Err(std::io::Error::other("temporary error"))
                } else if always_fail {
                    Err(std::io::Error::other("permanent error"))
                } else {
                    Ok(())
                }
            }
        },
        policy,
    )
    .await;
    (count, result)
}

#[rstest]
#[case::success_first_try(0, false, 1)]
#[case::success_after_retry(1, false, 2)]
#[case::failure_all_attempts(2, true, 3)]
#[tokio::test(start_paused = true)]
async fn test_attempt_counts(
    #[case] failures: u32,
    #[case] always_fail: bool,
    #[case] expected_attempts: u32,
) {
    let (count, result) = run(fast_policy(3), failures, always_fail).await;

    assert_eq!(count, expected_attempts);
    if always_fail {
        let err = assert_err!(result);
        assert_eq!(err.to_string(), "permanent error");
    } else {
        assert_ok!(result);
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[tokio::test(start_paused = true)]
async fn test_zero_attempts_behaves_like_one(#[case] max_attempts: u32) {
    let (count, result) = run(fast_policy(max_attempts), 5, false).await;

    assert_eq!(count, 1);
    assert!(assert_err!(result).as_operation().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_negative_attempts_from_config_behave_like_one() {
    let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": -3}"#).unwrap();

    let (count, result) = run(policy, 0, false).await;

    assert_eq!(count, 1);
    assert_ok!(result);
}

#[tokio::test]
async fn test_deadline_cancels_wait() {
    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(100))
        .factor(2.0)
        .build();
    let token = CancelToken::new().with_timeout(Duration::from_millis(50));
    let mut count = 0;

    let result = Retrier::new(policy)
        .execute(&token, || {
            count += 1;
            async { Err::<(), _>(std::io::Error::other("temporary error")) }
        })
        .await;

    let err = assert_err!(result);
    assert_eq!(err.cancel_reason(), Some(CancelReason::DeadlineExceeded));
    assert!(count <= 2, "expected 1-2 attempts before deadline, got {count}");
}

#[tokio::test(start_paused = true)]
async fn test_explicit_cancel_from_another_task() {
    let policy = RetryPolicy::builder()
        .max_attempts(10)
        .initial_delay(Duration::from_secs(1))
        .build();
    let token = CancellationToken::new();
    let attempts = Arc::new(AtomicU32::new(0));

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        canceller.cancel();
    });

    let counter = Arc::clone(&attempts);
    let result = Retrier::new(policy)
        .execute(&token, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(std::io::Error::other("unavailable")) }
        })
        .await;

    // attempt 1 at 0s, attempt 2 at 1s, cancelled during the 2s wait
    assert_eq!(assert_err!(result).cancel_reason(), Some(CancelReason::Cancelled));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_max_delay_bounds_observed_gaps() {
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .initial_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(15))
        .factor(2.0)
        .build();
    let mut last: Option<Instant> = None;
    let mut max_observed = Duration::ZERO;

    let result = retry(
        &Never,
        || {
            let now = Instant::now();
            if let Some(previous) = last {
                max_observed = max_observed.max(now - previous);
            }
            last = Some(now);
            async { Err::<(), _>(std::io::Error::other("temporary error")) }
        },
        policy,
    )
    .await;

    assert_err!(result);
    assert!(max_observed >= Duration::from_millis(15));
    assert!(max_observed < Duration::from_millis(17), "gap {max_observed:?} exceeded ceiling");
}

#[tokio::test(start_paused = true)]
async fn test_seeded_jitter_is_reproducible() {
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .initial_delay(Duration::from_millis(200))
        .factor(2.0)
        .jitter(true)
        .build();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let retrier = Retrier::with_jitter(policy.clone(), SeededJitter::new(1234));
        let mut times = Vec::new();
        let result = retrier
            .execute(&Never, || {
                times.push(Instant::now());
                async { Err::<(), _>(std::io::Error::other("temporary error")) }
            })
            .await;
        assert_err!(result);

        let gaps: Vec<_> = times.windows(2).map(|w| w[1] - w[0]).collect();
        runs.push(gaps);
    }

    assert_eq!(runs[0].len(), 3);
    assert_eq!(runs[0], runs[1]);
    for (gap, bound) in runs[0].iter().zip([200, 400, 800]) {
        assert!(*gap < Duration::from_millis(bound + 1));
    }
}

#[tokio::test]
async fn test_jitter_gaps_differ() {
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(20))
        .factor(2.0)
        .jitter(true)
        .build();
    let mut times = Vec::new();

    let result = retry(
        &Never,
        || {
            times.push(std::time::Instant::now());
            async { Err::<(), _>(std::io::Error::other("temporary error")) }
        },
        policy,
    )
    .await;

    assert_err!(result);
    let gaps: Vec<_> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps.len(), 2);
    assert_ne!(gaps[0], gaps[1], "expected different delays with jitter enabled");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_invocations_are_independent() {
    let retrier = Arc::new(Retrier::new(fast_policy(3)));
    let mut handles = Vec::new();

    for task in 0..8u32 {
        let retrier = Arc::clone(&retrier);
        handles.push(tokio::spawn(async move {
            let attempts = AtomicU32::new(0);
            let result = retrier
                .execute(&Never, || {
                    let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if current < 1 + task % 3 {
                            Err(std::io::Error::other("retry me"))
                        } else {
                            Ok(task)
                        }
                    }
                })
                .await;
            (result.ok(), attempts.load(Ordering::SeqCst))
        }));
    }

    for (task, handle) in handles.into_iter().enumerate() {
        let (value, attempts) = handle.await.unwrap();
        let task = task as u32;
        assert_eq!(value, Some(task));
        assert_eq!(attempts, 1 + task % 3);
    }
}

#[tokio::test]
async fn test_dyn_signal_is_accepted() {
    let signal: Box<dyn CancelSignal> = Box::new(CancelToken::new());

    let result = Retrier::new(fast_policy(2))
        .execute(signal.as_ref(), || async { Ok::<_, std::io::Error>(7) })
        .await;

    assert_eq!(assert_ok!(result), 7);
}
