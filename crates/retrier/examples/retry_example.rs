//! Example: Retrying an unreliable call with backoff and cancellation
//!
//! This example demonstrates:
//! 1. Simple retry with exponential backoff
//! 2. A deadline cutting a retry loop short
//! 3. Jitter impact (run multiple times to see variance)
//! 4. Loading a policy from TOML
//!
//! Run with:
//! ```bash
//! RUST_LOG=retrier=debug cargo run -p retrier --features tracing --example retry_example
//! ```

use retrier::prelude::*;
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// A simulated service that fails the first few times
struct UnreliableService {
    attempts: AtomicU32,
    fail_count: u32,
}

impl UnreliableService {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, std::io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.fail_count {
            println!("  Attempt {}: FAILED (simulating transient error)", attempt + 1);
            Err(std::io::Error::other(format!(
                "Transient error on attempt {}",
                attempt + 1
            )))
        } else {
            println!("  Attempt {}: SUCCESS", attempt + 1);
            Ok("service response".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: Simple retry with exponential backoff
async fn example_simple_retry() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Simple Retry with Exponential Backoff ===\n");

    let retrier = Retrier::new(
        RetryPolicy::builder()
            .max_attempts(4)
            .initial_delay(Duration::from_millis(100))
            .factor(2.0)
            .build(),
    );

    let service = UnreliableService::new(2);

    println!("Calling unreliable service (will fail 2 times before succeeding)...");
    let start = Instant::now();

    let result = retrier.execute(&Never, || service.call()).await?;

    println!("\nResult: {}", result);
    println!("Total attempts: {}", service.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected delays: 100ms + 200ms = ~300ms");

    Ok(())
}

/// Example 2: A deadline cancels the wait between attempts
async fn example_deadline() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Deadline Cancels Pending Retries ===\n");

    let retrier = Retrier::new(
        RetryPolicy::builder()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(100))
            .build(),
    );
    let token = CancelToken::new().with_timeout(Duration::from_millis(150));
    let service = UnreliableService::new(u32::MAX);

    match retrier.execute(&token, || service.call()).await {
        Ok(_) => println!("Unexpected success"),
        Err(RetryError::Cancelled(reason)) => println!("\nStopped: {}", reason),
        Err(RetryError::Operation(err)) => println!("\nGave up: {}", err),
    }
    println!("Total attempts: {}", service.total_attempts());

    Ok(())
}

/// Example 3: Jitter demonstration
async fn example_jitter_impact() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Jitter Impact (Run 10 Times) ===\n");

    let policy = |jitter| {
        RetryPolicy::builder()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(100))
            .jitter(jitter)
            .build()
    };
    let no_jitter = Retrier::new(policy(false));
    let with_jitter = Retrier::new(policy(true));

    for (label, retrier) in [("Without jitter", &no_jitter), ("With jitter", &with_jitter)] {
        println!("{} (10 runs):", label);
        let mut total = Duration::ZERO;
        for i in 0..10 {
            let service = UnreliableService::new(1);
            let start = Instant::now();

            let _ = retrier.execute(&Never, || service.call()).await;

            let elapsed = start.elapsed();
            total += elapsed;
            println!("  Run {}: {:?}", i + 1, elapsed);
        }
        println!("  Average: {:?}\n", total / 10);
    }

    println!("Analysis:");
    println!("  No jitter: All delays should be very similar (~100ms)");
    println!("  With jitter: Delays spread across 0-100ms");

    Ok(())
}

/// Example 4: Policy from configuration
async fn example_from_config() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 4: Policy Loaded from TOML ===\n");

    let policy: RetryPolicy = toml::from_str(
        r#"
        max_attempts = 3
        initial_delay_ms = 20
        max_delay_ms = 30
        factor = 3.0
        "#,
    )?;

    let gaps: Vec<_> = policy.delays().collect();
    println!("Policy: {:?}", policy);
    println!("Gaps between attempts: {:?}", gaps);

    let service = UnreliableService::new(1);
    let result = retry(&Never, || service.call(), policy).await?;
    println!("Result: {}", result);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("==============================================");
    println!("   Retrier: Backoff and Cancellation Examples");
    println!("==============================================");

    example_simple_retry().await?;
    example_deadline().await?;
    example_jitter_impact().await?;
    example_from_config().await?;

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
