#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Retry fallible async operations with exponential backoff.
//!
//! This crate provides a single mechanism: run an operation, and if it
//! fails, run it again after a growing delay, until it succeeds, the attempt
//! budget runs out, or a cancellation signal fires while waiting.
//!
//! - **Policies** via [`RetryPolicy`]
//!   - Geometric growth with an optional ceiling
//!   - Optional full jitter in `[0, current_delay)`
//!   - Loadable from any serde format
//! - **Cooperative cancellation** via [`CancelSignal`] and [`CancelToken`]
//! - **Injectable randomness** via [`JitterSource`]
//! - **Verbatim errors** via [`RetryError`]
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use retrier::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let retrier = Retrier::new(
//!     RetryPolicy::builder()
//!         .max_attempts(4)
//!         .initial_delay(Duration::from_millis(100))
//!         .max_delay(Duration::from_secs(1))
//!         .jitter(true)
//!         .build(),
//! );
//!
//! let token = CancelToken::new().with_timeout(Duration::from_secs(10));
//! let result = retrier.execute(&token, || async {
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: emit `debug` events for failed attempts, waits, and
//!   cancellation. The crate is silent without it.

pub mod cancel;
pub mod error;
pub mod jitter;
pub mod policy;
mod retrier;

pub use cancel::{CancelReason, CancelSignal, CancelToken, Never};
pub use error::RetryError;
pub use jitter::{JitterSource, SeededJitter, ThreadRngJitter};
pub use policy::{DelaySchedule, RetryPolicy, RetryPolicyBuilder};
pub use retrier::{Retrier, retry};

/// Convenient re-exports of commonly used items.
///
/// Import everything with:
///
/// ```rust
/// use retrier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cancel::{CancelReason, CancelSignal, CancelToken, Never};
    pub use crate::error::RetryError;
    pub use crate::jitter::{JitterSource, SeededJitter, ThreadRngJitter};
    pub use crate::policy::{RetryPolicy, RetryPolicyBuilder};
    pub use crate::retrier::{Retrier, retry};
}
