//! Cooperative cancellation for waits between attempts.
//!
//! The retrier never interrupts an in-flight operation. It only races the
//! wait between two attempts against a [`CancelSignal`], and when the signal
//! wins it returns the signal's [`CancelReason`].
//!
//! # Key Types
//!
//! - [`CancelSignal`] - Capability consumed by the retrier
//! - [`CancelToken`] - Cloneable token with explicit cancel and deadlines
//! - [`Never`] - A signal that never fires
//!
//! `tokio_util::sync::CancellationToken` also implements [`CancelSignal`], so
//! callers already using it can pass it straight through.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a cancellation signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CancelReason {
    /// Cancellation was requested explicitly.
    #[error("operation cancelled")]
    Cancelled,

    /// The signal's deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A capability that can abort a pending wait.
///
/// Implementations must be safe to share between concurrent retriers.
///
/// # Examples
///
/// ```rust
/// use retrier::{CancelReason, CancelSignal, CancelToken};
///
/// # async fn example() {
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert_eq!(token.reason(), Some(CancelReason::Cancelled));
/// assert_eq!(token.cancelled().await, CancelReason::Cancelled);
/// # }
/// ```
#[async_trait]
pub trait CancelSignal: Send + Sync {
    /// Returns `true` once cancellation has been requested.
    fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// The cancellation reason, or `None` while the signal is still live.
    fn reason(&self) -> Option<CancelReason>;

    /// Resolves with the reason once the signal fires.
    ///
    /// Resolves immediately if the signal has already fired.
    async fn cancelled(&self) -> CancelReason;
}

/// A signal that is never cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

#[async_trait]
impl CancelSignal for Never {
    fn reason(&self) -> Option<CancelReason> {
        None
    }

    async fn cancelled(&self) -> CancelReason {
        std::future::pending().await
    }
}

#[async_trait]
impl CancelSignal for CancellationToken {
    fn reason(&self) -> Option<CancelReason> {
        CancellationToken::is_cancelled(self).then_some(CancelReason::Cancelled)
    }

    async fn cancelled(&self) -> CancelReason {
        CancellationToken::cancelled(self).await;
        CancelReason::Cancelled
    }
}

/// A cloneable cancellation token with optional deadline.
///
/// Clones share state: cancelling one clone cancels all of them. Tokens
/// derived with [`with_timeout`](Self::with_timeout) or
/// [`with_deadline`](Self::with_deadline) are children: they fire when the
/// parent fires or when their own deadline passes, but firing a child never
/// affects its parent.
///
/// When several causes have fired, the one that fired first is reported, and
/// that reason is kept from then on. A token whose deadline has passed
/// reports [`CancelReason::DeadlineExceeded`] even if it is cancelled
/// explicitly afterwards, whether or not anyone looked at it in between.
///
/// # Examples
///
/// ```rust
/// use retrier::{CancelReason, CancelSignal, CancelToken};
/// use std::time::Duration;
///
/// # async fn example() {
/// let parent = CancelToken::new();
/// let child = parent.with_timeout(Duration::from_millis(50));
///
/// assert_eq!(child.cancelled().await, CancelReason::DeadlineExceeded);
/// assert!(!parent.is_cancelled());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    token: CancellationToken,
    fired: OnceLock<Fired>,
    deadline: Option<Instant>,
    parent: Option<Arc<Inner>>,
}

/// A cause and the instant it took effect.
#[derive(Debug, Clone, Copy)]
struct Fired {
    reason: CancelReason,
    at: Instant,
}

impl Inner {
    fn fired(&self) -> Option<Fired> {
        if let Some(fired) = self.fired.get() {
            return Some(*fired);
        }

        let expired = self
            .deadline
            .filter(|deadline| Instant::now() >= *deadline)
            .map(|at| Fired {
                reason: CancelReason::DeadlineExceeded,
                at,
            });
        let inherited = self.parent.as_ref().and_then(|parent| parent.fired());

        let earliest = match (expired, inherited) {
            (Some(own), Some(parent)) if parent.at < own.at => Some(parent),
            (Some(own), _) => Some(own),
            (None, parent) => parent,
        };

        earliest.map(|fired| *self.fired.get_or_init(|| fired))
    }

    fn reason(&self) -> Option<CancelReason> {
        self.fired().map(|fired| fired.reason)
    }
}

impl CancelToken {
    /// Create a live token with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every token derived from it.
    ///
    /// Has no effect on the reason if the token already fired.
    pub fn cancel(&self) {
        let now = Instant::now();
        // An elapsed deadline must be recorded before the explicit cancel.
        if self.inner.fired().is_none() {
            self.inner.fired.get_or_init(|| Fired {
                reason: CancelReason::Cancelled,
                at: now,
            });
        }
        self.inner.token.cancel();
    }

    /// Derive a child token that fires `timeout` from now.
    ///
    /// A timeout too large to represent yields a child without a deadline
    /// of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.derive(Instant::now().checked_add(timeout))
    }

    /// Derive a child token that fires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Some(deadline))
    }

    /// The earliest deadline that applies to this token, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let deadline = match (self.inner.deadline, deadline) {
            (Some(inherited), Some(own)) => Some(inherited.min(own)),
            (inherited, own) => inherited.or(own),
        };

        Self {
            inner: Arc::new(Inner {
                token: self.inner.token.child_token(),
                fired: OnceLock::new(),
                deadline,
                parent: Some(Arc::clone(&self.inner)),
            }),
        }
    }
}

#[async_trait]
impl CancelSignal for CancelToken {
    fn reason(&self) -> Option<CancelReason> {
        self.inner.reason()
    }

    async fn cancelled(&self) -> CancelReason {
        if let Some(reason) = self.reason() {
            return reason;
        }

        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }

        self.reason().unwrap_or(CancelReason::Cancelled)
    }
}
