//! Error types returned by the retrier.

use crate::cancel::CancelReason;

/// Result type for retried operations.
pub type Result<T, E> = std::result::Result<T, RetryError<E>>;

/// The outcome of a retried operation that did not succeed.
///
/// Every non-success outcome is surfaced verbatim: either the failure value
/// produced by the final attempt, or the reason the cancellation signal
/// reported while the retrier was waiting between attempts.
///
/// # Examples
///
/// ```rust
/// use retrier::{CancelReason, RetryError};
///
/// let err: RetryError<std::io::Error> = RetryError::Cancelled(CancelReason::DeadlineExceeded);
/// assert!(err.is_cancelled());
/// assert_eq!(err.cancel_reason(), Some(CancelReason::DeadlineExceeded));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The last failure returned by the operation once attempts ran out.
    #[error(transparent)]
    Operation(E),

    /// The cancellation signal fired during a wait between attempts.
    #[error(transparent)]
    Cancelled(#[from] CancelReason),
}

impl<E> RetryError<E> {
    /// Returns `true` if the retrier stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The cancellation reason, if the retrier was cancelled.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            Self::Operation(_) => None,
        }
    }

    /// Borrow the operation failure, if attempts were exhausted.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled(_) => None,
        }
    }

    /// Take the operation failure, if attempts were exhausted.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_operation_error_is_passed_through() {
        let err: RetryError<std::io::Error> =
            RetryError::Operation(std::io::Error::other("connection reset"));

        assert!(!err.is_cancelled());
        assert_eq!(err.cancel_reason(), None);
        assert_eq!(err.to_string(), "connection reset");
        // transparent: the message is not repeated further down the chain
        assert!(err.source().is_none());
        assert_eq!(
            err.into_operation().map(|e| e.to_string()),
            Some("connection reset".to_string())
        );
    }

    #[test]
    fn test_cancelled_from_reason() {
        let err: RetryError<std::io::Error> = CancelReason::Cancelled.into();

        assert!(err.is_cancelled());
        assert!(err.as_operation().is_none());
        assert_eq!(err.to_string(), CancelReason::Cancelled.to_string());
    }
}
