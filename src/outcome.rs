//! Outcome of one attempt or of a whole pipeline
//!
//! `Outcome` is the only channel through which a pipeline reports its result.
//! Expected failures are values, never panics, and cancellation is its own
//! variant so that it can short-circuit every policy without being mistaken
//! for an ordinary failure.
//!
//! # Examples
//!
//! ```
//! use weir::{ErrorDescriptor, Outcome};
//!
//! let ok = Outcome::success(42);
//! assert!(ok.is_success());
//! assert_eq!(ok.map(|n| n * 2), Outcome::Success(84));
//!
//! let failed: Outcome<i32> = Outcome::failure(ErrorDescriptor::terminal_msg("nope"));
//! assert!(failed.is_failure());
//! assert!(failed.into_result().is_err());
//! ```

use crate::error::{ErrorDescriptor, ExecutionError};

/// Success-or-failure result of invoking an operation or running a policy.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed.
    Failure(ErrorDescriptor),
    /// Execution was aborted by its cancellation token.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Create a successful outcome.
    #[inline]
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Create a failed outcome.
    #[inline]
    pub fn failure(error: ErrorDescriptor) -> Self {
        Outcome::Failure(error)
    }

    /// Create a cancelled outcome.
    #[inline]
    pub fn cancelled() -> Self {
        Outcome::Cancelled
    }

    /// Returns true for `Success`.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns true for `Failure`.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Returns true for `Cancelled`.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The failure descriptor, if any.
    pub fn error(&self) -> Option<&ErrorDescriptor> {
        match self {
            Outcome::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// A reference to the success value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the success value, leaving failure and cancellation untouched.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(err) => Outcome::Failure(err),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    /// Convert into a `Result`.
    ///
    /// ```
    /// use weir::{ExecutionError, Outcome};
    ///
    /// let cancelled = Outcome::<()>::cancelled();
    /// assert!(matches!(cancelled.into_result(), Err(ExecutionError::Cancelled)));
    /// ```
    pub fn into_result(self) -> Result<T, ExecutionError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(err) => Err(ExecutionError::Failed(err)),
            Outcome::Cancelled => Err(ExecutionError::Cancelled),
        }
    }
}

impl<T> From<Result<T, ErrorDescriptor>> for Outcome<T> {
    fn from(result: Result<T, ErrorDescriptor>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(err),
        }
    }
}

/// Failures compare by classification and cause identity.
impl<T: PartialEq> PartialEq for Outcome<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Outcome::Success(a), Outcome::Success(b)) => a == b,
            (Outcome::Failure(a), Outcome::Failure(b)) => {
                a.kind() == b.kind() && a.same_cause(b)
            }
            (Outcome::Cancelled, Outcome::Cancelled) => true,
            _ => false,
        }
    }
}
