//! Fallback substitution.
//!
//! A [`FallbackPolicy`] runs the operation once. On a failure its predicate
//! accepts, it discards that failure and returns whatever the fallback
//! operation produces instead, success or failure. The fallback's own failure
//! is not handled again: substitution is exactly one level deep per policy.
//!
//! Successes pass through untouched and never run the fallback. Cancelled
//! outcomes pass through too, and a fallback is not started once the
//! cancellation token has fired.
//!
//! # Choosing what to catch
//!
//! By default every failure is substituted, terminal ones included. Whether a
//! system should paper over terminal errors this way is a policy decision, so
//! it is configuration rather than a hardcoded rule: narrow it with
//! [`FallbackPolicy::when`] or [`FallbackPolicy::on`].
//!
//! ```rust
//! use weir::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let fallback = FallbackPolicy::new(|| async { Outcome::success("{\"cached\":true}") })
//!     .on(FailureFilter::Transient);
//!
//! let cancel = CancellationToken::new();
//! let down = || async { Outcome::failure(ErrorDescriptor::transient_msg("timeout")) };
//! let missing = || async { Outcome::failure(ErrorDescriptor::terminal_msg("404")) };
//!
//! assert!(fallback.execute(&down, &cancel).await.is_success());
//! assert!(fallback.execute(&missing, &cancel).await.is_failure());
//! # });
//! ```

use std::fmt;
use std::future::{ready, Future};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{ErrorDescriptor, FailureFilter};
use crate::events::{EventSink, PolicyEvent, TracingSink};
use crate::operation::Operation;
use crate::outcome::Outcome;
use crate::policy::{Policy, PolicyExt};
use crate::retry::Predicate;

/// Substitutes a fallback operation's outcome for matching failures.
#[derive(Clone)]
pub struct FallbackPolicy<F> {
    fallback: F,
    should_fallback: Predicate,
    sink: Arc<dyn EventSink>,
}

impl<F> fmt::Debug for FallbackPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackPolicy")
            .field("fallback", &"<operation>")
            .field("should_fallback", &"<predicate>")
            .field("sink", &self.sink)
            .finish()
    }
}

impl<F> FallbackPolicy<F> {
    /// Fall back to `fallback` on any failure.
    pub fn new(fallback: F) -> Self {
        Self {
            fallback,
            should_fallback: Arc::new(|_: &ErrorDescriptor| true),
            sink: Arc::new(TracingSink),
        }
    }

    /// Fall back only for failures where `predicate` returns true.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ErrorDescriptor) -> bool + Send + Sync + 'static,
    {
        self.should_fallback = Arc::new(predicate);
        self
    }

    /// Fall back only for failures matching `filter`.
    pub fn on(self, filter: FailureFilter) -> Self {
        self.when(move |err| filter.matches(err))
    }

    /// Send diagnostic events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns true if `error` would be replaced by the fallback.
    pub fn should_fallback(&self, error: &ErrorDescriptor) -> bool {
        (self.should_fallback)(error)
    }

    /// The fallback operation.
    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<T> FallbackPolicy<Value<T>> {
    /// Fall back to a fixed value on any failure.
    ///
    /// ```rust
    /// use weir::prelude::*;
    ///
    /// # tokio_test::block_on(async {
    /// let policy = FallbackPolicy::value(0u64);
    /// let op = || async { Outcome::failure(ErrorDescriptor::terminal_msg("no counter")) };
    ///
    /// assert_eq!(policy.execute(&op, &CancellationToken::new()).await, Outcome::Success(0));
    /// # });
    /// ```
    pub fn value(value: T) -> Self {
        Self::new(Value(value))
    }
}

/// Operation that always succeeds with a clone of its value.
///
/// Used by [`FallbackPolicy::value`].
#[derive(Debug, Clone)]
pub struct Value<T>(pub T);

impl<T> Operation<T> for Value<T>
where
    T: Clone + Send + Sync,
{
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        ready(Outcome::Success(self.0.clone()))
    }
}

impl<F> PolicyExt for FallbackPolicy<F> {}

impl<T, F> Policy<T> for FallbackPolicy<F>
where
    T: Send,
    F: Operation<T>,
{
    fn execute<'a, Op>(
        &'a self,
        op: &'a Op,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Outcome<T>> + Send + 'a
    where
        T: 'a,
        Op: Operation<T> + 'a,
    {
        async move {
            match op.invoke().await {
                Outcome::Failure(error) if self.should_fallback(&error) => {
                    if cancel.is_cancelled() {
                        self.sink.emit(&PolicyEvent::Cancelled);
                        return Outcome::Cancelled;
                    }
                    self.sink.emit(&PolicyEvent::FallbackInvoked { cause: error });
                    self.fallback.invoke().await
                }
                other => other,
            }
        }
    }
}
