//! The `Policy` trait and composition
//!
//! A policy decorates an [`Operation`] and changes how its failures are
//! handled. Policies are immutable once built: all per-execution state (attempt
//! counters, the outcome chain) lives inside the future returned by
//! [`Policy::execute`], so one policy value can serve any number of concurrent
//! executions without locking.
//!
//! # Composition
//!
//! `outer.wrap(inner)` builds a [`Wrap`] whose execution is
//! `outer.execute(|| inner.execute(op))`. The inner policy's whole run,
//! including every retry and delay, is a single attempt from the outer
//! policy's point of view.
//!
//! ```
//! use std::time::Duration;
//! use weir::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let pipeline = FallbackPolicy::value("cached")
//!     .wrap(RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(3));
//!
//! let outcome = weir::execute(
//!     &pipeline,
//!     &|| async { Outcome::failure(ErrorDescriptor::transient_msg("down")) },
//!     &CancellationToken::new(),
//! )
//! .await;
//!
//! assert_eq!(outcome, Outcome::Success("cached"));
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::operation::Operation;
use crate::outcome::Outcome;

/// A composable decorator over an operation that alters its failure behavior.
pub trait Policy<T>: Send + Sync {
    /// Run `op` under this policy.
    ///
    /// Implementations must observe `cancel` at every point where they would
    /// wait or start another attempt, and must return [`Outcome::Cancelled`]
    /// once they see it fire.
    fn execute<'a, Op>(
        &'a self,
        op: &'a Op,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Outcome<T>> + Send + 'a
    where
        T: 'a,
        Op: Operation<T> + 'a;
}

impl<T, P> Policy<T> for Arc<P>
where
    P: Policy<T>,
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
        (**self).execute(op, cancel)
    }
}

impl<T, P> Policy<T> for &P
where
    P: Policy<T>,
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
        (**self).execute(op, cancel)
    }
}

/// Composition methods for policies.
///
/// Implemented by every policy type in this crate. Implement it for your own
/// policies to get `.wrap()`.
pub trait PolicyExt: Sized {
    /// Wrap `inner` so that this policy sees the fully resolved outcome of
    /// `inner`'s execution.
    ///
    /// Order matters. `fallback.wrap(retry)` exhausts every retry before the
    /// fallback runs once; `retry.wrap(fallback)` gives each attempt its own
    /// fallback and retries whatever the fallback returns.
    fn wrap<I>(self, inner: I) -> Wrap<Self, I> {
        Wrap::new(self, inner)
    }
}

/// Compose `outer` around `inner`. Same as `outer.wrap(inner)`.
pub fn wrap<O, I>(outer: O, inner: I) -> Wrap<O, I> {
    Wrap::new(outer, inner)
}

/// Two policies combined into one: `outer` around `inner`.
///
/// Created by [`PolicyExt::wrap`] or [`wrap`]. Wrapping is associative:
/// `a.wrap(b).wrap(c)` and `a.wrap(b.wrap(c))` evaluate the same linear
/// chain, `c` innermost.
#[derive(Debug, Clone)]
pub struct Wrap<O, I> {
    outer: O,
    inner: I,
}

impl<O, I> Wrap<O, I> {
    /// Combine `outer` around `inner`.
    pub fn new(outer: O, inner: I) -> Self {
        Self { outer, inner }
    }

    /// The outer policy.
    pub fn outer(&self) -> &O {
        &self.outer
    }

    /// The inner policy.
    pub fn inner(&self) -> &I {
        &self.inner
    }
}

impl<O, I> PolicyExt for Wrap<O, I> {}

impl<T, O, I> Policy<T> for Wrap<O, I>
where
    T: Send,
    O: Policy<T>,
    I: Policy<T>,
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
            let inner = InnerExecution {
                policy: &self.inner,
                op,
                cancel,
            };
            self.outer.execute(&inner, cancel).await
        }
    }
}

/// The inner policy's execution, presented to the outer policy as one
/// operation.
struct InnerExecution<'a, P, Op> {
    policy: &'a P,
    op: &'a Op,
    cancel: &'a CancellationToken,
}

impl<'a, T, P, Op> Operation<T> for InnerExecution<'a, P, Op>
where
    T: Send + 'a,
    P: Policy<T>,
    Op: Operation<T>,
{
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        self.policy.execute(self.op, self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Records its label on entry so nesting order can be checked.
    struct Tag {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl PolicyExt for Tag {}

    impl<T: Send> Policy<T> for Tag {
        fn execute<'a, Op>(
            &'a self,
            op: &'a Op,
            _cancel: &'a CancellationToken,
        ) -> impl Future<Output = Outcome<T>> + Send + 'a
        where
            T: 'a,
            Op: Operation<T> + 'a,
        {
            async move {
                self.log.lock().unwrap().push(self.label);
                op.invoke().await
            }
        }
    }

    fn tag(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Tag {
        Tag {
            label,
            log: Arc::clone(log),
        }
    }

    #[tokio::test]
    async fn test_outer_runs_before_inner() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let policy = tag("outer", &log).wrap(tag("inner", &log));

        let outcome = policy
            .execute(&|| async { Outcome::success(1) }, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Success(1));
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_wrap_is_associative() {
        let left_log = Arc::new(Mutex::new(Vec::new()));
        let left = tag("a", &left_log)
            .wrap(tag("b", &left_log))
            .wrap(tag("c", &left_log));

        let right_log = Arc::new(Mutex::new(Vec::new()));
        let right = tag("a", &right_log).wrap(tag("b", &right_log).wrap(tag("c", &right_log)));

        let cancel = CancellationToken::new();
        let op = || async { Outcome::success(()) };
        left.execute(&op, &cancel).await;
        right.execute(&op, &cancel).await;

        assert_eq!(*left_log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(*left_log.lock().unwrap(), *right_log.lock().unwrap());
    }

    #[tokio::test]
    async fn test_operation_invoked_once_per_inner_execution() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicU32::new(0));
        let op = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Outcome::success(())
                }
            }
        };

        let policy = wrap(tag("outer", &log), tag("inner", &log));
        policy.execute(&op, &CancellationToken::new()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shared_policy_through_arc() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let policy = Arc::new(tag("shared", &log));
        let cancel = CancellationToken::new();

        let first = || async { Outcome::success(1) };
        let second = || async { Outcome::success(2) };
        let (a, b) = tokio::join!(
            policy.execute(&first, &cancel),
            policy.execute(&second, &cancel)
        );

        assert_eq!((a, b), (Outcome::Success(1), Outcome::Success(2)));
        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
