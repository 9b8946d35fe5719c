//! Operations: the failable work a policy decorates
//!
//! An [`Operation`] is a zero-argument callable producing an [`Outcome`]. Any
//! `Fn() -> impl Future<Output = Outcome<T>>` closure is an operation, so most
//! callers never name the trait. The adapters in this module cover the other
//! common shapes:
//!
//! - [`from_result`]: async closures returning `Result<T, ErrorDescriptor>`
//! - [`blocking`]: synchronous closures, run on the tokio blocking pool
//! - [`BoxedOperation`]: type erasure, for storing different operations together
//!
//! Policies only invoke operations; they never mutate them. Each invocation
//! produces a fresh outcome.
//!
//! # Examples
//!
//! ```
//! use weir::{ErrorDescriptor, Operation, Outcome};
//!
//! # tokio_test::block_on(async {
//! let op = || async { Outcome::<u32>::failure(ErrorDescriptor::transient_msg("busy")) };
//! assert!(op.invoke().await.is_failure());
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::ErrorDescriptor;
use crate::outcome::Outcome;

/// A zero-argument callable that either yields a `T` or fails.
pub trait Operation<T>: Send + Sync {
    /// Invoke the operation once.
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send;
}

impl<T, F, Fut> Operation<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<T>> + Send,
{
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        self()
    }
}

/// Operation adapter for closures returning `Result<T, ErrorDescriptor>`.
///
/// Created by [`from_result`].
#[derive(Debug, Clone)]
pub struct FromResult<F> {
    f: F,
}

/// Adapt an async closure returning `Result` so it can use `?` internally.
///
/// ```
/// use weir::{operation, ErrorDescriptor, Operation};
///
/// # tokio_test::block_on(async {
/// let op = operation::from_result(|| async {
///     let port: u16 = "80x"
///         .parse()
///         .map_err(ErrorDescriptor::terminal)?;
///     Ok::<_, ErrorDescriptor>(port)
/// });
/// assert!(op.invoke().await.error().unwrap().is_terminal());
/// # });
/// ```
pub fn from_result<F>(f: F) -> FromResult<F> {
    FromResult { f }
}

impl<T, F, Fut> Operation<T> for FromResult<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ErrorDescriptor>> + Send,
{
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        (self.f)().map(Outcome::from)
    }
}

/// Operation adapter for blocking closures.
///
/// Created by [`blocking`].
#[derive(Debug)]
pub struct Blocking<F> {
    f: Arc<F>,
}

impl<F> Clone for Blocking<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

/// Run a blocking closure as an operation.
///
/// Each invocation is moved onto the tokio blocking pool, so a slow call does
/// not stall the runtime. A panic inside the closure is a programming error,
/// not a failure: it is resumed on the calling task rather than turned into an
/// [`Outcome`].
///
/// ```
/// use weir::{operation, Operation, Outcome};
///
/// # tokio_test::block_on(async {
/// let op = operation::blocking(|| Outcome::success(std::env::consts::OS.len()));
/// assert!(op.invoke().await.is_success());
/// # });
/// ```
pub fn blocking<F>(f: F) -> Blocking<F> {
    Blocking { f: Arc::new(f) }
}

impl<T, F> Operation<T> for Blocking<F>
where
    T: Send + 'static,
    F: Fn() -> Outcome<T> + Send + Sync + 'static,
{
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        let f = Arc::clone(&self.f);
        async move {
            match tokio::task::spawn_blocking(move || f()).await {
                Ok(outcome) => outcome,
                Err(join_err) => match join_err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    // The runtime is shutting down; the attempt never completed.
                    Err(_) => Outcome::Cancelled,
                },
            }
        }
    }
}

/// A type-erased operation.
///
/// Use this when operations of different concrete types must be stored in the
/// same place, such as a table of fallbacks keyed by endpoint.
pub struct BoxedOperation<T> {
    inner: Arc<dyn Fn() -> BoxFuture<'static, Outcome<T>> + Send + Sync>,
}

impl<T> Clone for BoxedOperation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for BoxedOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedOperation").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> BoxedOperation<T> {
    /// Erase the type of `op`.
    pub fn new<O>(op: O) -> Self
    where
        O: Operation<T> + 'static,
    {
        let op = Arc::new(op);
        Self {
            inner: Arc::new(move || {
                let op = Arc::clone(&op);
                let fut: BoxFuture<'static, Outcome<T>> =
                    Box::pin(async move { op.invoke().await });
                fut
            }),
        }
    }
}

impl<T: Send + 'static> Operation<T> for BoxedOperation<T> {
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        (self.inner)()
    }
}

/// Extension methods for every [`Operation`].
pub trait OperationExt<T>: Operation<T> + Sized {
    /// Erase the concrete type of this operation.
    fn boxed(self) -> BoxedOperation<T>
    where
        Self: 'static,
        T: Send + 'static,
    {
        BoxedOperation::new(self)
    }
}

impl<T, O: Operation<T>> OperationExt<T> for O {}
