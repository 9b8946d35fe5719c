//! Retry with delay.
//!
//! A [`RetryPolicy`] re-invokes an operation after failures its predicate
//! accepts, waiting between attempts according to a backoff strategy:
//!
//! - **Constant**: Fixed delay between retries
//! - **Linear**: Delay increases linearly (100ms, 200ms, 300ms, ...)
//! - **Exponential**: Delay doubles each retry (100ms, 200ms, 400ms, ...)
//! - **Fibonacci**: Delay follows Fibonacci sequence
//! - **Custom**: Any function of the 1-based retry index
//!
//! Failures the predicate rejects are returned immediately without consuming
//! the retry budget. When the budget runs out the last failure is returned
//! unchanged. The wait between attempts observes the cancellation token: a
//! cancel during a delay ends the execution with [`Outcome::Cancelled`]
//! instead of starting another attempt.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use weir::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let calls = &AtomicU32::new(0);
//! let flaky = move || async move {
//!     if calls.fetch_add(1, Ordering::SeqCst) < 2 {
//!         Outcome::failure(ErrorDescriptor::transient_msg("connection reset"))
//!     } else {
//!         Outcome::success("payload")
//!     }
//! };
//!
//! let policy = RetryPolicy::exponential(Duration::from_millis(1)).with_max_retries(3);
//! let outcome = policy.execute(&flaky, &CancellationToken::new()).await;
//!
//! assert_eq!(outcome, Outcome::Success("payload"));
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # });
//! ```
//!
//! # Jitter Support
//!
//! Jitter adds randomness to delays to prevent thundering herd problems.
//! Enable the `jitter` feature to use jitter:
//!
//! ```toml
//! weir = { version = "...", features = ["jitter"] }
//! ```
//!
//! [`Outcome::Cancelled`]: crate::Outcome::Cancelled

mod config;
mod policy;

pub use config::{BackoffConfig, JitterConfig, RetryConfig};
pub use policy::{DelayFn, JitterStrategy, Predicate, RetryPolicy, RetryStrategy};
