//! # Weir
//!
//! Composable retry and fallback policies for failable async operations.
//!
//! An [`Operation`] is any zero-argument async callable producing an
//! [`Outcome`]: a success value, a classified failure, or cancellation. A
//! [`Policy`] decorates an operation and changes how its failures are handled:
//!
//! - [`RetryPolicy`] re-invokes the operation after retry-eligible failures,
//!   with a delay between attempts
//! - [`FallbackPolicy`] replaces a matching failure with the outcome of a
//!   fallback operation
//!
//! Policies compose with [`PolicyExt::wrap`]. The outer policy sees the
//! fully resolved outcome of the inner one, so order decides behavior.
//!
//! ## Quick Example
//!
//! ```rust
//! use std::time::Duration;
//! use weir::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let fetch = || async {
//!     Outcome::<String>::failure(ErrorDescriptor::transient_msg("503 Service Unavailable"))
//! };
//! let cached = || async { Outcome::success(String::from("{\"items\":[]}")) };
//!
//! // Retry twice, then fall back to the cached document.
//! let policy = FallbackPolicy::new(cached)
//!     .wrap(RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2));
//!
//! let outcome = PolicyExecutor::new("catalog")
//!     .execute(&policy, &fetch, &CancellationToken::new())
//!     .await;
//!
//! assert_eq!(outcome.value().map(String::as_str), Some("{\"items\":[]}"));
//! # });
//! ```
//!
//! ## Cancellation
//!
//! Every execution takes a [`CancellationToken`]. Policies check it before
//! starting another attempt, wake from retry delays as soon as it fires, and
//! never start a fallback after it has fired. A cancelled execution ends with
//! [`Outcome::Cancelled`], which no policy retries or substitutes.
//!
//! ## Feature Flags
//!
//! - `jitter`: randomized retry delays (adds `rand`)
//! - `serde`: `Serialize`/`Deserialize` for [`RetryConfig`] and friends

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod events;
pub mod executor;
pub mod fallback;
pub mod operation;
pub mod outcome;
pub mod policy;
pub mod retry;
pub mod testing;

// Re-exports
pub use error::{ConfigError, ErrorDescriptor, ErrorKind, ExecutionError, FailureFilter};
pub use events::{EventSink, PolicyEvent, TracingSink};
pub use executor::{execute, PolicyExecutor};
pub use fallback::FallbackPolicy;
pub use operation::{BoxedOperation, Operation, OperationExt};
pub use outcome::Outcome;
pub use policy::{wrap, Policy, PolicyExt, Wrap};
pub use retry::{RetryConfig, RetryPolicy};
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{ErrorDescriptor, ErrorKind, FailureFilter};
    pub use crate::executor::PolicyExecutor;
    pub use crate::fallback::FallbackPolicy;
    pub use crate::operation::{Operation, OperationExt};
    pub use crate::outcome::Outcome;
    pub use crate::policy::{Policy, PolicyExt};
    pub use crate::retry::RetryPolicy;
    pub use tokio_util::sync::CancellationToken;
}
