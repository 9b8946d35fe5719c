//! Testing utilities for code that builds policies
//!
//! - [`ScriptedOperation`]: an operation that replays a script of outcomes and
//!   counts how often it was invoked
//! - [`RecordingSink`]: an event sink that keeps every event for inspection
//! - assertion macros for [`Outcome`](crate::Outcome)
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use weir::prelude::*;
//! use weir::testing::ScriptedOperation;
//! use weir::assert_success;
//!
//! # tokio_test::block_on(async {
//! let op = ScriptedOperation::failing_then(2, ErrorDescriptor::transient_msg("busy"), "ok");
//! let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(5);
//!
//! assert_success!(policy.execute(&op, &CancellationToken::new()).await);
//! assert_eq!(op.calls(), 3);
//! # });
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ErrorDescriptor;
use crate::events::{EventSink, PolicyEvent};
use crate::operation::Operation;
use crate::outcome::Outcome;

/// An operation that returns scripted outcomes in order.
///
/// Once the script is exhausted the last entry repeats. An empty script
/// yields a terminal failure on every call.
#[derive(Debug)]
pub struct ScriptedOperation<T> {
    script: Vec<Outcome<T>>,
    calls: AtomicU32,
    latency: Option<Duration>,
}

impl<T> ScriptedOperation<T> {
    /// Replay `script`, repeating its last entry.
    pub fn new(script: Vec<Outcome<T>>) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
            latency: None,
        }
    }

    /// Return `outcome` on every call.
    pub fn always(outcome: Outcome<T>) -> Self {
        Self::new(vec![outcome])
    }

    /// Fail `failures` times with `error`, then succeed with `value`.
    pub fn failing_then(failures: usize, error: ErrorDescriptor, value: T) -> Self {
        let mut script: Vec<Outcome<T>> = (0..failures)
            .map(|_| Outcome::Failure(error.clone()))
            .collect();
        script.push(Outcome::Success(value));
        Self::new(script)
    }

    /// Sleep for `latency` inside every invocation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// How many times the operation was invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Operation<T> for ScriptedOperation<T>
where
    T: Clone + Send + Sync,
{
    fn invoke(&self) -> impl Future<Output = Outcome<T>> + Send {
        let index = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let outcome = self
            .script
            .get(index)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| Outcome::Failure(ErrorDescriptor::terminal_msg("empty script")));
        let latency = self.latency;

        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            outcome
        }
    }
}

/// An event sink that records every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PolicyEvent>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every event recorded so far.
    pub fn events(&self) -> Vec<PolicyEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events for which `pred` returns true.
    pub fn count(&self, pred: impl Fn(&PolicyEvent) -> bool) -> usize {
        self.events().iter().filter(|event| pred(event)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &PolicyEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Assert that an outcome is a success.
///
/// # Example
///
/// ```rust
/// use weir::{Outcome, assert_success};
///
/// assert_success!(Outcome::success(42));
/// ```
#[macro_export]
macro_rules! assert_success {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Success(_) => {}
            $crate::Outcome::Failure(e) => {
                panic!("Expected Success, got Failure: {:?}", e);
            }
            $crate::Outcome::Cancelled => {
                panic!("Expected Success, got Cancelled");
            }
        }
    };
}

/// Assert that an outcome is a failure.
///
/// # Example
///
/// ```rust
/// use weir::{ErrorDescriptor, Outcome, assert_failure};
///
/// assert_failure!(Outcome::<i32>::failure(ErrorDescriptor::terminal_msg("bad")));
/// ```
#[macro_export]
macro_rules! assert_failure {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Failure(_) => {}
            $crate::Outcome::Success(v) => {
                panic!("Expected Failure, got Success: {:?}", v);
            }
            $crate::Outcome::Cancelled => {
                panic!("Expected Failure, got Cancelled");
            }
        }
    };
}

/// Assert that an outcome is `Cancelled`.
///
/// # Example
///
/// ```rust
/// use weir::{Outcome, assert_cancelled};
///
/// assert_cancelled!(Outcome::<i32>::cancelled());
/// ```
#[macro_export]
macro_rules! assert_cancelled {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Cancelled => {}
            $crate::Outcome::Success(v) => {
                panic!("Expected Cancelled, got Success: {:?}", v);
            }
            $crate::Outcome::Failure(e) => {
                panic!("Expected Cancelled, got Failure: {:?}", e);
            }
        }
    };
}
