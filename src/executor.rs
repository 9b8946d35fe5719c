//! Running operations under a policy.
//!
//! [`PolicyExecutor`] is the entry point callers use: it checks the
//! cancellation token before anything starts, runs the policy inside a
//! `tracing` span, and reports the final failure, if any, to its event sink.
//! The free function [`execute`] does the same with default settings.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use crate::events::{EventSink, PolicyEvent, TracingSink};
use crate::operation::Operation;
use crate::outcome::Outcome;
use crate::policy::Policy;

/// Executes operations under policies.
///
/// # In-flight attempts
///
/// By default a cancel that arrives while an attempt is running lets that
/// attempt finish; the policy notices the token afterwards. With
/// [`interrupt_in_flight`](Self::interrupt_in_flight) enabled the executor
/// drops the whole execution as soon as the token fires, which also drops
/// the running attempt's future.
///
/// ```rust
/// use std::time::Duration;
/// use weir::prelude::*;
///
/// # tokio_test::block_on(async {
/// let executor = PolicyExecutor::new("inventory-client");
/// let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2);
/// let op = || async { Outcome::success(12u32) };
///
/// let outcome = executor.execute(&policy, &op, &CancellationToken::new()).await;
/// assert_eq!(outcome, Outcome::Success(12));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct PolicyExecutor {
    name: String,
    interrupt_in_flight: bool,
    sink: Arc<dyn EventSink>,
}

impl Default for PolicyExecutor {
    fn default() -> Self {
        Self::new("weir")
    }
}

impl PolicyExecutor {
    /// Create an executor. `name` is recorded on every execution span.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interrupt_in_flight: false,
            sink: Arc::new(TracingSink),
        }
    }

    /// Drop in-flight attempts as soon as the token fires.
    pub fn interrupt_in_flight(mut self, interrupt: bool) -> Self {
        self.interrupt_in_flight = interrupt;
        self
    }

    /// Send diagnostic events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The executor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `op` under `policy`.
    ///
    /// An already-cancelled token returns [`Outcome::Cancelled`] without
    /// invoking the operation. A failure returned to the caller is reported
    /// as [`PolicyEvent::FinalFailure`].
    pub async fn execute<T, P, Op>(
        &self,
        policy: &P,
        op: &Op,
        cancel: &CancellationToken,
    ) -> Outcome<T>
    where
        T: Send,
        P: Policy<T>,
        Op: Operation<T>,
    {
        let span = tracing::debug_span!("policy_execution", executor = %self.name);

        async move {
            if cancel.is_cancelled() {
                self.sink.emit(&PolicyEvent::Cancelled);
                return Outcome::Cancelled;
            }

            let outcome = if self.interrupt_in_flight {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.sink.emit(&PolicyEvent::Cancelled);
                        Outcome::Cancelled
                    }
                    outcome = policy.execute(op, cancel) => outcome,
                }
            } else {
                policy.execute(op, cancel).await
            };

            if let Outcome::Failure(cause) = &outcome {
                self.sink.emit(&PolicyEvent::FinalFailure {
                    cause: cause.clone(),
                });
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Run `op` under `policy` on a new tokio task.
    pub fn spawn<T, P, Op>(
        &self,
        policy: Arc<P>,
        op: Arc<Op>,
        cancel: CancellationToken,
    ) -> JoinHandle<Outcome<T>>
    where
        T: Send + 'static,
        P: Policy<T> + 'static,
        Op: Operation<T> + 'static,
    {
        let executor = self.clone();
        tokio::spawn(async move { executor.execute(&*policy, &*op, &cancel).await })
    }
}

/// Run `op` under `policy` with a default [`PolicyExecutor`].
pub async fn execute<T, P, Op>(policy: &P, op: &Op, cancel: &CancellationToken) -> Outcome<T>
where
    T: Send,
    P: Policy<T>,
    Op: Operation<T>,
{
    PolicyExecutor::default().execute(policy, op, cancel).await
}
