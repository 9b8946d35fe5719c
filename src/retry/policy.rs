//! Retry policy types and execution.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ErrorDescriptor, FailureFilter};
use crate::events::{EventSink, PolicyEvent, TracingSink};
use crate::operation::Operation;
use crate::outcome::Outcome;
use crate::policy::{Policy, PolicyExt};

/// Predicate deciding whether a failure is handled by a policy.
pub type Predicate = Arc<dyn Fn(&ErrorDescriptor) -> bool + Send + Sync>;

/// Delay function mapping a 1-based retry index to a delay.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// A retry policy: re-invokes an operation after retry-eligible failures.
///
/// The policy itself is plain configuration. Every call to
/// [`Policy::execute`] starts a fresh attempt counter, so a single policy can
/// be shared by concurrent executions.
///
/// # Bounds
///
/// `with_max_retries(n)` allows `n` retries after the initial attempt, so an
/// operation that keeps failing is invoked `n + 1` times. The default is no
/// retries at all: the operation runs once.
///
/// # Examples
///
/// ```rust
/// use weir::RetryPolicy;
/// use std::time::Duration;
///
/// // The fixed-delay policy: 3 retries, 500ms apart.
/// let policy = RetryPolicy::constant(Duration::from_millis(500))
///     .with_max_retries(3);
///
/// assert_eq!(policy.max_retries(), 3);
/// assert_eq!(policy.delay_for_retry(3), Some(Duration::from_millis(500)));
/// assert_eq!(policy.delay_for_retry(4), None);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_retries: u32,
    max_delay: Option<Duration>,
    jitter: JitterStrategy,
    should_retry: Predicate,
    sink: Arc<dyn EventSink>,
}

/// The backoff strategy for retry delays.
///
/// `k` below is the 1-based index of the retry about to start.
#[derive(Clone)]
pub enum RetryStrategy {
    /// Fixed delay between attempts.
    Constant(Duration),
    /// Delay increases linearly: base * k.
    Linear {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay doubles: base * 2^(k-1).
    Exponential {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay follows the Fibonacci sequence: base * fib(k).
    Fibonacci {
        /// Base delay duration.
        base: Duration,
    },
    /// Caller-supplied delay function.
    Custom(DelayFn),
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            RetryStrategy::Linear { base } => f.debug_struct("Linear").field("base", base).finish(),
            RetryStrategy::Exponential { base } => {
                f.debug_struct("Exponential").field("base", base).finish()
            }
            RetryStrategy::Fibonacci { base } => {
                f.debug_struct("Fibonacci").field("base", base).finish()
            }
            RetryStrategy::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay (AWS recommended).
    Full,
    /// Decorrelated jitter (AWS style).
    Decorrelated,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .field("max_retries", &self.max_retries)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("should_retry", &"<predicate>")
            .field("sink", &self.sink)
            .finish()
    }
}

impl RetryPolicy {
    fn with_strategy(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            max_retries: 0,
            max_delay: None,
            jitter: JitterStrategy::None,
            should_retry: Arc::new(|err: &ErrorDescriptor| err.is_transient()),
            sink: Arc::new(TracingSink),
        }
    }

    /// Create a policy with constant delay between retries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use weir::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(500))
    ///     .with_max_retries(3);
    ///
    /// assert_eq!(policy.delay_for_retry(1), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_retry(2), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_retry(3), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_retry(4), None);
    /// ```
    pub fn constant(delay: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Constant(delay))
    }

    /// Create a policy with linearly increasing delay.
    ///
    /// ```rust
    /// use weir::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::linear(Duration::from_millis(100)).with_max_retries(5);
    ///
    /// assert_eq!(policy.delay_for_retry(1), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_retry(3), Some(Duration::from_millis(300)));
    /// ```
    pub fn linear(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Linear { base })
    }

    /// Create a policy with exponentially increasing delay.
    ///
    /// ```rust
    /// use weir::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(5);
    ///
    /// assert_eq!(policy.delay_for_retry(1), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_retry(2), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_retry(3), Some(Duration::from_millis(400)));
    /// ```
    pub fn exponential(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Exponential { base })
    }

    /// Create a policy with Fibonacci-based delay.
    pub fn fibonacci(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Fibonacci { base })
    }

    /// Create a policy whose delay is computed by `f` from the 1-based retry
    /// index.
    ///
    /// ```rust
    /// use weir::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::custom(|retry| Duration::from_secs(u64::from(retry) * 10))
    ///     .with_max_retries(2);
    ///
    /// assert_eq!(policy.delay_for_retry(2), Some(Duration::from_secs(20)));
    /// ```
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::with_strategy(RetryStrategy::Custom(Arc::new(f)))
    }

    /// Set the maximum number of retries after the initial attempt.
    ///
    /// `0` means the operation is tried exactly once.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the maximum delay cap.
    ///
    /// Delays never exceed this value, whatever the strategy or jitter.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// The factor is clamped to `[0, 1]`; `0.25` gives delays within ±25% of
    /// the computed value. NaN counts as `0`.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(clamp_factor(factor));
        self
    }

    /// Use full jitter: a random delay between zero and the computed delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Use decorrelated jitter: random between the computed delay and three
    /// times the previous delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_decorrelated_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Decorrelated;
        self
    }

    /// Retry only failures for which `predicate` returns true.
    ///
    /// The default retries transient failures. A predicate that always
    /// returns false disables retrying and is a valid configuration.
    ///
    /// ```rust
    /// use weir::RetryPolicy;
    /// use std::io;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(500))
    ///     .with_max_retries(3)
    ///     .retry_if(|err| {
    ///         err.downcast_ref::<io::Error>()
    ///             .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
    ///     });
    /// ```
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ErrorDescriptor) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Retry failures matching `filter`.
    pub fn retry_on(self, filter: FailureFilter) -> Self {
        self.retry_if(move |err| filter.matches(err))
    }

    /// Send diagnostic events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// Get the retry strategy.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Returns true if `error` is eligible for a retry.
    pub fn should_retry(&self, error: &ErrorDescriptor) -> bool {
        (self.should_retry)(error)
    }

    /// Calculate the delay before retry `retry` (1-based), without jitter.
    ///
    /// Returns `None` when `retry` is outside the retry budget.
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }

        let base_delay = match &self.strategy {
            RetryStrategy::Constant(d) => *d,
            RetryStrategy::Linear { base } => base.saturating_mul(retry),
            RetryStrategy::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(retry - 1))
            }
            RetryStrategy::Fibonacci { base } => base.saturating_mul(fibonacci(retry)),
            RetryStrategy::Custom(f) => f(retry),
        };

        Some(match self.max_delay {
            Some(max) => base_delay.min(max),
            None => base_delay,
        })
    }

    /// Calculate the delay before retry `retry` with jitter applied.
    #[doc(hidden)]
    pub fn delay_with_jitter(&self, retry: u32, prev_delay: Option<Duration>) -> Option<Duration> {
        let base_delay = self.delay_for_retry(retry)?;
        Some(self.jitter.apply(base_delay, prev_delay, self.max_delay))
    }
}

impl PolicyExt for RetryPolicy {}

impl<T: Send> Policy<T> for RetryPolicy {
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
            let mut attempts = 0u32;
            let mut prev_delay: Option<Duration> = None;

            loop {
                let error = match op.invoke().await {
                    Outcome::Failure(error) => error,
                    other => return other,
                };
                attempts += 1;

                if !self.should_retry(&error) {
                    return Outcome::Failure(error);
                }

                let Some(delay) = self.delay_with_jitter(attempts, prev_delay) else {
                    self.sink.emit(&PolicyEvent::RetriesExhausted {
                        attempts,
                        cause: error.clone(),
                    });
                    return Outcome::Failure(error);
                };

                if cancel.is_cancelled() {
                    self.sink.emit(&PolicyEvent::Cancelled);
                    return Outcome::Cancelled;
                }

                self.sink.emit(&PolicyEvent::RetryScheduled {
                    retry: attempts,
                    delay,
                    cause: error,
                });

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.sink.emit(&PolicyEvent::Cancelled);
                        return Outcome::Cancelled;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                prev_delay = Some(delay);
            }
        }
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay.
    ///
    /// # Arguments
    ///
    /// * `base_delay` - The calculated delay before jitter
    /// * `prev_delay` - The previous delay (for decorrelated jitter)
    /// * `max_delay` - Optional cap on the final delay
    pub fn apply(
        &self,
        base_delay: Duration,
        #[cfg_attr(not(feature = "jitter"), allow(unused_variables))] prev_delay: Option<Duration>,
        max_delay: Option<Duration>,
    ) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let spread = base_millis * clamp_factor(*factor);
                let min = (base_millis - spread).max(0.0);
                let max = base_millis + spread;
                Duration::from_millis(rand::rng().random_range(min..=max) as u64)
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = saturating_millis(base_delay);
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Decorrelated => {
                use rand::Rng;
                let prev = prev_delay.unwrap_or(base_delay);
                let base_millis = saturating_millis(base_delay);
                let max_millis = saturating_millis(prev).saturating_mul(3);
                if max_millis <= base_millis {
                    base_delay
                } else {
                    Duration::from_millis(rand::rng().random_range(base_millis..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Decorrelated => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}

fn clamp_factor(factor: f64) -> f64 {
    if factor.is_nan() {
        0.0
    } else {
        factor.clamp(0.0, 1.0)
    }
}

#[cfg(feature = "jitter")]
fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Calculate the nth Fibonacci number.
fn fibonacci(n: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    let mut a = 0u32;
    let mut b = 1u32;
    for _ in 1..n {
        let temp = a.saturating_add(b);
        a = b;
        b = temp;
    }
    b
}
