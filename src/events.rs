//! Diagnostic events emitted by policies
//!
//! Policies report what they do through an [`EventSink`]. The default sink,
//! [`TracingSink`], forwards every event to `tracing` with structured fields,
//! so a host that installs a subscriber sees retries, fallbacks and final
//! failures without further wiring.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use weir::events::{EventSink, PolicyEvent};
//! use weir::RetryPolicy;
//!
//! #[derive(Debug)]
//! struct Stderr;
//!
//! impl EventSink for Stderr {
//!     fn emit(&self, event: &PolicyEvent) {
//!         eprintln!("{}", event);
//!     }
//! }
//!
//! let policy = RetryPolicy::constant(Duration::from_millis(10))
//!     .with_max_retries(2)
//!     .with_sink(Arc::new(Stderr));
//! ```

use std::fmt;
use std::time::Duration;

use tracing::Level;

use crate::error::ErrorDescriptor;

/// Something a policy did that an operator may want to see.
#[derive(Debug, Clone)]
pub enum PolicyEvent {
    /// A retry-eligible failure was observed and another attempt is scheduled.
    RetryScheduled {
        /// 1-based index of the upcoming retry.
        retry: u32,
        /// Delay before the retry starts.
        delay: Duration,
        /// The failure that triggered the retry.
        cause: ErrorDescriptor,
    },
    /// A retry policy stopped retrying and is returning its last failure.
    RetriesExhausted {
        /// Attempts made, including the initial one.
        attempts: u32,
        /// The last failure observed.
        cause: ErrorDescriptor,
    },
    /// A failure is being replaced by the fallback operation's outcome.
    FallbackInvoked {
        /// The failure being replaced.
        cause: ErrorDescriptor,
    },
    /// The pipeline is returning a failure to the caller.
    FinalFailure {
        /// The failure returned to the caller.
        cause: ErrorDescriptor,
    },
    /// Execution stopped because the cancellation token fired.
    Cancelled,
}

impl PolicyEvent {
    /// Severity used when forwarding the event to `tracing`.
    pub fn level(&self) -> Level {
        match self {
            PolicyEvent::RetryScheduled { .. } => Level::DEBUG,
            PolicyEvent::RetriesExhausted { .. } => Level::WARN,
            PolicyEvent::FallbackInvoked { .. } => Level::WARN,
            PolicyEvent::FinalFailure { .. } => Level::ERROR,
            PolicyEvent::Cancelled => Level::INFO,
        }
    }

    /// The failure this event is about, if any.
    pub fn cause(&self) -> Option<&ErrorDescriptor> {
        match self {
            PolicyEvent::RetryScheduled { cause, .. }
            | PolicyEvent::RetriesExhausted { cause, .. }
            | PolicyEvent::FallbackInvoked { cause }
            | PolicyEvent::FinalFailure { cause } => Some(cause),
            PolicyEvent::Cancelled => None,
        }
    }
}

impl fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEvent::RetryScheduled {
                retry,
                delay,
                cause,
            } => write!(f, "retry {} in {:?} after {}", retry, delay, cause),
            PolicyEvent::RetriesExhausted { attempts, cause } => {
                write!(f, "retries exhausted after {} attempt(s): {}", attempts, cause)
            }
            PolicyEvent::FallbackInvoked { cause } => {
                write!(f, "invoking fallback after {}", cause)
            }
            PolicyEvent::FinalFailure { cause } => write!(f, "operation failed: {}", cause),
            PolicyEvent::Cancelled => write!(f, "execution cancelled"),
        }
    }
}

/// Receiver of diagnostic events.
///
/// Implementations must not block; they run inline on the execution path.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Accept one event.
    fn emit(&self, event: &PolicyEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PolicyEvent) {
        match event {
            PolicyEvent::RetryScheduled {
                retry,
                delay,
                cause,
            } => tracing::debug!(
                retry = *retry,
                delay_ms = delay.as_millis() as u64,
                kind = %cause.kind(),
                cause = %cause.cause(),
                "retrying after failure"
            ),
            PolicyEvent::FallbackInvoked { cause } => tracing::warn!(
                kind = %cause.kind(),
                cause = %cause.cause(),
                "invoking fallback operation"
            ),
            PolicyEvent::RetriesExhausted { attempts, cause } => tracing::warn!(
                attempts = *attempts,
                kind = %cause.kind(),
                cause = %cause.cause(),
                "retries exhausted"
            ),
            PolicyEvent::FinalFailure { cause } => tracing::error!(
                kind = %cause.kind(),
                cause = %cause.cause(),
                "operation failed"
            ),
            PolicyEvent::Cancelled => tracing::info!("execution cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_levels() {
        let cause = ErrorDescriptor::transient_msg("x");
        assert_eq!(
            PolicyEvent::FallbackInvoked {
                cause: cause.clone()
            }
            .level(),
            Level::WARN
        );
        assert_eq!(PolicyEvent::FinalFailure { cause }.level(), Level::ERROR);
        assert_eq!(PolicyEvent::Cancelled.level(), Level::INFO);
    }

    #[test]
    fn test_display() {
        let event = PolicyEvent::RetryScheduled {
            retry: 2,
            delay: Duration::from_millis(500),
            cause: ErrorDescriptor::transient_msg("reset"),
        };
        assert_eq!(
            event.to_string(),
            "retry 2 in 500ms after transient failure: reset"
        );
        assert!(event.cause().is_some());
        assert!(PolicyEvent::Cancelled.cause().is_none());
    }

    #[test]
    #[traced_test]
    fn test_tracing_sink_logs_structured_fields() {
        TracingSink.emit(&PolicyEvent::RetryScheduled {
            retry: 1,
            delay: Duration::from_millis(250),
            cause: ErrorDescriptor::transient_msg("connection reset"),
        });
        TracingSink.emit(&PolicyEvent::FallbackInvoked {
            cause: ErrorDescriptor::terminal_msg("not found"),
        });

        assert!(logs_contain("retrying after failure"));
        assert!(logs_contain("delay_ms=250"));
        assert!(logs_contain("connection reset"));
        assert!(logs_contain("invoking fallback operation"));
    }
}
