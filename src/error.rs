//! Error descriptors and error types
//!
//! A failed attempt is described by an [`ErrorDescriptor`]: a classification
//! ([`ErrorKind`]) plus the underlying cause. Policies never look at the cause
//! directly; their predicates receive the whole descriptor and decide from it.
//!
//! # Examples
//!
//! ```
//! use weir::{ErrorDescriptor, ErrorKind};
//!
//! let err = ErrorDescriptor::transient_msg("connection reset");
//! assert_eq!(err.kind(), ErrorKind::Transient);
//! assert!(err.is_transient());
//! assert_eq!(err.to_string(), "transient failure: connection reset");
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased cause of a failure.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Classification of a failure, used by retry and fallback predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    /// The failure may go away if the operation is tried again.
    Transient,
    /// Trying again will not help.
    Terminal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Terminal => write!(f, "terminal"),
        }
    }
}

/// Which failures a policy reacts to.
///
/// A named, serializable alternative to a predicate closure. Fallback policies
/// default to [`FailureFilter::Any`]; retry policies to
/// [`FailureFilter::Transient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailureFilter {
    /// Every failure.
    Any,
    /// Only transient failures.
    #[default]
    Transient,
    /// Only terminal failures.
    Terminal,
    /// No failure at all; the policy is inert.
    Never,
}

impl FailureFilter {
    /// Returns true if `error` passes the filter.
    pub fn matches(&self, error: &ErrorDescriptor) -> bool {
        match self {
            FailureFilter::Any => true,
            FailureFilter::Transient => error.is_transient(),
            FailureFilter::Terminal => error.is_terminal(),
            FailureFilter::Never => false,
        }
    }
}

/// A classified failure flowing through the policy pipeline.
///
/// Cloning is cheap: the cause is reference counted, so the same descriptor can
/// be logged, handed to predicates and returned to the caller.
#[derive(Clone)]
pub struct ErrorDescriptor {
    kind: ErrorKind,
    cause: Cause,
}

impl ErrorDescriptor {
    /// Create a descriptor from a classification and a cause.
    pub fn new<E>(kind: ErrorKind, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind,
            cause: Arc::new(cause),
        }
    }

    /// Create a descriptor from an already shared cause.
    pub fn from_shared(kind: ErrorKind, cause: Cause) -> Self {
        Self { kind, cause }
    }

    /// A transient failure caused by `cause`.
    pub fn transient<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(ErrorKind::Transient, cause)
    }

    /// A terminal failure caused by `cause`.
    pub fn terminal<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(ErrorKind::Terminal, cause)
    }

    /// A transient failure carrying only a message.
    pub fn transient_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, Message(message.into()))
    }

    /// A terminal failure carrying only a message.
    pub fn terminal_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Terminal, Message(message.into()))
    }

    /// The classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if the failure is classified as transient.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    /// Returns true if the failure is classified as terminal.
    pub fn is_terminal(&self) -> bool {
        self.kind == ErrorKind::Terminal
    }

    /// The underlying cause.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Try to view the cause as a concrete error type.
    ///
    /// ```
    /// use weir::ErrorDescriptor;
    /// use std::io;
    ///
    /// let err = ErrorDescriptor::transient(io::Error::from(io::ErrorKind::TimedOut));
    /// let io_err = err.downcast_ref::<io::Error>().unwrap();
    /// assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    /// ```
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause.downcast_ref::<E>()
    }

    /// Returns true if both descriptors share the same cause allocation.
    ///
    /// Used to check that a failure was propagated verbatim rather than
    /// replaced.
    pub fn same_cause(&self, other: &ErrorDescriptor) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }
}

impl fmt::Debug for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDescriptor")
            .field("kind", &self.kind)
            .field("cause", &self.cause.to_string())
            .finish()
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.cause)
    }
}

impl StdError for ErrorDescriptor {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Plain message cause used by the `*_msg` constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Error returned when an [`Outcome`](crate::Outcome) is converted into a `Result`.
#[derive(Debug, Clone)]
pub enum ExecutionError {
    /// The pipeline ended in a failure that no policy handled.
    Failed(ErrorDescriptor),
    /// The pipeline was aborted by its cancellation token.
    Cancelled,
}

impl ExecutionError {
    /// Returns true if the execution was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }

    /// The failure descriptor, if the execution failed.
    pub fn descriptor(&self) -> Option<&ErrorDescriptor> {
        match self {
            ExecutionError::Failed(err) => Some(err),
            ExecutionError::Cancelled => None,
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Failed(err) => write!(f, "{}", err),
            ExecutionError::Cancelled => write!(f, "execution cancelled"),
        }
    }
}

impl StdError for ExecutionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExecutionError::Failed(err) => Some(err),
            ExecutionError::Cancelled => None,
        }
    }
}

/// Invalid policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Jitter factor outside `[0, 1]`.
    JitterOutOfRange(f64),
    /// A backoff base of zero with a growing strategy never grows.
    ZeroBase {
        /// Name of the backoff strategy.
        strategy: &'static str,
    },
    /// `max_delay_ms` is smaller than the first computed delay.
    MaxDelayBelowBase {
        /// Configured cap in milliseconds.
        max_delay_ms: u64,
        /// Configured base delay in milliseconds.
        base_ms: u64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::JitterOutOfRange(factor) => {
                write!(f, "jitter factor {} is outside [0, 1]", factor)
            }
            ConfigError::ZeroBase { strategy } => {
                write!(f, "{} backoff requires a non-zero base delay", strategy)
            }
            ConfigError::MaxDelayBelowBase {
                max_delay_ms,
                base_ms,
            } => write!(
                f,
                "max delay {}ms is below the base delay {}ms",
                max_delay_ms, base_ms
            ),
        }
    }
}

impl StdError for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_descriptor_classification() {
        let transient = ErrorDescriptor::transient_msg("reset");
        assert!(transient.is_transient());
        assert!(!transient.is_terminal());

        let terminal = ErrorDescriptor::terminal_msg("404");
        assert!(terminal.is_terminal());
        assert_eq!(terminal.kind(), ErrorKind::Terminal);
    }

    #[test]
    fn test_descriptor_display_and_source() {
        let err = ErrorDescriptor::terminal(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "terminal failure: gone");
        assert_eq!(err.source().unwrap().to_string(), "gone");
    }

    #[test]
    fn test_clone_shares_cause() {
        let err = ErrorDescriptor::transient_msg("boom");
        let cloned = err.clone();
        assert!(err.same_cause(&cloned));
        assert!(!err.same_cause(&ErrorDescriptor::transient_msg("boom")));
    }

    #[test]
    fn test_downcast_message_is_private() {
        let err = ErrorDescriptor::transient_msg("boom");
        assert!(err.downcast_ref::<io::Error>().is_none());
    }

    #[test]
    fn test_execution_error() {
        let failed = ExecutionError::Failed(ErrorDescriptor::terminal_msg("bad"));
        assert!(!failed.is_cancelled());
        assert!(failed.descriptor().is_some());
        assert_eq!(failed.to_string(), "terminal failure: bad");

        let cancelled = ExecutionError::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(cancelled.descriptor().is_none());
        assert!(cancelled.source().is_none());
    }

    #[test]
    fn test_failure_filter() {
        let transient = ErrorDescriptor::transient_msg("a");
        let terminal = ErrorDescriptor::terminal_msg("b");

        assert!(FailureFilter::Any.matches(&transient));
        assert!(FailureFilter::Any.matches(&terminal));
        assert!(FailureFilter::Transient.matches(&transient));
        assert!(!FailureFilter::Transient.matches(&terminal));
        assert!(FailureFilter::Terminal.matches(&terminal));
        assert!(!FailureFilter::Never.matches(&transient));
        assert_eq!(FailureFilter::default(), FailureFilter::Transient);
    }

    #[test]
    fn test_config_error_display() {
        assert!(ConfigError::JitterOutOfRange(1.5)
            .to_string()
            .contains("outside [0, 1]"));
        assert!(ConfigError::ZeroBase {
            strategy: "exponential"
        }
        .to_string()
        .contains("exponential"));
    }
}
