//! Declarative retry configuration.
//!
//! [`RetryConfig`] is plain data, so hosts can keep it in whatever settings
//! format they already use (enable the `serde` feature) and turn it into a
//! [`RetryPolicy`] with [`RetryConfig::build`].

use std::time::Duration;

use crate::error::{ConfigError, FailureFilter};
use crate::retry::policy::RetryPolicy;

/// Configuration for a [`RetryPolicy`].
///
/// Defaults to three retries, 500ms apart, for transient failures.
///
/// ```rust
/// use weir::retry::{BackoffConfig, RetryConfig};
/// use std::time::Duration;
///
/// let config = RetryConfig {
///     max_retries: 5,
///     backoff: BackoffConfig::Exponential { base_ms: 50 },
///     max_delay_ms: Some(1_000),
///     ..RetryConfig::default()
/// };
///
/// let policy = config.build().unwrap();
/// assert_eq!(policy.delay_for_retry(5), Some(Duration::from_millis(800)));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// How delays grow between retries.
    pub backoff: BackoffConfig,
    /// Optional cap on any single delay, in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Randomization applied to delays.
    pub jitter: JitterConfig,
    /// Which failures are retried.
    pub retry_on: FailureFilter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffConfig::Constant { delay_ms: 500 },
            max_delay_ms: None,
            jitter: JitterConfig::None,
            retry_on: FailureFilter::Transient,
        }
    }
}

/// Backoff section of a [`RetryConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "strategy", rename_all = "snake_case")
)]
pub enum BackoffConfig {
    /// Same delay before every retry.
    Constant {
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// base * k.
    Linear {
        /// Base delay in milliseconds.
        base_ms: u64,
    },
    /// base * 2^(k-1).
    Exponential {
        /// Base delay in milliseconds.
        base_ms: u64,
    },
    /// base * fib(k).
    Fibonacci {
        /// Base delay in milliseconds.
        base_ms: u64,
    },
}

impl BackoffConfig {
    fn name(&self) -> &'static str {
        match self {
            BackoffConfig::Constant { .. } => "constant",
            BackoffConfig::Linear { .. } => "linear",
            BackoffConfig::Exponential { .. } => "exponential",
            BackoffConfig::Fibonacci { .. } => "fibonacci",
        }
    }

    fn base_ms(&self) -> u64 {
        match self {
            BackoffConfig::Constant { delay_ms } => *delay_ms,
            BackoffConfig::Linear { base_ms }
            | BackoffConfig::Exponential { base_ms }
            | BackoffConfig::Fibonacci { base_ms } => *base_ms,
        }
    }
}

/// Jitter section of a [`RetryConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum JitterConfig {
    /// No jitter.
    #[default]
    None,
    /// ±factor around the computed delay.
    Proportional {
        /// Spread, in `[0, 1]`.
        factor: f64,
    },
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay, 3 * previous delay]`.
    Decorrelated,
}

impl RetryConfig {
    /// Check the configuration without building a policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let JitterConfig::Proportional { factor } = self.jitter {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::JitterOutOfRange(factor));
            }
        }

        let base_ms = self.backoff.base_ms();
        if base_ms == 0 && !matches!(self.backoff, BackoffConfig::Constant { .. }) {
            return Err(ConfigError::ZeroBase {
                strategy: self.backoff.name(),
            });
        }

        if let Some(max_delay_ms) = self.max_delay_ms {
            if max_delay_ms < base_ms {
                return Err(ConfigError::MaxDelayBelowBase {
                    max_delay_ms,
                    base_ms,
                });
            }
        }

        Ok(())
    }

    /// Build the policy described by this configuration.
    pub fn build(&self) -> Result<RetryPolicy, ConfigError> {
        self.validate()?;

        let mut policy = match self.backoff {
            BackoffConfig::Constant { delay_ms } => {
                RetryPolicy::constant(Duration::from_millis(delay_ms))
            }
            BackoffConfig::Linear { base_ms } => RetryPolicy::linear(Duration::from_millis(base_ms)),
            BackoffConfig::Exponential { base_ms } => {
                RetryPolicy::exponential(Duration::from_millis(base_ms))
            }
            BackoffConfig::Fibonacci { base_ms } => {
                RetryPolicy::fibonacci(Duration::from_millis(base_ms))
            }
        }
        .with_max_retries(self.max_retries)
        .retry_on(self.retry_on);

        if let Some(max_delay_ms) = self.max_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(max_delay_ms));
        }

        policy = match self.jitter {
            JitterConfig::None => policy,
            JitterConfig::Proportional { factor } => policy.with_jitter(factor),
            JitterConfig::Full => policy.with_full_jitter(),
            JitterConfig::Decorrelated => policy.with_decorrelated_jitter(),
        };

        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDescriptor;
    use crate::retry::policy::{JitterStrategy, RetryStrategy};

    #[test]
    fn test_default_builds_fixed_delay_policy() {
        let policy = RetryConfig::default().build().unwrap();

        assert_eq!(policy.max_retries(), 3);
        assert!(matches!(policy.strategy(), RetryStrategy::Constant(d) if *d == Duration::from_millis(500)));
        assert!(policy.should_retry(&ErrorDescriptor::transient_msg("x")));
        assert!(!policy.should_retry(&ErrorDescriptor::terminal_msg("x")));
    }

    #[test]
    fn test_build_applies_every_field() {
        let config = RetryConfig {
            max_retries: 4,
            backoff: BackoffConfig::Linear { base_ms: 10 },
            max_delay_ms: Some(25),
            jitter: JitterConfig::Full,
            retry_on: FailureFilter::Any,
        };
        let policy = config.build().unwrap();

        assert_eq!(policy.max_retries(), 4);
        assert_eq!(policy.max_delay(), Some(Duration::from_millis(25)));
        assert_eq!(policy.jitter(), &JitterStrategy::Full);
        assert_eq!(policy.delay_for_retry(4), Some(Duration::from_millis(25)));
        assert!(policy.should_retry(&ErrorDescriptor::terminal_msg("x")));
    }

    #[test]
    fn test_rejects_out_of_range_jitter() {
        let config = RetryConfig {
            jitter: JitterConfig::Proportional { factor: 1.5 },
            ..RetryConfig::default()
        };
        assert_eq!(config.build().unwrap_err(), ConfigError::JitterOutOfRange(1.5));
    }

    #[test]
    fn test_rejects_zero_exponential_base() {
        let config = RetryConfig {
            backoff: BackoffConfig::Exponential { base_ms: 0 },
            ..RetryConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroBase {
                strategy: "exponential"
            })
        );
    }

    #[test]
    fn test_zero_constant_delay_is_allowed() {
        let config = RetryConfig {
            backoff: BackoffConfig::Constant { delay_ms: 0 },
            ..RetryConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_cap_below_base() {
        let config = RetryConfig {
            backoff: BackoffConfig::Exponential { base_ms: 100 },
            max_delay_ms: Some(10),
            ..RetryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxDelayBelowBase { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_partial_config() {
        let config: RetryConfig = serde_json::from_str(
            r#"{
                "max_retries": 5,
                "backoff": { "strategy": "exponential", "base_ms": 100 },
                "jitter": { "kind": "proportional", "factor": 0.2 },
                "retry_on": "any"
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff, BackoffConfig::Exponential { base_ms: 100 });
        assert_eq!(config.max_delay_ms, None);
        assert_eq!(config.retry_on, FailureFilter::Any);
        assert!(config.build().is_ok());
    }
}
