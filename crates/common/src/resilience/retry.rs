//! Generic retry executor with exponential backoff and jitter
//!
//! The executor runs an async operation up to `max_attempts` times. After
//! each failure a [`RetryPolicy`] decides whether the error is worth another
//! attempt; the delay before that attempt comes from the configured
//! [`BackoffStrategy`] plus [`Jitter`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All attempts failed with retryable errors
    #[error("all {attempts} attempts failed; last error: {last}")]
    AttemptsExhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: E,
    },

    /// The operation failed with an error the policy refused to retry
    #[error("operation failed with non-retryable error: {source}")]
    NonRetryable {
        /// The error the policy stopped on
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up, when known.
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::AttemptsExhausted { attempts, .. } => Some(*attempts),
            Self::NonRetryable { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide what to do after `attempt` (1-based) failed with `error`
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff
    Retry,
    /// Give up immediately
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: `initial_delay * base^retry`, capped at `max_delay`
    Exponential {
        /// Delay before the first retry
        initial_delay: Duration,
        /// Growth factor per retry
        base: f64,
        /// Upper bound on any single delay
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Delay before retry number `retry` (0 for the first retry)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let secs = initial_delay.as_secs_f64() * base.powi(exponent);
                if secs.is_finite() && secs < max_delay.as_secs_f64() {
                    Duration::from_secs_f64(secs.max(0.0))
                } else {
                    *max_delay
                }
            }
        }
    }
}

/// Jitter added on top of the backoff delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Adds a uniformly random delay in `[0, max)`
    Additive {
        /// Exclusive upper bound of the added delay
        max: Duration,
    },
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Additive { max } if max.is_zero() => delay,
            Self::Additive { max } => {
                let extra = rand::thread_rng().gen_range(0.0..max.as_secs_f64());
                delay + Duration::from_secs_f64(extra)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Backoff strategy
    pub backoff: BackoffStrategy,
    /// Jitter applied on top of the backoff
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    /// Three attempts, `2^retry` seconds of backoff plus up to one second of
    /// jitter.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_secs(1),
                base: 2.0,
                max_delay: Duration::from_secs(30),
            },
            jitter: Jitter::Additive { max: Duration::from_secs(1) },
        }
    }
}

impl RetryConfig {
    /// Same attempt budget without any waiting between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, backoff: BackoffStrategy::Fixed(Duration::ZERO), jitter: Jitter::None }
    }

    /// Override the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retry number `retry` (0-based), jitter included.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.jitter.apply(self.backoff.calculate_delay(retry))
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic.
    ///
    /// `operation` receives the 1-based attempt number.
    ///
    /// # Errors
    /// - `RetryError::NonRetryable` as soon as the policy answers `Stop`
    /// - `RetryError::AttemptsExhausted` carrying the last error once the
    ///   attempt budget is spent
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, "executing operation");

            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if self.policy.should_retry(&error, attempt) == RetryDecision::Stop {
                debug!(attempt, error = %error, "retry policy declined to retry");
                return Err(RetryError::NonRetryable { source: error });
            }
            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %error, "all retry attempts exhausted");
                return Err(RetryError::AttemptsExhausted { attempts: attempt, last: error });
            }
            let delay = self.config.delay_for(attempt - 1);

            warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Pre-defined retry policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Retries whenever the predicate returns true
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        /// Wrap a predicate over the error and the 1-based attempt number
        pub const fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
