//! Resilience patterns for calls to remote endpoints
//!
//! Only retry with backoff is needed by the token lifecycle; the executor is
//! generic so the policy deciding what is retryable stays with the caller.

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult,
};
