//! Timeout and bounded retry for outbound calls.
//!
//! Every call to the CI system or the asset store goes through a
//! [`RetryPolicy`]: each attempt is bounded by a timeout, and only errors the
//! provider might not repeat (timeouts, transport failures, 5xx) are retried.
//! Retrying a dispatch can start a duplicate run; the correlator's tie-break
//! absorbs that.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use buildrelay_types::config::{CiConfig, StorageConfig};
use buildrelay_types::error::{CiError, StorageError};

/// Errors that can distinguish transient from permanent failures.
pub trait TransientError: Sized {
    /// The error reported when an attempt exceeds its timeout.
    fn timed_out() -> Self;

    fn is_retryable(&self) -> bool;
}

impl TransientError for CiError {
    fn timed_out() -> Self {
        CiError::Timeout
    }

    fn is_retryable(&self) -> bool {
        CiError::is_retryable(self)
    }
}

impl TransientError for StorageError {
    fn timed_out() -> Self {
        StorageError::Timeout
    }

    fn is_retryable(&self) -> bool {
        StorageError::is_retryable(self)
    }
}

/// Per-call timeout plus bounded retry with linear backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Retries after the first attempt (total attempts = 1 + max_retries).
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_ci(&CiConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_ci(config: &CiConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub fn from_storage(config: &StorageConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(250),
        }
    }

    /// A policy that never retries; used by tests and one-shot CLI calls.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Run `call` under this policy.
    ///
    /// `call` is invoked once per attempt. The last error is returned when
    /// retries are exhausted or the error is permanent.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        E: TransientError + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out()),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %e,
                        "external call failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
