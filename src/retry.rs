//! Bounded exponential backoff for source calls
//!
//! Consolidates the per-call-site retry logic into one policy:
//! `delay = base_delay * 2^attempt`, transient errors only, last error
//! returned after exhaustion. Search calls additionally treat an empty
//! page as retryable, since vendors intermittently return nothing for
//! queries that do have matches.

use crate::config::RetryConfig;
use crate::errors::{Result, SearchError};
use crate::models::{CanonicalRecord, SourceName};
use std::future::Future;
use std::time::Duration;

/// Retry policy wrapping one source call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay())
    }

    /// Run `op` with retries on transient errors.
    ///
    /// Malformed-query and other permanent errors return immediately.
    /// A vendor `Retry-After` hint overrides the computed backoff when
    /// it is longer.
    pub async fn run<T, F, Fut>(&self, source: SourceName, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with(source, op, |_| false).await
    }

    /// Run a search call with retries on transient errors and on empty
    /// successes.
    ///
    /// An empty page is retried like a transient failure; once attempts
    /// run out, the empty set is returned as-is rather than an error.
    pub async fn run_search<F, Fut>(
        &self,
        source: SourceName,
        op: F,
    ) -> Result<Vec<CanonicalRecord>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<CanonicalRecord>>>,
    {
        self.run_with(source, op, |records| records.is_empty()).await
    }

    async fn run_with<T, F, Fut, P>(&self, source: SourceName, op: F, retry_success: P) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&T) -> bool,
    {
        let mut last_error: Option<SearchError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let mut delay = self.base_delay * 2u32.pow(attempt - 1);
                if let Some(SearchError::RateLimited {
                    retry_after: Some(hint),
                    ..
                }) = &last_error
                {
                    delay = delay.max(*hint);
                }
                match &last_error {
                    Some(err) => tracing::warn!(
                        source = %source,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "source call failed, retrying"
                    ),
                    None => tracing::debug!(
                        source = %source,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "source returned nothing, retrying"
                    ),
                }
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) if retry_success(&value) && attempt < self.max_retries => {
                    last_error = None;
                }
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Only reachable when the final attempt errored transiently,
        // which the loop returns directly; keep the compiler satisfied.
        Err(last_error.unwrap_or(SearchError::NoSourcesAvailable))
    }
}
