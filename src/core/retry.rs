//! Retrying wrapper around a single [`HttpTransport`] send.
//!
//! Transport failures and responses with status 429 or 5xx are retried up to
//! `max_retries` times, sleeping `backoff * attempt` between attempts. When
//! the budget runs out the last outcome is handed back untouched: a response
//! stays a response (callers inspect the status) and an error stays the same
//! error. A fired abort signal is never retried.

use crate::domain::model::{FetchRequest, FetchResponse};
use crate::domain::ports::HttpTransport;
use crate::utils::error::{ClientError, Result};
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF_MS: u64 = 300;

/// 429 and the whole 5xx range are worth another attempt. Everything else is final.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    /// Linear backoff: the n-th retry waits `backoff * n`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

pub struct RetryableFetch<T: HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryableFetch<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut attempt: u32 = 0;

        loop {
            let outcome = self.send_once(request).await;

            let retryable = match &outcome {
                Ok(response) => is_retryable_status(response.status),
                Err(_) if request.is_aborted() => return Err(ClientError::Aborted),
                Err(e) => e.is_retryable(),
            };
            if !retryable {
                return outcome;
            }
            if attempt >= self.policy.max_retries {
                tracing::warn!(retries = attempt, "Retry budget exhausted, returning last outcome");
                return outcome;
            }

            match &outcome {
                Ok(response) => tracing::debug!(status = response.status, "Retryable status"),
                Err(e) => tracing::debug!(error = %e, "Transient transport failure"),
            }

            attempt += 1;
            let delay = self.policy.backoff_for(attempt);
            tracing::info!(
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying request"
            );
            self.backoff(request, delay).await?;
        }
    }

    async fn send_once(&self, request: &FetchRequest) -> Result<FetchResponse> {
        match &request.abort {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(ClientError::Aborted);
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ClientError::Aborted),
                    outcome = self.transport.send(request) => outcome,
                }
            }
            None => self.transport.send(request).await,
        }
    }

    async fn backoff(&self, request: &FetchRequest, delay: Duration) -> Result<()> {
        match &request.abort {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("Aborted during backoff");
                    Err(ClientError::Aborted)
                }
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
