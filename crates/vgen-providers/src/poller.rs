//! Completion polling for asynchronous providers.
//!
//! Polls at a constant interval up to a fixed number of attempts. There is no
//! backoff, so the worst-case wait is `interval * max_attempts`.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::adapter::{JobHandle, PollStatus, ProviderAdapter, Submission};
use crate::error::{ProviderError, ProviderResult};
use crate::metrics;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default poll budget (about five minutes at the default interval).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

/// Receiver side of a job's cancellation flag.
pub type CancelSignal = watch::Receiver<bool>;

/// Resolve once the signal reads `true`. Never resolves if the sender is gone.
pub async fn cancelled(signal: &mut CancelSignal) {
    if signal.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Drives a provider from submit to artifact URL.
#[derive(Debug, Clone, Copy)]
pub struct CompletionPoller {
    interval: Duration,
    max_attempts: u32,
}

impl Default for CompletionPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_POLL_ATTEMPTS)
    }
}

impl CompletionPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Submit and, for asynchronous providers, wait for the result.
    pub async fn generate(
        &self,
        adapter: &dyn ProviderAdapter,
        prompt: &str,
        duration_seconds: u32,
        cancel: &mut CancelSignal,
    ) -> ProviderResult<String> {
        if *cancel.borrow() {
            return Err(ProviderError::Cancelled);
        }

        let submission = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(ProviderError::Cancelled),
            result = adapter.submit(prompt, duration_seconds) => result?,
        };

        match submission {
            Submission::Completed(url) => Ok(url),
            Submission::Pending(handle) => {
                self.wait_for_completion(adapter, &handle, cancel).await?;
                tokio::select! {
                    biased;
                    _ = cancelled(cancel) => Err(ProviderError::Cancelled),
                    result = adapter.fetch_result(&handle) => result,
                }
            }
        }
    }

    /// Poll until the generation succeeds, fails, or the budget runs out.
    pub async fn wait_for_completion(
        &self,
        adapter: &dyn ProviderAdapter,
        handle: &JobHandle,
        cancel: &mut CancelSignal,
    ) -> ProviderResult<()> {
        let provider_id = adapter.provider().id.as_str();
        let started = Instant::now();

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }

            let status = tokio::select! {
                biased;
                _ = cancelled(cancel) => return Err(ProviderError::Cancelled),
                status = adapter.poll_status(handle) => status?,
            };

            match status {
                PollStatus::Succeeded => {
                    debug!(
                        provider = provider_id,
                        handle = %handle,
                        attempts = attempt,
                        "Generation completed"
                    );
                    metrics::record_poll_wait(provider_id, attempt, started.elapsed());
                    return Ok(());
                }
                PollStatus::Failed(message) => {
                    metrics::record_poll_wait(provider_id, attempt, started.elapsed());
                    return Err(ProviderError::generation_failed(provider_id, message));
                }
                PollStatus::Pending => {
                    debug!(provider = provider_id, handle = %handle, attempt, "Still pending");
                }
            }
        }

        warn!(
            provider = provider_id,
            handle = %handle,
            attempts = self.max_attempts,
            "Polling budget exhausted"
        );
        metrics::record_poll_wait(provider_id, self.max_attempts, started.elapsed());
        Err(ProviderError::Timeout {
            provider: provider_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}
