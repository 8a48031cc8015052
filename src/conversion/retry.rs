use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

use super::ConversionError;

/// Retries transient conversion failures with linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }

    /// Wait before attempt `attempt` (0-based). The first attempt never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.config.retry_delay.saturating_mul(attempt)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retries run out. `op` receives the 0-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ConversionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ConversionError>>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                tracing::debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "Retrying conversion");
                tokio::time::sleep(delay).await;
            }

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "Conversion succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Conversion failed with non-retryable error");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Conversion attempt failed");
                    last = Some(e);
                }
            }
        }

        Err(ConversionError::Exhausted {
            attempts,
            last: Box::new(last.unwrap_or_else(|| ConversionError::HttpClient("no attempt was made".into()))),
        })
    }
}
