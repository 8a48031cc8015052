use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{BreakerConfig, RetryConfig};

use super::{CircuitBreaker, CircuitState, ConversionError, DocumentConverter, PageOptions, RetryPolicy};

/// Snapshot of the resilience layer for health endpoints and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverterMetrics {
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub max_failures: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// A converter behind a circuit breaker, each admitted call retried with
/// backoff. One exhausted retry sequence counts as one breaker failure.
pub struct ResilientConverter {
    inner: Arc<dyn DocumentConverter>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientConverter {
    pub fn new(inner: Arc<dyn DocumentConverter>, breaker: BreakerConfig, retry: RetryConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(breaker),
            retry: RetryPolicy::new(retry),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn metrics(&self) -> ConverterMetrics {
        let retry = self.retry.config();
        ConverterMetrics {
            circuit_state: self.breaker.state(),
            consecutive_failures: self.breaker.consecutive_failures(),
            max_failures: self.breaker.config().max_failures,
            max_retries: retry.max_retries,
            retry_delay_ms: retry.retry_delay.as_millis() as u64,
        }
    }
}

#[async_trait]
impl DocumentConverter for ResilientConverter {
    async fn convert(&self, html: &str, options: &PageOptions) -> Result<Vec<u8>, ConversionError> {
        let result = self
            .breaker
            .call(|| self.retry.run(|_| self.inner.convert(html, options)))
            .await;

        if let Err(ConversionError::CircuitOpen) = &result {
            tracing::warn!("Conversion rejected, circuit open");
        }
        result
    }

    /// Probes the service directly; health checks never trip the breaker.
    async fn health(&self) -> Result<(), ConversionError> {
        self.inner.health().await
    }
}
