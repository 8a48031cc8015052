use std::sync::Arc;
use std::time::Duration;

use crate::coordination::{CoordinationStore, WindowDecision};

/// Per-subject sliding-window limiter backed by the shared coordination store,
/// so the quota holds across every instance that shares the store.
pub struct SlidingWindowLimiter {
    store: Arc<dyn CoordinationStore>,
    limit: u32,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    fn key(subject_id: &str) -> String {
        format!("rate_limit:{}", subject_id)
    }

    /// Check if a subject is within its quota. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    ///
    /// A store failure admits the request (logged).
    pub async fn check(&self, subject_id: &str) -> Result<(), u64> {
        match self
            .store
            .window_admit(&Self::key(subject_id), self.window, self.limit)
            .await
        {
            Ok(WindowDecision::Admitted { .. }) => Ok(()),
            Ok(WindowDecision::Rejected { retry_after }) => {
                Err(retry_after.as_secs().max(1))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit check unavailable, admitting request");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::MemoryStore;

    #[tokio::test]
    async fn quota_is_per_subject() {
        let limiter =
            SlidingWindowLimiter::new(Arc::new(MemoryStore::new()), 2, Duration::from_secs(60));
        assert!(limiter.check("user-a").await.is_ok());
        assert!(limiter.check("user-a").await.is_ok());
        let retry = limiter.check("user-a").await.unwrap_err();
        assert!(retry >= 1 && retry <= 60);
        assert!(limiter.check("user-b").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn quota_recovers_after_window() {
        let limiter =
            SlidingWindowLimiter::new(Arc::new(MemoryStore::new()), 1, Duration::from_secs(60));
        assert!(limiter.check("u").await.is_ok());
        assert!(limiter.check("u").await.is_err());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check("u").await.is_ok());
    }
}
