use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use super::{CoordinationError, CoordinationStore};

/// Document generation for one response runs at most once at a time.
const DOCUMENT_LOCK_TTL: Duration = Duration::from_secs(5 * 60);
/// Form edits are short; editors wait briefly for a concurrent save.
const FORM_LOCK_TTL: Duration = Duration::from_secs(2 * 60);
const FORM_LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LockError {
    #[error("Resource is locked by another holder: {0}")]
    Contended(String),

    #[error("Timed out after {waited_ms}ms waiting for lock on {resource}")]
    WaitTimeout { resource: String, waited_ms: u64 },

    #[error("Lock on {0} is not held by this token")]
    NotOwner(String),

    #[error(transparent)]
    Store(#[from] CoordinationError),
}

/// Opaque holder identity. Only the holder can release or extend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A lock acquired by this process.
#[derive(Debug, Clone)]
pub struct HeldLock {
    pub resource: String,
    pub token: LockToken,
    pub ttl: Duration,
}

/// Point-in-time view of a lock key, for operators.
#[derive(Debug, Clone, PartialEq)]
pub struct LockStatus {
    pub key: String,
    pub locked: bool,
    pub remaining_ttl: Option<Duration>,
}

/// Wait-mode backoff: exponential from `initial` by `multiplier`, capped at `ceiling`.
#[derive(Debug, Clone)]
pub struct LockBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub ceiling: Duration,
}

impl Default for LockBackoff {
    /// 100ms start, ×1.5 per attempt, 1s ceiling.
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            multiplier: 1.5,
            ceiling: Duration::from_secs(1),
        }
    }
}

impl LockBackoff {
    fn next(&self, current: Duration) -> Duration {
        let nanos = (current.as_nanos() as f64 * self.multiplier) as u64;
        Duration::from_nanos(nanos).min(self.ceiling)
    }
}

/// Per-resource mutual exclusion across instances, built on atomic store calls.
pub struct LockManager {
    store: Arc<dyn CoordinationStore>,
    backoff: LockBackoff,
}

impl LockManager {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_backoff(store, LockBackoff::default())
    }

    pub fn with_backoff(store: Arc<dyn CoordinationStore>, backoff: LockBackoff) -> Self {
        Self { store, backoff }
    }

    pub fn lock_key(resource: &str) -> String {
        format!("lock:{}", resource)
    }

    /// Non-blocking acquire.
    pub async fn acquire(&self, resource: &str, ttl: Duration) -> Result<HeldLock, LockError> {
        let token = LockToken::generate();
        let stored = self
            .store
            .set_if_absent(&Self::lock_key(resource), token.as_str(), ttl)
            .await?;

        if !stored {
            return Err(LockError::Contended(resource.to_string()));
        }

        tracing::debug!(resource = %resource, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
        Ok(HeldLock {
            resource: resource.to_string(),
            token,
            ttl,
        })
    }

    /// Acquire, retrying with capped exponential backoff until `max_wait` elapses.
    pub async fn acquire_within(
        &self,
        resource: &str,
        ttl: Duration,
        max_wait: Duration,
    ) -> Result<HeldLock, LockError> {
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut delay = self.backoff.initial;

        loop {
            match self.acquire(resource, ttl).await {
                Err(LockError::Contended(_)) => {}
                other => return other,
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::WaitTimeout {
                    resource: resource.to_string(),
                    waited_ms: now.duration_since(started).as_millis() as u64,
                });
            }

            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = self.backoff.next(delay);
        }
    }

    /// Release if, and only if, `token` still holds the lock.
    pub async fn release(&self, resource: &str, token: &LockToken) -> Result<(), LockError> {
        let deleted = self
            .store
            .delete_if_equals(&Self::lock_key(resource), token.as_str())
            .await?;

        if !deleted {
            tracing::warn!(resource = %resource, "Release refused: lock not held by caller");
            return Err(LockError::NotOwner(resource.to_string()));
        }

        tracing::debug!(resource = %resource, "Lock released");
        Ok(())
    }

    /// Reset the lock's TTL to `ttl`, owner-checked.
    pub async fn extend(
        &self,
        resource: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<(), LockError> {
        let extended = self
            .store
            .expire_if_equals(&Self::lock_key(resource), token.as_str(), ttl)
            .await?;

        if !extended {
            return Err(LockError::NotOwner(resource.to_string()));
        }
        Ok(())
    }

    /// Whether `token` still owns the lock. False after the TTL lapsed or
    /// another holder took over.
    pub async fn is_held(&self, resource: &str, token: &LockToken) -> Result<bool, LockError> {
        let current = self.store.get(&Self::lock_key(resource)).await?;
        Ok(current.as_deref() == Some(token.as_str()))
    }

    pub async fn remaining_ttl(&self, resource: &str) -> Result<Option<Duration>, LockError> {
        Ok(self.store.ttl(&Self::lock_key(resource)).await?)
    }

    pub async fn status(&self, resource: &str) -> Result<LockStatus, LockError> {
        let key = Self::lock_key(resource);
        let locked = self.store.get(&key).await?.is_some();
        let remaining_ttl = if locked { self.store.ttl(&key).await? } else { None };
        Ok(LockStatus {
            key,
            locked,
            remaining_ttl,
        })
    }

    /// Status of every live lock, sorted by key.
    pub async fn all_locks(&self) -> Result<Vec<LockStatus>, LockError> {
        let keys = self.store.keys_with_prefix("lock:").await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let remaining_ttl = self.store.ttl(&key).await?;
            out.push(LockStatus {
                key,
                locked: true,
                remaining_ttl,
            });
        }
        Ok(out)
    }

    /// Guard for generating a response's document. Fails fast when another
    /// instance is already generating it.
    pub async fn acquire_document_lock(&self, response_id: &str) -> Result<HeldLock, LockError> {
        self.acquire(&format!("pdf-gen:{}", response_id), DOCUMENT_LOCK_TTL)
            .await
    }

    pub async fn acquire_form_lock(&self, form_id: &str) -> Result<HeldLock, LockError> {
        self.acquire_within(&format!("form-edit:{}", form_id), FORM_LOCK_TTL, FORM_LOCK_WAIT)
            .await
    }
}
