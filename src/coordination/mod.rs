//! Cache/coordination store seam.
//!
//! Locks and rate counters are shared across instances, so every operation
//! that reads then writes is a single atomic store call (compare-and-delete,
//! compare-and-expire, window admit). Callers never compose read + write.

pub mod memory;
pub mod lock;

pub use memory::*;
pub use lock::*;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinationError {
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("Coordination store operation failed: {0}")]
    Operation(String),
}

/// Outcome of a sliding-window admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// Request recorded; `count` includes it.
    Admitted { count: u32 },
    /// Window full; the oldest entry leaves it after `retry_after`.
    Rejected { retry_after: Duration },
}

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Store `value` under `key` only if the key is absent. Returns whether it was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CoordinationError>;

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CoordinationError>;

    /// Delete `key` only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CoordinationError>;

    /// Reset the TTL of `key` only if it currently holds `expected`.
    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError>;

    /// Remaining time to live. `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CoordinationError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CoordinationError>;

    /// Drop entries older than `window`, then record this request if fewer
    /// than `limit` remain. One atomic step.
    async fn window_admit(
        &self,
        key: &str,
        window: Duration,
        limit: u32,
    ) -> Result<WindowDecision, CoordinationError>;
}
