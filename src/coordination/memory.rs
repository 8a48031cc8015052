use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{CoordinationError, CoordinationStore, WindowDecision};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    windows: HashMap<String, VecDeque<Instant>>,
}

impl State {
    /// Live entry for `key`, purging it first if it has expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

/// Single-process coordination store. Every trait call holds one mutex for its
/// whole body, which gives the same atomicity a cache server's scripts give.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State, Instant) -> T) -> Result<T, CoordinationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoordinationError::Unavailable("memory store lock poisoned".into()))?;
        Ok(f(&mut state, Instant::now()))
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError> {
        self.with_state(|state, now| {
            if state.live(key, now).is_some() {
                return false;
            }
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + ttl),
                },
            );
            true
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        self.with_state(|state, now| state.live(key, now).map(|e| e.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CoordinationError> {
        self.with_state(|state, now| {
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: ttl.map(|t| now + t),
                },
            );
        })
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CoordinationError> {
        self.with_state(|state, now| {
            let owned = state.live(key, now).is_some_and(|e| e.value == expected);
            if owned {
                state.entries.remove(key);
            }
            owned
        })
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError> {
        self.with_state(|state, now| match state.live(key, now) {
            Some(entry) if entry.value == expected => {
                entry.expires_at = Some(now + ttl);
                true
            }
            _ => false,
        })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CoordinationError> {
        self.with_state(|state, now| {
            state
                .live(key, now)
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(now))
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CoordinationError> {
        self.with_state(|state, now| {
            state.entries.retain(|_, e| e.is_live(now));
            let mut keys: Vec<String> = state
                .entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            keys
        })
    }

    async fn window_admit(
        &self,
        key: &str,
        window: Duration,
        limit: u32,
    ) -> Result<WindowDecision, CoordinationError> {
        self.with_state(|state, now| {
            let hits = state.windows.entry(key.to_string()).or_default();
            while hits.front().is_some_and(|ts| now.duration_since(*ts) >= window) {
                hits.pop_front();
            }

            if hits.len() as u32 >= limit {
                let retry_after = hits
                    .front()
                    .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                    .unwrap_or(window);
                return WindowDecision::Rejected { retry_after };
            }

            hits.push_back(now);
            WindowDecision::Admitted {
                count: hits.len() as u32,
            }
        })
    }
}
