use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;

use super::ConversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Permission to make one call. Returned to the breaker with the outcome.
#[derive(Debug)]
#[must_use]
pub struct Admission {
    trial: bool,
}

/// Consecutive-failure circuit breaker.
///
/// Closed passes calls through. `max_failures` consecutive failures open the
/// circuit; while open every call is rejected without running. After
/// `reset_timeout` the circuit half-opens and admits exactly one trial: success
/// closes it, failure reopens it for another full timeout.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Current state, accounting for an elapsed reset timeout.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .opened_at
            .map(|at| at.elapsed() >= self.config.reset_timeout)
            .unwrap_or(true);
        if elapsed {
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
            tracing::info!("Conversion circuit half-open, admitting one trial call");
        }
    }

    /// Admit a call, or reject it while open or while a trial is in flight.
    pub fn admit(&self) -> Result<Admission, ConversionError> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => Ok(Admission { trial: false }),
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(Admission { trial: true })
            }
            CircuitState::HalfOpen | CircuitState::Open => Err(ConversionError::CircuitOpen),
        }
    }

    pub fn record_success(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.trial || inner.state == CircuitState::HalfOpen {
            tracing::info!("Conversion circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if admission.trial {
            inner.trial_in_flight = false;
        }
        let reopen = admission.trial || inner.state == CircuitState::HalfOpen;
        if reopen || inner.consecutive_failures >= self.config.max_failures {
            if inner.state != CircuitState::Open {
                tracing::warn!(
                    failures = inner.consecutive_failures,
                    "Conversion circuit opened"
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// A call admitted but never reported back. An abandoned trial reopens the
    /// circuit; an abandoned closed-state call counts for nothing.
    fn record_abandoned(&self, admission: Admission) {
        if !admission.trial {
            return;
        }
        let mut inner = self.lock();
        inner.trial_in_flight = false;
        if inner.state == CircuitState::HalfOpen {
            tracing::warn!("Conversion trial call abandoned, circuit reopened");
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Run `call` under the breaker. Dropping the returned future mid-call is
    /// safe: the admission is handed back on drop.
    pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, ConversionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ConversionError>>,
    {
        let mut pending = PendingCall {
            breaker: self,
            admission: Some(self.admit()?),
        };
        let result = call().await;
        if let Some(admission) = pending.admission.take() {
            match &result {
                Ok(_) => self.record_success(admission),
                Err(_) => self.record_failure(admission),
            }
        }
        result
    }
}

struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    admission: Option<Admission>,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            self.breaker.record_abandoned(admission);
        }
    }
}
