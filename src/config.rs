//! Runtime configuration: conversion service endpoint, resilience tuning,
//! render timeouts, and validator limits.
//!
//! Every struct has a `Default` matching production values. `PipelineConfig::from_env`
//! overrides the few knobs operators change per deployment.

use std::time::Duration;

use serde::Serialize;

use crate::security::ValidatorLimits;

/// Application-level constants
pub const APP_NAME: &str = "intake-pdf";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_GOTENBERG_URL: &str = "http://localhost:3000";

pub const ENV_GOTENBERG_URL: &str = "GOTENBERG_URL";
pub const ENV_RENDER_TIMEOUT_MS: &str = "INTAKE_PDF_RENDER_TIMEOUT_MS";
pub const ENV_DEADLINE_SECS: &str = "INTAKE_PDF_DEADLINE_SECS";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "intake_pdf=info,warn"
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// When the conversion circuit opens and how long it stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit. Default: 5.
    pub max_failures: u32,
    /// Time spent open before a single trial call. Default: 60s.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Linear backoff: attempt `n` waits `retry_delay × n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt. Default: 3.
    pub max_retries: u32,
    /// Default: 1s.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverterConfig {
    /// Base URL of the Gotenberg service, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout for conversions. Default: 30s.
    pub request_timeout: Duration,
    /// Timeout of the liveness probe. Default: 5s.
    pub health_timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GOTENBERG_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything the orchestrator needs to be built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub converter: ConverterConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub validator: ValidatorLimits,
    /// Budget of a single section render. Default: 10s.
    pub render_timeout: Duration,
    /// Budget of a whole document request. Default: 120s.
    pub deadline: Duration,
    /// Audit entries buffered before new ones are dropped. Default: 1024.
    pub audit_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            converter: ConverterConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            validator: ValidatorLimits::default(),
            render_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(120),
            audit_queue_capacity: 1024,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Environment
// ═══════════════════════════════════════════════════════════

impl PipelineConfig {
    /// Defaults overridden by `GOTENBERG_URL`, `INTAKE_PDF_RENDER_TIMEOUT_MS`,
    /// and `INTAKE_PDF_DEADLINE_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    /// Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_GOTENBERG_URL).filter(|u| !u.trim().is_empty()) {
            config.converter.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(ms) = parse_positive(&lookup, ENV_RENDER_TIMEOUT_MS) {
            config.render_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_positive(&lookup, ENV_DEADLINE_SECS) {
            config.deadline = Duration::from_secs(secs);
        }
        config
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(variable = key, "Ignoring invalid configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_production_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.converter.base_url, "http://localhost:3000");
        assert_eq!(config.converter.request_timeout, Duration::from_secs(30));
        assert_eq!(config.breaker.max_failures, 5);
        assert_eq!(config.breaker.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_delay, Duration::from_secs(1));
        assert_eq!(config.render_timeout, Duration::from_secs(10));
    }

    #[test]
    fn environment_overrides() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("GOTENBERG_URL", "http://gotenberg:3000/"),
            ("INTAKE_PDF_RENDER_TIMEOUT_MS", "2500"),
            ("INTAKE_PDF_DEADLINE_SECS", "45"),
        ]));
        assert_eq!(config.converter.base_url, "http://gotenberg:3000");
        assert_eq!(config.render_timeout, Duration::from_millis(2500));
        assert_eq!(config.deadline, Duration::from_secs(45));
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("GOTENBERG_URL", "  "),
            ("INTAKE_PDF_RENDER_TIMEOUT_MS", "soon"),
            ("INTAKE_PDF_DEADLINE_SECS", "0"),
        ]));
        assert_eq!(config.converter.base_url, DEFAULT_GOTENBERG_URL);
        assert_eq!(config.render_timeout, Duration::from_secs(10));
        assert_eq!(config.deadline, Duration::from_secs(120));
    }

    #[test]
    fn app_name_is_intake_pdf() {
        assert_eq!(APP_NAME, "intake-pdf");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
