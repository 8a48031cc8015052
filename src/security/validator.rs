use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::coordination::CoordinationStore;
use crate::models::Answers;

use super::rate::SlidingWindowLimiter;
use super::sanitize::{SanitizeLimits, ValueSanitizer};

/// Limits enforced by the validator.
#[derive(Debug, Clone)]
pub struct ValidatorLimits {
    /// Requests per subject per window. Default: 10.
    pub requests_per_window: u32,
    /// Default: 60 seconds.
    pub window: Duration,
    /// More top-level fields than this rejects the payload. Default: 1000.
    pub max_field_count: usize,
    /// Longer strings are truncated. Default: 7,000,000 (room for embedded images).
    pub max_string_chars: usize,
    /// Longer lists are truncated. Default: 100.
    pub max_list_len: usize,
    /// Larger nested objects are truncated. Default: 50.
    pub max_map_len: usize,
    /// Default: 100.
    pub max_field_name_len: usize,
}

impl Default for ValidatorLimits {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window: Duration::from_secs(60),
            max_field_count: 1000,
            max_string_chars: 7_000_000,
            max_list_len: 100,
            max_map_len: 50,
            max_field_name_len: 100,
        }
    }
}

/// Outcome of validating one payload.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Empty unless `is_valid`.
    pub sanitized: Answers,
}

/// Why a subject was turned away before its data was looked at.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubjectRejected {
    #[error("Subject ID is required")]
    MissingSubject,

    #[error("Rate limit exceeded: retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },
}

/// Rate limits and sanitizes untyped answer data before anything renders it.
pub struct SecurityValidator {
    limits: ValidatorLimits,
    limiter: SlidingWindowLimiter,
}

impl SecurityValidator {
    pub fn new(store: Arc<dyn CoordinationStore>, limits: ValidatorLimits) -> Self {
        let limiter =
            SlidingWindowLimiter::new(store, limits.requests_per_window, limits.window);
        Self { limits, limiter }
    }

    pub fn limits(&self) -> &ValidatorLimits {
        &self.limits
    }

    /// Check that `subject_id` is present and within its rate limit.
    pub async fn admit_subject(&self, subject_id: &str) -> Result<(), SubjectRejected> {
        if subject_id.trim().is_empty() {
            return Err(SubjectRejected::MissingSubject);
        }
        if let Err(retry_after) = self.limiter.check(subject_id).await {
            tracing::warn!(retry_after_secs = retry_after, "Validation rate limit exceeded");
            return Err(SubjectRejected::RateLimited { retry_after });
        }
        Ok(())
    }

    /// Rate-limit `subject_id`, then sanitize `data`. A rate-limit breach
    /// returns immediately without touching the data.
    pub async fn validate_and_sanitize(&self, subject_id: &str, data: &Answers) -> ValidationResult {
        if let Err(rejected) = self.admit_subject(subject_id).await {
            return ValidationResult {
                errors: vec![rejected.to_string()],
                ..Default::default()
            };
        }
        self.sanitize_answers(data)
    }

    /// Sanitize without rate limiting. Enforces the field-count limit and every
    /// size limit.
    pub fn sanitize_answers(&self, data: &Answers) -> ValidationResult {
        if data.len() > self.limits.max_field_count {
            return ValidationResult {
                errors: vec![format!(
                    "Too many fields: {} (max {})",
                    data.len(),
                    self.limits.max_field_count
                )],
                ..Default::default()
            };
        }

        let mut warnings = Vec::new();
        let mut sanitized = Answers::new();
        let mut collisions = Vec::new();
        {
            let mut sanitizer = ValueSanitizer::new(self.sanitize_limits(), &mut warnings);
            for (name, value) in data {
                let Some(clean_name) = sanitizer.sanitize_key(name, name) else {
                    continue;
                };
                let clean_value = sanitizer.sanitize(&clean_name, value);
                // Two raw names can collapse to the same safe name; the later one wins.
                if sanitized.insert(clean_name.clone(), clean_value).is_some() {
                    collisions.push(clean_name);
                }
            }
        }
        warnings.extend(
            collisions
                .into_iter()
                .map(|name| format!("Field name collision on {}", name)),
        );

        ValidationResult {
            is_valid: true,
            warnings,
            errors: Vec::new(),
            sanitized,
        }
    }

    fn sanitize_limits(&self) -> SanitizeLimits {
        SanitizeLimits {
            max_string_chars: self.limits.max_string_chars,
            max_list_len: self.limits.max_list_len,
            max_map_len: self.limits.max_map_len,
            max_field_name_len: self.limits.max_field_name_len,
        }
    }
}
