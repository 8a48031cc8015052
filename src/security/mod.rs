//! Answer sanitization, size limits, and per-subject rate limiting.
//!
//! Every string that reaches a renderer has been HTML-escaped here. Pattern
//! detection for script and SQL probes is informational only.

pub mod sanitize;
pub mod rate;
pub mod validator;
pub mod request;

pub use sanitize::{escape_html, looks_like_sql_injection, looks_like_xss};
pub use rate::SlidingWindowLimiter;
pub use validator::*;
pub use request::*;
