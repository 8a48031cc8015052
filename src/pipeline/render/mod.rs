//! Section rendering: one pure renderer per pattern kind, run through a
//! registry that sanitizes input and bounds every call with a timeout.
//!
//! Renderers receive only the sanitized answer view. Every text value they
//! see is already HTML-escaped, so they interpolate answers directly and
//! escape only text that comes from the form definition.

pub mod context;
pub mod html;
pub mod layout;
pub mod registry;
pub mod sections;

pub use context::*;
pub use registry::*;

use thiserror::Error;

use crate::pipeline::detection::{PatternKind, PatternMatch};

/// Why a renderer could not produce its section.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderFailure {
    #[error("no renderable data in {0}")]
    NoData(String),

    #[error("invalid value in {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A failed section, as recorded in the audit trail and shown in the
/// document placeholder.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[{code}] {section}: {cause} (request: {request_id})")]
pub struct RenderError {
    pub code: String,
    pub section: String,
    pub cause: String,
    pub request_id: String,
}

impl RenderError {
    /// Stable error code for a renderer that ran and failed (or panicked).
    pub fn failed_code(kind: PatternKind) -> String {
        format!("RNDR-{}-001", kind.code_segment())
    }
}

/// A pure function from a match and the sanitized answers to an HTML fragment.
///
/// Implementations must not perform I/O, read clocks, or depend on anything
/// outside their arguments: identical inputs give byte-identical output.
pub trait SectionRenderer: Send + Sync {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure>;
}

/// Outcome of rendering one section. `html` is the placeholder when `error` is set.
#[derive(Debug, Clone)]
pub struct SectionResult {
    pub kind: PatternKind,
    pub html: String,
    pub error: Option<RenderError>,
}

/// The visible block that replaces a section that could not be rendered.
pub fn error_placeholder(error: &RenderError) -> String {
    format!(
        r#"<div class="section-error">
  <h3>Could Not Render Section: {section}</h3>
  <p>This section could not be generated due to a system error. Please review this information in the patient's online chart or contact support.</p>
  <p class="error-code">Error Code: {code} | Request: {request_id}</p>
</div>"#,
        section = html::escape(&error.section),
        code = html::escape(&error.code),
        request_id = html::escape(&error.request_id),
    )
}
