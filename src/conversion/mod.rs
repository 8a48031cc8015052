//! HTML → PDF conversion: the converter seam, the Gotenberg client, and the
//! circuit breaker / retry wrapper around it.

pub mod breaker;
pub mod gotenberg;
pub mod resilient;
pub mod retry;

pub use breaker::*;
pub use gotenberg::*;
pub use resilient::*;
pub use retry::*;

use async_trait::async_trait;
use thiserror::Error;

/// Anything smaller cannot be a rendered page.
pub const MIN_PDF_BYTES: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Cannot connect to conversion service at {0}")]
    Connection(String),

    #[error("Conversion request timed out after {0}s")]
    Timeout(u64),

    #[error("Conversion service error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Conversion produced {0} bytes, too small to be a PDF")]
    OutputTooSmall(usize),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Conversion circuit is open")]
    CircuitOpen,

    #[error("Conversion failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ConversionError>,
    },
}

impl ConversionError {
    /// Transient failures worth another attempt. Client errors other than
    /// 429 are not: the same request would fail the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConversionError::Connection(_)
            | ConversionError::Timeout(_)
            | ConversionError::OutputTooSmall(_)
            | ConversionError::HttpClient(_) => true,
            ConversionError::Status { status, .. } => {
                *status == 429 || !(400..500).contains(status)
            }
            ConversionError::CircuitOpen | ConversionError::Exhausted { .. } => false,
        }
    }
}

/// Page setup sent with every conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOptions {
    pub margin_top: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub margin_right: String,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub format: String,
    pub landscape: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            margin_top: "0.5in".into(),
            margin_bottom: "0.5in".into(),
            margin_left: "0.5in".into(),
            margin_right: "0.5in".into(),
            print_background: true,
            prefer_css_page_size: true,
            format: "A4".into(),
            landscape: false,
        }
    }
}

impl PageOptions {
    /// Multipart form fields, in the conversion service's field names.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("marginTop", self.margin_top.clone()),
            ("marginBottom", self.margin_bottom.clone()),
            ("marginLeft", self.margin_left.clone()),
            ("marginRight", self.margin_right.clone()),
            ("printBackground", self.print_background.to_string()),
            ("preferCSSPageSize", self.prefer_css_page_size.to_string()),
            ("format", self.format.clone()),
            ("landscape", self.landscape.to_string()),
        ]
    }
}

/// Turns a complete HTML document into PDF bytes.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, html: &str, options: &PageOptions) -> Result<Vec<u8>, ConversionError>;

    /// Liveness probe.
    async fn health(&self) -> Result<(), ConversionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let status = |status| ConversionError::Status {
            status,
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(ConversionError::Timeout(30).is_retryable());
        assert!(ConversionError::OutputTooSmall(12).is_retryable());
        assert!(!ConversionError::CircuitOpen.is_retryable());
    }

    #[test]
    fn page_options_form_fields() {
        let fields = PageOptions::default().form_fields();
        assert!(fields.contains(&("marginTop", "0.5in".to_string())));
        assert!(fields.contains(&("printBackground", "true".to_string())));
        assert!(fields.contains(&("preferCSSPageSize", "true".to_string())));
        assert!(fields.contains(&("format", "A4".to_string())));
        assert!(fields.contains(&("landscape", "false".to_string())));
    }
}
