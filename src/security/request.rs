use std::sync::LazyLock;

use regex::Regex;

/// Document identifiers as issued by the document store.
static DOCUMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{5,100}$").expect("valid document id regex"));

/// User agents of common scanners. Flagged, not blocked.
const SUSPICIOUS_AGENTS: &[&str] = &[
    "sqlmap", "nikto", "nmap", "masscan", "zap", "burp", "w3af", "acunetix", "nessus", "openvas",
];

/// A document generation request as seen by the surrounding handler.
#[derive(Debug, Clone, Default)]
pub struct DocumentRequest<'a> {
    pub user_id: &'a str,
    pub document_id: &'a str,
    pub user_agent: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestCheck {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Shape checks on a generation request, ahead of any store access.
pub fn validate_request(request: &DocumentRequest<'_>) -> RequestCheck {
    let mut check = RequestCheck::default();

    if request.user_id.trim().is_empty() {
        check.errors.push("User ID is required".to_string());
    }

    if !DOCUMENT_ID.is_match(request.document_id) {
        check
            .errors
            .push("Document ID must be 5-100 characters of letters, digits, '_' or '-'".to_string());
    }

    if let Some(agent) = request.user_agent {
        let lower = agent.to_lowercase();
        if SUSPICIOUS_AGENTS.iter().any(|s| lower.contains(s)) {
            check.warnings.push("Suspicious user agent".to_string());
        }
    }

    check.is_valid = check.errors.is_empty();
    check
}
