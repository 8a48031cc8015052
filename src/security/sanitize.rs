use std::collections::BTreeMap;

use crate::models::FieldValue;

/// Substrings that suggest script injection. Matched case-insensitively.
/// Detection only feeds warnings; escaping is what neutralizes them.
const XSS_PATTERNS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "vbscript:",
    "data:text/html",
    "onerror=",
    "onclick=",
    "onload=",
    "onmouseover=",
    "onfocus=",
    "onblur=",
    "onchange=",
    "onsubmit=",
    "<iframe",
    "<object",
    "<embed",
    "eval(",
    "expression(",
];

/// Substrings typical of SQL injection probes. Matched case-insensitively.
const SQL_PATTERNS: &[&str] = &[
    "' or ",
    "\" or ",
    "' and ",
    "\" and ",
    " union ",
    " select ",
    " insert ",
    " update ",
    " delete ",
    " drop ",
    " create ",
    " alter ",
    " exec ",
    " execute ",
    "--",
    "/*",
    "*/",
    "xp_",
    "sp_",
];

/// Size limits applied while sanitizing.
#[derive(Debug, Clone, Copy)]
pub struct SanitizeLimits {
    pub max_string_chars: usize,
    pub max_list_len: usize,
    pub max_map_len: usize,
    pub max_field_name_len: usize,
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove null bytes and control characters, keeping tab, newline, and carriage return.
pub fn strip_control_characters(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(c, '\t' | '\n' | '\r') || !c.is_control())
        .collect()
}

pub fn looks_like_xss(text: &str) -> bool {
    let lower = text.to_lowercase();
    XSS_PATTERNS.iter().any(|p| lower.contains(p))
}

pub fn looks_like_sql_injection(text: &str) -> bool {
    let lower = text.to_lowercase();
    SQL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Restrict a field name to `[A-Za-z0-9_-]` and the length limit.
/// Returns `None` when nothing usable remains.
pub fn sanitize_field_name(name: &str, max_len: usize) -> Option<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(max_len)
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Recursive sanitizer. Collects warnings with the path of the value that caused them.
pub struct ValueSanitizer<'a> {
    limits: SanitizeLimits,
    warnings: &'a mut Vec<String>,
}

impl<'a> ValueSanitizer<'a> {
    pub fn new(limits: SanitizeLimits, warnings: &'a mut Vec<String>) -> Self {
        Self { limits, warnings }
    }

    pub fn sanitize(&mut self, path: &str, value: &FieldValue) -> FieldValue {
        match value {
            FieldValue::Null => FieldValue::Null,
            FieldValue::Bool(b) => FieldValue::Bool(*b),
            FieldValue::Number(n) => FieldValue::Number(*n),
            FieldValue::Text(s) => FieldValue::Text(self.sanitize_text(path, s)),
            FieldValue::List(items) => FieldValue::List(self.sanitize_list(path, items)),
            FieldValue::Object(map) => FieldValue::Object(self.sanitize_map(path, map)),
            other => {
                self.warnings.push(format!(
                    "Unknown type {} in field {} converted to string",
                    other.shape(),
                    path
                ));
                FieldValue::Text(self.sanitize_text(path, &other.display_text()))
            }
        }
    }

    pub fn sanitize_text(&mut self, path: &str, text: &str) -> String {
        let mut text = text;
        if let Some((cut, _)) = text.char_indices().nth(self.limits.max_string_chars) {
            self.warnings.push(format!(
                "String in field {} truncated to {} characters",
                path, self.limits.max_string_chars
            ));
            text = &text[..cut];
        }

        if looks_like_xss(text) {
            self.warnings.push(format!(
                "Potential XSS content detected and escaped in field {}",
                path
            ));
        }
        if looks_like_sql_injection(text) {
            self.warnings.push(format!(
                "Potential SQL injection pattern detected in field {}",
                path
            ));
        }

        strip_control_characters(&escape_html(text))
    }

    fn sanitize_list(&mut self, path: &str, items: &[FieldValue]) -> Vec<FieldValue> {
        if items.len() > self.limits.max_list_len {
            self.warnings.push(format!(
                "Array in field {} truncated from {} to {} items",
                path,
                items.len(),
                self.limits.max_list_len
            ));
        }
        items
            .iter()
            .take(self.limits.max_list_len)
            .enumerate()
            .map(|(i, item)| self.sanitize(&format!("{}[{}]", path, i), item))
            .collect()
    }

    fn sanitize_map(
        &mut self,
        path: &str,
        map: &BTreeMap<String, FieldValue>,
    ) -> BTreeMap<String, FieldValue> {
        if map.len() > self.limits.max_map_len {
            self.warnings.push(format!(
                "Object in field {} truncated from {} to {} entries",
                path,
                map.len(),
                self.limits.max_map_len
            ));
        }

        let mut out = BTreeMap::new();
        for (key, value) in map.iter().take(self.limits.max_map_len) {
            let child_path = format!("{}.{}", path, key);
            let Some(clean_key) = self.sanitize_key(&child_path, key) else {
                continue;
            };
            let clean_value = self.sanitize(&child_path, value);
            out.insert(clean_key, clean_value);
        }
        out
    }

    /// Sanitize a key, warning when it changes or must be dropped.
    pub fn sanitize_key(&mut self, path: &str, key: &str) -> Option<String> {
        match sanitize_field_name(key, self.limits.max_field_name_len) {
            Some(clean) if clean == key => Some(clean),
            Some(clean) => {
                self.warnings
                    .push(format!("Field name at {} sanitized to {}", path, clean));
                Some(clean)
            }
            None => {
                self.warnings
                    .push(format!("Field at {} dropped: name has no allowed characters", path));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits() -> SanitizeLimits {
        SanitizeLimits {
            max_string_chars: 20,
            max_list_len: 3,
            max_map_len: 2,
            max_field_name_len: 10,
        }
    }

    #[test]
    fn escapes_html_specials() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn strips_null_and_control_but_keeps_whitespace() {
        assert_eq!(strip_control_characters("a\0b\x07c\td\ne\rf"), "abc\td\ne\rf");
    }

    #[test]
    fn detects_xss_case_insensitively() {
        assert!(looks_like_xss("<SCRIPT>alert(1)</SCRIPT>"));
        assert!(looks_like_xss("<img src=x onerror=alert(1)>"));
        assert!(looks_like_xss("JavaScript:void(0)"));
        assert!(!looks_like_xss("I have neck pain when scripting"));
    }

    #[test]
    fn detects_sql_patterns() {
        assert!(looks_like_sql_injection("x' OR '1'='1"));
        assert!(looks_like_sql_injection("1; DROP TABLE users --"));
        assert!(!looks_like_sql_injection("Lower back pain"));
    }

    #[test]
    fn field_names_are_restricted() {
        assert_eq!(sanitize_field_name("patient name!", 100).as_deref(), Some("patientname"));
        assert_eq!(sanitize_field_name("ndi-lifting_2", 100).as_deref(), Some("ndi-lifting_2"));
        assert_eq!(sanitize_field_name("abcdefghijkl", 5).as_deref(), Some("abcde"));
        assert_eq!(sanitize_field_name("<>!", 100), None);
    }

    #[test]
    fn script_text_is_escaped_with_warning() {
        let mut warnings = Vec::new();
        let mut sanitizer = ValueSanitizer::new(limits(), &mut warnings);
        let out = sanitizer.sanitize_text("patient_name", "<script>x</script>");
        assert!(!out.contains("<script"));
        assert!(out.starts_with("&lt;script&gt;"));
        assert!(warnings.iter().any(|w| w.contains("XSS")));
    }

    #[test]
    fn oversized_collections_are_truncated_not_rejected() {
        let mut warnings = Vec::new();
        let mut sanitizer = ValueSanitizer::new(limits(), &mut warnings);
        let value = FieldValue::from(json!({
            "list": [1, 2, 3, 4, 5],
            "map": {"a": 1, "b": 2, "c": 3}
        }));

        let out = sanitizer.sanitize("root", &value);
        let list = out.get("list").and_then(FieldValue::as_list).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(out.get("map").and_then(FieldValue::as_object).unwrap().len(), 2);
        assert_eq!(warnings.iter().filter(|w| w.contains("truncated")).count(), 2);
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let mut warnings = Vec::new();
        let mut sanitizer = ValueSanitizer::new(limits(), &mut warnings);
        let out = sanitizer.sanitize_text("f", &"é".repeat(30));
        assert_eq!(out.chars().count(), 20);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn timestamps_are_stringified_with_warning() {
        let mut warnings = Vec::new();
        let mut sanitizer = ValueSanitizer::new(limits(), &mut warnings);
        let ts = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let out = sanitizer.sanitize("visit", &FieldValue::Timestamp(ts));
        assert!(out.as_str().unwrap().starts_with("2024-01-01"));
        assert!(warnings[0].contains("Unknown type timestamp"));
    }
}
